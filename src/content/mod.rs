//! Section content model: the codec between persisted payloads and editable
//! lines, plus preview rendering.

pub mod codec;
pub mod render;

pub use codec::{
    clamp_anchor, clone_section_content, create_empty_line, create_section, decode,
    decode_sections, encode, encode_sections, parse_bar_text,
};
pub use render::{
    chord_layout, chord_row, line_span, render_section, ChordSpan, RenderedRow, RowKind,
};
