//! Plain-text rendering of section content for the preview pane.

use crate::models::{BarLine, LyricsLine, Section, SectionLine};

/// What a rendered row carries, so the UI can style chords apart from lyrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Chords,
    Lyrics,
    Bars,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub kind: RowKind,
    pub text: String,
}

/// Column a chord starts at when its line spans `width` cells.
pub fn anchor_column(anchor: f64, width: usize) -> usize {
    if width <= 1 {
        return 0;
    }
    let column = (anchor.clamp(0.0, 1.0) * (width - 1) as f64).round() as usize;
    column.min(width - 1)
}

/// Narrowest span a lyric line is laid out over, so short or empty lines
/// still leave room to place chords.
pub const MIN_LINE_SPAN: usize = 16;

/// Where one chord label ends up on a chord row, in columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSpan {
    pub chord_id: String,
    pub start: usize,
    pub end: usize,
}

/// Number of columns a lyric line's chords are placed across.
pub fn line_span(line: &LyricsLine) -> usize {
    line.lyrics.chars().count().max(MIN_LINE_SPAN)
}

/// Compute label positions for a line. A label that would overlap the
/// previous one is pushed right past it with one space of separation.
pub fn chord_layout(line: &LyricsLine, width: usize) -> Vec<ChordSpan> {
    let mut spans: Vec<ChordSpan> = Vec::with_capacity(line.chords.len());
    for chord in &line.chords {
        let target = anchor_column(chord.anchor, width);
        let start = match spans.last() {
            Some(previous) => target.max(previous.end + 1),
            None => target,
        };
        spans.push(ChordSpan {
            chord_id: chord.id.clone(),
            start,
            end: start + chord.chord.chars().count(),
        });
    }
    spans
}

/// Lay chord labels out on a single row.
pub fn chord_row(line: &LyricsLine, width: usize) -> String {
    let mut row = String::new();
    let mut cursor = 0usize;
    for (chord, span) in line.chords.iter().zip(chord_layout(line, width)) {
        while cursor < span.start {
            row.push(' ');
            cursor += 1;
        }
        row.push_str(&chord.chord);
        cursor = span.end;
    }
    row
}

/// Bar grid row such as `| C | G | Am |`. Placeholders render as `-`.
pub fn bar_row(line: &BarLine) -> String {
    if line.bars.is_empty() {
        return "|".to_string();
    }
    let cells: Vec<&str> = line
        .bars
        .iter()
        .map(|bar| if bar.is_empty() { "-" } else { bar.as_str() })
        .collect();
    format!("| {} |", cells.join(" | "))
}

/// Render every line of a section. Chord rows are placed against `width`
/// when given, otherwise against [`line_span`].
pub fn render_section(section: &Section, width: Option<usize>) -> Vec<RenderedRow> {
    let mut rows = Vec::new();
    for line in &section.content.lines {
        match line {
            SectionLine::Lyrics(line) => {
                if !line.chords.is_empty() {
                    let span = width.unwrap_or_else(|| line_span(line));
                    rows.push(RenderedRow {
                        kind: RowKind::Chords,
                        text: chord_row(line, span),
                    });
                }
                rows.push(RenderedRow {
                    kind: RowKind::Lyrics,
                    text: line.lyrics.clone(),
                });
            }
            SectionLine::Bars(line) => rows.push(RenderedRow {
                kind: RowKind::Bars,
                text: bar_row(line),
            }),
        }
    }
    rows
}
