//! Core library surface for ChordBook, a terminal chord-sheet editor.
//!
//! The content model and its codec live in [`content`], pure song edits in
//! [`editor`], and persistence behind the [`SongStore`] trait. The `bin`
//! target wires these to the TUI in [`ui`].
pub mod config;
pub mod content;
pub mod db;
pub mod editor;
pub mod error;
pub mod identity;
pub mod ids;
pub mod logging;
pub mod models;
pub mod store;
pub mod ui;

pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use identity::{ConfiguredIdentity, IdentityProvider};

/// The domain types other layers manipulate.
pub use models::{
    ChordAnnotation, LyricsLine, Section, SectionContent, SectionLine, SectionType, Song,
    SongMeta, SongSummary, Visibility,
};

pub use store::{ListFilter, SongStore, SqliteStore};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
