//! State of one editing session, threaded explicitly through the UI instead of
//! living in a global.

use tracing::{debug, warn};

use crate::editor::ops;
use crate::error::StoreResult;
use crate::models::{ChordAnnotation, LyricsLine, Song, SongUpdate};
use crate::store::SongStore;

/// Step used when nudging a chord left or right from the keyboard.
pub const ANCHOR_NUDGE: f64 = 0.02;

/// Pending edit of a single chord. `chord_id` is `None` while creating.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordDialog {
    pub section_id: String,
    pub line_id: String,
    pub chord_id: Option<String>,
    pub anchor: f64,
    pub value: String,
}

impl ChordDialog {
    pub fn create(section_id: &str, line_id: &str, anchor: f64) -> Self {
        Self {
            section_id: section_id.to_string(),
            line_id: line_id.to_string(),
            chord_id: None,
            anchor,
            value: String::new(),
        }
    }

    pub fn edit(section_id: &str, line_id: &str, chord: &ChordAnnotation) -> Self {
        Self {
            section_id: section_id.to_string(),
            line_id: line_id.to_string(),
            chord_id: Some(chord.id.clone()),
            anchor: chord.anchor,
            value: chord.chord.clone(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.chord_id.is_none()
    }
}

#[derive(Debug)]
pub struct EditorSession {
    song: Option<Song>,
    preview_visible: bool,
    dirty: bool,
    saving: bool,
    dialog: Option<ChordDialog>,
    share_message: Option<String>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            song: None,
            preview_visible: true,
            dirty: false,
            saving: false,
            dialog: None,
            share_message: None,
        }
    }

    pub fn with_song(song: Song) -> Self {
        let mut session = Self::new();
        session.set_song(song);
        session
    }

    /// Replace the song wholesale, e.g. after loading or saving.
    pub fn set_song(&mut self, song: Song) {
        self.song = Some(song);
        self.dirty = false;
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn preview_visible(&self) -> bool {
        self.preview_visible
    }

    pub fn toggle_preview(&mut self) {
        self.preview_visible = !self.preview_visible;
    }

    /// Run an edit against the song. Returns whether anything changed; only a
    /// real change marks the session dirty.
    pub fn apply<F>(&mut self, op: F) -> bool
    where
        F: FnOnce(Song) -> Song,
    {
        let Some(song) = self.song.take() else {
            return false;
        };
        let before = song.clone();
        let next = op(song);
        let changed = next != before;
        self.song = Some(next);
        self.dirty |= changed;
        changed
    }

    pub fn find_line(&self, section_id: &str, line_id: &str) -> Option<&LyricsLine> {
        self.song()?
            .section(section_id)?
            .content
            .lines
            .iter()
            .filter_map(|line| line.as_lyrics())
            .find(|line| line.id == line_id)
    }

    pub fn find_chord(
        &self,
        section_id: &str,
        line_id: &str,
        chord_id: &str,
    ) -> Option<&ChordAnnotation> {
        self.find_line(section_id, line_id)?
            .chords
            .iter()
            .find(|chord| chord.id == chord_id)
    }

    pub fn dialog(&self) -> Option<&ChordDialog> {
        self.dialog.as_ref()
    }

    pub fn dialog_mut(&mut self) -> Option<&mut ChordDialog> {
        self.dialog.as_mut()
    }

    pub fn open_dialog(&mut self, dialog: ChordDialog) {
        debug!(line_id = %dialog.line_id, new = dialog.is_new(), "opened chord dialog");
        self.dialog = Some(dialog);
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }

    /// Commit the dialog. A blank value closes it without touching the song;
    /// otherwise the chord is renamed (and moved to the dialog anchor) or
    /// created.
    pub fn confirm_dialog(&mut self) -> bool {
        let Some(dialog) = self.dialog.take() else {
            return false;
        };
        let value = dialog.value.trim().to_string();
        if value.is_empty() {
            return false;
        }
        let ChordDialog {
            section_id,
            line_id,
            chord_id,
            anchor,
            ..
        } = dialog;
        match chord_id {
            Some(chord_id) => self.apply(|song| {
                let song = ops::update_chord_label(song, &section_id, &line_id, &chord_id, &value);
                ops::update_chord_anchor(song, &section_id, &line_id, &chord_id, anchor)
            }),
            None => self.apply(|song| ops::add_chord(song, &section_id, &line_id, &value, anchor)),
        }
    }

    /// Delete the chord the dialog is editing. Does nothing while creating.
    pub fn delete_dialog_chord(&mut self) -> bool {
        let Some(dialog) = self.dialog.take() else {
            return false;
        };
        let Some(chord_id) = dialog.chord_id.clone() else {
            self.dialog = Some(dialog);
            return false;
        };
        self.apply(|song| ops::delete_chord(song, &dialog.section_id, &dialog.line_id, &chord_id))
    }

    pub fn nudge_dialog_anchor(&mut self, steps: i32) {
        if let Some(dialog) = self.dialog.as_mut() {
            dialog.anchor = (dialog.anchor + ANCHOR_NUDGE * f64::from(steps)).clamp(0.0, 1.0);
        }
    }

    pub fn share_message(&self) -> Option<&str> {
        self.share_message.as_deref()
    }

    pub fn set_share_message(&mut self, message: impl Into<String>) {
        self.share_message = Some(message.into());
    }

    pub fn clear_share_message(&mut self) {
        self.share_message = None;
    }

    /// Write the song back through the store. On failure the local edits stay
    /// in place and the session stays dirty so the user can retry.
    pub fn save(&mut self, store: &dyn SongStore, owner_id: &str) -> StoreResult<()> {
        let Some(song) = self.song.as_ref() else {
            return Ok(());
        };
        self.saving = true;
        let result = store.update(&song.id, owner_id, &SongUpdate::from(song));
        self.saving = false;

        match result {
            Ok(saved) => {
                self.set_song(saved);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "save failed, keeping local edits");
                Err(err)
            }
        }
    }
}
