use anyhow::{anyhow, Context, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{SectionType, Song, SongMeta, SongSummary, DEFAULT_TIME_SIGNATURE};

/// Form state for song creation and metadata editing.
#[derive(Clone)]
pub(crate) struct SongForm {
    pub(crate) title: String,
    pub(crate) artist: String,
    pub(crate) key: String,
    pub(crate) bpm: String,
    pub(crate) time_signature: String,
    pub(crate) active: SongField,
    pub(crate) error: Option<String>,
}

/// Fields within the song form, in focus order.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum SongField {
    #[default]
    Title,
    Artist,
    Key,
    Bpm,
    TimeSignature,
}

impl SongField {
    pub(crate) const ALL: [SongField; 5] = [
        SongField::Title,
        SongField::Artist,
        SongField::Key,
        SongField::Bpm,
        SongField::TimeSignature,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            SongField::Title => "Title",
            SongField::Artist => "Artist",
            SongField::Key => "Key",
            SongField::Bpm => "BPM",
            SongField::TimeSignature => "Time",
        }
    }

    fn placeholder(self) -> &'static str {
        match self {
            SongField::Title => "<required>",
            _ => "<optional>",
        }
    }

    /// Row of the field inside the form, counted from the top.
    pub(crate) fn row(self) -> u16 {
        match self {
            SongField::Title => 0,
            SongField::Artist => 1,
            SongField::Key => 2,
            SongField::Bpm => 3,
            SongField::TimeSignature => 4,
        }
    }
}

impl Default for SongForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            key: String::new(),
            bpm: String::new(),
            time_signature: DEFAULT_TIME_SIGNATURE.to_string(),
            active: SongField::Title,
            error: None,
        }
    }
}

impl SongForm {
    pub(crate) fn from_song(song: &Song) -> Self {
        Self {
            title: song.title.clone(),
            artist: song.artist.clone().unwrap_or_default(),
            key: song.key.clone().unwrap_or_default(),
            bpm: song.bpm.map(|bpm| bpm.to_string()).unwrap_or_default(),
            time_signature: song.time_signature.clone(),
            active: SongField::Title,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        self.active = match self.active {
            SongField::Title => SongField::Artist,
            SongField::Artist => SongField::Key,
            SongField::Key => SongField::Bpm,
            SongField::Bpm => SongField::TimeSignature,
            SongField::TimeSignature => SongField::Title,
        };
    }

    pub(crate) fn previous_field(&mut self) {
        self.active = match self.active {
            SongField::Title => SongField::TimeSignature,
            SongField::Artist => SongField::Title,
            SongField::Key => SongField::Artist,
            SongField::Bpm => SongField::Key,
            SongField::TimeSignature => SongField::Bpm,
        };
    }

    /// Insert a character into the active field. The BPM field only takes
    /// digits.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        if self.active == SongField::Bpm && !ch.is_ascii_digit() {
            return false;
        }
        self.value_mut(self.active).push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.value_mut(self.active).pop();
    }

    /// Validate the inputs that the form itself can check. Length limits are
    /// left to the store.
    pub(crate) fn parse_inputs(&self) -> Result<SongMeta> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(anyhow!("Song title is required."));
        }
        let bpm = match self.bpm.trim() {
            "" => None,
            raw => {
                let bpm = raw
                    .parse::<u32>()
                    .context("BPM must be a whole number.")?;
                if bpm == 0 {
                    return Err(anyhow!("BPM must be greater than zero."));
                }
                Some(bpm)
            }
        };
        Ok(SongMeta {
            title: title.to_string(),
            artist: optional(&self.artist),
            key: optional(&self.key),
            bpm,
            time_signature: self.time_signature.trim().to_string(),
        })
    }

    pub(crate) fn build_line(&self, field: SongField) -> Line<'static> {
        let value = self.value(field);
        let is_active = self.active == field;

        let display = if value.is_empty() {
            field.placeholder().to_string()
        } else {
            value.to_string()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{}: ", field.label())),
            Span::styled(display, style),
        ])
    }

    pub(crate) fn value_len(&self, field: SongField) -> usize {
        self.value(field).chars().count()
    }

    fn value(&self, field: SongField) -> &str {
        match field {
            SongField::Title => &self.title,
            SongField::Artist => &self.artist,
            SongField::Key => &self.key,
            SongField::Bpm => &self.bpm,
            SongField::TimeSignature => &self.time_signature,
        }
    }

    fn value_mut(&mut self, field: SongField) -> &mut String {
        match field {
            SongField::Title => &mut self.title,
            SongField::Artist => &mut self.artist,
            SongField::Key => &mut self.key,
            SongField::Bpm => &mut self.bpm,
            SongField::TimeSignature => &mut self.time_signature,
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// What a single-line prompt edits once confirmed.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PromptPurpose {
    AddSection(SectionType),
    RenameSection { section_id: String },
    EditLyrics { section_id: String, line_id: String },
    EditBars { section_id: String, line_id: String },
    OpenShare,
    GrantAccess { song_id: String },
    RevokeAccess { song_id: String },
}

impl PromptPurpose {
    pub(crate) fn title(&self) -> &'static str {
        match self {
            PromptPurpose::AddSection(SectionType::LyricsChord) => "New Lyrics Section",
            PromptPurpose::AddSection(SectionType::Bar) => "New Bar Section",
            PromptPurpose::RenameSection { .. } => "Rename Section",
            PromptPurpose::EditLyrics { .. } => "Edit Lyrics",
            PromptPurpose::EditBars { .. } => "Edit Bars",
            PromptPurpose::OpenShare => "Open Shared Song",
            PromptPurpose::GrantAccess { .. } => "Grant Access",
            PromptPurpose::RevokeAccess { .. } => "Revoke Access",
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            PromptPurpose::AddSection(_) | PromptPurpose::RenameSection { .. } => "Name",
            PromptPurpose::EditLyrics { .. } => "Lyrics",
            PromptPurpose::EditBars { .. } => "Bars",
            PromptPurpose::OpenShare => "Token",
            PromptPurpose::GrantAccess { .. } | PromptPurpose::RevokeAccess { .. } => "User",
        }
    }

    pub(crate) fn hint(&self) -> &'static str {
        match self {
            PromptPurpose::EditBars { .. } => "Separate bars with |, leave a cell blank for a rest.",
            PromptPurpose::OpenShare => "Paste a share token and press Enter.",
            PromptPurpose::GrantAccess { .. } => {
                "Only applies while visibility is specific users."
            }
            _ => "Enter to confirm, Esc to cancel.",
        }
    }
}

/// Single-line text input shown in a popup.
#[derive(Clone, Debug)]
pub(crate) struct TextPrompt {
    pub(crate) purpose: PromptPurpose,
    pub(crate) value: String,
}

impl TextPrompt {
    pub(crate) fn new(purpose: PromptPurpose, initial: impl Into<String>) -> Self {
        Self {
            purpose,
            value: initial.into(),
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.value.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.value.pop();
    }

    pub(crate) fn prefix(&self) -> String {
        format!("{}: ", self.purpose.label())
    }
}

/// State for confirming permanent song deletion.
pub(crate) struct ConfirmSongDelete {
    pub(crate) song: SongSummary,
}

/// State for confirming removal of a section and all its lines.
pub(crate) struct ConfirmSectionDelete {
    pub(crate) section_id: String,
    pub(crate) name: String,
}

/// State for confirming a section type change, which rewrites its lines.
pub(crate) struct ConfirmTypeChange {
    pub(crate) section_id: String,
    pub(crate) name: String,
    pub(crate) target: SectionType,
}

/// Tracks the user's choice when leaving the editor with unsaved edits.
pub(crate) struct ConfirmLeave {
    pub(crate) exit_app: bool,
    pub(crate) selection: LeaveChoice,
}

impl ConfirmLeave {
    pub(crate) fn new(exit_app: bool) -> Self {
        Self {
            exit_app,
            selection: LeaveChoice::Save,
        }
    }

    /// Move the selection forward (Save → Discard → Cancel).
    pub(crate) fn next(&mut self) {
        self.selection = match self.selection {
            LeaveChoice::Save => LeaveChoice::Discard,
            LeaveChoice::Discard => LeaveChoice::Cancel,
            LeaveChoice::Cancel => LeaveChoice::Save,
        };
    }

    pub(crate) fn previous(&mut self) {
        self.selection = match self.selection {
            LeaveChoice::Save => LeaveChoice::Cancel,
            LeaveChoice::Discard => LeaveChoice::Save,
            LeaveChoice::Cancel => LeaveChoice::Discard,
        };
    }

    pub(crate) fn labels(&self) -> [&'static str; 3] {
        if self.exit_app {
            ["Save & Quit", "Discard & Quit", "Cancel"]
        } else {
            ["Save & Leave", "Discard & Leave", "Cancel"]
        }
    }

    pub(crate) fn selected_index(&self) -> usize {
        match self.selection {
            LeaveChoice::Save => 0,
            LeaveChoice::Discard => 1,
            LeaveChoice::Cancel => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LeaveChoice {
    Save,
    Discard,
    Cancel,
}
