use std::mem;

use anyhow::Result;
use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use tracing::{debug, info};

use crate::content::render::{anchor_column, bar_row};
use crate::content::{chord_layout, line_span, parse_bar_text, render_section, RowKind};
use crate::db::validate_meta;
use crate::editor::{ops, ChordDialog, MoveDirection, ANCHOR_NUDGE};
use crate::identity::IdentityProvider;
use crate::models::{SectionLine, SectionType, Song, SongSummary, Visibility};
use crate::store::{ListFilter, SongStore, SqliteStore};

use super::forms::{
    ConfirmLeave, ConfirmSectionDelete, ConfirmSongDelete, ConfirmTypeChange, LeaveChoice,
    PromptPurpose, SongField, SongForm, TextPrompt,
};
use super::helpers::{anchor_percent, centered_rect, key_hints, surface_error, visibility_style};
use super::screens::{
    ChordRowHit, EditorRow, EditorScreen, LibraryScreen, LibraryTab, PointerTarget,
};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 4;
/// Song title and metadata strip above the editor.
const HEADER_HEIGHT: u16 = 4;
/// Columns in front of every editor line, holding the cursor marker.
const LINE_INDENT: u16 = 2;

/// High-level navigation states.
enum Screen {
    Library(LibraryScreen),
    Editor(EditorScreen),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    Searching(SearchState),
    CreatingSong(SongForm),
    EditingMeta(SongForm),
    ConfirmSongDelete(ConfirmSongDelete),
    Prompt(TextPrompt),
    /// The chord dialog itself lives on the editor session.
    EditingChord,
    ConfirmSectionDelete(ConfirmSectionDelete),
    ConfirmTypeChange(ConfirmTypeChange),
    ConfirmLeave(ConfirmLeave),
}

/// State for an active inline search.
struct SearchState {
    query: String,
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    store: SqliteStore,
    identity: Box<dyn IdentityProvider>,
    drag_threshold: f64,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
    last_tab: LibraryTab,
}

impl App {
    pub fn new(
        store: SqliteStore,
        identity: Box<dyn IdentityProvider>,
        drag_threshold: f64,
    ) -> Result<Self> {
        let tab = if identity.current_user_id().is_some() {
            LibraryTab::Mine
        } else {
            LibraryTab::Public
        };
        let mut app = Self {
            store,
            identity,
            drag_threshold,
            screen: Screen::Library(LibraryScreen::new(tab, Vec::new())),
            mode: Mode::Normal,
            status: None,
            last_tab: tab,
        };
        app.open_library(tab, None)?;
        Ok(app)
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        let mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::Searching(state) => self.handle_search(code, state)?,
            Mode::CreatingSong(form) => self.handle_create_song(code, form)?,
            Mode::EditingMeta(form) => self.handle_edit_meta(code, form)?,
            Mode::ConfirmSongDelete(confirm) => self.handle_confirm_song_delete(code, confirm)?,
            Mode::Prompt(prompt) => self.handle_prompt(code, prompt)?,
            Mode::EditingChord => self.handle_chord_dialog(code),
            Mode::ConfirmSectionDelete(confirm) => {
                self.handle_confirm_section_delete(code, confirm)
            }
            Mode::ConfirmTypeChange(confirm) => self.handle_confirm_type_change(code, confirm),
            Mode::ConfirmLeave(confirm) => self.handle_confirm_leave(code, confirm, &mut exit)?,
        };

        self.mode = mode;
        Ok(exit)
    }

    pub(crate) fn handle_ctrl_s(&mut self) -> Result<()> {
        if matches!(self.mode, Mode::Normal) && matches!(self.screen, Screen::Editor(_)) {
            self.save_song();
        }
        Ok(())
    }

    /// Ask to quit. Returns true when the app may exit right away; with
    /// unsaved edits the leave dialog is shown instead.
    pub(crate) fn request_quit(&mut self) -> bool {
        if let Screen::Editor(editor) = &self.screen {
            if editor.session.is_dirty() {
                self.mode = Mode::ConfirmLeave(ConfirmLeave::new(true));
                return false;
            }
        }
        true
    }

    pub(crate) fn handle_mouse(&mut self, event: MouseEvent) -> Result<()> {
        if !matches!(self.mode, Mode::Normal) {
            return Ok(());
        }
        let Screen::Editor(editor) = &mut self.screen else {
            return Ok(());
        };
        if editor.read_only {
            return Ok(());
        }

        let x = f64::from(event.column);
        let mut status_to_set: Option<&str> = None;
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                match editor.hit_test(event.column, event.row) {
                    Some(PointerTarget::Chord {
                        section_id,
                        line_id,
                        chord_id,
                        rect,
                    }) => {
                        editor
                            .gesture
                            .pointer_down_on_chord(&section_id, &line_id, &chord_id, rect, x);
                        editor.focus_row(&EditorRow::Line {
                            section_id,
                            line_id,
                            section_type: SectionType::LyricsChord,
                        });
                        editor.select_chord_id(&chord_id);
                    }
                    Some(PointerTarget::EmptySpace {
                        section_id,
                        line_id,
                        rect,
                    }) => {
                        editor
                            .gesture
                            .click_empty(&mut editor.session, &section_id, &line_id, rect, x);
                        editor.focus_row(&EditorRow::Line {
                            section_id,
                            line_id,
                            section_type: SectionType::LyricsChord,
                        });
                    }
                    None => {
                        if let Some(section_id) = editor.header_at(event.row).map(str::to_string) {
                            editor.focus_section(&section_id);
                            editor.section_drag = Some(section_id);
                        }
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                editor.gesture.pointer_move(&mut editor.session, x);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(dragged) = editor.section_drag.take() {
                    let over = editor.header_at(event.row).map(str::to_string);
                    if let Some(over) = over.filter(|over| *over != dragged) {
                        editor
                            .session
                            .apply(|song| ops::reorder_section(song, &dragged, &over));
                        editor.focus_section(&dragged);
                        status_to_set = Some("Section moved.");
                    }
                }
                let chord_id = editor.gesture.active().map(|drag| drag.chord_id.clone());
                editor.gesture.pointer_up(&mut editor.session);
                if let Some(chord_id) = chord_id {
                    editor.select_chord_id(&chord_id);
                }
            }
            _ => {}
        }

        if editor.session.dialog().is_some() {
            self.mode = Mode::EditingChord;
        }
        if let Some(text) = status_to_set {
            self.set_status(text, StatusKind::Info);
        }
        Ok(())
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match self.screen {
            Screen::Library(_) => self.handle_library_key(code, exit),
            Screen::Editor(_) => self.handle_editor_key(code, exit),
        }
    }

    fn handle_library_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let user_id = self.user_id();
        let signed_in = user_id.is_some();
        let Screen::Library(library) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Char('q') | KeyCode::Esc => *exit = true,
            KeyCode::Up => library.move_selection(-1),
            KeyCode::Down => library.move_selection(1),
            KeyCode::PageUp => library.move_selection(-5),
            KeyCode::PageDown => library.move_selection(5),
            KeyCode::Home => library.select_first(),
            KeyCode::End => library.select_last(),
            KeyCode::Tab | KeyCode::BackTab => {
                let offset = if code == KeyCode::Tab { 1 } else { -1 };
                let tab = library.tab.step(offset, signed_in);
                self.clear_status();
                self.open_library(tab, None)?;
            }
            KeyCode::Char('f') | KeyCode::Char('/') => {
                let query = library.filter.clone().unwrap_or_default();
                return Ok(Mode::Searching(SearchState { query }));
            }
            KeyCode::Char('r') => {
                self.clear_status();
                self.reload_library()?;
            }
            KeyCode::Enter => match library.current_song().map(|song| song.id.clone()) {
                Some(song_id) => self.open_editor(&song_id),
                None => self.set_status("No song selected.", StatusKind::Error),
            },
            KeyCode::Char('+') | KeyCode::Char('n') => {
                if signed_in {
                    self.clear_status();
                    return Ok(Mode::CreatingSong(SongForm::default()));
                }
                self.set_status("Sign in to create songs.", StatusKind::Error);
            }
            KeyCode::Char('-') => match library.current_song().cloned() {
                Some(song) if user_id.as_deref() == Some(song.owner_id.as_str()) => {
                    return Ok(Mode::ConfirmSongDelete(ConfirmSongDelete { song }));
                }
                Some(_) => {
                    self.set_status("Only the owner can delete this song.", StatusKind::Error)
                }
                None => self.set_status("No song selected to delete.", StatusKind::Error),
            },
            KeyCode::Char('b') => {
                if let Some(song_id) = library.current_song().map(|song| song.id.clone()) {
                    self.toggle_bookmark(&song_id)?;
                }
            }
            KeyCode::Char('o') => {
                self.clear_status();
                return Ok(Mode::Prompt(TextPrompt::new(PromptPurpose::OpenShare, "")));
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_editor_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Editor(editor) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Up => editor.move_cursor(-1),
            KeyCode::Down => editor.move_cursor(1),
            KeyCode::PageUp => editor.move_cursor(-5),
            KeyCode::PageDown => editor.move_cursor(5),
            KeyCode::Home => {
                editor.cursor = 0;
                editor.chord = None;
            }
            KeyCode::End => editor.select_last_row(),
            KeyCode::Left => editor.step_chord(-1),
            KeyCode::Right => editor.step_chord(1),
            KeyCode::Char('p') => editor.session.toggle_preview(),
            KeyCode::Esc => return self.request_leave(false, exit),
            KeyCode::Char('q') => return self.request_leave(true, exit),
            _ if editor.read_only => {
                if matches!(code, KeyCode::Enter | KeyCode::Char(_) | KeyCode::Delete) {
                    self.set_status("This song is read-only.", StatusKind::Error);
                }
            }
            _ => return self.handle_editor_edit_key(code),
        }
        Ok(Mode::Normal)
    }

    /// Keys that change the song. Only reached for songs the user owns.
    fn handle_editor_edit_key(&mut self, code: KeyCode) -> Result<Mode> {
        match code {
            KeyCode::Char('s') => {
                self.save_song();
                return Ok(Mode::Normal);
            }
            KeyCode::Char('S') => {
                self.share_song();
                return Ok(Mode::Normal);
            }
            _ => {}
        }

        let Screen::Editor(editor) = &mut self.screen else {
            return Ok(Mode::Normal);
        };
        let mut status_to_set: Option<(String, StatusKind)> = None;
        let row = editor.current_row();
        let section_id = editor.current_section_id();

        match code {
            KeyCode::Enter => match &row {
                Some(EditorRow::Section { section_id }) => {
                    let name = editor
                        .session
                        .song()
                        .and_then(|song| song.section(section_id))
                        .map(|section| section.name.clone())
                        .unwrap_or_default();
                    return Ok(Mode::Prompt(TextPrompt::new(
                        PromptPurpose::RenameSection {
                            section_id: section_id.clone(),
                        },
                        name,
                    )));
                }
                Some(EditorRow::Line {
                    section_id,
                    line_id,
                    ..
                }) => {
                    if let Some(chord_id) = editor.selected_chord_id() {
                        let dialog = editor
                            .session
                            .find_chord(section_id, line_id, &chord_id)
                            .map(|chord| ChordDialog::edit(section_id, line_id, chord));
                        if let Some(dialog) = dialog {
                            editor.session.open_dialog(dialog);
                            return Ok(Mode::EditingChord);
                        }
                    }
                    match editor.current_line() {
                        Some(SectionLine::Lyrics(line)) => {
                            return Ok(Mode::Prompt(TextPrompt::new(
                                PromptPurpose::EditLyrics {
                                    section_id: section_id.clone(),
                                    line_id: line_id.clone(),
                                },
                                line.lyrics.clone(),
                            )));
                        }
                        Some(SectionLine::Bars(line)) => {
                            return Ok(Mode::Prompt(TextPrompt::new(
                                PromptPurpose::EditBars {
                                    section_id: section_id.clone(),
                                    line_id: line_id.clone(),
                                },
                                line.bars.join(" | "),
                            )));
                        }
                        None => {}
                    }
                }
                None => {}
            },
            KeyCode::Char('c') => match &row {
                Some(EditorRow::Line {
                    section_id,
                    line_id,
                    section_type: SectionType::LyricsChord,
                }) => {
                    let anchor = editor
                        .selected_chord_id()
                        .and_then(|chord_id| {
                            editor.session.find_chord(section_id, line_id, &chord_id)
                        })
                        .map(|chord| chord.anchor)
                        .unwrap_or(0.0);
                    editor
                        .session
                        .open_dialog(ChordDialog::create(section_id, line_id, anchor));
                    return Ok(Mode::EditingChord);
                }
                _ => {
                    status_to_set = Some((
                        "Chords go on lyric lines.".to_string(),
                        StatusKind::Error,
                    ))
                }
            },
            KeyCode::Char('<') | KeyCode::Char(',') | KeyCode::Char('>') | KeyCode::Char('.') => {
                let step = if matches!(code, KeyCode::Char('<') | KeyCode::Char(',')) {
                    -ANCHOR_NUDGE
                } else {
                    ANCHOR_NUDGE
                };
                if let (
                    Some(EditorRow::Line {
                        section_id,
                        line_id,
                        ..
                    }),
                    Some(chord_id),
                ) = (&row, editor.selected_chord_id())
                {
                    let anchor = editor
                        .session
                        .find_chord(section_id, line_id, &chord_id)
                        .map(|chord| chord.anchor)
                        .unwrap_or(0.0);
                    editor.session.apply(|song| {
                        ops::update_chord_anchor(song, section_id, line_id, &chord_id, anchor + step)
                    });
                    editor.select_chord_id(&chord_id);
                }
            }
            KeyCode::Char('a') => {
                if let Some(section_id) = &section_id {
                    editor
                        .session
                        .apply(|song| ops::add_line(song, section_id));
                    let new_row = editor
                        .session
                        .song()
                        .and_then(|song| song.section(section_id))
                        .and_then(|section| {
                            section.content.lines.last().map(|line| EditorRow::Line {
                                section_id: section.id.clone(),
                                line_id: line.id().to_string(),
                                section_type: section.section_type,
                            })
                        });
                    if let Some(new_row) = new_row {
                        editor.focus_row(&new_row);
                    }
                } else {
                    status_to_set = Some((
                        "Add a section first.".to_string(),
                        StatusKind::Error,
                    ));
                }
            }
            KeyCode::Char('x') | KeyCode::Delete => match &row {
                Some(EditorRow::Line {
                    section_id,
                    line_id,
                    ..
                }) => {
                    if let Some(chord_id) = editor.selected_chord_id() {
                        editor.session.apply(|song| {
                            ops::delete_chord(song, section_id, line_id, &chord_id)
                        });
                        status_to_set = Some(("Chord deleted.".to_string(), StatusKind::Info));
                    } else {
                        editor
                            .session
                            .apply(|song| ops::delete_line(song, section_id, line_id));
                        status_to_set = Some(("Line deleted.".to_string(), StatusKind::Info));
                    }
                    editor.clamp_cursor();
                }
                Some(EditorRow::Section { section_id }) => {
                    return Ok(self.confirm_section_delete(section_id));
                }
                None => {}
            },
            KeyCode::Char('D') => {
                if let Some(section_id) = &section_id {
                    return Ok(self.confirm_section_delete(section_id));
                }
            }
            KeyCode::Char('n') => {
                return Ok(Mode::Prompt(TextPrompt::new(
                    PromptPurpose::AddSection(SectionType::LyricsChord),
                    "",
                )));
            }
            KeyCode::Char('N') => {
                return Ok(Mode::Prompt(TextPrompt::new(
                    PromptPurpose::AddSection(SectionType::Bar),
                    "",
                )));
            }
            KeyCode::Char('d') => {
                if let Some(section_id) = &section_id {
                    editor
                        .session
                        .apply(|song| ops::duplicate_section(song, section_id));
                    let copy_id = editor.session.song().and_then(|song| {
                        let index = song
                            .sections
                            .iter()
                            .position(|section| &section.id == section_id)?;
                        song.sections.get(index + 1).map(|section| section.id.clone())
                    });
                    if let Some(copy_id) = copy_id {
                        editor.focus_section(&copy_id);
                    }
                    status_to_set = Some(("Section duplicated.".to_string(), StatusKind::Info));
                }
            }
            KeyCode::Char('[') | KeyCode::Char(']') => {
                if let Some(section_id) = &section_id {
                    let direction = if code == KeyCode::Char('[') {
                        MoveDirection::Earlier
                    } else {
                        MoveDirection::Later
                    };
                    editor
                        .session
                        .apply(|song| ops::move_section(song, section_id, direction));
                    editor.focus_section(section_id);
                }
            }
            KeyCode::Char('t') => {
                let section = section_id.as_deref().and_then(|section_id| {
                    editor.session.song()?.section(section_id).cloned()
                });
                if let Some(section) = section {
                    return Ok(Mode::ConfirmTypeChange(ConfirmTypeChange {
                        section_id: section.id,
                        name: section.name,
                        target: section.section_type.toggled(),
                    }));
                }
            }
            KeyCode::Char('m') => {
                if let Some(song) = editor.session.song() {
                    return Ok(Mode::EditingMeta(SongForm::from_song(song)));
                }
            }
            KeyCode::Char('g') | KeyCode::Char('G') => {
                if let Some(song_id) = editor.session.song().map(|song| song.id.clone()) {
                    let purpose = if code == KeyCode::Char('g') {
                        PromptPurpose::GrantAccess { song_id }
                    } else {
                        PromptPurpose::RevokeAccess { song_id }
                    };
                    return Ok(Mode::Prompt(TextPrompt::new(purpose, "")));
                }
            }
            KeyCode::Char('v') => {
                if let Some(next) = editor.session.song().map(|song| song.visibility.next()) {
                    editor
                        .session
                        .apply(|song| ops::set_visibility(song, next));
                    status_to_set = Some((
                        format!("Visibility set to {next}. Save to apply it."),
                        StatusKind::Info,
                    ));
                }
            }
            _ => {}
        }

        if let Some((text, kind)) = status_to_set {
            self.set_status(text, kind);
        }
        Ok(Mode::Normal)
    }

    fn confirm_section_delete(&self, section_id: &str) -> Mode {
        let name = match &self.screen {
            Screen::Editor(editor) => editor
                .session
                .song()
                .and_then(|song| song.section(section_id))
                .map(|section| section.name.clone()),
            Screen::Library(_) => None,
        };
        match name {
            Some(name) => Mode::ConfirmSectionDelete(ConfirmSectionDelete {
                section_id: section_id.to_string(),
                name,
            }),
            None => Mode::Normal,
        }
    }

    fn handle_search(&mut self, code: KeyCode, mut state: SearchState) -> Result<Mode> {
        let Screen::Library(library) = &mut self.screen else {
            return Ok(Mode::Normal);
        };
        let public = library.tab == LibraryTab::Public;

        match code {
            KeyCode::Esc => {
                library.set_filter(None);
                if public {
                    library.set_songs(self.store.list(&ListFilter::Public)?);
                }
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => return Ok(Mode::Normal),
            KeyCode::Up => {
                library.move_selection(-1);
                return Ok(Mode::Searching(state));
            }
            KeyCode::Down => {
                library.move_selection(1);
                return Ok(Mode::Searching(state));
            }
            KeyCode::Backspace => {
                state.query.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => state.query.push(ch),
            _ => return Ok(Mode::Searching(state)),
        }

        if public {
            library.set_songs(self.store.search(&state.query)?);
        } else if state.query.trim().is_empty() {
            library.set_filter(None);
        } else {
            library.set_filter(Some(state.query.clone()));
        }
        Ok(Mode::Searching(state))
    }

    fn handle_create_song(&mut self, code: KeyCode, mut form: SongForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Song creation cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.create_song(&form) {
                Ok(()) => keep_open = false,
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::CreatingSong(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_edit_meta(&mut self, code: KeyCode, mut form: SongForm) -> Result<Mode> {
        let mut keep_open = true;
        match code {
            KeyCode::Esc => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                keep_open = false;
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.previous_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                let parsed = form
                    .parse_inputs()
                    .and_then(|meta| validate_meta(&meta).map_err(Into::into));
                match parsed {
                    Ok(meta) => {
                        if let Screen::Editor(editor) = &mut self.screen {
                            editor.session.apply(|song| ops::update_meta(song, meta));
                        }
                        self.set_status("Details updated. Save to keep them.", StatusKind::Info);
                        keep_open = false;
                    }
                    Err(err) => {
                        let message = surface_error(&err);
                        form.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                    }
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }

        if keep_open {
            Ok(Mode::EditingMeta(form))
        } else {
            Ok(Mode::Normal)
        }
    }

    fn handle_confirm_song_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmSongDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                let result = self
                    .identity
                    .require_user_id("delete songs")
                    .and_then(|owner_id| self.store.delete(&confirm.song.id, owner_id));
                match result {
                    Ok(deleted) => {
                        let message = if deleted {
                            format!("Deleted '{}'.", confirm.song.display_title())
                        } else {
                            "Song was already gone.".to_string()
                        };
                        self.set_status(message, StatusKind::Info);
                        self.reload_library()?;
                        Ok(Mode::Normal)
                    }
                    Err(err) => {
                        self.report(err.into());
                        Ok(Mode::ConfirmSongDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmSongDelete(confirm)),
        }
    }

    fn handle_prompt(&mut self, code: KeyCode, mut prompt: TextPrompt) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Backspace => {
                prompt.backspace();
                Ok(Mode::Prompt(prompt))
            }
            KeyCode::Char(ch) => {
                prompt.push_char(ch);
                Ok(Mode::Prompt(prompt))
            }
            KeyCode::Enter => Ok(self.commit_prompt(prompt)),
            _ => Ok(Mode::Prompt(prompt)),
        }
    }

    fn commit_prompt(&mut self, prompt: TextPrompt) -> Mode {
        match prompt.purpose {
            PromptPurpose::OpenShare => return self.open_shared(prompt),
            PromptPurpose::GrantAccess { .. } | PromptPurpose::RevokeAccess { .. } => {
                return self.change_access(prompt);
            }
            _ => {}
        }
        let Screen::Editor(editor) = &mut self.screen else {
            return Mode::Normal;
        };
        let name = prompt.value.trim().to_string();
        let names_section = matches!(
            prompt.purpose,
            PromptPurpose::AddSection(_) | PromptPurpose::RenameSection { .. }
        );
        if names_section && name.is_empty() {
            self.set_status("Section name is required.", StatusKind::Error);
            return Mode::Prompt(prompt);
        }

        match &prompt.purpose {
            PromptPurpose::AddSection(section_type) => {
                editor
                    .session
                    .apply(|song| ops::add_section(song, &name, *section_type));
                let new_id = editor
                    .session
                    .song()
                    .and_then(|song| song.sections.last())
                    .map(|section| section.id.clone());
                if let Some(new_id) = new_id {
                    editor.focus_section(&new_id);
                }
            }
            PromptPurpose::RenameSection { section_id } => {
                editor
                    .session
                    .apply(|song| ops::rename_section(song, section_id, &name));
            }
            PromptPurpose::EditLyrics {
                section_id,
                line_id,
            } => {
                editor.session.apply(|song| {
                    ops::update_line_lyrics(song, section_id, line_id, prompt.value.trim_end())
                });
            }
            PromptPurpose::EditBars {
                section_id,
                line_id,
            } => {
                let bars = parse_bar_text(&prompt.value);
                editor
                    .session
                    .apply(|song| ops::update_line_bars(song, section_id, line_id, bars));
            }
            PromptPurpose::OpenShare
            | PromptPurpose::GrantAccess { .. }
            | PromptPurpose::RevokeAccess { .. } => {}
        }
        Mode::Normal
    }

    /// Resolve a share token and open the song it points at.
    fn open_shared(&mut self, prompt: TextPrompt) -> Mode {
        let token = prompt.value.trim();
        if token.is_empty() {
            self.set_status("Share token is required.", StatusKind::Error);
            return Mode::Prompt(prompt);
        }
        match self.store.get_by_share_token(token) {
            Ok(song) => {
                let read_only = self.user_id().as_deref() != Some(song.owner_id.as_str());
                info!(song_id = %song.id, read_only, "opened shared song");
                self.set_status(
                    format!("Opened shared song '{}'.", song.display_title()),
                    StatusKind::Info,
                );
                self.open_song(song, read_only);
                Mode::Normal
            }
            Err(err) => {
                self.report(err.into());
                Mode::Prompt(prompt)
            }
        }
    }

    fn change_access(&mut self, prompt: TextPrompt) -> Mode {
        let user_id = prompt.value.trim().to_string();
        if user_id.is_empty() {
            self.set_status("User id is required.", StatusKind::Error);
            return Mode::Prompt(prompt);
        }
        let owner_id = match self.identity.require_user_id("change song access") {
            Ok(owner_id) => owner_id.to_string(),
            Err(err) => {
                self.report(err.into());
                return Mode::Normal;
            }
        };

        let result = match &prompt.purpose {
            PromptPurpose::GrantAccess { song_id } => self
                .store
                .grant_access(song_id, &owner_id, &user_id)
                .map(|()| format!("Granted {user_id} access.")),
            PromptPurpose::RevokeAccess { song_id } => self
                .store
                .revoke_access(song_id, &owner_id, &user_id)
                .map(|revoked| {
                    if revoked {
                        format!("Revoked access for {user_id}.")
                    } else {
                        format!("{user_id} had no access.")
                    }
                }),
            _ => return Mode::Normal,
        };
        match result {
            Ok(message) => {
                info!(user_id = %user_id, "changed song access");
                self.set_status(message, StatusKind::Info);
                Mode::Normal
            }
            Err(err) => {
                self.report(err.into());
                Mode::Prompt(prompt)
            }
        }
    }

    fn handle_chord_dialog(&mut self, code: KeyCode) -> Mode {
        let Screen::Editor(editor) = &mut self.screen else {
            return Mode::Normal;
        };
        let Some(dialog) = editor.session.dialog_mut() else {
            return Mode::Normal;
        };

        match code {
            KeyCode::Esc => {
                editor.session.close_dialog();
                return Mode::Normal;
            }
            KeyCode::Enter => {
                let chord_id = dialog.chord_id.clone();
                editor.session.confirm_dialog();
                editor.clamp_cursor();
                if let Some(chord_id) = chord_id {
                    editor.select_chord_id(&chord_id);
                }
                return Mode::Normal;
            }
            KeyCode::Delete => {
                if editor.session.delete_dialog_chord() {
                    editor.clamp_cursor();
                    self.set_status("Chord deleted.", StatusKind::Info);
                    return Mode::Normal;
                }
            }
            KeyCode::Left => editor.session.nudge_dialog_anchor(-1),
            KeyCode::Right => editor.session.nudge_dialog_anchor(1),
            KeyCode::Backspace => {
                dialog.value.pop();
            }
            KeyCode::Char(ch) if !ch.is_control() => dialog.value.push(ch),
            _ => {}
        }
        Mode::EditingChord
    }

    fn handle_confirm_section_delete(&mut self, code: KeyCode, confirm: ConfirmSectionDelete) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => Mode::Normal,
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Screen::Editor(editor) = &mut self.screen {
                    editor
                        .session
                        .apply(|song| ops::delete_section(song, &confirm.section_id));
                    editor.clamp_cursor();
                }
                self.set_status(format!("Removed section '{}'.", confirm.name), StatusKind::Info);
                Mode::Normal
            }
            _ => Mode::ConfirmSectionDelete(confirm),
        }
    }

    fn handle_confirm_type_change(&mut self, code: KeyCode, confirm: ConfirmTypeChange) -> Mode {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => Mode::Normal,
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Screen::Editor(editor) = &mut self.screen {
                    editor.session.apply(|song| {
                        ops::change_section_type(song, &confirm.section_id, confirm.target)
                    });
                    editor.focus_section(&confirm.section_id);
                }
                self.set_status(
                    format!("'{}' is now a {} section.", confirm.name, confirm.target.label()),
                    StatusKind::Info,
                );
                Mode::Normal
            }
            _ => Mode::ConfirmTypeChange(confirm),
        }
    }

    fn handle_confirm_leave(
        &mut self,
        code: KeyCode,
        mut confirm: ConfirmLeave,
        exit: &mut bool,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc => Ok(Mode::Normal),
            KeyCode::Left | KeyCode::Up | KeyCode::BackTab => {
                confirm.previous();
                Ok(Mode::ConfirmLeave(confirm))
            }
            KeyCode::Right | KeyCode::Down | KeyCode::Tab => {
                confirm.next();
                Ok(Mode::ConfirmLeave(confirm))
            }
            KeyCode::Enter => match confirm.selection {
                LeaveChoice::Save => {
                    if !self.save_song() {
                        return Ok(Mode::ConfirmLeave(confirm));
                    }
                    self.finish_leave(confirm.exit_app, exit)?;
                    Ok(Mode::Normal)
                }
                LeaveChoice::Discard => {
                    info!("discarded unsaved edits");
                    self.set_status("Discarded unsaved edits.", StatusKind::Info);
                    self.finish_leave(confirm.exit_app, exit)?;
                    Ok(Mode::Normal)
                }
                LeaveChoice::Cancel => Ok(Mode::Normal),
            },
            _ => Ok(Mode::ConfirmLeave(confirm)),
        }
    }

    fn request_leave(&mut self, exit_app: bool, exit: &mut bool) -> Result<Mode> {
        if let Screen::Editor(editor) = &self.screen {
            if editor.session.is_dirty() {
                return Ok(Mode::ConfirmLeave(ConfirmLeave::new(exit_app)));
            }
        }
        self.finish_leave(exit_app, exit)?;
        Ok(Mode::Normal)
    }

    fn finish_leave(&mut self, exit_app: bool, exit: &mut bool) -> Result<()> {
        if exit_app {
            *exit = true;
            return Ok(());
        }
        let focus = match &self.screen {
            Screen::Editor(editor) => editor.session.song().map(|song| song.id.clone()),
            Screen::Library(_) => None,
        };
        self.open_library(self.last_tab, focus.as_deref())
    }

    pub(crate) fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &mut self.screen {
            Screen::Library(library) => draw_library(frame, content_area, library),
            Screen::Editor(editor) => draw_editor(frame, content_area, editor),
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::Searching(state) => self.draw_search_bar(frame, area, state),
            Mode::CreatingSong(form) => self.draw_song_form(frame, area, "New Song", form),
            Mode::EditingMeta(form) => self.draw_song_form(frame, area, "Song Details", form),
            Mode::ConfirmSongDelete(confirm) => self.draw_confirm_song_delete(frame, area, confirm),
            Mode::Prompt(prompt) => self.draw_prompt(frame, area, prompt),
            Mode::EditingChord => {
                if let Screen::Editor(editor) = &self.screen {
                    self.draw_chord_dialog(frame, area, editor);
                }
            }
            Mode::ConfirmSectionDelete(confirm) => self.draw_confirm(
                frame,
                area,
                "Delete Section",
                vec![
                    Line::from(format!("Delete section '{}'?", confirm.name)),
                    Line::from("All of its lines and chords go with it."),
                ],
            ),
            Mode::ConfirmTypeChange(confirm) => self.draw_confirm(
                frame,
                area,
                "Change Section Type",
                vec![
                    Line::from(format!(
                        "Turn '{}' into a {} section?",
                        confirm.name,
                        confirm.target.label()
                    )),
                    Line::from(match confirm.target {
                        SectionType::Bar => "Chord labels become bars; lyrics are dropped.",
                        SectionType::LyricsChord => "Bars become evenly spaced chords.",
                    }),
                ],
            ),
            Mode::ConfirmLeave(confirm) => self.draw_confirm_leave(frame, area, confirm),
            Mode::Normal => {}
        }
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        match (&self.screen, &self.mode) {
            (_, Mode::EditingChord) => key_hints(&[
                ("←→", "Move"),
                ("Enter", "Save"),
                ("Del", "Delete"),
                ("Esc", "Cancel"),
            ]),
            (_, Mode::Searching(_)) => key_hints(&[
                ("↑↓", "Select"),
                ("Enter", "Keep Filter"),
                ("Esc", "Clear"),
            ]),
            (Screen::Editor(editor), _) if editor.read_only => key_hints(&[
                ("↑↓", "Move"),
                ("p", "Preview"),
                ("Esc", "Back"),
                ("q", "Quit"),
            ]),
            (Screen::Editor(_), _) => key_hints(&[
                ("↑↓", "Move"),
                ("←→", "Chord"),
                ("Enter", "Edit"),
                ("c", "Add Chord"),
                ("<>", "Nudge"),
                ("a", "Add Line"),
                ("x", "Delete"),
                ("n/N", "New Section"),
                ("d", "Duplicate"),
                ("[]", "Reorder"),
                ("t", "Type"),
                ("m", "Details"),
                ("v", "Visibility"),
                ("S", "Share"),
                ("g/G", "Grant/Revoke"),
                ("s", "Save"),
                ("p", "Preview"),
                ("Esc", "Back"),
            ]),
            (Screen::Library(_), _) => key_hints(&[
                ("Tab", "Switch List"),
                ("↑↓", "Select"),
                ("Enter", "Open"),
                ("f", "Search"),
                ("+", "New"),
                ("-", "Delete"),
                ("b", "Bookmark"),
                ("o", "Open Share"),
                ("r", "Refresh"),
                ("q", "Quit"),
            ]),
        }
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, state: &SearchState) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {}", state.query)))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + state.query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_song_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &SongForm) {
        let popup_area = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = SongField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let prefix = format!("{}: ", form.active.label()).len() as u16;
        let cursor_x = inner.x + prefix + form.value_len(form.active) as u16;
        frame.set_cursor_position((cursor_x, inner.y + form.active.row()));
    }

    fn draw_prompt(&self, frame: &mut Frame, area: Rect, prompt: &TextPrompt) {
        let popup_area = centered_rect(70, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(prompt.purpose.title())
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let prefix = prompt.prefix();
        let lines = vec![
            Line::from(format!("{prefix}{}", prompt.value)),
            Line::from(""),
            Line::from(Span::styled(
                prompt.purpose.hint(),
                Style::default().fg(Color::Gray),
            )),
        ];
        frame.render_widget(Paragraph::new(lines), inner);

        let cursor_x = inner.x + (prefix.chars().count() + prompt.value.chars().count()) as u16;
        frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y));
    }

    fn draw_chord_dialog(&self, frame: &mut Frame, area: Rect, editor: &EditorScreen) {
        let Some(dialog) = editor.session.dialog() else {
            return;
        };
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let title = if dialog.is_new() { "Add Chord" } else { "Edit Chord" };
        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            Line::from(format!("Chord: {}", dialog.value)),
            Line::from(format!("Position: {}", anchor_percent(dialog.anchor))),
            Line::from(""),
        ];
        if let Some(line) = editor.session.find_line(&dialog.section_id, &dialog.line_id) {
            let column = anchor_column(dialog.anchor, line_span(line));
            lines.push(Line::from(format!("{}^", " ".repeat(column))));
            lines.push(Line::from(Span::styled(
                line.lyrics.clone(),
                Style::default().fg(Color::Gray),
            )));
            lines.push(Line::from(""));
        }
        let hint = if dialog.is_new() {
            "Enter to add • ←/→ to move • Esc to cancel"
        } else {
            "Enter to save • ←/→ to move • Del to delete • Esc to cancel"
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::Gray))));

        frame.render_widget(Paragraph::new(lines), inner);
        let cursor_x = inner.x + "Chord: ".len() as u16 + dialog.value.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_confirm_song_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmSongDelete) {
        self.draw_confirm(
            frame,
            area,
            "Delete Song",
            vec![
                Line::from(format!(
                    "Delete '{}' permanently?",
                    confirm.song.display_title()
                )),
                Line::from("Share links and bookmarks for it stop working."),
            ],
        );
    }

    fn draw_confirm(&self, frame: &mut Frame, area: Rect, title: &str, mut lines: Vec<Line>) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_confirm_leave(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmLeave) {
        let popup_area = centered_rect(70, 40, area);
        frame.render_widget(Clear, popup_area);

        let title = if confirm.exit_app {
            "Exit Application"
        } else {
            "Leave Editor"
        };
        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut option_spans = Vec::new();
        for (idx, label) in confirm.labels().iter().enumerate() {
            if idx > 0 {
                option_spans.push(Span::raw("   "));
            }
            let style = if confirm.selected_index() == idx {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            option_spans.push(Span::styled(*label, style));
        }

        let lines = vec![
            Line::from("This song has unsaved edits. Save them first?"),
            Line::from(""),
            Line::from(option_spans),
            Line::from(""),
            Line::from(Span::styled(
                "Use ←/→ to choose • Enter to confirm • Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn report(&mut self, err: anyhow::Error) {
        debug!(error = %err, "action failed");
        let message = surface_error(&err);
        self.set_status(message, StatusKind::Error);
    }

    fn user_id(&self) -> Option<String> {
        self.identity.current_user_id().map(str::to_string)
    }

    fn load_songs(&self, tab: LibraryTab) -> Result<Vec<SongSummary>> {
        let songs = match (tab, self.user_id()) {
            (LibraryTab::Mine, Some(user_id)) => self.store.list(&ListFilter::Owner(user_id))?,
            (LibraryTab::Bookmarks, Some(user_id)) => self.store.list_bookmarks(&user_id)?,
            _ => self.store.list(&ListFilter::Public)?,
        };
        Ok(songs)
    }

    fn open_library(&mut self, tab: LibraryTab, focus: Option<&str>) -> Result<()> {
        let tab = tab.step(0, self.user_id().is_some());
        let mut library = LibraryScreen::new(tab, self.load_songs(tab)?);
        if let Some(id) = focus {
            library.focus(id);
        }
        self.screen = Screen::Library(library);
        self.last_tab = tab;
        Ok(())
    }

    /// Reload the current list, keeping its filter and selection.
    fn reload_library(&mut self) -> Result<()> {
        let Screen::Library(library) = &self.screen else {
            return Ok(());
        };
        let tab = library.tab;
        let focus = library.current_song().map(|song| song.id.clone());
        let songs = self.load_songs(tab)?;
        if let Screen::Library(library) = &mut self.screen {
            library.set_songs(songs);
            if let Some(id) = focus {
                library.focus(&id);
            }
        }
        Ok(())
    }

    fn open_editor(&mut self, song_id: &str) {
        let viewer = self.user_id();
        match self.store.get(song_id, viewer.as_deref()) {
            Ok(song) => {
                let read_only = viewer.as_deref() != Some(song.owner_id.as_str());
                info!(song_id, read_only, "opened song");
                if read_only {
                    self.set_status("Read-only: you do not own this song.", StatusKind::Info);
                } else {
                    self.clear_status();
                }
                self.open_song(song, read_only);
            }
            Err(err) => self.report(err.into()),
        }
    }

    fn open_song(&mut self, song: Song, read_only: bool) {
        self.screen = Screen::Editor(EditorScreen::new(song, read_only, self.drag_threshold));
    }

    fn create_song(&mut self, form: &SongForm) -> Result<()> {
        let meta = form.parse_inputs()?;
        let owner_id = self.identity.require_user_id("create songs")?;
        let song = self.store.create(owner_id, &meta)?;
        info!(song_id = %song.id, "created song");
        self.set_status(format!("Created '{}'.", song.display_title()), StatusKind::Info);
        self.last_tab = LibraryTab::Mine;
        self.open_song(song, false);
        Ok(())
    }

    fn toggle_bookmark(&mut self, song_id: &str) -> Result<()> {
        let Some(user_id) = self.user_id() else {
            self.set_status("Sign in to bookmark songs.", StatusKind::Error);
            return Ok(());
        };
        let bookmarked = self
            .store
            .list_bookmarks(&user_id)?
            .iter()
            .any(|song| song.id == song_id);
        let result = if bookmarked {
            self.store
                .remove_bookmark(&user_id, song_id)
                .map(|_| "Bookmark removed.")
        } else {
            self.store
                .add_bookmark(&user_id, song_id)
                .map(|_| "Bookmarked.")
        };
        match result {
            Ok(message) => {
                self.set_status(message, StatusKind::Info);
                self.reload_library()?;
            }
            Err(err) => self.report(err.into()),
        }
        Ok(())
    }

    /// Save the open song. Returns whether the save went through.
    fn save_song(&mut self) -> bool {
        let owner_id = match self.identity.require_user_id("save songs") {
            Ok(owner_id) => owner_id.to_string(),
            Err(err) => {
                self.report(err.into());
                return false;
            }
        };
        let Screen::Editor(editor) = &mut self.screen else {
            return false;
        };
        if editor.read_only {
            self.set_status("This song is read-only.", StatusKind::Error);
            return false;
        }
        let result = editor.session.save(&self.store, &owner_id);
        editor.clamp_cursor();
        match result {
            Ok(()) => {
                self.set_status("Saved.", StatusKind::Info);
                true
            }
            Err(err) => {
                self.report(err.into());
                false
            }
        }
    }

    fn share_song(&mut self) {
        let owner_id = match self.identity.require_user_id("share songs") {
            Ok(owner_id) => owner_id.to_string(),
            Err(err) => {
                self.report(err.into());
                return;
            }
        };
        let Screen::Editor(editor) = &mut self.screen else {
            return;
        };
        let Some((song_id, visibility)) = editor
            .session
            .song()
            .map(|song| (song.id.clone(), song.visibility))
        else {
            return;
        };

        match self.store.create_share(&song_id, &owner_id, None) {
            Ok(share) => {
                info!(song_id = %song_id, "created share token");
                editor
                    .session
                    .set_share_message(format!("Share token: {}", share.token));
                let message = if visibility == Visibility::Private {
                    "Share token created. It resolves once the song is no longer private."
                } else {
                    "Share token created."
                };
                self.set_status(message, StatusKind::Info);
            }
            Err(err) => self.report(err.into()),
        }
    }
}

fn draw_library(frame: &mut Frame, area: Rect, library: &LibraryScreen) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let titles: Vec<&str> = LibraryTab::ALL.iter().map(|tab| tab.title()).collect();
    let tabs = Tabs::new(titles)
        .select(library.tab.index())
        .block(Block::default().borders(Borders::ALL).title("ChordBook"))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, chunks[0]);

    let title = match &library.filter {
        Some(filter) if !filter.trim().is_empty() => {
            format!("{} (filter: {})", library.tab.title(), filter.trim())
        }
        _ => format!("{} ({})", library.tab.title(), library.filtered_songs.len()),
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    if library.filtered_songs.is_empty() {
        let message = match library.tab {
            LibraryTab::Mine => "No songs yet. Press '+' to create one.",
            LibraryTab::Public => "No public songs found.",
            LibraryTab::Bookmarks => "No bookmarks yet. Press 'b' on a song to add one.",
        };
        let paragraph = Paragraph::new(message)
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(paragraph, chunks[1]);
        return;
    }

    let items: Vec<ListItem> = library
        .filtered_songs
        .iter()
        .map(|song| {
            let mut spans = vec![Span::styled(
                song.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if let Some(artist) = &song.artist {
                spans.push(Span::styled(
                    format!("  {artist}"),
                    Style::default().fg(Color::Gray),
                ));
            }
            if let Some(key) = &song.key {
                spans.push(Span::raw(format!("  [{key}]")));
            }
            spans.push(Span::styled(
                format!("  {}", song.visibility),
                visibility_style(song.visibility),
            ));
            spans.push(Span::styled(
                format!("  {}", song.updated_at.format("%Y-%m-%d %H:%M")),
                Style::default().fg(Color::DarkGray),
            ));
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Yellow))
        .highlight_symbol("▶ ");

    let mut list_state = ListState::default();
    list_state.select(Some(library.selected));
    frame.render_stateful_widget(list, chunks[1], &mut list_state);
}

fn draw_editor(frame: &mut Frame, area: Rect, editor: &mut EditorScreen) {
    let header_height = HEADER_HEIGHT.min(area.height);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(header_height), Constraint::Min(0)])
        .split(area);

    draw_song_header(frame, chunks[0], editor);

    if editor.session.preview_visible() {
        let panes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);
        draw_sections(frame, panes[0], editor);
        draw_preview(frame, panes[1], editor);
    } else {
        draw_sections(frame, chunks[1], editor);
    }
}

fn draw_song_header(frame: &mut Frame, area: Rect, editor: &EditorScreen) {
    let Some(song) = editor.session.song() else {
        return;
    };

    let mut details = vec![Span::styled(
        song.display_title(),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if let Some(key) = &song.key {
        details.push(Span::raw(format!("  Key: {key}")));
    }
    if let Some(bpm) = song.bpm {
        details.push(Span::raw(format!("  BPM: {bpm}")));
    }
    details.push(Span::raw(format!("  Time: {}", song.time_signature)));

    let mut state = vec![Span::styled(
        song.visibility.to_string(),
        visibility_style(song.visibility),
    )];
    if editor.read_only {
        state.push(Span::styled("  read-only", Style::default().fg(Color::Gray)));
    } else if editor.session.is_saving() {
        state.push(Span::styled("  saving…", Style::default().fg(Color::Yellow)));
    } else if editor.session.is_dirty() {
        state.push(Span::styled("  ● unsaved", Style::default().fg(Color::Yellow)));
    } else {
        state.push(Span::styled("  saved", Style::default().fg(Color::Green)));
    }
    if let Some(message) = editor.session.share_message() {
        state.push(Span::styled(
            format!("  {message}"),
            Style::default().fg(Color::Cyan),
        ));
    }

    let header = Paragraph::new(vec![Line::from(details), Line::from(state)])
        .block(Block::default().borders(Borders::ALL).title("Song"));
    frame.render_widget(header, area);
}

/// Draw the editable section list and record where each chord row landed.
fn draw_sections(frame: &mut Frame, area: Rect, editor: &mut EditorScreen) {
    let block = Block::default().title("Sections").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    editor.hits.clear();
    editor.header_hits.clear();

    let cursor = editor.cursor;
    let selected_chord = editor.selected_chord_id();
    let available = usize::from(inner.width.saturating_sub(LINE_INDENT)).max(1);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut pending_hits: Vec<(usize, ChordRowHit)> = Vec::new();
    let mut pending_headers: Vec<(usize, String)> = Vec::new();
    let mut cursor_lines = (0, 0);

    {
        let Some(song) = editor.session.song() else {
            return;
        };
        if song.sections.is_empty() {
            let message = Paragraph::new("No sections yet. Press 'n' to add one.")
                .alignment(Alignment::Center);
            frame.render_widget(message, inner);
            return;
        }

        let mut row_index = 0;
        for section in &song.sections {
            if !lines.is_empty() {
                lines.push(Line::from(""));
            }
            if row_index == cursor {
                cursor_lines = (lines.len(), lines.len());
            }
            pending_headers.push((lines.len(), section.id.clone()));
            lines.push(Line::from(vec![
                Span::raw(marker(row_index == cursor)),
                Span::styled(
                    format!("[{}]", section.name),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!(" {}", section.section_type.label()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
            row_index += 1;

            for line in &section.content.lines {
                let selected = row_index == cursor;
                let first = lines.len();
                match line {
                    SectionLine::Lyrics(line) => {
                        let span = line_span(line).min(available);
                        let chords = chord_layout(line, span);
                        let mut chord_spans = vec![Span::raw(" ".repeat(LINE_INDENT as usize))];
                        let mut column = 0;
                        for (chord, placed) in line.chords.iter().zip(&chords) {
                            chord_spans.push(Span::raw(" ".repeat(placed.start - column)));
                            let style = if selected && selected_chord.as_deref() == Some(chord.id.as_str())
                            {
                                Style::default()
                                    .fg(Color::Black)
                                    .bg(Color::Yellow)
                                    .add_modifier(Modifier::BOLD)
                            } else {
                                Style::default()
                                    .fg(Color::Cyan)
                                    .add_modifier(Modifier::BOLD)
                            };
                            chord_spans.push(Span::styled(chord.chord.clone(), style));
                            column = placed.end;
                        }
                        pending_hits.push((
                            lines.len(),
                            ChordRowHit {
                                y: 0,
                                left: inner.x + LINE_INDENT,
                                span,
                                section_id: section.id.clone(),
                                line_id: line.id.clone(),
                                chords,
                            },
                        ));
                        lines.push(Line::from(chord_spans));

                        let lyrics = if line.lyrics.is_empty() {
                            Span::styled("<empty line>", Style::default().fg(Color::DarkGray))
                        } else {
                            Span::raw(line.lyrics.clone())
                        };
                        lines.push(Line::from(vec![Span::raw(marker(selected)), lyrics]));
                    }
                    SectionLine::Bars(line) => {
                        lines.push(Line::from(vec![
                            Span::raw(marker(selected)),
                            Span::styled(bar_row(line), Style::default().fg(Color::Magenta)),
                        ]));
                    }
                }
                if selected {
                    cursor_lines = (first, lines.len() - 1);
                }
                row_index += 1;
            }
        }
    }

    let height = usize::from(inner.height);
    editor.scroll = editor.scroll.min(lines.len().saturating_sub(1));
    editor.scroll_into_view(cursor_lines.0, cursor_lines.1, height);
    let scroll = editor.scroll;

    for (index, mut hit) in pending_hits {
        if index >= scroll && index < scroll + height {
            hit.y = inner.y + (index - scroll) as u16;
            editor.hits.push(hit);
        }
    }
    for (index, section_id) in pending_headers {
        if index >= scroll && index < scroll + height {
            editor
                .header_hits
                .push((inner.y + (index - scroll) as u16, section_id));
        }
    }

    let visible: Vec<Line> = lines.into_iter().skip(scroll).take(height).collect();
    frame.render_widget(Paragraph::new(visible), inner);
}

fn draw_preview(frame: &mut Frame, area: Rect, editor: &EditorScreen) {
    let block = Block::default().title("Preview").borders(Borders::ALL);
    let Some(song) = editor.session.song() else {
        frame.render_widget(block, area);
        return;
    };

    let mut lines = Vec::new();
    for section in &song.sections {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            section.name.clone(),
            Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )));
        for row in render_section(section, None) {
            let style = match row.kind {
                RowKind::Chords => Style::default().fg(Color::Cyan),
                RowKind::Lyrics => Style::default(),
                RowKind::Bars => Style::default().fg(Color::Magenta),
            };
            lines.push(Line::from(Span::styled(row.text, style)));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((editor.scroll.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(paragraph, area);
}

fn marker(selected: bool) -> &'static str {
    if selected {
        "▶ "
    } else {
        "  "
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::identity::ConfiguredIdentity;
    use crate::models::{SongMeta, SongUpdate, User};

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            display_name: None,
        }
    }

    #[fixture]
    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().expect("store");
        for id in ["alice", "bob"] {
            store.ensure_user(&user(id)).expect("user");
        }
        store
    }

    fn song_for(store: &SqliteStore, title: &str, visibility: Visibility) -> Song {
        let song = store.create("alice", &SongMeta::titled(title)).expect("create");
        let mut update = SongUpdate::from(&song);
        update.visibility = visibility;
        store.update(&song.id, "alice", &update).expect("update")
    }

    fn app_for(store: SqliteStore, viewer: &str) -> App {
        let identity = ConfiguredIdentity::new(Some(user(viewer)));
        App::new(store, Box::new(identity), 3.0).expect("app")
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(KeyCode::Char(ch)).expect("key");
        }
    }

    fn click(app: &mut App, kind: MouseEventKind, row: u16) {
        let event = MouseEvent {
            kind,
            column: 4,
            row,
            modifiers: KeyModifiers::NONE,
        };
        app.handle_mouse(event).expect("mouse");
    }

    fn status_is_error(app: &App) -> bool {
        matches!(
            app.status,
            Some(StatusMessage {
                kind: StatusKind::Error,
                ..
            })
        )
    }

    #[rstest]
    fn share_tokens_open_the_song_read_only(store: SqliteStore) {
        let song = song_for(&store, "Setlist", Visibility::UrlOnly);
        let share = store.create_share(&song.id, "alice", None).expect("share");
        let mut app = app_for(store, "bob");

        app.handle_key(KeyCode::Char('o')).expect("key");
        assert!(matches!(app.mode, Mode::Prompt(_)));
        type_text(&mut app, &share.token);
        app.handle_key(KeyCode::Enter).expect("enter");

        assert!(matches!(app.mode, Mode::Normal));
        assert!(matches!(
            &app.screen,
            Screen::Editor(editor)
                if editor.read_only
                    && editor.session.song().map(|song| song.id.as_str()) == Some(song.id.as_str())
        ));
    }

    #[rstest]
    #[case("nope")]
    #[case("   ")]
    fn bad_share_tokens_keep_the_prompt_open(store: SqliteStore, #[case] token: &str) {
        let mut app = app_for(store, "bob");
        app.handle_key(KeyCode::Char('o')).expect("key");
        type_text(&mut app, token);
        app.handle_key(KeyCode::Enter).expect("enter");

        assert!(matches!(app.mode, Mode::Prompt(_)));
        assert!(matches!(app.screen, Screen::Library(_)));
        assert!(status_is_error(&app));
    }

    #[rstest]
    fn owners_grant_and_revoke_readers(store: SqliteStore) {
        let song = song_for(&store, "Rehearsal", Visibility::SpecificUsers);
        let mut app = app_for(store, "alice");
        app.open_editor(&song.id);

        app.handle_key(KeyCode::Char('g')).expect("key");
        type_text(&mut app, "bob");
        app.handle_key(KeyCode::Enter).expect("enter");
        assert!(matches!(app.mode, Mode::Normal));
        assert!(app.store.get(&song.id, Some("bob")).is_ok());

        app.handle_key(KeyCode::Char('G')).expect("key");
        type_text(&mut app, "bob");
        app.handle_key(KeyCode::Enter).expect("enter");
        assert!(app.store.get(&song.id, Some("bob")).is_err());
        assert!(!status_is_error(&app));
    }

    #[rstest]
    fn dragging_a_heading_onto_another_reorders_sections(store: SqliteStore) {
        let song = song_for(&store, "Order", Visibility::Private);
        let song = ops::add_section(song, "Verse", SectionType::LyricsChord);
        let song = ops::add_section(song, "Chorus", SectionType::LyricsChord);
        let ids: Vec<String> = song.sections.iter().map(|section| section.id.clone()).collect();
        let mut app = app_for(store, "alice");
        app.open_song(song, false);
        if let Screen::Editor(editor) = &mut app.screen {
            editor.header_hits = vec![(3, ids[0].clone()), (7, ids[1].clone())];
        }

        click(&mut app, MouseEventKind::Down(MouseButton::Left), 7);
        click(&mut app, MouseEventKind::Up(MouseButton::Left), 3);

        let Screen::Editor(editor) = &app.screen else {
            panic!("expected the editor");
        };
        let order: Vec<&str> = editor
            .session
            .song()
            .map(|song| song.sections.iter().map(|section| section.id.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(order, vec![ids[1].as_str(), ids[0].as_str()]);
        assert!(editor.session.is_dirty());
        assert_eq!(editor.current_section_id().as_deref(), Some(ids[1].as_str()));
    }

    #[rstest]
    fn releasing_a_heading_on_itself_changes_nothing(store: SqliteStore) {
        let song = song_for(&store, "Still", Visibility::Private);
        let song = ops::add_section(song, "Verse", SectionType::LyricsChord);
        let section_id = song.sections[0].id.clone();
        let mut app = app_for(store, "alice");
        app.open_song(song, false);
        if let Screen::Editor(editor) = &mut app.screen {
            editor.header_hits = vec![(3, section_id)];
        }

        click(&mut app, MouseEventKind::Down(MouseButton::Left), 3);
        click(&mut app, MouseEventKind::Up(MouseButton::Left), 3);

        assert!(matches!(
            &app.screen,
            Screen::Editor(editor) if !editor.session.is_dirty() && editor.section_drag.is_none()
        ));
    }
}
