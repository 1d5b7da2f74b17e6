use crate::content::ChordSpan;
use crate::editor::{ChordGesture, EditorSession, LineRect};
use crate::models::{SectionLine, SectionType, Song, SongSummary};

/// Which list the library screen shows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LibraryTab {
    Mine,
    Public,
    Bookmarks,
}

impl LibraryTab {
    pub(crate) const ALL: [LibraryTab; 3] =
        [LibraryTab::Mine, LibraryTab::Public, LibraryTab::Bookmarks];

    pub(crate) fn title(self) -> &'static str {
        match self {
            LibraryTab::Mine => "My Songs",
            LibraryTab::Public => "Public",
            LibraryTab::Bookmarks => "Bookmarks",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            LibraryTab::Mine => 0,
            LibraryTab::Public => 1,
            LibraryTab::Bookmarks => 2,
        }
    }

    /// Step through the tabs. Signed-out users only ever see public songs.
    pub(crate) fn step(self, offset: isize, signed_in: bool) -> Self {
        if !signed_in {
            return LibraryTab::Public;
        }
        let len = Self::ALL.len() as isize;
        let index = (self.index() as isize + offset).rem_euclid(len) as usize;
        Self::ALL[index]
    }
}

/// Song list with an optional local text filter.
pub(crate) struct LibraryScreen {
    pub(crate) tab: LibraryTab,
    pub(crate) songs: Vec<SongSummary>,
    pub(crate) filtered_songs: Vec<SongSummary>,
    pub(crate) filter: Option<String>,
    pub(crate) selected: usize,
}

impl LibraryScreen {
    pub(crate) fn new(tab: LibraryTab, songs: Vec<SongSummary>) -> Self {
        let mut screen = Self {
            tab,
            filtered_songs: Vec::new(),
            songs,
            filter: None,
            selected: 0,
        };
        screen.apply_filter();
        screen
    }

    pub(crate) fn apply_filter(&mut self) {
        self.filtered_songs = match &self.filter {
            Some(query) if !query.trim().is_empty() => {
                let query = query.trim().to_lowercase();
                self.songs
                    .iter()
                    .filter(|song| {
                        song.title.to_lowercase().contains(&query)
                            || song
                                .artist
                                .as_deref()
                                .is_some_and(|artist| artist.to_lowercase().contains(&query))
                            || song
                                .key
                                .as_deref()
                                .is_some_and(|key| key.to_lowercase().contains(&query))
                    })
                    .cloned()
                    .collect()
            }
            _ => self.songs.clone(),
        };
        self.ensure_in_bounds();
    }

    pub(crate) fn set_filter(&mut self, filter: Option<String>) {
        self.filter = filter;
        self.apply_filter();
    }

    pub(crate) fn set_songs(&mut self, songs: Vec<SongSummary>) {
        self.songs = songs;
        self.apply_filter();
    }

    /// Move the selection onto the song with `id` if it is listed.
    pub(crate) fn focus(&mut self, id: &str) {
        if let Some(index) = self.filtered_songs.iter().position(|song| song.id == id) {
            self.selected = index;
        }
    }

    pub(crate) fn current_song(&self) -> Option<&SongSummary> {
        self.filtered_songs.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.filtered_songs.is_empty() {
            return;
        }
        let last = self.filtered_songs.len() as isize - 1;
        self.selected = (self.selected as isize + offset).clamp(0, last) as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.filtered_songs.len().saturating_sub(1);
    }

    fn ensure_in_bounds(&mut self) {
        if self.filtered_songs.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.filtered_songs.len() {
            self.selected = self.filtered_songs.len() - 1;
        }
    }
}

/// One navigable row of the editor: a section heading or one of its lines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EditorRow {
    Section {
        section_id: String,
    },
    Line {
        section_id: String,
        line_id: String,
        section_type: SectionType,
    },
}

impl EditorRow {
    pub(crate) fn section_id(&self) -> &str {
        match self {
            EditorRow::Section { section_id } | EditorRow::Line { section_id, .. } => section_id,
        }
    }
}

pub(crate) fn editor_rows(song: &Song) -> Vec<EditorRow> {
    let mut rows = Vec::new();
    for section in &song.sections {
        rows.push(EditorRow::Section {
            section_id: section.id.clone(),
        });
        for line in &section.content.lines {
            rows.push(EditorRow::Line {
                section_id: section.id.clone(),
                line_id: line.id().to_string(),
                section_type: section.section_type,
            });
        }
    }
    rows
}

/// Screen area of one chord row, recorded while drawing so pointer events
/// can be mapped back to chords.
#[derive(Clone, Debug)]
pub(crate) struct ChordRowHit {
    pub(crate) y: u16,
    pub(crate) left: u16,
    pub(crate) span: usize,
    pub(crate) section_id: String,
    pub(crate) line_id: String,
    pub(crate) chords: Vec<ChordSpan>,
}

impl ChordRowHit {
    /// Rect whose fractions line up with the columns chords are drawn at.
    pub(crate) fn rect(&self) -> LineRect {
        LineRect::new(
            f64::from(self.left),
            self.span.saturating_sub(1).max(1) as f64,
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PointerTarget {
    Chord {
        section_id: String,
        line_id: String,
        chord_id: String,
        rect: LineRect,
    },
    EmptySpace {
        section_id: String,
        line_id: String,
        rect: LineRect,
    },
}

/// The song editor: session state, the active pointer gesture and the
/// keyboard cursor.
pub(crate) struct EditorScreen {
    pub(crate) session: EditorSession,
    pub(crate) gesture: ChordGesture,
    pub(crate) read_only: bool,
    pub(crate) cursor: usize,
    pub(crate) chord: Option<usize>,
    pub(crate) scroll: usize,
    pub(crate) hits: Vec<ChordRowHit>,
    /// Screen rows of the visible section headings.
    pub(crate) header_hits: Vec<(u16, String)>,
    /// Section whose heading is held down, waiting to be dropped on another.
    pub(crate) section_drag: Option<String>,
}

impl EditorScreen {
    pub(crate) fn new(song: Song, read_only: bool, drag_threshold: f64) -> Self {
        Self {
            session: EditorSession::with_song(song),
            gesture: ChordGesture::new(drag_threshold),
            read_only,
            cursor: 0,
            chord: None,
            scroll: 0,
            hits: Vec::new(),
            header_hits: Vec::new(),
            section_drag: None,
        }
    }

    pub(crate) fn rows(&self) -> Vec<EditorRow> {
        self.session.song().map(editor_rows).unwrap_or_default()
    }

    pub(crate) fn current_row(&self) -> Option<EditorRow> {
        self.rows().into_iter().nth(self.cursor)
    }

    pub(crate) fn current_section_id(&self) -> Option<String> {
        self.current_row().map(|row| row.section_id().to_string())
    }

    pub(crate) fn move_cursor(&mut self, offset: isize) {
        let len = self.rows().len();
        if len == 0 {
            self.cursor = 0;
        } else {
            let last = len as isize - 1;
            self.cursor = (self.cursor as isize + offset).clamp(0, last) as usize;
        }
        self.chord = None;
    }

    pub(crate) fn select_last_row(&mut self) {
        self.cursor = self.rows().len().saturating_sub(1);
        self.chord = None;
    }

    /// Put the cursor on a row by identity, e.g. after an edit reshuffled
    /// the list.
    pub(crate) fn focus_row(&mut self, target: &EditorRow) {
        if let Some(index) = self.rows().iter().position(|row| row == target) {
            self.cursor = index;
        }
        self.clamp_cursor();
    }

    pub(crate) fn focus_section(&mut self, section_id: &str) {
        self.focus_row(&EditorRow::Section {
            section_id: section_id.to_string(),
        });
    }

    /// Keep the cursor and chord selection valid after the song changed.
    pub(crate) fn clamp_cursor(&mut self) {
        let len = self.rows().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
        let chord_count = self.current_chord_ids().len();
        self.chord = match self.chord {
            Some(_) if chord_count == 0 => None,
            Some(index) => Some(index.min(chord_count - 1)),
            None => None,
        };
    }

    /// Ids of the chords on the lyric line under the cursor.
    pub(crate) fn current_chord_ids(&self) -> Vec<String> {
        let Some(EditorRow::Line {
            section_id,
            line_id,
            ..
        }) = self.current_row()
        else {
            return Vec::new();
        };
        self.session
            .find_line(&section_id, &line_id)
            .map(|line| line.chords.iter().map(|chord| chord.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Step the chord selection along the current line. Stepping off either
    /// end clears it.
    pub(crate) fn step_chord(&mut self, offset: isize) {
        let count = self.current_chord_ids().len() as isize;
        if count == 0 {
            self.chord = None;
            return;
        }
        self.chord = match self.chord {
            None if offset > 0 => Some(0),
            None => Some(count as usize - 1),
            Some(index) => {
                let next = index as isize + offset;
                (0..count).contains(&next).then_some(next as usize)
            }
        };
    }

    pub(crate) fn selected_chord_id(&self) -> Option<String> {
        let index = self.chord?;
        self.current_chord_ids().into_iter().nth(index)
    }

    /// Select a chord by id on the current line.
    pub(crate) fn select_chord_id(&mut self, chord_id: &str) {
        self.chord = self
            .current_chord_ids()
            .iter()
            .position(|id| id == chord_id);
    }

    pub(crate) fn current_line(&self) -> Option<&SectionLine> {
        let EditorRow::Line {
            section_id,
            line_id,
            ..
        } = self.current_row()?
        else {
            return None;
        };
        self.session
            .song()?
            .section(&section_id)?
            .content
            .lines
            .iter()
            .find(|line| line.id() == line_id)
    }

    pub(crate) fn hit_test(&self, x: u16, y: u16) -> Option<PointerTarget> {
        let hit = self.hits.iter().find(|hit| hit.y == y)?;
        if x < hit.left {
            return None;
        }
        let column = usize::from(x - hit.left);
        let rect = hit.rect();
        if let Some(span) = hit
            .chords
            .iter()
            .find(|span| (span.start..span.end).contains(&column))
        {
            return Some(PointerTarget::Chord {
                section_id: hit.section_id.clone(),
                line_id: hit.line_id.clone(),
                chord_id: span.chord_id.clone(),
                rect,
            });
        }
        if column >= hit.span {
            return None;
        }
        Some(PointerTarget::EmptySpace {
            section_id: hit.section_id.clone(),
            line_id: hit.line_id.clone(),
            rect,
        })
    }

    pub(crate) fn header_at(&self, y: u16) -> Option<&str> {
        self.header_hits
            .iter()
            .find(|(row, _)| *row == y)
            .map(|(_, section_id)| section_id.as_str())
    }

    /// Adjust the scroll offset so display lines `first..=last` are visible
    /// in a viewport `height` lines tall.
    pub(crate) fn scroll_into_view(&mut self, first: usize, last: usize, height: usize) {
        if height == 0 {
            return;
        }
        if first < self.scroll {
            self.scroll = first;
        } else if last >= self.scroll + height {
            self.scroll = last + 1 - height;
        }
    }
}
