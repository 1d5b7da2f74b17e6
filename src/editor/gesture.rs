//! Pointer handling for chords on a lyric line: a press that barely moves is
//! a click and opens the chord dialog, anything further is a drag that moves
//! the chord live.

use tracing::debug;

use crate::content::clamp_anchor;
use crate::editor::ops;
use crate::editor::session::{ChordDialog, EditorSession};

/// Travel, in pointer units, a press must exceed before it becomes a drag.
pub const DEFAULT_DRAG_THRESHOLD: f64 = 3.0;

/// Horizontal extent of the area a line's chords are laid out over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineRect {
    pub left: f64,
    pub width: f64,
}

impl LineRect {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }
}

/// Map a pointer position to an anchor. A zero-width rect maps everything
/// to the start of the line.
pub fn anchor_at(rect: LineRect, x: f64) -> f64 {
    if rect.width <= 0.0 {
        return 0.0;
    }
    clamp_anchor((x - rect.left) / rect.width)
}

/// Snapshot taken when a press lands on a chord.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordDrag {
    pub section_id: String,
    pub line_id: String,
    pub chord_id: String,
    pub rect: LineRect,
    pub start_x: f64,
    pub moved: bool,
}

#[derive(Debug, Clone)]
pub struct ChordGesture {
    active: Option<ChordDrag>,
    threshold: f64,
}

impl Default for ChordGesture {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_THRESHOLD)
    }
}

impl ChordGesture {
    pub fn new(threshold: f64) -> Self {
        Self {
            active: None,
            threshold: threshold.max(0.0),
        }
    }

    pub fn active(&self) -> Option<&ChordDrag> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.as_ref().is_some_and(|drag| drag.moved)
    }

    pub fn pointer_down_on_chord(
        &mut self,
        section_id: &str,
        line_id: &str,
        chord_id: &str,
        rect: LineRect,
        x: f64,
    ) {
        self.active = Some(ChordDrag {
            section_id: section_id.to_string(),
            line_id: line_id.to_string(),
            chord_id: chord_id.to_string(),
            rect,
            start_x: x,
            moved: false,
        });
    }

    /// Follow the pointer, moving the chord with it. Ignored when no press is
    /// in progress.
    pub fn pointer_move(&mut self, session: &mut EditorSession, x: f64) {
        let Some(drag) = self.active.as_mut() else {
            return;
        };
        if !drag.moved && (x - drag.start_x).abs() > self.threshold {
            drag.moved = true;
            debug!(chord_id = %drag.chord_id, "chord drag started");
        }
        let anchor = anchor_at(drag.rect, x);
        let drag = drag.clone();
        session.apply(|song| {
            ops::update_chord_anchor(song, &drag.section_id, &drag.line_id, &drag.chord_id, anchor)
        });
    }

    /// Finish the gesture. A press that never passed the threshold opens the
    /// dialog for that chord; a drag has already been applied.
    pub fn pointer_up(&mut self, session: &mut EditorSession) {
        let Some(drag) = self.active.take() else {
            return;
        };
        if drag.moved {
            return;
        }
        if let Some(chord) = session.find_chord(&drag.section_id, &drag.line_id, &drag.chord_id) {
            let dialog = ChordDialog::edit(&drag.section_id, &drag.line_id, chord);
            session.open_dialog(dialog);
        }
    }

    /// A click on a line away from any chord starts a new one there.
    pub fn click_empty(
        &mut self,
        session: &mut EditorSession,
        section_id: &str,
        line_id: &str,
        rect: LineRect,
        x: f64,
    ) {
        self.active = None;
        if session.find_line(section_id, line_id).is_none() {
            return;
        }
        session.open_dialog(ChordDialog::create(section_id, line_id, anchor_at(rect, x)));
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::models::{
        ChordAnnotation, LyricsLine, Section, SectionContent, SectionLine, SectionType, Song,
    };

    const RECT: LineRect = LineRect {
        left: 10.0,
        width: 100.0,
    };

    #[fixture]
    fn session() -> EditorSession {
        let now = Utc::now();
        EditorSession::with_song(Song {
            id: "song".into(),
            owner_id: "me".into(),
            title: "Tune".into(),
            artist: None,
            key: None,
            bpm: None,
            time_signature: "4/4".into(),
            visibility: Default::default(),
            sections: vec![Section {
                id: "s".into(),
                name: "Verse".into(),
                section_type: SectionType::LyricsChord,
                content: SectionContent {
                    lines: vec![SectionLine::Lyrics(LyricsLine {
                        id: "l".into(),
                        lyrics: "hello there".into(),
                        chords: vec![ChordAnnotation {
                            id: "c".into(),
                            chord: "G".into(),
                            anchor: 0.2,
                        }],
                    })],
                },
            }],
            created_at: now,
            updated_at: now,
        })
    }

    fn anchor_of(session: &EditorSession) -> f64 {
        session.find_chord("s", "l", "c").expect("chord").anchor
    }

    #[rstest]
    #[case(10.0, 0.0)]
    #[case(60.0, 0.5)]
    #[case(110.0, 1.0)]
    #[case(-40.0, 0.0)]
    #[case(400.0, 1.0)]
    fn pointer_positions_map_to_clamped_anchors(#[case] x: f64, #[case] expected: f64) {
        assert!((anchor_at(RECT, x) - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_width_lines_anchor_at_the_start() {
        assert_eq!(anchor_at(LineRect::new(5.0, 0.0), 50.0), 0.0);
    }

    #[rstest]
    fn tap_opens_the_edit_dialog(mut session: EditorSession) {
        let mut gesture = ChordGesture::default();
        gesture.pointer_down_on_chord("s", "l", "c", RECT, 30.0);
        gesture.pointer_move(&mut session, 32.0);
        gesture.pointer_up(&mut session);

        let dialog = session.dialog().expect("dialog");
        assert_eq!(dialog.chord_id.as_deref(), Some("c"));
        assert_eq!(dialog.value, "G");
        assert!(gesture.active().is_none());
    }

    #[rstest]
    fn drag_moves_the_chord_without_a_dialog(mut session: EditorSession) {
        let mut gesture = ChordGesture::default();
        gesture.pointer_down_on_chord("s", "l", "c", RECT, 30.0);
        gesture.pointer_move(&mut session, 50.0);
        assert!(gesture.is_dragging());
        assert!((anchor_of(&session) - 0.4).abs() < 1e-9);

        gesture.pointer_move(&mut session, 85.0);
        gesture.pointer_up(&mut session);

        assert!((anchor_of(&session) - 0.75).abs() < 1e-9);
        assert!(session.dialog().is_none());
        assert!(session.is_dirty());
    }

    #[rstest]
    fn moving_back_under_the_threshold_still_counts_as_a_drag(mut session: EditorSession) {
        let mut gesture = ChordGesture::default();
        gesture.pointer_down_on_chord("s", "l", "c", RECT, 30.0);
        gesture.pointer_move(&mut session, 40.0);
        gesture.pointer_move(&mut session, 30.0);
        gesture.pointer_up(&mut session);
        assert!(session.dialog().is_none());
    }

    #[rstest]
    fn empty_space_click_opens_a_create_dialog(mut session: EditorSession) {
        let mut gesture = ChordGesture::default();
        gesture.click_empty(&mut session, "s", "l", RECT, 85.0);

        let dialog = session.dialog().expect("dialog");
        assert!(dialog.is_new());
        assert!((dialog.anchor - 0.75).abs() < 1e-9);
    }

    #[rstest]
    fn moves_without_a_press_are_ignored(mut session: EditorSession) {
        let mut gesture = ChordGesture::default();
        gesture.pointer_move(&mut session, 90.0);
        gesture.pointer_up(&mut session);
        assert!((anchor_of(&session) - 0.2).abs() < 1e-9);
        assert!(!session.is_dirty());
    }
}
