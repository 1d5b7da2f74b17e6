//! Song editing: pure operations on a song value, the session that holds the
//! song being edited, and pointer gestures for placing chords.

pub mod gesture;
pub mod ops;
pub mod session;

pub use gesture::{anchor_at, ChordDrag, ChordGesture, LineRect, DEFAULT_DRAG_THRESHOLD};
pub use ops::{MoveDirection, COPY_SUFFIX};
pub use session::{ChordDialog, EditorSession, ANCHOR_NUDGE};
