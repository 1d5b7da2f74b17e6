use chordbook::content::{decode_sections, encode_sections, render_section, RowKind};
use chordbook::editor::{ops, ChordDialog, ChordGesture, EditorSession, LineRect};
use chordbook::{SectionLine, SectionType, Song, SongMeta, SongStore, SqliteStore, Visibility};
use chordbook::models::User;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const OWNER: &str = "writer";

struct Workspace {
    _dir: TempDir,
    path: std::path::PathBuf,
}

impl Workspace {
    fn open(&self) -> SqliteStore {
        let store = SqliteStore::open(&self.path).expect("open store");
        store
            .ensure_user(&User {
                id: OWNER.into(),
                email: "writer@example.com".into(),
                display_name: Some("Writer".into()),
            })
            .expect("user");
        store
    }
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("chordbook.sqlite");
    Workspace { _dir: dir, path }
}

fn first_line_id(song: &Song, section_index: usize) -> (String, String) {
    let section = &song.sections[section_index];
    (section.id.clone(), section.content.lines[0].id().to_string())
}

#[rstest]
fn edits_survive_a_save_and_reopen(workspace: Workspace) {
    let store = workspace.open();
    let song = store.create(OWNER, &SongMeta::titled("Sound Check")).expect("create");

    let mut session = EditorSession::with_song(song);
    assert!(session.apply(|song| ops::add_section(song, "Verse", SectionType::LyricsChord)));
    let (section_id, line_id) = first_line_id(session.song().expect("song"), 0);

    session.apply(|song| {
        ops::update_line_lyrics(song, &section_id, &line_id, "Hello darkness my old friend")
    });
    session.apply(|song| ops::add_chord(song, &section_id, &line_id, "G", 0.5));
    session.apply(|song| ops::add_chord(song, &section_id, &line_id, "Am", 0.0));
    session.apply(|song| ops::set_visibility(song, Visibility::Public));
    assert!(session.is_dirty());

    session.save(&store, OWNER).expect("save");
    assert!(!session.is_dirty());
    let saved = session.song().cloned().expect("song");
    drop(store);

    let reopened = workspace.open();
    let loaded = reopened.get(&saved.id, None).expect("public song");
    assert_eq!(loaded.sections, saved.sections);

    let rows = render_section(&loaded.sections[0], None);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].kind, RowKind::Chords);
    assert_eq!(rows[0].text, format!("Am{}G", " ".repeat(12)));
    assert_eq!(rows[1].text, "Hello darkness my old friend");
}

#[rstest]
fn a_tap_edits_and_a_drag_moves(workspace: Workspace) {
    let store = workspace.open();
    let song = store.create(OWNER, &SongMeta::titled("Gestures")).expect("create");
    let mut session = EditorSession::with_song(song);
    session.apply(|song| ops::add_section(song, "Chorus", SectionType::LyricsChord));
    let (section_id, line_id) = first_line_id(session.song().expect("song"), 0);

    let rect = LineRect::new(10.0, 20.0);
    let mut gesture = ChordGesture::new(3.0);
    gesture.click_empty(&mut session, &section_id, &line_id, rect, 15.0);
    let dialog = session.dialog_mut().expect("create dialog");
    assert!(dialog.is_new());
    assert_eq!(dialog.anchor, 0.25);
    dialog.value = "D".into();
    assert!(session.confirm_dialog());

    let chord_id = session
        .find_line(&section_id, &line_id)
        .and_then(|line| line.chords.first())
        .map(|chord| chord.id.clone())
        .expect("chord");

    gesture.pointer_down_on_chord(&section_id, &line_id, &chord_id, rect, 15.0);
    gesture.pointer_move(&mut session, 25.0);
    gesture.pointer_up(&mut session);
    assert!(session.dialog().is_none());
    let moved = session.find_chord(&section_id, &line_id, &chord_id).expect("chord");
    assert_eq!(moved.anchor, 0.75);

    gesture.pointer_down_on_chord(&section_id, &line_id, &chord_id, rect, 25.0);
    gesture.pointer_move(&mut session, 26.0);
    gesture.pointer_up(&mut session);
    assert_eq!(
        session.dialog().map(|dialog| dialog.chord_id.as_deref()),
        Some(Some(chord_id.as_str()))
    );

    session.save(&store, OWNER).expect("save");
    let loaded = store.get(&session.song().expect("song").id, Some(OWNER)).expect("get");
    let line = loaded.sections[0].content.lines[0].as_lyrics().expect("lyrics");
    assert_eq!(line.chords[0].chord, "D");
}

#[test]
fn legacy_payloads_normalize_to_canonical_content() {
    let raw = r#"[
        {"id": "s1", "name": "Verse", "type": "lyrics-chord",
         "content": "{\"lines\":[{\"id\":\"l1\",\"lyrics\":\"abcdefghij\",\"chords\":[{\"chord\":\"C\",\"position\":5},{\"chord\":\"\",\"anchor\":0.2},{\"id\":\"l1\",\"chord\":\"F\",\"offset\":\"0.1\"}]}]}"},
        {"name": "Outro", "type": "bar", "content": "\"| C | | G |\""}
    ]"#;

    let sections = decode_sections(raw);
    assert_eq!(sections.len(), 2);

    let verse = sections[0].content.lines[0].as_lyrics().expect("lyrics");
    let labels: Vec<(&str, f64)> = verse
        .chords
        .iter()
        .map(|chord| (chord.chord.as_str(), chord.anchor))
        .collect();
    assert_eq!(labels, vec![("F", 0.1), ("C", 0.5)]);
    assert_ne!(verse.chords[0].id, "l1");

    assert_eq!(sections[1].section_type, SectionType::Bar);
    assert!(!sections[1].id.is_empty());
    match &sections[1].content.lines[0] {
        SectionLine::Bars(line) => assert_eq!(line.bars, vec!["C", "", "G"]),
        other => panic!("expected bars, got {other:?}"),
    }

    let canonical = encode_sections(&sections);
    assert_eq!(decode_sections(&canonical), sections);
}

#[test]
fn section_type_changes_carry_chords_into_bars() {
    let now = chrono::Utc::now();
    let song = Song {
        id: "song".into(),
        owner_id: OWNER.into(),
        title: "Convert".into(),
        artist: None,
        key: None,
        bpm: None,
        time_signature: "3/4".into(),
        visibility: Visibility::Private,
        sections: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    let song = ops::add_section(song, "Bridge", SectionType::LyricsChord);
    let (section_id, line_id) = first_line_id(&song, 0);
    let song = ops::add_chord(song, &section_id, &line_id, "Em", 0.3);
    let song = ops::add_chord(song, &section_id, &line_id, "Bm", 0.6);

    let song = ops::change_section_type(song, &section_id, SectionType::Bar);
    match &song.sections[0].content.lines[0] {
        SectionLine::Bars(line) => assert_eq!(line.bars, vec!["Em", "Bm"]),
        other => panic!("expected bars, got {other:?}"),
    }

    let song = ops::change_section_type(song, &section_id, SectionType::LyricsChord);
    let line = song.sections[0].content.lines[0].as_lyrics().expect("lyrics");
    let anchors: Vec<f64> = line.chords.iter().map(|chord| chord.anchor).collect();
    assert_eq!(anchors, vec![0.0, 0.5]);
    assert_eq!(line.id, line_id);
}

#[test]
fn blank_dialogs_never_touch_the_song() {
    let mut session = EditorSession::new();
    session.open_dialog(ChordDialog::create("missing", "missing", 0.5));
    assert!(!session.confirm_dialog());
    assert!(session.dialog().is_none());
    assert!(!session.is_dirty());
}
