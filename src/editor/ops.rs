//! Structural edits over a [`Song`]. Every operation consumes the song and
//! hands back the edited one; stale or unknown identifiers leave it untouched.

use crate::content::{clamp_anchor, clone_section_content, create_empty_line, create_section};
use crate::content::codec::sort_chords;
use crate::ids;
use crate::models::{
    BarLine, ChordAnnotation, LyricsLine, Section, SectionLine, SectionType, Song, SongMeta,
    Visibility,
};

/// Marker appended to the name of a duplicated section.
pub const COPY_SUFFIX: &str = " (copy)";

/// Which neighbour a section swaps places with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Earlier,
    Later,
}

pub fn add_section(mut song: Song, name: &str, section_type: SectionType) -> Song {
    song.sections.push(create_section(name, section_type));
    song
}

pub fn duplicate_section(mut song: Song, section_id: &str) -> Song {
    let Some(index) = section_index(&song, section_id) else {
        return song;
    };
    let source = &song.sections[index];
    let copy = Section {
        id: ids::generate(),
        name: format!("{}{COPY_SUFFIX}", source.name),
        section_type: source.section_type,
        content: clone_section_content(&source.content),
    };
    song.sections.insert(index + 1, copy);
    song
}

pub fn move_section(mut song: Song, section_id: &str, direction: MoveDirection) -> Song {
    let Some(index) = section_index(&song, section_id) else {
        return song;
    };
    let target = match direction {
        MoveDirection::Earlier => index.checked_sub(1),
        MoveDirection::Later => Some(index + 1).filter(|target| *target < song.sections.len()),
    };
    let Some(target) = target else {
        return song;
    };
    let moved = song.sections.remove(index);
    song.sections.insert(target, moved);
    song
}

/// Move the dragged section into the slot currently held by `over_id`.
pub fn reorder_section(mut song: Song, dragged_id: &str, over_id: &str) -> Song {
    if dragged_id == over_id {
        return song;
    }
    let (Some(from), Some(to)) = (section_index(&song, dragged_id), section_index(&song, over_id))
    else {
        return song;
    };
    let moved = song.sections.remove(from);
    song.sections.insert(to, moved);
    song
}

pub fn delete_section(mut song: Song, section_id: &str) -> Song {
    song.sections.retain(|section| section.id != section_id);
    song
}

pub fn rename_section(mut song: Song, section_id: &str, name: &str) -> Song {
    if let Some(section) = section_mut(&mut song, section_id) {
        section.name = name.to_string();
    }
    song
}

/// Switch a section between lyrics and bar grid, converting every line.
///
/// Lyrics lines become bar lines holding their chord labels in order. Bar
/// lines become empty lyrics lines with their labels spread evenly across the
/// line; placeholder cells keep their slot but produce no chord.
pub fn change_section_type(mut song: Song, section_id: &str, section_type: SectionType) -> Song {
    let Some(section) = section_mut(&mut song, section_id) else {
        return song;
    };
    if section.section_type == section_type {
        return song;
    }
    section.content.lines = section
        .content
        .lines
        .drain(..)
        .map(|line| convert_line(line, section_type))
        .collect();
    section.section_type = section_type;
    song
}

fn convert_line(line: SectionLine, section_type: SectionType) -> SectionLine {
    match (line, section_type) {
        (SectionLine::Lyrics(line), SectionType::Bar) => SectionLine::Bars(BarLine {
            id: line.id,
            bars: line.chords.into_iter().map(|chord| chord.chord).collect(),
        }),
        (SectionLine::Bars(line), SectionType::LyricsChord) => {
            let count = line.bars.len();
            let chords = line
                .bars
                .into_iter()
                .enumerate()
                .filter(|(_, bar)| !bar.is_empty())
                .map(|(index, bar)| ChordAnnotation {
                    id: ids::generate(),
                    chord: bar,
                    anchor: index as f64 / count as f64,
                })
                .collect();
            SectionLine::Lyrics(LyricsLine {
                id: line.id,
                lyrics: String::new(),
                chords,
            })
        }
        (line, _) => line,
    }
}

pub fn add_line(mut song: Song, section_id: &str) -> Song {
    if let Some(section) = section_mut(&mut song, section_id) {
        let line = create_empty_line(section.section_type);
        section.content.lines.push(line);
    }
    song
}

pub fn delete_line(mut song: Song, section_id: &str, line_id: &str) -> Song {
    if let Some(section) = section_mut(&mut song, section_id) {
        section.content.lines.retain(|line| line.id() != line_id);
    }
    song
}

pub fn update_line_lyrics(mut song: Song, section_id: &str, line_id: &str, lyrics: &str) -> Song {
    if let Some(line) = lyrics_line_mut(&mut song, section_id, line_id) {
        line.lyrics = lyrics.to_string();
    }
    song
}

pub fn update_line_bars(mut song: Song, section_id: &str, line_id: &str, bars: Vec<String>) -> Song {
    let target = section_mut(&mut song, section_id).and_then(|section| {
        section
            .content
            .lines
            .iter_mut()
            .find_map(|line| match line {
                SectionLine::Bars(line) if line.id == line_id => Some(line),
                _ => None,
            })
    });
    if let Some(line) = target {
        line.bars = bars;
    }
    song
}

/// Insert a chord and keep the line sorted. Blank labels are ignored.
pub fn add_chord(
    mut song: Song,
    section_id: &str,
    line_id: &str,
    chord_label: &str,
    anchor: f64,
) -> Song {
    let label = chord_label.trim();
    if label.is_empty() {
        return song;
    }
    if let Some(line) = lyrics_line_mut(&mut song, section_id, line_id) {
        line.chords.push(ChordAnnotation {
            id: ids::generate(),
            chord: label.to_string(),
            anchor: clamp_anchor(anchor),
        });
        sort_chords(&mut line.chords);
    }
    song
}

/// Rename a chord. A blank label removes it.
pub fn update_chord_label(
    mut song: Song,
    section_id: &str,
    line_id: &str,
    chord_id: &str,
    chord_label: &str,
) -> Song {
    let label = chord_label.trim();
    if label.is_empty() {
        return delete_chord(song, section_id, line_id, chord_id);
    }
    if let Some(chord) = chord_mut(&mut song, section_id, line_id, chord_id) {
        chord.chord = label.to_string();
    }
    song
}

pub fn update_chord_anchor(
    mut song: Song,
    section_id: &str,
    line_id: &str,
    chord_id: &str,
    anchor: f64,
) -> Song {
    if let Some(line) = lyrics_line_mut(&mut song, section_id, line_id) {
        if let Some(chord) = line.chords.iter_mut().find(|chord| chord.id == chord_id) {
            chord.anchor = clamp_anchor(anchor);
            sort_chords(&mut line.chords);
        }
    }
    song
}

pub fn delete_chord(mut song: Song, section_id: &str, line_id: &str, chord_id: &str) -> Song {
    if let Some(line) = lyrics_line_mut(&mut song, section_id, line_id) {
        line.chords.retain(|chord| chord.id != chord_id);
    }
    song
}

pub fn update_meta(mut song: Song, meta: SongMeta) -> Song {
    song.title = meta.title;
    song.artist = meta.artist;
    song.key = meta.key;
    song.bpm = meta.bpm;
    song.time_signature = meta.time_signature;
    song
}

pub fn set_visibility(mut song: Song, visibility: Visibility) -> Song {
    song.visibility = visibility;
    song
}

fn section_index(song: &Song, section_id: &str) -> Option<usize> {
    song.sections
        .iter()
        .position(|section| section.id == section_id)
}

fn section_mut<'a>(song: &'a mut Song, section_id: &str) -> Option<&'a mut Section> {
    song.sections
        .iter_mut()
        .find(|section| section.id == section_id)
}

fn lyrics_line_mut<'a>(
    song: &'a mut Song,
    section_id: &str,
    line_id: &str,
) -> Option<&'a mut LyricsLine> {
    section_mut(song, section_id)?
        .content
        .lines
        .iter_mut()
        .find_map(|line| match line {
            SectionLine::Lyrics(line) if line.id == line_id => Some(line),
            _ => None,
        })
}

fn chord_mut<'a>(
    song: &'a mut Song,
    section_id: &str,
    line_id: &str,
    chord_id: &str,
) -> Option<&'a mut ChordAnnotation> {
    lyrics_line_mut(song, section_id, line_id)?
        .chords
        .iter_mut()
        .find(|chord| chord.id == chord_id)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::content::{decode, encode};
    use crate::models::{SectionContent, DEFAULT_TIME_SIGNATURE};

    #[fixture]
    fn song() -> Song {
        let now = Utc::now();
        let verse = Section {
            id: "verse".into(),
            name: "Verse".into(),
            section_type: SectionType::LyricsChord,
            content: SectionContent {
                lines: vec![SectionLine::Lyrics(LyricsLine {
                    id: "line".into(),
                    lyrics: "hello world".into(),
                    chords: vec![
                        ChordAnnotation {
                            id: "c1".into(),
                            chord: "Am".into(),
                            anchor: 0.1,
                        },
                        ChordAnnotation {
                            id: "c2".into(),
                            chord: "F".into(),
                            anchor: 0.5,
                        },
                    ],
                })],
            },
        };
        let intro = Section {
            id: "intro".into(),
            name: "Intro".into(),
            section_type: SectionType::Bar,
            content: SectionContent {
                lines: vec![SectionLine::Bars(BarLine {
                    id: "bars".into(),
                    bars: vec!["C".into(), String::new(), "G".into()],
                })],
            },
        };
        let chorus = Section {
            id: "chorus".into(),
            name: "Chorus".into(),
            section_type: SectionType::LyricsChord,
            content: SectionContent::default(),
        };
        Song {
            id: "song".into(),
            owner_id: "owner".into(),
            title: "Test".into(),
            artist: None,
            key: None,
            bpm: None,
            time_signature: DEFAULT_TIME_SIGNATURE.into(),
            visibility: Visibility::Private,
            sections: vec![intro, verse, chorus],
            created_at: now,
            updated_at: now,
        }
    }

    fn section_ids(song: &Song) -> Vec<&str> {
        song.sections.iter().map(|section| section.id.as_str()).collect()
    }

    fn verse_line(song: &Song) -> &LyricsLine {
        song.section("verse").expect("verse").content.lines[0]
            .as_lyrics()
            .expect("lyrics line")
    }

    fn anchors(song: &Song) -> Vec<f64> {
        verse_line(song).chords.iter().map(|chord| chord.anchor).collect()
    }

    #[rstest]
    fn add_section_appends_with_one_empty_line(song: Song) {
        let song = add_section(song, "Bridge", SectionType::Bar);
        let added = song.sections.last().expect("section");
        assert_eq!(added.name, "Bridge");
        assert_eq!(added.content.lines.len(), 1);
        assert!(matches!(added.content.lines[0], SectionLine::Bars(_)));
    }

    #[rstest]
    fn duplicate_inserts_an_independent_copy_after_the_source(song: Song) {
        let song = duplicate_section(song, "verse");
        assert_eq!(song.sections.len(), 4);
        let copy = &song.sections[2];
        assert_eq!(copy.name, "Verse (copy)");
        assert_ne!(copy.id, "verse");

        let copy_line = copy.content.lines[0].as_lyrics().expect("lyrics line");
        assert_eq!(copy_line.lyrics, "hello world");
        assert_ne!(copy_line.id, "line");
        assert!(copy_line.chords.iter().all(|chord| chord.id != "c1" && chord.id != "c2"));

        let edited = update_line_lyrics(song.clone(), &copy.id.clone(), &copy_line.id.clone(), "new");
        assert_eq!(verse_line(&edited).lyrics, "hello world");
    }

    #[rstest]
    fn duplicate_of_unknown_section_is_a_no_op(song: Song) {
        assert_eq!(duplicate_section(song.clone(), "missing"), song);
    }

    #[rstest]
    fn move_swaps_with_the_neighbour(song: Song) {
        let moved = move_section(song.clone(), "verse", MoveDirection::Earlier);
        assert_eq!(section_ids(&moved), vec!["verse", "intro", "chorus"]);
        let moved = move_section(song, "verse", MoveDirection::Later);
        assert_eq!(section_ids(&moved), vec!["intro", "chorus", "verse"]);
    }

    #[rstest]
    #[case("intro", MoveDirection::Earlier)]
    #[case("chorus", MoveDirection::Later)]
    #[case("missing", MoveDirection::Later)]
    fn out_of_bounds_moves_are_no_ops(
        song: Song,
        #[case] section_id: &str,
        #[case] direction: MoveDirection,
    ) {
        assert_eq!(move_section(song.clone(), section_id, direction), song);
    }

    #[rstest]
    fn reorder_moves_into_the_target_slot(song: Song) {
        let reordered = reorder_section(song.clone(), "chorus", "intro");
        assert_eq!(section_ids(&reordered), vec!["chorus", "intro", "verse"]);
        assert_eq!(reorder_section(song.clone(), "chorus", "missing"), song);
    }

    #[rstest]
    fn delete_section_removes_only_the_match(song: Song) {
        let song = delete_section(song, "verse");
        assert_eq!(section_ids(&song), vec!["intro", "chorus"]);
        let unchanged = delete_section(song.clone(), "verse");
        assert_eq!(unchanged, song);
    }

    #[rstest]
    fn add_line_matches_section_type(song: Song) {
        let song = add_line(song, "intro");
        let intro = song.section("intro").expect("intro");
        assert_eq!(intro.content.lines.len(), 2);
        assert!(intro
            .content
            .lines
            .iter()
            .all(|line| line.section_type() == SectionType::Bar));
    }

    #[rstest]
    fn lyrics_updates_ignore_bar_lines(song: Song) {
        assert_eq!(update_line_lyrics(song.clone(), "intro", "bars", "x"), song);
        let updated = update_line_lyrics(song, "verse", "line", "goodbye");
        assert_eq!(verse_line(&updated).lyrics, "goodbye");
    }

    #[rstest]
    fn add_chord_keeps_anchor_order(song: Song) {
        let song = add_chord(song, "verse", "line", "G", 0.2);
        assert_eq!(anchors(&song), vec![0.1, 0.2, 0.5]);
        let song = add_chord(song, "verse", "line", "D", 7.0);
        assert_eq!(anchors(&song), vec![0.1, 0.2, 0.5, 1.0]);
    }

    #[rstest]
    fn blank_chord_labels_are_never_added(song: Song) {
        assert_eq!(add_chord(song.clone(), "verse", "line", "   ", 0.3), song);
    }

    #[rstest]
    fn chord_edits_resolve_by_full_path(song: Song) {
        let renamed = update_chord_label(song.clone(), "verse", "line", "c1", " Am7 ");
        assert_eq!(verse_line(&renamed).chords[0].chord, "Am7");

        let moved = update_chord_anchor(song.clone(), "verse", "line", "c1", 0.9);
        let order: Vec<&str> = verse_line(&moved)
            .chords
            .iter()
            .map(|chord| chord.id.as_str())
            .collect();
        assert_eq!(order, vec!["c2", "c1"]);

        let deleted = delete_chord(song, "verse", "line", "c2");
        assert_eq!(verse_line(&deleted).chords.len(), 1);
    }

    #[rstest]
    fn blank_rename_discards_the_chord(song: Song) {
        let song = update_chord_label(song, "verse", "line", "c1", "");
        let ids: Vec<&str> = verse_line(&song)
            .chords
            .iter()
            .map(|chord| chord.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c2"]);
    }

    #[rstest]
    #[case("verse", "line", "nonexistent-id")]
    #[case("verse", "missing-line", "c1")]
    #[case("missing", "line", "c1")]
    fn stale_chord_references_are_no_ops(
        song: Song,
        #[case] section_id: &str,
        #[case] line_id: &str,
        #[case] chord_id: &str,
    ) {
        assert_eq!(delete_chord(song.clone(), section_id, line_id, chord_id), song);
        assert_eq!(
            update_chord_label(song.clone(), section_id, line_id, chord_id, "E"),
            song
        );
        assert_eq!(
            update_chord_anchor(song.clone(), section_id, line_id, chord_id, 0.4),
            song
        );
    }

    #[rstest]
    fn lyrics_to_bars_keeps_chord_labels(song: Song) {
        let song = change_section_type(song, "verse", SectionType::Bar);
        let verse = song.section("verse").expect("verse");
        assert_eq!(verse.section_type, SectionType::Bar);
        let line = verse.content.lines[0].as_bars().expect("bar line");
        assert_eq!(line.id, "line");
        assert_eq!(line.bars, vec!["Am", "F"]);
    }

    #[rstest]
    fn bars_to_lyrics_spreads_chords(song: Song) {
        let song = change_section_type(song, "intro", SectionType::LyricsChord);
        let intro = song.section("intro").expect("intro");
        let line = intro.content.lines[0].as_lyrics().expect("lyrics line");
        let placed: Vec<(&str, f64)> = line
            .chords
            .iter()
            .map(|chord| (chord.chord.as_str(), chord.anchor))
            .collect();
        assert_eq!(placed, vec![("C", 0.0), ("G", 2.0 / 3.0)]);
        assert!(line.lyrics.is_empty());
    }

    #[rstest]
    fn same_type_change_is_a_no_op(song: Song) {
        assert_eq!(
            change_section_type(song.clone(), "intro", SectionType::Bar),
            song
        );
    }

    #[rstest]
    fn metadata_and_visibility_updates(song: Song) {
        let mut meta = SongMeta::titled("Renamed");
        meta.bpm = Some(96);
        let song = update_meta(song, meta);
        assert_eq!(song.title, "Renamed");
        assert_eq!(song.bpm, Some(96));
        let song = set_visibility(song, Visibility::Public);
        assert_eq!(song.visibility, Visibility::Public);
    }

    #[rstest]
    fn chords_added_in_order_survive_a_round_trip(mut song: Song) {
        song = update_line_lyrics(song, "verse", "line", "hello world");
        song = delete_chord(song, "verse", "line", "c1");
        song = delete_chord(song, "verse", "line", "c2");
        song = add_chord(song, "verse", "line", "C", 0.0);
        song = add_chord(song, "verse", "line", "G", 0.5);

        let content = &song.section("verse").expect("verse").content;
        let decoded = decode(&encode(content), SectionType::LyricsChord);
        let chords: Vec<(String, f64)> = decoded.lines[0]
            .as_lyrics()
            .expect("lyrics line")
            .chords
            .iter()
            .map(|chord| (chord.chord.clone(), chord.anchor))
            .collect();
        assert_eq!(chords, vec![("C".to_string(), 0.0), ("G".to_string(), 0.5)]);
    }
}
