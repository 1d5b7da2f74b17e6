use std::collections::HashSet;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::ids;
use crate::models::{
    BarLine, ChordAnnotation, LyricsLine, Section, SectionContent, SectionLine, SectionType,
};

/// Clamp an anchor into `[0, 1]`, mapping NaN and infinities to the start of
/// the line.
pub fn clamp_anchor(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Decode a persisted section payload into editable lines.
///
/// Accepts the canonical `{"lines": [...]}` object, a bare array of lines, or
/// a JSON string holding plain text. Anything else, including text that is not
/// JSON at all, decodes to an empty line list.
pub fn decode(raw: &str, section_type: SectionType) -> SectionContent {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return SectionContent::default();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => decode_value(&value, section_type),
        Err(err) => {
            debug!(error = %err, "section payload is not JSON, using empty content");
            SectionContent::default()
        }
    }
}

/// Decode an already-parsed payload. See [`decode`].
pub fn decode_value(value: &Value, section_type: SectionType) -> SectionContent {
    let mut seen = HashSet::new();
    let lines = match value {
        Value::Object(map) => match map.get("lines") {
            Some(Value::Array(items)) => decode_lines(items, section_type, &mut seen),
            _ => Vec::new(),
        },
        Value::Array(items) => decode_lines(items, section_type, &mut seen),
        Value::String(text) => decode_plain_text(text, section_type),
        _ => Vec::new(),
    };
    SectionContent { lines }
}

/// Produce the canonical payload for a section's lines.
pub fn encode(content: &SectionContent) -> String {
    encode_value(content).to_string()
}

/// Canonical payload as a JSON value, for embedding in song content.
pub fn encode_value(content: &SectionContent) -> Value {
    let lines: Vec<Value> = content.lines.iter().map(encode_line).collect();
    json!({ "lines": lines })
}

fn encode_line(line: &SectionLine) -> Value {
    match line {
        SectionLine::Lyrics(line) => {
            let chords: Vec<Value> = line
                .chords
                .iter()
                .filter(|chord| !chord.chord.is_empty())
                .map(|chord| {
                    json!({
                        "id": chord.id,
                        "chord": chord.chord,
                        "anchor": clamp_anchor(chord.anchor),
                    })
                })
                .collect();
            json!({ "id": line.id, "lyrics": line.lyrics, "chords": chords })
        }
        SectionLine::Bars(line) => json!({ "id": line.id, "bars": line.bars }),
    }
}

/// Empty line whose variant matches the section type.
pub fn create_empty_line(section_type: SectionType) -> SectionLine {
    match section_type {
        SectionType::LyricsChord => SectionLine::Lyrics(LyricsLine {
            id: ids::generate(),
            lyrics: String::new(),
            chords: Vec::new(),
        }),
        SectionType::Bar => SectionLine::Bars(BarLine {
            id: ids::generate(),
            bars: Vec::new(),
        }),
    }
}

/// New section holding a single empty line.
pub fn create_section(name: &str, section_type: SectionType) -> Section {
    Section {
        id: ids::generate(),
        name: name.to_string(),
        section_type,
        content: SectionContent {
            lines: vec![create_empty_line(section_type)],
        },
    }
}

/// Deep copy with a fresh identifier on every line and chord.
pub fn clone_section_content(content: &SectionContent) -> SectionContent {
    let lines = content
        .lines
        .iter()
        .map(|line| match line {
            SectionLine::Lyrics(line) => SectionLine::Lyrics(LyricsLine {
                id: ids::generate(),
                lyrics: line.lyrics.clone(),
                chords: line
                    .chords
                    .iter()
                    .map(|chord| ChordAnnotation {
                        id: ids::generate(),
                        chord: chord.chord.clone(),
                        anchor: chord.anchor,
                    })
                    .collect(),
            }),
            SectionLine::Bars(line) => SectionLine::Bars(BarLine {
                id: ids::generate(),
                bars: line.bars.clone(),
            }),
        })
        .collect();
    SectionContent { lines }
}

/// Split one plain-text bar row such as `| C | G | Am |` into cells.
pub fn parse_bar_text(text: &str) -> Vec<String> {
    let inner = text.trim().trim_matches('|');
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner
        .split('|')
        .map(|cell| cell.trim().to_string())
        .collect()
}

/// Decode a whole song's section list.
pub fn decode_sections(raw: &str) -> Vec<Section> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "song content is not JSON, using no sections");
            return Vec::new();
        }
    };
    let Value::Array(items) = value else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|map| decode_section(map, &mut seen))
        .collect()
}

fn decode_section(map: &Map<String, Value>, seen: &mut HashSet<String>) -> Section {
    let section_type = map
        .get("type")
        .and_then(Value::as_str)
        .map(SectionType::from_tag)
        .unwrap_or(SectionType::LyricsChord);
    let content = match map.get("content") {
        // Early revisions stored the section body as bare text.
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value @ (Value::Object(_) | Value::Array(_) | Value::String(_))) => {
                decode_value(&value, section_type)
            }
            _ => SectionContent {
                lines: decode_plain_text(raw, section_type),
            },
        },
        Some(value) => decode_value(value, section_type),
        None => match map.get("lines") {
            Some(lines) => decode_value(lines, section_type),
            None => SectionContent::default(),
        },
    };
    Section {
        id: unique_id(map.get("id"), seen),
        name: map
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        section_type,
        content,
    }
}

/// Encode a song's section list for the `content` column.
pub fn encode_sections(sections: &[Section]) -> String {
    let items: Vec<Value> = sections
        .iter()
        .map(|section| {
            json!({
                "id": section.id,
                "name": section.name,
                "type": section.section_type.as_str(),
                "content": encode_value(&section.content),
            })
        })
        .collect();
    Value::Array(items).to_string()
}

fn decode_lines(
    items: &[Value],
    section_type: SectionType,
    seen: &mut HashSet<String>,
) -> Vec<SectionLine> {
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|map| match section_type {
            SectionType::LyricsChord => SectionLine::Lyrics(decode_lyrics_line(map, seen)),
            SectionType::Bar => SectionLine::Bars(decode_bar_line(map, seen)),
        })
        .collect()
}

fn decode_lyrics_line(map: &Map<String, Value>, seen: &mut HashSet<String>) -> LyricsLine {
    let id = unique_id(map.get("id"), seen);
    let lyrics = map
        .get("lyrics")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let lyric_len = lyrics.chars().count();

    let mut chords: Vec<ChordAnnotation> = match map.get("chords") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|entry| decode_chord(entry, lyric_len, seen))
            .collect(),
        _ => Vec::new(),
    };
    sort_chords(&mut chords);

    LyricsLine { id, lyrics, chords }
}

fn decode_chord(
    entry: &Map<String, Value>,
    lyric_len: usize,
    seen: &mut HashSet<String>,
) -> Option<ChordAnnotation> {
    let chord = entry.get("chord").and_then(Value::as_str).unwrap_or_default();
    if chord.is_empty() {
        return None;
    }

    let anchor = if let Some(value) = entry.get("anchor").or_else(|| entry.get("offset")) {
        clamp_anchor(coerce_number(value))
    } else if let Some(value) = entry.get("position") {
        column_to_anchor(coerce_number(value), lyric_len)
    } else {
        0.0
    };

    Some(ChordAnnotation {
        id: unique_id(entry.get("id"), seen),
        chord: chord.to_string(),
        anchor,
    })
}

fn decode_bar_line(map: &Map<String, Value>, seen: &mut HashSet<String>) -> BarLine {
    let bars = match map.get("bars") {
        Some(Value::Array(cells)) => cells
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };
    BarLine {
        id: unique_id(map.get("id"), seen),
        bars,
    }
}

fn decode_plain_text(text: &str, section_type: SectionType) -> Vec<SectionLine> {
    text.lines()
        .map(|row| match section_type {
            SectionType::LyricsChord => SectionLine::Lyrics(LyricsLine {
                id: ids::generate(),
                lyrics: row.to_string(),
                chords: Vec::new(),
            }),
            SectionType::Bar => SectionLine::Bars(BarLine {
                id: ids::generate(),
                bars: parse_bar_text(row),
            }),
        })
        .collect()
}

/// Numbers pass through, numeric strings are parsed, everything else is `0`.
/// Negative and non-finite results also collapse to `0`.
fn coerce_number(value: &Value) -> f64 {
    let number = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if number.is_finite() && number > 0.0 {
        number
    } else {
        0.0
    }
}

/// Convert a character index into a fractional anchor over the lyric.
fn column_to_anchor(column: f64, lyric_len: usize) -> f64 {
    if lyric_len == 0 {
        return 0.0;
    }
    clamp_anchor(column.floor() / lyric_len as f64)
}

/// Stable sort so chords sharing an anchor keep their insertion order.
pub(crate) fn sort_chords(chords: &mut [ChordAnnotation]) {
    chords.sort_by(|a, b| a.anchor.total_cmp(&b.anchor));
}

fn unique_id(candidate: Option<&Value>, seen: &mut HashSet<String>) -> String {
    let id = match candidate.and_then(Value::as_str) {
        Some(id) if !id.is_empty() && !seen.contains(id) => id.to_string(),
        _ => ids::generate(),
    };
    seen.insert(id.clone());
    id
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn lyrics(content: &SectionContent, index: usize) -> &LyricsLine {
        content.lines[index].as_lyrics().expect("lyrics line")
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("not json")]
    #[case("{}")]
    #[case("42")]
    #[case("null")]
    #[case(r#"{"lines": "nope"}"#)]
    fn malformed_payloads_decode_to_no_lines(#[case] raw: &str) {
        assert!(decode(raw, SectionType::LyricsChord).lines.is_empty());
        assert!(decode(raw, SectionType::Bar).lines.is_empty());
    }

    #[test]
    fn anchors_are_clamped_and_coerced() {
        let raw = r#"{"lines":[{"id":"l1","lyrics":"hello","chords":[
            {"id":"a","chord":"C","anchor":-5},
            {"id":"b","chord":"G","anchor":1.5},
            {"id":"c","chord":"F","anchor":"0.25"},
            {"id":"d","chord":"D","anchor":"left"}
        ]}]}"#;
        let content = decode(raw, SectionType::LyricsChord);
        let anchors: Vec<(&str, f64)> = lyrics(&content, 0)
            .chords
            .iter()
            .map(|chord| (chord.chord.as_str(), chord.anchor))
            .collect();
        assert_eq!(anchors, vec![("C", 0.0), ("D", 0.0), ("F", 0.25), ("G", 1.0)]);
    }

    #[test]
    fn legacy_position_is_floored_and_scaled_to_lyrics() {
        let raw = r#"[{"lyrics":"abcdefghij","chords":[
            {"chord":"Am","position":5.9},
            {"chord":"E","position":-2},
            {"chord":"G","position":40}
        ]}]"#;
        let content = decode(raw, SectionType::LyricsChord);
        let anchors: Vec<f64> = lyrics(&content, 0)
            .chords
            .iter()
            .map(|chord| chord.anchor)
            .collect();
        assert_eq!(anchors, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn legacy_offset_key_is_read_as_fraction() {
        let raw = r#"{"lines":[{"lyrics":"x","chords":[{"chord":"C","offset":0.75}]}]}"#;
        let content = decode(raw, SectionType::LyricsChord);
        assert_eq!(lyrics(&content, 0).chords[0].anchor, 0.75);
    }

    #[test]
    fn missing_and_duplicate_ids_are_replaced() {
        let raw = r#"{"lines":[
            {"id":"same","lyrics":"a","chords":[{"chord":"C"},{"id":"same","chord":"G"}]},
            {"id":"same","lyrics":"b","chords":[]}
        ]}"#;
        let content = decode(raw, SectionType::LyricsChord);
        let first = lyrics(&content, 0);
        let second = lyrics(&content, 1);
        assert_eq!(first.id, "same");
        assert_ne!(second.id, "same");
        assert!(first.chords.iter().all(|chord| !chord.id.is_empty()));
        assert!(first.chords.iter().all(|chord| chord.id != "same"));
    }

    #[test]
    fn empty_chord_labels_are_dropped() {
        let raw = r#"{"lines":[{"lyrics":"a","chords":[{"chord":"","anchor":0.1},{"chord":7},{"chord":"C","anchor":0.2}]}]}"#;
        let content = decode(raw, SectionType::LyricsChord);
        let labels: Vec<&str> = lyrics(&content, 0)
            .chords
            .iter()
            .map(|chord| chord.chord.as_str())
            .collect();
        assert_eq!(labels, vec!["C"]);
    }

    #[test]
    fn chord_ties_keep_insertion_order() {
        let raw = r#"{"lines":[{"lyrics":"a","chords":[
            {"chord":"B","anchor":0.5},{"chord":"A","anchor":0.2},{"chord":"C","anchor":0.5}
        ]}]}"#;
        let content = decode(raw, SectionType::LyricsChord);
        let labels: Vec<&str> = lyrics(&content, 0)
            .chords
            .iter()
            .map(|chord| chord.chord.as_str())
            .collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
    }

    #[test]
    fn bar_entries_that_are_not_strings_are_dropped() {
        let raw = r#"{"lines":[{"id":"b1","bars":["C", 3, "", null, "G7"]}, "stray"]}"#;
        let content = decode(raw, SectionType::Bar);
        assert_eq!(content.lines.len(), 1);
        let line = content.lines[0].as_bars().expect("bar line");
        assert_eq!(line.bars, vec!["C", "", "G7"]);
    }

    #[test]
    fn plain_text_payloads_become_lines() {
        let content = decode(r#""first line\nsecond line""#, SectionType::LyricsChord);
        assert_eq!(content.lines.len(), 2);
        assert_eq!(lyrics(&content, 1).lyrics, "second line");

        let bars = decode(r#""| C | G | Am | F |""#, SectionType::Bar);
        assert_eq!(
            bars.lines[0].as_bars().expect("bar line").bars,
            vec!["C", "G", "Am", "F"]
        );
    }

    #[test]
    fn encode_then_decode_is_identity_for_normalized_content() {
        let raw = r#"{"lines":[
            {"id":"l1","lyrics":"hello world","chords":[{"id":"c1","chord":"C","anchor":0},{"id":"c2","chord":"G","anchor":0.5}]},
            {"id":"l2","lyrics":"","chords":[]}
        ]}"#;
        let content = decode(raw, SectionType::LyricsChord);
        assert_eq!(decode(&encode(&content), SectionType::LyricsChord), content);

        let bars = decode(r#"{"lines":[{"id":"b","bars":["C","","G"]}]}"#, SectionType::Bar);
        assert_eq!(decode(&encode(&bars), SectionType::Bar), bars);
    }

    #[test]
    fn created_sections_hold_one_matching_empty_line() {
        let section = create_section("Verse", SectionType::Bar);
        assert_eq!(section.name, "Verse");
        assert_eq!(section.content.lines.len(), 1);
        assert_eq!(section.content.lines[0].section_type(), SectionType::Bar);

        match create_empty_line(SectionType::LyricsChord) {
            SectionLine::Lyrics(line) => {
                assert!(line.lyrics.is_empty());
                assert!(line.chords.is_empty());
            }
            SectionLine::Bars(_) => panic!("expected a lyrics line"),
        }
    }

    #[test]
    fn clones_share_no_identifiers_with_the_source() {
        let raw = r#"{"lines":[{"id":"l1","lyrics":"hi","chords":[{"id":"c1","chord":"C","anchor":0.3}]}]}"#;
        let source = decode(raw, SectionType::LyricsChord);
        let mut copy = clone_section_content(&source);

        let source_line = lyrics(&source, 0);
        let copy_line = lyrics(&copy, 0);
        assert_ne!(source_line.id, copy_line.id);
        assert_ne!(source_line.chords[0].id, copy_line.chords[0].id);
        assert_eq!(copy_line.chords[0].chord, "C");

        if let SectionLine::Lyrics(line) = &mut copy.lines[0] {
            line.lyrics = "changed".into();
        }
        assert_eq!(lyrics(&source, 0).lyrics, "hi");
    }

    #[test]
    fn sections_round_trip_through_song_content() {
        let mut verse = create_section("Verse", SectionType::LyricsChord);
        if let SectionLine::Lyrics(line) = &mut verse.content.lines[0] {
            line.lyrics = "la la".into();
        }
        let intro = create_section("Intro", SectionType::Bar);
        let sections = vec![intro, verse];

        assert_eq!(decode_sections(&encode_sections(&sections)), sections);
    }

    #[test]
    fn legacy_sections_with_inline_lines_are_accepted() {
        let raw = r#"[{"id":"s1","name":"Chorus","type":"bar","lines":[{"bars":["C","G"]}]}, 5]"#;
        let sections = decode_sections(raw);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_type, SectionType::Bar);
        assert_eq!(
            sections[0].content.lines[0].as_bars().expect("bar line").bars,
            vec!["C", "G"]
        );
        assert!(decode_sections("garbage").is_empty());
    }

    #[rstest]
    #[case(SectionType::LyricsChord, "first line\nsecond line")]
    #[case(SectionType::Bar, "| C | G |\n| Am | |")]
    fn plain_text_section_content_keeps_its_lines(
        #[case] section_type: SectionType,
        #[case] text: &str,
    ) {
        let raw = json!([{
            "id": "s1",
            "name": "Verse",
            "type": section_type.as_str(),
            "content": text,
        }])
        .to_string();
        let sections = decode_sections(&raw);
        assert_eq!(sections[0].content.lines.len(), 2);
        match &sections[0].content.lines[1] {
            SectionLine::Lyrics(line) => assert_eq!(line.lyrics, "second line"),
            SectionLine::Bars(line) => assert_eq!(line.bars, vec!["Am", ""]),
        }
    }

    #[test]
    fn bar_text_keeps_inner_placeholders() {
        assert_eq!(parse_bar_text("C |  | G"), vec!["C", "", "G"]);
        assert!(parse_bar_text(" | ").is_empty());
    }
}
