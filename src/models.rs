//! Domain models shared by the codec, the editor operations, the SQLite store,
//! and the TUI. These types stay plain data holders; normalization lives in
//! `content::codec` and structural edits live in `editor::ops`.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Time signature assigned to songs that do not specify one.
pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";

/// A chord label anchored to a horizontal position on a lyrics line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordAnnotation {
    pub id: String,
    /// Short label such as `Am7`. Never empty once normalized.
    pub chord: String,
    /// Fractional offset across the line, always within `[0, 1]`.
    pub anchor: f64,
}

/// One line of lyrics with chords kept sorted by anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct LyricsLine {
    pub id: String,
    pub lyrics: String,
    pub chords: Vec<ChordAnnotation>,
}

/// One row of a bar grid. Empty labels are valid placeholder cells.
#[derive(Debug, Clone, PartialEq)]
pub struct BarLine {
    pub id: String,
    pub bars: Vec<String>,
}

/// A line inside a section. All lines of a section share the variant that
/// matches the section's [`SectionType`].
#[derive(Debug, Clone, PartialEq)]
pub enum SectionLine {
    Lyrics(LyricsLine),
    Bars(BarLine),
}

impl SectionLine {
    pub fn id(&self) -> &str {
        match self {
            SectionLine::Lyrics(line) => &line.id,
            SectionLine::Bars(line) => &line.id,
        }
    }

    pub fn section_type(&self) -> SectionType {
        match self {
            SectionLine::Lyrics(_) => SectionType::LyricsChord,
            SectionLine::Bars(_) => SectionType::Bar,
        }
    }

    pub fn as_lyrics(&self) -> Option<&LyricsLine> {
        match self {
            SectionLine::Lyrics(line) => Some(line),
            SectionLine::Bars(_) => None,
        }
    }

    pub fn as_bars(&self) -> Option<&BarLine> {
        match self {
            SectionLine::Bars(line) => Some(line),
            SectionLine::Lyrics(_) => None,
        }
    }
}

/// Decoded lines of a single section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionContent {
    pub lines: Vec<SectionLine>,
}

/// Whether a section holds lyrics with chords or a bar grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionType {
    LyricsChord,
    Bar,
}

impl SectionType {
    /// Wire tag used in persisted song content.
    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::LyricsChord => "lyrics-chord",
            SectionType::Bar => "bar",
        }
    }

    /// Parse a wire tag, treating anything unknown as lyrics.
    pub fn from_tag(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("bar") {
            SectionType::Bar
        } else {
            SectionType::LyricsChord
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SectionType::LyricsChord => "Lyrics",
            SectionType::Bar => "Bars",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SectionType::LyricsChord => SectionType::Bar,
            SectionType::Bar => SectionType::LyricsChord,
        }
    }
}

/// A named block of a song such as a verse or chorus.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub section_type: SectionType,
    pub content: SectionContent,
}

/// Sharing scope of a song. The integer codes match the persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Private,
    UrlOnly,
    SpecificUsers,
    Public,
}

impl Visibility {
    pub fn code(self) -> i64 {
        match self {
            Visibility::Private => 0,
            Visibility::UrlOnly => 1,
            Visibility::SpecificUsers => 2,
            Visibility::Public => 3,
        }
    }

    /// Unknown codes collapse to private so nothing leaks by accident.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Visibility::UrlOnly,
            2 => Visibility::SpecificUsers,
            3 => Visibility::Public,
            _ => Visibility::Private,
        }
    }

    /// Next scope in the cycle used by the editor's visibility shortcut.
    pub fn next(self) -> Self {
        match self {
            Visibility::Private => Visibility::UrlOnly,
            Visibility::UrlOnly => Visibility::SpecificUsers,
            Visibility::SpecificUsers => Visibility::Public,
            Visibility::Public => Visibility::Private,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Visibility::Private => "private",
            Visibility::UrlOnly => "url-only",
            Visibility::SpecificUsers => "specific-users",
            Visibility::Public => "public",
        };
        f.write_str(label)
    }
}

/// Editable song metadata, used both for creation and for updates.
#[derive(Debug, Clone, PartialEq)]
pub struct SongMeta {
    pub title: String,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub bpm: Option<u32>,
    pub time_signature: String,
}

impl SongMeta {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: None,
            key: None,
            bpm: None,
            time_signature: DEFAULT_TIME_SIGNATURE.to_string(),
        }
    }
}

/// The song aggregate: metadata plus ordered sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub bpm: Option<u32>,
    pub time_signature: String,
    pub visibility: Visibility,
    pub sections: Vec<Section>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Song {
    pub fn meta(&self) -> SongMeta {
        SongMeta {
            title: self.title.clone(),
            artist: self.artist.clone(),
            key: self.key.clone(),
            bpm: self.bpm,
            time_signature: self.time_signature.clone(),
        }
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == section_id)
    }

    /// Compose a `Title - Artist` string that omits the hyphen when no artist
    /// is set.
    pub fn display_title(&self) -> String {
        display_title(&self.title, self.artist.as_deref())
    }

    /// Advance `updated_at`, never moving it backwards or standing still even
    /// if the wall clock does.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = next_timestamp(self.updated_at, now);
    }
}

/// Compute a timestamp strictly after `previous`, preferring `now`.
pub fn next_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

/// Row shown in song lists.
#[derive(Debug, Clone, PartialEq)]
pub struct SongSummary {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub visibility: Visibility,
    pub updated_at: DateTime<Utc>,
}

impl SongSummary {
    pub fn display_title(&self) -> String {
        display_title(&self.title, self.artist.as_deref())
    }
}

fn display_title(title: &str, artist: Option<&str>) -> String {
    match artist.map(str::trim) {
        Some(artist) if !artist.is_empty() => format!("{title} - {artist}"),
        _ => title.to_string(),
    }
}

/// Everything a save writes back for an existing song.
#[derive(Debug, Clone, PartialEq)]
pub struct SongUpdate {
    pub meta: SongMeta,
    pub sections: Vec<Section>,
    pub visibility: Visibility,
}

impl From<&Song> for SongUpdate {
    fn from(song: &Song) -> Self {
        Self {
            meta: song.meta(),
            sections: song.sections.clone(),
            visibility: song.visibility,
        }
    }
}

/// A registered user of the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// A revocable token that grants read access to a single song.
#[derive(Debug, Clone, PartialEq)]
pub struct SongShare {
    pub id: String,
    pub song_id: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SongShare {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn next_timestamp_is_strictly_monotonic() {
        let previous = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        assert_eq!(next_timestamp(previous, later), later);
        assert_eq!(
            next_timestamp(previous, earlier),
            previous + Duration::milliseconds(1)
        );
        assert!(next_timestamp(previous, previous) > previous);
    }

    #[test]
    fn visibility_codes_survive_persistence() {
        for visibility in [
            Visibility::Private,
            Visibility::UrlOnly,
            Visibility::SpecificUsers,
            Visibility::Public,
        ] {
            assert_eq!(Visibility::from_code(visibility.code()), visibility);
        }
        assert_eq!(Visibility::from_code(42), Visibility::Private);
    }

    #[test]
    fn share_validity_respects_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut share = SongShare {
            id: "s".into(),
            song_id: "song".into(),
            token: "t".into(),
            expires_at: None,
            created_at: now,
        };
        assert!(share.is_valid_at(now));
        share.expires_at = Some(now - Duration::seconds(1));
        assert!(!share.is_valid_at(now));
    }

    #[test]
    fn display_title_skips_blank_artist() {
        let summary = SongSummary {
            id: "1".into(),
            owner_id: "u".into(),
            title: "Blue".into(),
            artist: Some("  ".into()),
            key: None,
            visibility: Visibility::Private,
            updated_at: Utc::now(),
        };
        assert_eq!(summary.display_title(), "Blue");
    }
}
