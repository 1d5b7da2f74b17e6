use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::content::{decode_sections, encode_sections};
use crate::error::{StoreContext, StoreError, StoreResult};
use crate::ids;
use crate::models::{
    next_timestamp, Song, SongMeta, SongSummary, SongUpdate, Visibility, DEFAULT_TIME_SIGNATURE,
};

const TITLE_MAX: usize = 200;
const ARTIST_MAX: usize = 200;
const KEY_MAX: usize = 10;
const TIME_SIGNATURE_MAX: usize = 10;

const SONG_COLUMNS: &str = "id, owner_id, title, artist, key, bpm, time_signature, content, \
                            visibility, created_at, updated_at";
pub(crate) const SUMMARY_SELECT: &str =
    "SELECT s.id, s.owner_id, s.title, s.artist, s.key, s.visibility, s.updated_at FROM songs s";

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    let content: String = row.get(7)?;
    Ok(Song {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        key: row.get(4)?,
        bpm: row.get(5)?,
        time_signature: row.get(6)?,
        sections: decode_sections(&content),
        visibility: Visibility::from_code(row.get(8)?),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SongSummary> {
    Ok(SongSummary {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        key: row.get(4)?,
        visibility: Visibility::from_code(row.get(5)?),
        updated_at: row.get(6)?,
    })
}

/// Load a song regardless of who is asking. Access checks happen in the
/// store on top of this.
pub fn fetch_song(conn: &Connection, id: &str) -> StoreResult<Option<Song>> {
    conn.query_row(
        &format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1"),
        [id],
        song_from_row,
    )
    .optional()
    .store_context("failed to load song")
}

/// Songs owned by one user, most recently edited first.
pub fn fetch_songs_for_owner(conn: &Connection, owner_id: &str) -> StoreResult<Vec<SongSummary>> {
    let mut stmt = conn
        .prepare(&format!(
            "{SUMMARY_SELECT} WHERE s.owner_id = ?1 ORDER BY s.updated_at DESC"
        ))
        .store_context("failed to prepare owner songs query")?;

    let songs = stmt
        .query_map([owner_id], summary_from_row)
        .store_context("failed to iterate owner songs")?
        .collect::<Result<Vec<_>, _>>()
        .store_context("failed to collect owner songs")?;

    Ok(songs)
}

/// Public songs whose title, artist, or key contains `query`, ignoring case.
/// A blank query returns every public song.
pub fn search_public_songs(conn: &Connection, query: &str) -> StoreResult<Vec<SongSummary>> {
    let term = query.trim().to_lowercase();
    let mut stmt = conn
        .prepare(&format!(
            "{SUMMARY_SELECT}
             WHERE s.visibility = ?1
               AND (?2 = ''
                    OR instr(LOWER(s.title), ?2) > 0
                    OR instr(LOWER(COALESCE(s.artist, '')), ?2) > 0
                    OR instr(LOWER(COALESCE(s.key, '')), ?2) > 0)
             ORDER BY s.updated_at DESC"
        ))
        .store_context("failed to prepare search query")?;

    let songs = stmt
        .query_map(params![Visibility::Public.code(), term], summary_from_row)
        .store_context("failed to iterate search results")?
        .collect::<Result<Vec<_>, _>>()
        .store_context("failed to collect search results")?;

    debug!(query = %term, hits = songs.len(), "searched public songs");
    Ok(songs)
}

/// Insert a new song with no sections.
pub fn create_song(conn: &Connection, owner_id: &str, meta: &SongMeta) -> StoreResult<Song> {
    let meta = validate_meta(meta)?;
    let now = Utc::now();
    let song = Song {
        id: ids::generate(),
        owner_id: owner_id.to_string(),
        title: meta.title,
        artist: meta.artist,
        key: meta.key,
        bpm: meta.bpm,
        time_signature: meta.time_signature,
        visibility: Visibility::Private,
        sections: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        &format!("INSERT INTO songs ({SONG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            song.id,
            song.owner_id,
            song.title,
            song.artist,
            song.key,
            song.bpm,
            song.time_signature,
            encode_sections(&song.sections),
            song.visibility.code(),
            song.created_at,
            song.updated_at,
        ],
    )
    .store_context("failed to insert song")?;

    info!(song_id = %song.id, owner_id, "created song");
    Ok(song)
}

/// Overwrite metadata, sections, and visibility of a song the caller owns.
pub fn update_song(
    conn: &Connection,
    id: &str,
    owner_id: &str,
    update: &SongUpdate,
) -> StoreResult<Song> {
    let meta = validate_meta(&update.meta)?;
    let existing = fetch_song(conn, id)?
        .filter(|song| song.owner_id == owner_id)
        .ok_or_else(|| StoreError::NotFound("Song".into()))?;
    let updated_at = next_timestamp(existing.updated_at, Utc::now());

    let changed = conn
        .execute(
            "UPDATE songs
             SET title = ?1, artist = ?2, key = ?3, bpm = ?4, time_signature = ?5,
                 content = ?6, visibility = ?7, updated_at = ?8
             WHERE id = ?9 AND owner_id = ?10",
            params![
                meta.title,
                meta.artist,
                meta.key,
                meta.bpm,
                meta.time_signature,
                encode_sections(&update.sections),
                update.visibility.code(),
                updated_at,
                id,
                owner_id,
            ],
        )
        .store_context("failed to update song")?;

    if changed == 0 {
        return Err(StoreError::NotFound("Song".into()));
    }

    info!(song_id = id, sections = update.sections.len(), "saved song");
    fetch_song(conn, id)?.ok_or_else(|| StoreError::NotFound("Song".into()))
}

/// Delete a song the caller owns. Returns `false` when nothing matched.
pub fn delete_song(conn: &Connection, id: &str, owner_id: &str) -> StoreResult<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM songs WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )
        .store_context("failed to delete song")?;

    if deleted > 0 {
        info!(song_id = id, "deleted song");
    }
    Ok(deleted > 0)
}

/// Trim and check metadata against the column limits.
pub fn validate_meta(meta: &SongMeta) -> StoreResult<SongMeta> {
    let title = meta.title.trim();
    if title.is_empty() {
        return Err(StoreError::Invalid("Song title is required.".into()));
    }
    check_len("Title", title, TITLE_MAX)?;

    let artist = non_blank(meta.artist.as_deref());
    if let Some(artist) = &artist {
        check_len("Artist", artist, ARTIST_MAX)?;
    }
    let key = non_blank(meta.key.as_deref());
    if let Some(key) = &key {
        check_len("Key", key, KEY_MAX)?;
    }

    let time_signature = non_blank(Some(&meta.time_signature))
        .unwrap_or_else(|| DEFAULT_TIME_SIGNATURE.to_string());
    check_len("Time signature", &time_signature, TIME_SIGNATURE_MAX)?;

    Ok(SongMeta {
        title: title.to_string(),
        artist,
        key,
        bpm: meta.bpm,
        time_signature,
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn check_len(field: &str, value: &str, max: usize) -> StoreResult<()> {
    if value.chars().count() > max {
        Err(StoreError::Invalid(format!(
            "{field} must be at most {max} characters."
        )))
    } else {
        Ok(())
    }
}
