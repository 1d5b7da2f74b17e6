use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::db::songs::{summary_from_row, SUMMARY_SELECT};
use crate::error::{StoreContext, StoreResult};
use crate::ids;
use crate::models::{SongShare, SongSummary, Visibility};

/// Mint a share token for a song. The caller must already have checked
/// ownership.
pub fn create_share(
    conn: &Connection,
    song_id: &str,
    expires_at: Option<DateTime<Utc>>,
) -> StoreResult<SongShare> {
    let share = SongShare {
        id: ids::generate(),
        song_id: song_id.to_string(),
        token: ids::share_token(),
        expires_at,
        created_at: Utc::now(),
    };
    conn.execute(
        "INSERT INTO song_shares (id, song_id, token, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            share.id,
            share.song_id,
            share.token,
            share.expires_at,
            share.created_at
        ],
    )
    .store_context("failed to insert share")?;

    info!(song_id, "created share token");
    Ok(share)
}

pub fn fetch_share_by_token(conn: &Connection, token: &str) -> StoreResult<Option<SongShare>> {
    conn.query_row(
        "SELECT id, song_id, token, expires_at, created_at FROM song_shares WHERE token = ?1",
        [token],
        |row| {
            Ok(SongShare {
                id: row.get(0)?,
                song_id: row.get(1)?,
                token: row.get(2)?,
                expires_at: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()
    .store_context("failed to load share")
}

/// Allow a user to read a `specific-users` song. Granting twice is harmless.
pub fn grant_access(conn: &Connection, song_id: &str, user_id: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO song_grants (song_id, user_id) VALUES (?1, ?2)",
        params![song_id, user_id],
    )
    .store_context("failed to grant access")?;
    Ok(())
}

pub fn revoke_access(conn: &Connection, song_id: &str, user_id: &str) -> StoreResult<bool> {
    let removed = conn
        .execute(
            "DELETE FROM song_grants WHERE song_id = ?1 AND user_id = ?2",
            params![song_id, user_id],
        )
        .store_context("failed to revoke access")?;
    Ok(removed > 0)
}

pub fn is_granted(conn: &Connection, song_id: &str, user_id: &str) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM song_grants WHERE song_id = ?1 AND user_id = ?2",
            params![song_id, user_id],
            |_| Ok(()),
        )
        .optional()
        .store_context("failed to check access grant")?;
    Ok(found.is_some())
}

/// Bookmark a song. Repeated requests are idempotent.
pub fn add_bookmark(conn: &Connection, user_id: &str, song_id: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO bookmarks (user_id, song_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, song_id, Utc::now()],
    )
    .store_context("failed to add bookmark")?;
    Ok(())
}

pub fn remove_bookmark(conn: &Connection, user_id: &str, song_id: &str) -> StoreResult<bool> {
    let removed = conn
        .execute(
            "DELETE FROM bookmarks WHERE user_id = ?1 AND song_id = ?2",
            params![user_id, song_id],
        )
        .store_context("failed to remove bookmark")?;
    Ok(removed > 0)
}

/// Bookmarked songs the user can still see: their own songs plus anything
/// public or url-only. Bookmarks on songs that went private stay in the table
/// but are hidden.
pub fn fetch_bookmarks(conn: &Connection, user_id: &str) -> StoreResult<Vec<SongSummary>> {
    let mut stmt = conn
        .prepare(&format!(
            "{SUMMARY_SELECT}
             INNER JOIN bookmarks b ON b.song_id = s.id
             WHERE b.user_id = ?1
               AND (s.owner_id = ?1 OR s.visibility IN (?2, ?3)
                    OR (s.visibility = ?4 AND EXISTS (
                        SELECT 1 FROM song_grants g WHERE g.song_id = s.id AND g.user_id = ?1)))
             ORDER BY b.created_at DESC"
        ))
        .store_context("failed to prepare bookmarks query")?;

    let songs = stmt
        .query_map(
            params![
                user_id,
                Visibility::Public.code(),
                Visibility::UrlOnly.code(),
                Visibility::SpecificUsers.code()
            ],
            summary_from_row,
        )
        .store_context("failed to iterate bookmarks")?
        .collect::<Result<Vec<_>, _>>()
        .store_context("failed to collect bookmarks")?;

    Ok(songs)
}
