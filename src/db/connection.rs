use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Open (or create) the SQLite file at `path` and make sure every table
/// exists. Parent directories are created on demand.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    init_schema(&conn)?;
    info!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Run the lazy migrations against an open connection. Foreign keys are
/// switched on so deleting a song cascades to its shares, grants, and
/// bookmarks.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            display_name TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create users table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS songs (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            artist TEXT,
            key TEXT,
            bpm INTEGER,
            time_signature TEXT NOT NULL DEFAULT '4/4',
            content TEXT NOT NULL DEFAULT '[]',
            visibility INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(owner_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create songs table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_songs_owner ON songs(owner_id)",
        [],
    )
    .context("failed to create owner index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_songs_visibility ON songs(visibility)",
        [],
    )
    .context("failed to create visibility index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS song_shares (
            id TEXT PRIMARY KEY,
            song_id TEXT NOT NULL,
            token TEXT NOT NULL UNIQUE,
            expires_at TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(song_id) REFERENCES songs(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create song_shares table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS song_grants (
            song_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (song_id, user_id),
            FOREIGN KEY(song_id) REFERENCES songs(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create song_grants table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bookmarks (
            user_id TEXT NOT NULL,
            song_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (user_id, song_id),
            FOREIGN KEY(song_id) REFERENCES songs(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create bookmarks table")?;

    Ok(())
}
