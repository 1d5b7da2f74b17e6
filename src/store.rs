//! The song store: the persistence collaborator the editor talks to. Access
//! rules live here so callers only ever see songs they may read.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db;
use crate::error::{StoreError, StoreResult};
use crate::models::{Song, SongMeta, SongShare, SongSummary, SongUpdate, User, Visibility};

/// Which songs a listing returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    Owner(String),
    Public,
}

/// CRUD by identifier plus filtered listing.
pub trait SongStore {
    /// Load a song the viewer may read. Songs that exist but are hidden from
    /// the viewer report `NotFound`, same as missing ones.
    fn get(&self, song_id: &str, viewer: Option<&str>) -> StoreResult<Song>;

    fn list(&self, filter: &ListFilter) -> StoreResult<Vec<SongSummary>>;

    fn search(&self, query: &str) -> StoreResult<Vec<SongSummary>>;

    fn create(&self, owner_id: &str, meta: &SongMeta) -> StoreResult<Song>;

    fn update(&self, song_id: &str, owner_id: &str, update: &SongUpdate) -> StoreResult<Song>;

    fn delete(&self, song_id: &str, owner_id: &str) -> StoreResult<bool>;
}

/// [`SongStore`] backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = db::open_database(path)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        db::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn ensure_user(&self, user: &User) -> StoreResult<()> {
        db::ensure_user(&self.conn, user)
    }

    /// Mint a share token for a song owned by `owner_id`.
    pub fn create_share(
        &self,
        song_id: &str,
        owner_id: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<SongShare> {
        self.owned_song(song_id, owner_id)?;
        db::create_share(&self.conn, song_id, expires_at)
    }

    /// Resolve a share token to its song. Expired tokens and songs that were
    /// made private since the token was minted both report `NotFound`.
    pub fn get_by_share_token(&self, token: &str) -> StoreResult<Song> {
        let share = db::fetch_share_by_token(&self.conn, token)?
            .filter(|share| share.is_valid_at(Utc::now()))
            .ok_or_else(|| StoreError::NotFound("Share".into()))?;
        let song = db::fetch_song(&self.conn, &share.song_id)?
            .ok_or_else(|| StoreError::NotFound("Song".into()))?;
        if song.visibility == Visibility::Private {
            return Err(StoreError::NotFound("Song".into()));
        }
        Ok(song)
    }

    pub fn grant_access(&self, song_id: &str, owner_id: &str, user_id: &str) -> StoreResult<()> {
        self.owned_song(song_id, owner_id)?;
        db::grant_access(&self.conn, song_id, user_id)
    }

    pub fn revoke_access(&self, song_id: &str, owner_id: &str, user_id: &str) -> StoreResult<bool> {
        self.owned_song(song_id, owner_id)?;
        db::revoke_access(&self.conn, song_id, user_id)
    }

    /// Bookmark a song the user can read.
    pub fn add_bookmark(&self, user_id: &str, song_id: &str) -> StoreResult<()> {
        self.get(song_id, Some(user_id))?;
        db::add_bookmark(&self.conn, user_id, song_id)
    }

    pub fn remove_bookmark(&self, user_id: &str, song_id: &str) -> StoreResult<bool> {
        db::remove_bookmark(&self.conn, user_id, song_id)
    }

    pub fn list_bookmarks(&self, user_id: &str) -> StoreResult<Vec<SongSummary>> {
        db::fetch_bookmarks(&self.conn, user_id)
    }

    fn owned_song(&self, song_id: &str, owner_id: &str) -> StoreResult<Song> {
        db::fetch_song(&self.conn, song_id)?
            .filter(|song| song.owner_id == owner_id)
            .ok_or_else(|| StoreError::NotFound("Song".into()))
    }

    fn can_view(&self, song: &Song, viewer: Option<&str>) -> StoreResult<bool> {
        if viewer == Some(song.owner_id.as_str()) {
            return Ok(true);
        }
        match (song.visibility, viewer) {
            (Visibility::Public, _) => Ok(true),
            (Visibility::UrlOnly, Some(_)) => Ok(true),
            (Visibility::SpecificUsers, Some(viewer)) => {
                db::is_granted(&self.conn, &song.id, viewer)
            }
            _ => Ok(false),
        }
    }
}

impl SongStore for SqliteStore {
    fn get(&self, song_id: &str, viewer: Option<&str>) -> StoreResult<Song> {
        let song = db::fetch_song(&self.conn, song_id)?
            .ok_or_else(|| StoreError::NotFound("Song".into()))?;
        if self.can_view(&song, viewer)? {
            debug!(song_id, "loaded song");
            Ok(song)
        } else {
            warn!(song_id, viewer = viewer.unwrap_or("anonymous"), "song hidden from viewer");
            Err(StoreError::NotFound("Song".into()))
        }
    }

    fn list(&self, filter: &ListFilter) -> StoreResult<Vec<SongSummary>> {
        match filter {
            ListFilter::Owner(owner_id) => db::fetch_songs_for_owner(&self.conn, owner_id),
            ListFilter::Public => db::search_public_songs(&self.conn, ""),
        }
    }

    fn search(&self, query: &str) -> StoreResult<Vec<SongSummary>> {
        db::search_public_songs(&self.conn, query)
    }

    fn create(&self, owner_id: &str, meta: &SongMeta) -> StoreResult<Song> {
        db::create_song(&self.conn, owner_id, meta)
    }

    fn update(&self, song_id: &str, owner_id: &str, update: &SongUpdate) -> StoreResult<Song> {
        db::update_song(&self.conn, song_id, owner_id, update)
    }

    fn delete(&self, song_id: &str, owner_id: &str) -> StoreResult<bool> {
        db::delete_song(&self.conn, song_id, owner_id)
    }
}
