//! Persistence module split across logical submodules. Each function wraps
//! one query against the embedded SQLite database.

mod connection;
mod shares;
mod songs;
mod users;

pub use connection::{init_schema, open_database};
pub use shares::{
    add_bookmark, create_share, fetch_bookmarks, fetch_share_by_token, grant_access, is_granted,
    remove_bookmark, revoke_access,
};
pub use songs::{
    create_song, delete_song, fetch_song, fetch_songs_for_owner, search_public_songs, update_song,
    validate_meta,
};
pub use users::{ensure_user, fetch_user};
