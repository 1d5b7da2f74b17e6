use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{StoreContext, StoreResult};
use crate::models::User;

/// Insert the user on first sight; later calls refresh the email and display
/// name so config edits show up without a migration.
pub fn ensure_user(conn: &Connection, user: &User) -> StoreResult<()> {
    let existing = fetch_user(conn, &user.id)?;
    match existing {
        Some(current) if current == *user => Ok(()),
        Some(_) => {
            conn.execute(
                "UPDATE users SET email = ?1, display_name = ?2 WHERE id = ?3",
                params![user.email, user.display_name, user.id],
            )
            .store_context("failed to update user")?;
            Ok(())
        }
        None => {
            conn.execute(
                "INSERT INTO users (id, email, display_name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.id, user.email, user.display_name, Utc::now()],
            )
            .store_context("failed to insert user")?;
            info!(user_id = %user.id, "registered local user");
            Ok(())
        }
    }
}

pub fn fetch_user(conn: &Connection, id: &str) -> StoreResult<Option<User>> {
    conn.query_row(
        "SELECT id, email, display_name FROM users WHERE id = ?1",
        [id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                display_name: row.get(2)?,
            })
        },
    )
    .optional()
    .store_context("failed to load user")
}
