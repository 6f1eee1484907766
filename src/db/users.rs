use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, Error as SqlError, ErrorCode, OptionalExtension, Row};
use tracing::info;

use crate::error::StoreError;
use crate::models::User;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
    })
}

/// Insert a new user. Usernames and emails are unique; a clash is reported
/// with a readable message instead of the raw constraint error.
pub fn create_user(conn: &Connection, username: &str, email: &str) -> Result<User> {
    conn.execute(
        "INSERT INTO users (username, email) VALUES (?1, ?2)",
        params![username, email],
    )
    .map_err(|err| map_unique_constraint(err, username, email))
    .context("failed to insert user")?;

    let id = conn.last_insert_rowid();
    info!(user_id = id, username, "created user");
    Ok(User {
        id,
        username: username.to_string(),
        email: email.to_string(),
    })
}

pub fn fetch_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        "SELECT id, username, email FROM users WHERE id = ?1",
        [id],
        user_from_row,
    )
    .optional()
    .context("failed to load user")?
    .ok_or_else(|| StoreError::UserNotFound(id).into())
}

pub fn fetch_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, username, email FROM users WHERE username = ?1",
        [username],
        user_from_row,
    )
    .optional()
    .context("failed to look up user by username")
}

/// Return the user with this username, creating it on first use. The
/// application calls this at startup to resolve the configured actor.
pub fn ensure_user(conn: &Connection, username: &str, email: &str) -> Result<User> {
    if let Some(user) = fetch_user_by_username(conn, username)? {
        return Ok(user);
    }
    create_user(conn, username, email)
}

/// Remove a user. Their setlists go with them (and the setlists' slots with
/// those); their songs stay but lose their owner.
pub fn delete_user(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM users WHERE id = ?1", params![id])
        .context("failed to delete user")?;

    if deleted == 0 {
        Err(StoreError::UserNotFound(id).into())
    } else {
        info!(user_id = id, "deleted user");
        Ok(())
    }
}

fn map_unique_constraint(err: SqlError, username: &str, email: &str) -> anyhow::Error {
    if matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    ) {
        anyhow!("Username {username} or email {email} is already in use.")
    } else {
        err.into()
    }
}
