use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::models::Setlist;

pub(crate) fn setlist_from_row(row: &Row<'_>) -> rusqlite::Result<Setlist> {
    Ok(Setlist {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        notes: row.get(3)?,
        version: row.get(4)?,
    })
}

/// Load one setlist or fail with a typed `SetlistNotFound`. Shared by the
/// CRUD helpers, the ordering store and the reconciler.
pub(crate) fn require_setlist(conn: &Connection, id: i64) -> StoreResult<Setlist> {
    conn.query_row(
        "SELECT id, user_id, name, notes, version FROM setlists WHERE id = ?1",
        [id],
        setlist_from_row,
    )
    .optional()?
    .ok_or(StoreError::SetlistNotFound(id))
}

/// Retrieve every setlist sorted by name, case-insensitively.
pub fn fetch_setlists(conn: &Connection) -> Result<Vec<Setlist>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, name, notes, version
             FROM setlists
             ORDER BY name COLLATE UNICODE_NOCASE, id",
        )
        .context("failed to prepare setlist query")?;

    let setlists = stmt
        .query_map([], setlist_from_row)
        .context("failed to load setlists")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect setlists")?;

    Ok(setlists)
}

pub fn fetch_setlists_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Setlist>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, name, notes, version
             FROM setlists
             WHERE user_id = ?1
             ORDER BY name COLLATE UNICODE_NOCASE, id",
        )
        .context("failed to prepare user setlist query")?;

    let setlists = stmt
        .query_map([user_id], setlist_from_row)
        .context("failed to load user setlists")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect user setlists")?;

    Ok(setlists)
}

pub fn fetch_setlist(conn: &Connection, id: i64) -> Result<Setlist> {
    Ok(require_setlist(conn, id)?)
}

/// Insert a new, empty setlist owned by `user_id`.
pub fn create_setlist(conn: &Connection, user_id: i64, name: &str) -> Result<Setlist> {
    conn.execute(
        "INSERT INTO setlists (user_id, name) VALUES (?1, ?2)",
        params![user_id, name],
    )
    .context("failed to insert setlist")?;

    let id = conn.last_insert_rowid();
    info!(setlist_id = id, name, "created setlist");
    Ok(Setlist {
        id,
        user_id,
        name: name.to_string(),
        notes: None,
        version: 0,
    })
}

/// Change the display name. Membership and notes are only ever changed by
/// the reconciler, so the version stays as it is.
pub fn rename_setlist(conn: &Connection, id: i64, name: &str) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE setlists SET name = ?1 WHERE id = ?2",
            params![name, id],
        )
        .context("failed to rename setlist")?;

    if updated == 0 {
        Err(StoreError::SetlistNotFound(id).into())
    } else {
        Ok(())
    }
}

/// Remove a setlist. The schema cascades to `setlist_slots`; songs are never
/// touched.
pub fn delete_setlist(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM setlists WHERE id = ?1", params![id])
        .context("failed to delete setlist")?;

    if deleted == 0 {
        Err(StoreError::SetlistNotFound(id).into())
    } else {
        info!(setlist_id = id, "deleted setlist");
        Ok(())
    }
}
