use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::models::fold_case_cmp;

/// Collation every title and name `ORDER BY` uses. Registered per
/// connection by [`ensure_schema`].
pub(crate) const UNICODE_NOCASE: &str = "UNICODE_NOCASE";

/// Open (or create) the database file, configure the connection and run the
/// idempotent schema setup.
pub fn open_database(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    conn.busy_timeout(busy_timeout)
        .context("failed to set busy timeout")?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("failed to switch journal mode")?;
    debug!(journal_mode = %mode, "journal mode configured");

    ensure_schema(&conn)?;
    info!(path = %path.display(), "database ready");
    Ok(conn)
}

/// Private in-memory database with the full schema. Used by tests and by
/// tooling that wants a scratch store.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create every table and index if missing. Also turns on
/// `PRAGMA foreign_keys` so the cascade rules below are enforced on this
/// connection, and registers the `UNICODE_NOCASE` collation.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("failed to enable foreign keys")?;
    conn.create_collation(UNICODE_NOCASE, fold_case_cmp)
        .context("failed to register title collation")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE
        )",
        [],
    )
    .context("failed to create users table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            artist TEXT NOT NULL,
            lyrics TEXT
        )",
        [],
    )
    .context("failed to create songs table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS setlists (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            notes TEXT,
            version INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )
    .context("failed to create setlists table")?;

    // One row per song occurrence; positions are unique within a setlist.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS setlist_slots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            setlist_id INTEGER NOT NULL,
            song_id INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            UNIQUE (setlist_id, position),
            FOREIGN KEY(setlist_id) REFERENCES setlists(id) ON DELETE CASCADE,
            FOREIGN KEY(song_id) REFERENCES songs(id) ON DELETE CASCADE
        )",
        [],
    )
    .context("failed to create setlist_slots table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_setlist_slots_song ON setlist_slots(song_id)",
        [],
    )
    .context("failed to create setlist_slots song index")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn in_memory_database_has_every_table() {
        let conn = open_in_memory().unwrap();
        let tables = table_names(&conn);
        for expected in ["setlist_slots", "setlists", "songs", "users"] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let conn = open_in_memory().unwrap();
        let enabled: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn title_collation_folds_beyond_ascii() {
        let conn = open_in_memory().unwrap();
        let titles: Vec<String> = conn
            .prepare(
                "SELECT column1 FROM (VALUES ('Émile'), ('zebra'), ('éclair'), ('Apple'))
                 ORDER BY column1 COLLATE UNICODE_NOCASE",
            )
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(titles, ["Apple", "zebra", "éclair", "Émile"]);
    }

    #[test]
    fn opening_a_file_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("setlists.sqlite");

        let first = open_database(&path, Duration::from_millis(100)).unwrap();
        drop(first);
        let second = open_database(&path, Duration::from_millis(100)).unwrap();

        assert!(path.is_file());
        assert!(table_names(&second).contains(&"setlist_slots".to_string()));
    }

    #[test]
    fn duplicate_positions_are_rejected_by_storage() {
        let conn = open_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO users (username, email) VALUES ('ana', 'ana@example.com');
             INSERT INTO songs (user_id, title, artist) VALUES (1, 'A', 'X');
             INSERT INTO setlists (user_id, name) VALUES (1, 'Set');
             INSERT INTO setlist_slots (setlist_id, song_id, position) VALUES (1, 1, 0);",
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO setlist_slots (setlist_id, song_id, position) VALUES (1, 1, 0)",
                [],
            )
            .unwrap_err();
        assert_eq!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }
}
