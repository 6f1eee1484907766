use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::slots::compact_positions;
use crate::error::StoreError;
use crate::models::{Song, SongSummary};

pub(crate) fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    Ok(Song {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        lyrics: row.get(4)?,
    })
}

/// Map `id, user_id, title, artist` columns, for queries that skip lyrics.
pub(crate) fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SongSummary> {
    Ok(SongSummary {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
    })
}

/// Fetch every song, ordered case-insensitively by title so mixed-case titles
/// group together.
pub fn fetch_all_songs(conn: &Connection) -> Result<Vec<Song>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, title, artist, lyrics
             FROM songs
             ORDER BY title COLLATE UNICODE_NOCASE, id",
        )
        .context("failed to prepare all songs query")?;

    let songs = stmt
        .query_map([], song_from_row)
        .context("failed to iterate songs")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect songs")?;

    Ok(songs)
}

/// Songs created by one user, in title order.
pub fn fetch_songs_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Song>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, user_id, title, artist, lyrics
             FROM songs
             WHERE user_id = ?1
             ORDER BY title COLLATE UNICODE_NOCASE, id",
        )
        .context("failed to prepare user songs query")?;

    let songs = stmt
        .query_map([user_id], song_from_row)
        .context("failed to iterate user songs")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect user songs")?;

    Ok(songs)
}

pub fn fetch_song(conn: &Connection, id: i64) -> Result<Song> {
    conn.query_row(
        "SELECT id, user_id, title, artist, lyrics FROM songs WHERE id = ?1",
        [id],
        song_from_row,
    )
    .optional()
    .context("failed to load song")?
    .ok_or_else(|| StoreError::SongNotFound(id).into())
}

/// Insert a brand new song and echo the hydrated struct so callers can update
/// their state without re-querying.
pub fn create_song(
    conn: &Connection,
    user_id: Option<i64>,
    title: &str,
    artist: &str,
    lyrics: Option<&str>,
) -> Result<Song> {
    conn.execute(
        "INSERT INTO songs (user_id, title, artist, lyrics) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, title, artist, lyrics],
    )
    .context("failed to insert song")?;

    let id = conn.last_insert_rowid();
    info!(song_id = id, title, "created song");
    Ok(Song {
        id,
        user_id,
        title: title.to_string(),
        artist: artist.to_string(),
        lyrics: lyrics.map(str::to_string),
    })
}

/// Update all editable song fields. Ownership is not checked here: any actor
/// may edit a song.
pub fn update_song(
    conn: &Connection,
    id: i64,
    title: &str,
    artist: &str,
    lyrics: Option<&str>,
) -> Result<()> {
    let updated = conn
        .execute(
            "UPDATE songs SET title = ?1, artist = ?2, lyrics = ?3 WHERE id = ?4",
            params![title, artist, lyrics, id],
        )
        .context("failed to update song")?;

    if updated == 0 {
        Err(StoreError::SongNotFound(id).into())
    } else {
        Ok(())
    }
}

/// Permanently delete a song. Its slots cascade away; every setlist that lost
/// a slot gets its positions compacted and its version bumped in the same
/// transaction, so open editors notice the change.
pub fn delete_song(conn: &Connection, id: i64) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin song deletion")?;

    let affected: Vec<i64> = {
        let mut stmt = tx
            .prepare("SELECT DISTINCT setlist_id FROM setlist_slots WHERE song_id = ?1")
            .context("failed to prepare affected setlists query")?;
        let rows = stmt
            .query_map([id], |row| row.get(0))
            .context("failed to iterate affected setlists")?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to collect affected setlists")?;
        rows
    };

    let deleted = tx
        .execute("DELETE FROM songs WHERE id = ?1", params![id])
        .context("failed to delete song")?;
    if deleted == 0 {
        return Err(StoreError::SongNotFound(id).into());
    }

    for setlist_id in &affected {
        compact_positions(&tx, *setlist_id).context("failed to compact setlist positions")?;
        tx.execute(
            "UPDATE setlists SET version = version + 1 WHERE id = ?1",
            params![setlist_id],
        )
        .context("failed to bump setlist version")?;
    }

    tx.commit().context("failed to commit song deletion")?;
    info!(song_id = id, setlists = affected.len(), "deleted song");
    Ok(())
}
