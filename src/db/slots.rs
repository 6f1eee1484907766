//! The ordering store: which songs belong to which setlist, and in what
//! order. Membership lives in `setlist_slots`, one row per occurrence with an
//! explicit zero-based `position`.

use rusqlite::{params, Connection};
use tracing::debug;

use super::setlists::require_setlist;
use super::songs::{song_from_row, summary_from_row};
use crate::error::StoreResult;
use crate::models::{Partition, Slot, Song};

/// Split every song into "in this setlist" (by position) and "not in it" (by
/// title). Both lists and the version are read inside one transaction so a
/// concurrent reconcile cannot make a song show up in both or neither.
pub fn membership_partition(conn: &Connection, setlist_id: i64) -> StoreResult<Partition> {
    let tx = conn.unchecked_transaction()?;
    let setlist = require_setlist(&tx, setlist_id)?;

    let in_setlist = {
        let mut stmt = tx.prepare_cached(
            "SELECT s.id, s.user_id, s.title, s.artist
             FROM setlist_slots sl
             INNER JOIN songs s ON s.id = sl.song_id
             WHERE sl.setlist_id = ?1
             ORDER BY sl.position",
        )?;
        let songs = stmt
            .query_map([setlist_id], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        songs
    };

    let not_in_setlist = {
        let mut stmt = tx.prepare_cached(
            "SELECT s.id, s.user_id, s.title, s.artist
             FROM songs s
             WHERE NOT EXISTS (
                 SELECT 1 FROM setlist_slots sl WHERE sl.song_id = s.id AND sl.setlist_id = ?1
             )
             ORDER BY s.title COLLATE UNICODE_NOCASE, s.id",
        )?;
        let songs = stmt
            .query_map([setlist_id], summary_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        songs
    };

    tx.commit()?;
    debug!(
        setlist_id,
        in_setlist = in_setlist.len(),
        not_in_setlist = not_in_setlist.len(),
        "read membership partition"
    );

    Ok(Partition {
        in_setlist,
        not_in_setlist,
        version: setlist.version,
    })
}

/// Full songs, lyrics included, in setlist order. Backs the perform view.
pub fn fetch_setlist_songs(conn: &Connection, setlist_id: i64) -> StoreResult<Vec<Song>> {
    require_setlist(conn, setlist_id)?;

    let mut stmt = conn.prepare_cached(
        "SELECT s.id, s.user_id, s.title, s.artist, s.lyrics
         FROM setlist_slots sl
         INNER JOIN songs s ON s.id = sl.song_id
         WHERE sl.setlist_id = ?1
         ORDER BY sl.position",
    )?;
    let songs = stmt
        .query_map([setlist_id], song_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(songs)
}

/// Raw slot rows in position order.
pub fn fetch_slots(conn: &Connection, setlist_id: i64) -> StoreResult<Vec<Slot>> {
    require_setlist(conn, setlist_id)?;

    let mut stmt = conn.prepare_cached(
        "SELECT id, setlist_id, song_id, position
         FROM setlist_slots
         WHERE setlist_id = ?1
         ORDER BY position",
    )?;
    let slots = stmt
        .query_map([setlist_id], |row| {
            Ok(Slot {
                id: row.get(0)?,
                setlist_id: row.get(1)?,
                song_id: row.get(2)?,
                position: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots)
}

/// Renumber the remaining slots of a setlist to `0..n` keeping their order.
/// Walking in ascending order never moves a slot onto a position that is
/// still taken, so the UNIQUE constraint holds after every statement.
pub(crate) fn compact_positions(conn: &Connection, setlist_id: i64) -> StoreResult<()> {
    let ids: Vec<i64> = {
        let mut stmt = conn.prepare_cached(
            "SELECT id FROM setlist_slots WHERE setlist_id = ?1 ORDER BY position",
        )?;
        let ids = stmt
            .query_map([setlist_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };

    let mut update =
        conn.prepare_cached("UPDATE setlist_slots SET position = ?1 WHERE id = ?2")?;
    for (position, slot_id) in ids.iter().enumerate() {
        update.execute(params![position as i64, slot_id])?;
    }
    Ok(())
}
