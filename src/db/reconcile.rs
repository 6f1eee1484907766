//! The setlist reconciler: replace a setlist's whole membership, order and
//! notes in one transaction.

use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{info, warn};

use super::setlists::require_setlist;
use super::songs::summary_from_row;
use crate::error::{StoreError, StoreResult};
use crate::models::{DuplicatePolicy, SongSummary};

/// Knobs for a single reconciliation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Version the caller last read. `None` means last writer wins.
    pub expected_version: Option<i64>,
    pub duplicates: DuplicatePolicy,
}

/// What the setlist looks like after a committed reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub songs: Vec<SongSummary>,
    pub version: i64,
}

/// Replace the setlist's slots with `desired_song_ids` (position = index) and
/// its notes with `notes`. Empty or missing notes clear the field.
///
/// Everything runs in a `BEGIN IMMEDIATE` transaction: the write lock is
/// taken before the current version is read, so concurrent reconciles on the
/// same setlist run one after the other. Any failure (missing setlist,
/// missing song, stale version, rejected duplicate, storage error) rolls the
/// whole change back.
pub fn reconcile(
    conn: &Connection,
    setlist_id: i64,
    desired_song_ids: &[i64],
    notes: Option<&str>,
    options: &ReconcileOptions,
) -> StoreResult<Reconciliation> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let setlist = require_setlist(&tx, setlist_id)?;
    if let Some(expected) = options.expected_version {
        if expected != setlist.version {
            warn!(
                setlist_id,
                expected,
                found = setlist.version,
                "rejected stale reconciliation"
            );
            return Err(StoreError::Conflict {
                setlist_id,
                expected,
                found: setlist.version,
            });
        }
    }

    if options.duplicates == DuplicatePolicy::Reject {
        let mut seen = HashSet::with_capacity(desired_song_ids.len());
        if let Some(repeated) = desired_song_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(StoreError::DuplicateSong(*repeated));
        }
    }

    let songs = resolve_songs(&tx, desired_song_ids)?;

    tx.execute(
        "DELETE FROM setlist_slots WHERE setlist_id = ?1",
        params![setlist_id],
    )?;
    {
        let mut insert = tx.prepare_cached(
            "INSERT INTO setlist_slots (setlist_id, song_id, position) VALUES (?1, ?2, ?3)",
        )?;
        for (position, song_id) in desired_song_ids.iter().enumerate() {
            insert.execute(params![setlist_id, song_id, position as i64])?;
        }
    }

    let notes = notes.filter(|text| !text.is_empty());
    tx.execute(
        "UPDATE setlists SET notes = ?1, version = version + 1 WHERE id = ?2",
        params![notes, setlist_id],
    )?;

    tx.commit()?;

    let version = setlist.version + 1;
    info!(
        setlist_id,
        songs = songs.len(),
        version,
        "reconciled setlist"
    );
    Ok(Reconciliation { songs, version })
}

/// Look up every desired id in input order. The first id without a song row
/// aborts the reconciliation.
fn resolve_songs(conn: &Connection, song_ids: &[i64]) -> StoreResult<Vec<SongSummary>> {
    let mut stmt =
        conn.prepare_cached("SELECT id, user_id, title, artist FROM songs WHERE id = ?1")?;

    let mut songs = Vec::with_capacity(song_ids.len());
    for &song_id in song_ids {
        let song = stmt
            .query_row([song_id], summary_from_row)
            .optional()?
            .ok_or(StoreError::SongNotFound(song_id))?;
        songs.push(song);
    }
    Ok(songs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        create_setlist, create_song, create_user, fetch_setlist, fetch_slots, open_in_memory,
    };

    struct Fixture {
        conn: Connection,
        setlist_id: i64,
        songs: Vec<i64>,
    }

    fn fixture() -> Fixture {
        let conn = open_in_memory().unwrap();
        let user = create_user(&conn, "ana", "ana@example.com").unwrap();
        let setlist = create_setlist(&conn, user.id, "Saturday").unwrap();
        let songs = ["One", "Two", "Three"]
            .iter()
            .map(|title| create_song(&conn, Some(user.id), title, "Band", None).unwrap().id)
            .collect();
        Fixture {
            conn,
            setlist_id: setlist.id,
            songs,
        }
    }

    fn positions(conn: &Connection, setlist_id: i64) -> Vec<(i64, i64)> {
        fetch_slots(conn, setlist_id)
            .unwrap()
            .iter()
            .map(|slot| (slot.song_id, slot.position))
            .collect()
    }

    #[test]
    fn positions_follow_input_order() {
        let f = fixture();
        let order = [f.songs[2], f.songs[0], f.songs[1]];
        let result = reconcile(
            &f.conn,
            f.setlist_id,
            &order,
            Some("open loud"),
            &ReconcileOptions::default(),
        )
        .unwrap();

        let returned: Vec<i64> = result.songs.iter().map(|s| s.id).collect();
        assert_eq!(returned, order);
        assert_eq!(result.version, 1);
        assert_eq!(
            positions(&f.conn, f.setlist_id),
            [(order[0], 0), (order[1], 1), (order[2], 2)]
        );
        let setlist = fetch_setlist(&f.conn, f.setlist_id).unwrap();
        assert_eq!(setlist.notes.as_deref(), Some("open loud"));
        assert_eq!(setlist.version, 1);
    }

    #[test]
    fn returned_songs_match_the_next_partition() {
        let f = fixture();
        let order = [f.songs[1], f.songs[2]];
        let result =
            reconcile(&f.conn, f.setlist_id, &order, None, &ReconcileOptions::default()).unwrap();

        let partition = crate::db::membership_partition(&f.conn, f.setlist_id).unwrap();
        assert_eq!(result.songs, partition.in_setlist);
        assert_eq!(result.songs[0].title, "Two");
        assert_eq!(result.songs[0].artist, "Band");
        assert!(result.songs[0].user_id.is_some());
    }

    #[test]
    fn empty_notes_clear_the_field() {
        let f = fixture();
        let options = ReconcileOptions::default();
        reconcile(&f.conn, f.setlist_id, &f.songs, Some("keep"), &options).unwrap();
        reconcile(&f.conn, f.setlist_id, &f.songs, Some(""), &options).unwrap();
        assert_eq!(fetch_setlist(&f.conn, f.setlist_id).unwrap().notes, None);

        reconcile(&f.conn, f.setlist_id, &f.songs, Some("again"), &options).unwrap();
        reconcile(&f.conn, f.setlist_id, &f.songs, None, &options).unwrap();
        assert_eq!(fetch_setlist(&f.conn, f.setlist_id).unwrap().notes, None);
    }

    #[test]
    fn missing_song_rolls_back_everything() {
        let f = fixture();
        let options = ReconcileOptions::default();
        reconcile(&f.conn, f.setlist_id, &f.songs[..2], Some("before"), &options).unwrap();

        let err = reconcile(
            &f.conn,
            f.setlist_id,
            &[f.songs[2], 99999],
            Some("after"),
            &options,
        )
        .unwrap_err();

        assert!(matches!(err, StoreError::SongNotFound(99999)));
        assert_eq!(
            positions(&f.conn, f.setlist_id),
            [(f.songs[0], 0), (f.songs[1], 1)]
        );
        let setlist = fetch_setlist(&f.conn, f.setlist_id).unwrap();
        assert_eq!(setlist.notes.as_deref(), Some("before"));
        assert_eq!(setlist.version, 1);
    }

    #[test]
    fn missing_setlist_is_not_found() {
        let f = fixture();
        let err = reconcile(&f.conn, 404, &f.songs, None, &ReconcileOptions::default())
            .unwrap_err();
        assert!(matches!(err, StoreError::SetlistNotFound(404)));
    }

    #[test]
    fn stale_version_conflicts_without_writing() {
        let f = fixture();
        let first = ReconcileOptions {
            expected_version: Some(0),
            ..Default::default()
        };
        reconcile(&f.conn, f.setlist_id, &f.songs, Some("first"), &first).unwrap();

        let err = reconcile(&f.conn, f.setlist_id, &[], Some("second"), &first).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: 0,
                found: 1,
                ..
            }
        ));
        assert_eq!(positions(&f.conn, f.setlist_id).len(), 3);
        assert_eq!(
            fetch_setlist(&f.conn, f.setlist_id).unwrap().notes.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn duplicates_follow_the_policy() {
        let f = fixture();
        let repeated = [f.songs[0], f.songs[1], f.songs[0]];

        let allowed = reconcile(
            &f.conn,
            f.setlist_id,
            &repeated,
            None,
            &ReconcileOptions::default(),
        )
        .unwrap();
        assert_eq!(allowed.songs.len(), 3);
        assert_eq!(
            positions(&f.conn, f.setlist_id),
            [(f.songs[0], 0), (f.songs[1], 1), (f.songs[0], 2)]
        );

        let reject = ReconcileOptions {
            duplicates: DuplicatePolicy::Reject,
            ..Default::default()
        };
        let err = reconcile(&f.conn, f.setlist_id, &[f.songs[2], f.songs[2]], None, &reject)
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSong(id) if id == f.songs[2]));
        assert_eq!(positions(&f.conn, f.setlist_id).len(), 3);
    }

    #[test]
    fn empty_order_removes_every_slot() {
        let f = fixture();
        let options = ReconcileOptions::default();
        reconcile(&f.conn, f.setlist_id, &f.songs, None, &options).unwrap();
        let result = reconcile(&f.conn, f.setlist_id, &[], Some(""), &options).unwrap();

        assert!(result.songs.is_empty());
        assert!(positions(&f.conn, f.setlist_id).is_empty());
    }
}
