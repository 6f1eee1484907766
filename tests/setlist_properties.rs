use std::time::Duration;

use rusqlite::Connection;
use setlist_manager::db::{
    create_setlist, create_song, create_user, delete_setlist, delete_song, delete_user,
    fetch_all_songs, fetch_setlist, fetch_slots, fetch_song, membership_partition, open_database,
    open_in_memory, reconcile, ReconcileOptions,
};
use setlist_manager::{DuplicatePolicy, ErrorKind, StoreError};

struct Fixture {
    conn: Connection,
    user_id: i64,
    setlist_id: i64,
    songs: Vec<i64>,
}

fn fixture() -> Fixture {
    let conn = open_in_memory().unwrap();
    seed(conn)
}

fn seed(conn: Connection) -> Fixture {
    let user = create_user(&conn, "ana", "ana@example.com").unwrap();
    let setlist = create_setlist(&conn, user.id, "Friday").unwrap();
    let songs = ["Wonderwall", "alright", "Creep", "Bohemian Rhapsody"]
        .iter()
        .map(|title| {
            create_song(&conn, Some(user.id), title, "Band", None)
                .unwrap()
                .id
        })
        .collect();
    Fixture {
        conn,
        user_id: user.id,
        setlist_id: setlist.id,
        songs,
    }
}

fn ids_in_setlist(conn: &Connection, setlist_id: i64) -> Vec<i64> {
    membership_partition(conn, setlist_id)
        .unwrap()
        .in_setlist
        .iter()
        .map(|song| song.id)
        .collect()
}

fn positions(conn: &Connection, setlist_id: i64) -> Vec<i64> {
    fetch_slots(conn, setlist_id)
        .unwrap()
        .iter()
        .map(|slot| slot.position)
        .collect()
}

fn apply(fx: &Fixture, order: &[i64], notes: Option<&str>) {
    reconcile(
        &fx.conn,
        fx.setlist_id,
        order,
        notes,
        &ReconcileOptions::default(),
    )
    .unwrap();
}

#[test]
fn reading_a_partition_twice_gives_the_same_answer() {
    let fx = fixture();
    apply(&fx, &[fx.songs[2], fx.songs[0]], None);

    let first = membership_partition(&fx.conn, fx.setlist_id).unwrap();
    let second = membership_partition(&fx.conn, fx.setlist_id).unwrap();
    assert_eq!(first, second);
}

#[test]
fn reconcile_round_trips_order_and_notes() {
    let fx = fixture();
    let order = [fx.songs[3], fx.songs[1], fx.songs[0]];
    apply(&fx, &order, Some("capo 2 on the closer"));

    assert_eq!(ids_in_setlist(&fx.conn, fx.setlist_id), order);
    assert_eq!(positions(&fx.conn, fx.setlist_id), [0, 1, 2]);
    let setlist = fetch_setlist(&fx.conn, fx.setlist_id).unwrap();
    assert_eq!(setlist.notes.as_deref(), Some("capo 2 on the closer"));
    assert_eq!(setlist.version, 1);
}

#[test]
fn empty_reconcile_clears_membership() {
    let fx = fixture();
    apply(&fx, &fx.songs, Some("full set"));
    apply(&fx, &[], None);

    let partition = membership_partition(&fx.conn, fx.setlist_id).unwrap();
    assert!(partition.in_setlist.is_empty());
    assert_eq!(partition.not_in_setlist.len(), fx.songs.len());
    assert_eq!(fetch_setlist(&fx.conn, fx.setlist_id).unwrap().notes, None);
}

#[test]
fn partition_covers_every_song_exactly_once() {
    let fx = fixture();
    apply(&fx, &[fx.songs[0], fx.songs[2]], None);

    let partition = membership_partition(&fx.conn, fx.setlist_id).unwrap();
    let mut seen: Vec<i64> = partition
        .in_setlist
        .iter()
        .chain(partition.not_in_setlist.iter())
        .map(|song| song.id)
        .collect();
    seen.sort_unstable();
    let mut all: Vec<i64> = fetch_all_songs(&fx.conn)
        .unwrap()
        .iter()
        .map(|song| song.id)
        .collect();
    all.sort_unstable();
    assert_eq!(seen, all);

    let others: Vec<&str> = partition
        .not_in_setlist
        .iter()
        .map(|song| song.title.as_str())
        .collect();
    assert_eq!(others, ["alright", "Bohemian Rhapsody"]);
}

#[test]
fn missing_song_leaves_the_setlist_untouched() {
    let fx = fixture();
    apply(&fx, &[fx.songs[1], fx.songs[0]], Some("before"));

    let err = reconcile(
        &fx.conn,
        fx.setlist_id,
        &[fx.songs[2], 4242],
        Some("after"),
        &ReconcileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, StoreError::SongNotFound(4242)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(
        ids_in_setlist(&fx.conn, fx.setlist_id),
        [fx.songs[1], fx.songs[0]]
    );
    let setlist = fetch_setlist(&fx.conn, fx.setlist_id).unwrap();
    assert_eq!(setlist.notes.as_deref(), Some("before"));
    assert_eq!(setlist.version, 1);
}

#[test]
fn deleting_a_song_removes_its_slots_and_compacts_positions() {
    let fx = fixture();
    apply(&fx, &[fx.songs[0], fx.songs[1], fx.songs[2]], None);

    delete_song(&fx.conn, fx.songs[1]).unwrap();

    assert_eq!(
        ids_in_setlist(&fx.conn, fx.setlist_id),
        [fx.songs[0], fx.songs[2]]
    );
    assert_eq!(positions(&fx.conn, fx.setlist_id), [0, 1]);
    assert_eq!(fetch_setlist(&fx.conn, fx.setlist_id).unwrap().version, 2);
}

#[test]
fn deleting_a_setlist_keeps_its_songs() {
    let fx = fixture();
    apply(&fx, &fx.songs, None);

    delete_setlist(&fx.conn, fx.setlist_id).unwrap();

    assert_eq!(fetch_all_songs(&fx.conn).unwrap().len(), fx.songs.len());
    let err = membership_partition(&fx.conn, fx.setlist_id).unwrap_err();
    assert!(matches!(err, StoreError::SetlistNotFound(_)));
    let orphaned: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM setlist_slots", [], |row| row.get(0))
        .unwrap();
    assert_eq!(orphaned, 0);
}

#[test]
fn stale_version_is_a_conflict_and_changes_nothing() {
    let fx = fixture();
    let version = membership_partition(&fx.conn, fx.setlist_id)
        .unwrap()
        .version;
    apply(&fx, &[fx.songs[0]], Some("first writer"));

    let stale = ReconcileOptions {
        expected_version: Some(version),
        ..ReconcileOptions::default()
    };
    let err = reconcile(
        &fx.conn,
        fx.setlist_id,
        &[fx.songs[1]],
        Some("second writer"),
        &stale,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Conflict {
            expected: 0,
            found: 1,
            ..
        }
    ));

    assert_eq!(ids_in_setlist(&fx.conn, fx.setlist_id), [fx.songs[0]]);
    let setlist = fetch_setlist(&fx.conn, fx.setlist_id).unwrap();
    assert_eq!(setlist.notes.as_deref(), Some("first writer"));
}

#[test]
fn duplicate_policy_decides_repeated_ids() {
    let fx = fixture();
    let order = [fx.songs[0], fx.songs[1], fx.songs[0]];

    apply(&fx, &order, None);
    assert_eq!(ids_in_setlist(&fx.conn, fx.setlist_id), order);
    assert_eq!(positions(&fx.conn, fx.setlist_id), [0, 1, 2]);

    let reject = ReconcileOptions {
        duplicates: DuplicatePolicy::Reject,
        ..ReconcileOptions::default()
    };
    let err = reconcile(&fx.conn, fx.setlist_id, &order, None, &reject).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateSong(id) if id == fx.songs[0]));
    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert_eq!(ids_in_setlist(&fx.conn, fx.setlist_id), order);
}

#[test]
fn deleting_a_user_drops_setlists_and_orphans_songs() {
    let fx = fixture();
    apply(&fx, &fx.songs, None);

    delete_user(&fx.conn, fx.user_id).unwrap();

    assert!(fetch_setlist(&fx.conn, fx.setlist_id).is_err());
    let song = fetch_song(&fx.conn, fx.songs[0]).unwrap();
    assert_eq!(song.user_id, None);
    assert_eq!(fetch_all_songs(&fx.conn).unwrap().len(), fx.songs.len());
}

#[test]
fn second_connection_sees_conflict_after_first_commits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("setlists.sqlite");
    let fx = seed(open_database(&path, Duration::from_secs(1)).unwrap());
    let other = open_database(&path, Duration::from_secs(1)).unwrap();

    // Both editors read version 0.
    let read_a = membership_partition(&fx.conn, fx.setlist_id).unwrap();
    let read_b = membership_partition(&other, fx.setlist_id).unwrap();
    assert_eq!(read_a.version, read_b.version);

    let options = ReconcileOptions {
        expected_version: Some(read_a.version),
        ..ReconcileOptions::default()
    };
    reconcile(&fx.conn, fx.setlist_id, &[fx.songs[0]], None, &options).unwrap();
    let err = reconcile(&other, fx.setlist_id, &[fx.songs[1]], None, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(ids_in_setlist(&other, fx.setlist_id), [fx.songs[0]]);
}

#[test]
fn accented_titles_sort_case_insensitively() {
    let conn = open_in_memory().unwrap();
    let user = create_user(&conn, "ana", "ana@example.com").unwrap();
    let setlist = create_setlist(&conn, user.id, "Friday").unwrap();
    create_song(&conn, Some(user.id), "Émile", "Band", None).unwrap();
    create_song(&conn, Some(user.id), "éclair", "Band", None).unwrap();

    let partition = membership_partition(&conn, setlist.id).unwrap();
    let others: Vec<&str> = partition
        .not_in_setlist
        .iter()
        .map(|song| song.title.as_str())
        .collect();
    assert_eq!(others, ["éclair", "Émile"]);

    let titles: Vec<String> = fetch_all_songs(&conn)
        .unwrap()
        .into_iter()
        .map(|song| song.title)
        .collect();
    assert_eq!(titles, ["éclair", "Émile"]);
}
