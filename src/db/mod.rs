//! Persistence module split across logical submodules.

mod connection;
mod reconcile;
mod setlists;
mod slots;
mod songs;
mod users;

pub use connection::{ensure_schema, open_database, open_in_memory};
pub use reconcile::{reconcile, ReconcileOptions, Reconciliation};
pub use setlists::{
    create_setlist, delete_setlist, fetch_setlist, fetch_setlists, fetch_setlists_for_user,
    rename_setlist,
};
pub use slots::{fetch_setlist_songs, fetch_slots, membership_partition};
pub use songs::{
    create_song, delete_song, fetch_all_songs, fetch_song, fetch_songs_for_user, update_song,
};
pub use users::{create_user, delete_user, ensure_user, fetch_user, fetch_user_by_username};
