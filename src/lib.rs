//! Core library surface for the setlist manager.
//!
//! `db` owns the SQLite store and the reconciler, `api` is the JSON boundary
//! a reorder editor talks to, and `ui` is the terminal front-end built on
//! top of both.
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod session;
pub mod ui;

pub use config::{AppPaths, Config};
pub use db::{ensure_user, open_database};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use logging::init_logging;
pub use models::{DuplicatePolicy, Partition, Setlist, Slot, Song, SongSummary, User};
pub use session::Session;

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
