//! Domain models that mirror the SQLite schema and get passed between the
//! store, the JSON boundary and the TUI. They stay plain data holders; the
//! persistence rules live in `db` and the presentation rules in `ui`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Someone who owns songs and setlists. Authentication is handled elsewhere,
/// so only the identifying fields are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.username)
    }
}

/// A song as stored in the `songs` table, lyrics included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Primary key from the SQLite store.
    pub id: i64,
    /// Owner of the song. `None` once the owning user has been removed; the
    /// song itself survives its owner.
    pub user_id: Option<i64>,
    pub title: String,
    pub artist: String,
    /// Lyrics are optional and can be long, which is why list views work with
    /// [`SongSummary`] instead.
    pub lyrics: Option<String>,
}

impl Song {
    pub fn display_title(&self) -> String {
        display_title(&self.title, &self.artist)
    }

    /// Drop the lyrics for use in list contexts.
    pub fn summary(&self) -> SongSummary {
        SongSummary {
            id: self.id,
            user_id: self.user_id,
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// Serialized shape of a song in list responses: every field except lyrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongSummary {
    pub id: i64,
    pub user_id: Option<i64>,
    pub title: String,
    pub artist: String,
}

impl SongSummary {
    pub fn display_title(&self) -> String {
        display_title(&self.title, &self.artist)
    }
}

/// Compose a `Title - Artist` string that omits the hyphen when the artist
/// is blank.
fn display_title(title: &str, artist: &str) -> String {
    if artist.trim().is_empty() {
        title.to_string()
    } else {
        format!("{title} - {artist}")
    }
}

/// Case-insensitive comparison over the full Unicode range. SQLite's
/// built-in `NOCASE` only folds ASCII, so titles and names are ordered with
/// this instead, both in SQL (as a registered collation) and in memory.
pub fn fold_case_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// An ordered collection of songs owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setlist {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Free text replaced wholesale every time the setlist is reconciled.
    pub notes: Option<String>,
    /// Bumped on every committed change to membership or notes. Writers that
    /// read an older value get a conflict instead of overwriting.
    pub version: i64,
}

impl fmt::Display for Setlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One `(setlist, song, position)` membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub id: i64,
    pub setlist_id: i64,
    pub song_id: i64,
    pub position: i64,
}

/// The two disjoint song lists backing the two-pane editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Songs referenced by the setlist's slots, by position.
    pub in_setlist: Vec<SongSummary>,
    /// Every other song, by title (case-insensitive).
    pub not_in_setlist: Vec<SongSummary>,
    /// Setlist version the two lists were read at.
    pub version: i64,
}

/// How the reconciler treats a song id that appears more than once in the
/// desired order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep every occurrence as its own slot (a song played twice in a set).
    #[default]
    Allow,
    /// Fail the whole reconciliation.
    Reject,
}
