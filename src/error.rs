use thiserror::Error;

/// Typed failures of the setlist store. The CRUD helpers wrap these in
/// `anyhow::Error`, so callers can still `downcast_ref::<StoreError>()`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Setlist {0} not found.")]
    SetlistNotFound(i64),

    #[error("Song {0} not found.")]
    SongNotFound(i64),

    #[error("User {0} not found.")]
    UserNotFound(i64),

    #[error(
        "Setlist {setlist_id} was changed elsewhere (expected version {expected}, found {found}). Reload and try again."
    )]
    Conflict {
        setlist_id: i64,
        expected: i64,
        found: i64,
    },

    #[error("Song {0} appears more than once in the requested order.")]
    DuplicateSong(i64),

    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

/// Coarse classification used by the boundary layer to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Invalid,
    Persistence,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::SetlistNotFound(_)
            | StoreError::SongNotFound(_)
            | StoreError::UserNotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::DuplicateSong(_) => ErrorKind::Invalid,
            StoreError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
