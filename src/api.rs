//! JSON boundary over the ordering store and the reconciler. These are the
//! two operations a reorder editor needs: read the partition, then submit the
//! complete new order. The typed functions are what the TUI calls; the
//! `handle_*` variants take and produce raw JSON bodies with an HTTP-style
//! status so a web front-end can mount them unchanged.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::db::{membership_partition, reconcile, ReconcileOptions};
use crate::error::{ErrorKind, StoreError};
use crate::models::{DuplicatePolicy, SongSummary};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_CONFLICT: u16 = 409;
pub const STATUS_UNPROCESSABLE: u16 = 422;
pub const STATUS_INTERNAL: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionResponse {
    pub setlist_songs: Vec<SongSummary>,
    pub other_songs: Vec<SongSummary>,
    pub version: i64,
}

/// Body of an "apply reconciliation" call. `version` is optional; when it is
/// present a stale value is rejected with 409.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub songs: Vec<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub songs: Vec<SongSummary>,
    pub version: i64,
}

/// Error payload: `{"status": 404, "error": "Song 7 not found."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ApiError {
    pub status: u16,
    pub error: String,
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self {
            status: STATUS_BAD_REQUEST,
            error: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status == STATUS_CONFLICT
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => STATUS_NOT_FOUND,
            ErrorKind::Conflict => STATUS_CONFLICT,
            ErrorKind::Invalid => STATUS_UNPROCESSABLE,
            ErrorKind::Persistence => {
                error!(error = %err, "storage failure behind the setlist api");
                return Self {
                    status: STATUS_INTERNAL,
                    error: "The setlist could not be saved. Please try again.".to_string(),
                };
            }
        };
        Self {
            status,
            error: err.to_string(),
        }
    }
}

/// A serialized response ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    pub status: u16,
    pub body: String,
}

pub fn fetch_partition(conn: &Connection, setlist_id: i64) -> Result<PartitionResponse, ApiError> {
    let partition = membership_partition(conn, setlist_id)?;
    Ok(PartitionResponse {
        setlist_songs: partition.in_setlist,
        other_songs: partition.not_in_setlist,
        version: partition.version,
    })
}

pub fn apply_reconciliation(
    conn: &Connection,
    setlist_id: i64,
    request: &ReconcileRequest,
    duplicates: DuplicatePolicy,
) -> Result<ReconcileResponse, ApiError> {
    let options = ReconcileOptions {
        expected_version: request.version,
        duplicates,
    };
    let result = reconcile(
        conn,
        setlist_id,
        &request.songs,
        request.notes.as_deref(),
        &options,
    )?;
    Ok(ReconcileResponse {
        songs: result.songs,
        version: result.version,
    })
}

pub fn handle_fetch_partition(conn: &Connection, setlist_id: i64) -> JsonResponse {
    respond(fetch_partition(conn, setlist_id))
}

pub fn handle_apply_reconciliation(
    conn: &Connection,
    setlist_id: i64,
    body: &str,
    duplicates: DuplicatePolicy,
) -> JsonResponse {
    let request: ReconcileRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(err) => {
            return respond::<ReconcileResponse>(Err(ApiError::bad_request(format!(
                "Malformed request body: {err}"
            ))))
        }
    };
    respond(apply_reconciliation(conn, setlist_id, &request, duplicates))
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> JsonResponse {
    let (status, encoded) = match result {
        Ok(value) => (STATUS_OK, serde_json::to_string(&value)),
        Err(err) => (err.status, serde_json::to_string(&err)),
    };
    match encoded {
        Ok(body) => JsonResponse { status, body },
        Err(err) => {
            error!(error = %err, "failed to encode api response");
            JsonResponse {
                status: STATUS_INTERNAL,
                body: r#"{"status":500,"error":"response encoding failed"}"#.to_string(),
            }
        }
    }
}
