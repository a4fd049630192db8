use catraca_storage::StorageError;
use thiserror::Error;

/// Errors that end a synchronization run (or its push phase).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another run holds the import lock
    #[error("Synchronization already running")]
    LockContention,

    /// The request never got a response
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body was not what the API contract says
    #[error("Invalid API response: {0}")]
    Parse(String),

    /// The API sent records but none passed validation
    #[error("No valid user records in API response ({skipped} skipped)")]
    NoValidRecords { skipped: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Why a single user record was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Shape(String),

    #[error("invalid field: {0}")]
    Field(String),

    #[error("invalid schedule entry {entry:?}: {reason}")]
    Schedule { entry: String, reason: String },
}
