use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use catraca_storage::StorageError;
use catraca_sync::SyncError;
use serde_json::json;

/// Errors returned by the admin HTTP surface.
///
/// Rendered as `{"error": <message>, "code": <CODE>}`.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Missing or invalid token")]
    Unauthorized,

    #[error("Too many requests")]
    RateLimited,

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type AdminResult<T> = Result<T, AdminError>;

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AdminError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            AdminError::RateLimited => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", self.to_string())
            }
            AdminError::Sync(SyncError::LockContention) => {
                (StatusCode::CONFLICT, "SYNC_RUNNING", self.to_string())
            }
            AdminError::Sync(
                e @ (SyncError::Http(_) | SyncError::Api { .. } | SyncError::Parse(_)),
            ) => {
                tracing::warn!(error = %e, "Manual synchronization failed upstream");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
            }
            AdminError::Sync(e @ SyncError::NoValidRecords { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NO_VALID_RECORDS", e.to_string())
            }
            AdminError::Sync(SyncError::Storage(e)) | AdminError::Storage(e) => {
                tracing::error!(error = %e, "Storage error in admin request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
