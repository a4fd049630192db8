use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A confirmed physical passage.
///
/// Created in [`AccessStatus::Waiting`] once the controller reports the turn,
/// then moved to `Granted` or `Revoked` exactly once when the API
/// acknowledges it.
///
/// # Examples
///
/// ```
/// use catraca_storage::models::{AccessEvent, AccessStatus};
/// use chrono::Utc;
///
/// let event = AccessEvent::new("2024001", Utc::now());
/// assert_eq!(event.status, AccessStatus::Waiting);
/// assert_eq!(event.id.len(), 36);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessEvent {
    /// UUID v4, generated locally
    pub id: String,
    /// Moment the turn was confirmed
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub status: AccessStatus,
}

impl AccessEvent {
    /// New waiting event with a fresh id.
    pub fn new(user_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            user_id: user_id.into(),
            status: AccessStatus::Waiting,
        }
    }
}

/// Acknowledgement state of an [`AccessEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Waiting,
    Granted,
    Revoked,
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessStatus::Waiting => write!(f, "waiting"),
            AccessStatus::Granted => write!(f, "granted"),
            AccessStatus::Revoked => write!(f, "revoked"),
        }
    }
}
