use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RFID credential with its authorization attributes.
///
/// Tags are written only by the synchronization job and read by the access
/// engine. `user_id` and `credential` are both unique.
///
/// # Fields
///
/// * `id` - Auto-increment primary key
/// * `user_id` - External student identifier (matrícula), owning key
/// * `credential` - Numeric RFID value as read by the controller
/// * `released` - Payment/eligibility flag
/// * `status` - Free text shown on the controller display when not released
/// * `admin` - Bypasses every check after lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub user_id: String,
    pub credential: i64,
    pub released: bool,
    pub status: String,
    pub admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tag attributes as imported, before they get a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTag {
    pub user_id: String,
    pub credential: i64,
    pub released: bool,
    pub status: String,
    pub admin: bool,
}

impl Tag {
    /// Whether the tag may be admitted at all, ignoring schedule.
    pub fn is_eligible(&self) -> bool {
        self.admin || self.released
    }
}
