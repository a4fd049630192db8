use catraca_core::WeekDay;
use serde::{Deserialize, Serialize};

/// One weekly recurring class slot for a user.
///
/// `start` is minutes since local midnight (0-1439). `week_day` is stored as
/// an integer with Sunday = 0; use [`ClassSchedule::day`] for the typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClassSchedule {
    pub id: i64,
    pub start: i64,
    pub week_day: i64,
    pub user_id: String,
}

impl ClassSchedule {
    /// Typed week day, `None` if the stored value is out of range.
    pub fn day(&self) -> Option<WeekDay> {
        WeekDay::try_from(self.week_day).ok()
    }
}

/// Class slot to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClassSchedule {
    pub start: i64,
    pub week_day: WeekDay,
    pub user_id: String,
}
