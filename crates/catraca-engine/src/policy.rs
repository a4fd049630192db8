//! Pure admission rules: schedule windows and anti-spam.
//!
//! Window maths runs on local wall-clock time in the configured zone. A class
//! starting at minute `M` with tolerance `T` admits from `M - T` to `M + T`
//! inclusive, anchored to today's date, so windows may spill into the
//! previous or next day.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;

/// Result of checking the current time against a day's classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScheduleCheck {
    /// Inside at least one window
    Within,
    /// Outside every window, and one of them opens later
    Early,
    /// Outside every window, all of them already closed
    Late,
}

/// Admission window for a class, as local date-times on `now`'s date.
pub fn admission_window(
    now: NaiveDateTime,
    start_minutes: i64,
    tolerance_minutes: i64,
) -> (NaiveDateTime, NaiveDateTime) {
    let midnight = now.date().and_time(chrono::NaiveTime::MIN);
    let class_start = midnight + Duration::minutes(start_minutes);
    let tolerance = Duration::minutes(tolerance_minutes);
    (class_start - tolerance, class_start + tolerance)
}

/// Check `now` against the start minutes of today's classes.
///
/// `starts` must not be empty; an empty day is a plain deny handled by the
/// caller.
pub fn check_schedule(
    now: NaiveDateTime,
    starts: impl IntoIterator<Item = i64>,
    tolerance_minutes: i64,
) -> ScheduleCheck {
    let mut opens_later = false;

    for start in starts {
        let (open, close) = admission_window(now, start, tolerance_minutes);
        if open <= now && now <= close {
            return ScheduleCheck::Within;
        }
        if open > now {
            opens_later = true;
        }
    }

    if opens_later {
        ScheduleCheck::Early
    } else {
        ScheduleCheck::Late
    }
}

/// Whether a passage at `last_access` still blocks a new one at `now`.
///
/// The block lasts twice the tolerance, which covers an entry and an exit
/// inside the same class window.
pub fn is_repeat_access(
    last_access: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance_minutes: i64,
) -> bool {
    last_access + Duration::minutes(2 * tolerance_minutes) > now
}
