//! User records as served by the academic API.
//!
//! ```json
//! {
//!   "matricula": "2024001",
//!   "rfid": 1001,
//!   "horarios": [["09:00", [1, 3]], ["19:00", [5]]],
//!   "liberado": true,
//!   "mensagem": "MENSALIDADE EM ABERTO",
//!   "admin": false
//! }
//! ```
//!
//! Each `horarios` entry is a time of day and the week days (0 = Sunday) it
//! applies to. Records are checked one at a time so a single bad record
//! never sinks the batch.

use catraca_core::WeekDay;
use catraca_core::constants::MINUTES_PER_DAY;
use catraca_storage::NewTag;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::RecordError;

/// One `(time of day, week days)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry(pub String, pub Vec<u8>);

/// A user as the API describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UserRecord {
    /// External student id
    #[validate(length(min = 1, max = 64))]
    pub matricula: String,

    /// RFID credential; the API sends it as a number or a numeric string
    #[serde(deserialize_with = "credential")]
    #[validate(range(min = 1))]
    pub rfid: i64,

    pub horarios: Vec<ScheduleEntry>,

    /// Payment/eligibility flag
    pub liberado: bool,

    /// Text shown on the display when not released
    #[serde(default)]
    #[validate(length(max = 255))]
    pub mensagem: Option<String>,

    #[serde(default)]
    pub admin: bool,
}

impl UserRecord {
    /// Deserialize and validate one element of the API response.
    ///
    /// # Errors
    ///
    /// `RecordError::Shape` for missing or mistyped fields,
    /// `RecordError::Field` for values out of range and
    /// `RecordError::Schedule` for unparsable schedule entries.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        let record: UserRecord =
            serde_json::from_value(value).map_err(|e| RecordError::Shape(e.to_string()))?;
        record
            .validate()
            .map_err(|e| RecordError::Field(e.to_string()))?;
        record.class_slots()?;
        Ok(record)
    }

    /// Whether the user gets admission windows at all.
    pub fn is_schedulable(&self) -> bool {
        self.liberado || self.admin
    }

    /// Tag attributes for the upsert.
    pub fn to_new_tag(&self) -> NewTag {
        NewTag {
            user_id: self.matricula.clone(),
            credential: self.rfid,
            released: self.liberado,
            status: self.mensagem.clone().unwrap_or_default(),
            admin: self.admin,
        }
    }

    /// Expand `horarios` into `(start minutes, week day)` pairs.
    pub fn class_slots(&self) -> Result<Vec<(i64, WeekDay)>, RecordError> {
        let mut slots = Vec::new();

        for ScheduleEntry(time, days) in &self.horarios {
            let start = parse_time_of_day(time).map_err(|reason| RecordError::Schedule {
                entry: time.clone(),
                reason,
            })?;

            for &day in days {
                let week_day =
                    WeekDay::try_from(i64::from(day)).map_err(|e| RecordError::Schedule {
                        entry: time.clone(),
                        reason: e.to_string(),
                    })?;
                if !slots.contains(&(start, week_day)) {
                    slots.push((start, week_day));
                }
            }
        }

        Ok(slots)
    }
}

/// `"HH:MM"` (or `"HH:MM:SS"`, seconds ignored) to minutes since midnight.
fn parse_time_of_day(time: &str) -> Result<i64, String> {
    let mut parts = time.trim().split(':');
    let (Some(hours), Some(minutes)) = (parts.next(), parts.next()) else {
        return Err("expected HH:MM".to_string());
    };

    let hours: i64 = hours.parse().map_err(|_| format!("bad hour {hours:?}"))?;
    let minutes: i64 = minutes
        .parse()
        .map_err(|_| format!("bad minute {minutes:?}"))?;
    if !(0..MINUTES_PER_DAY / 60).contains(&hours) || !(0..60).contains(&minutes) {
        return Err("time of day out of range".to_string());
    }

    Ok(hours * 60 + minutes)
}

fn credential<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
