use crate::{Result, constants::MAX_MESSAGE_INDEX, error::Error};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message index (2 digits, zero-padded) echoed back by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageIndex(u8);

impl MessageIndex {
    /// Create a new message index with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidField` if the index does not fit two digits.
    pub fn new(index: u8) -> Result<Self> {
        if index > MAX_MESSAGE_INDEX {
            return Err(Error::InvalidField(format!(
                "Message index must be 0-{MAX_MESSAGE_INDEX}, got {index}"
            )));
        }
        Ok(MessageIndex(index))
    }

    /// Get the raw index as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for MessageIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl std::str::FromStr for MessageIndex {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidField(format!("Invalid message index: {s:?}")));
        }
        let index: u8 = s
            .parse()
            .map_err(|_| Error::InvalidField(format!("Invalid message index: {s:?}")))?;
        MessageIndex::new(index)
    }
}

/// Passage direction reported with a card read.
///
/// Only codes `2` and `3` have a release command; anything else is carried as
/// [`Way::Other`] so the caller can decide what to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Way {
    Entry,
    Exit,
    Other(u8),
}

impl Way {
    /// Map a wire direction code to a `Way`.
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            2 => Way::Entry,
            3 => Way::Exit,
            other => Way::Other(other),
        }
    }

    /// Wire code for this direction.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Way::Entry => 2,
            Way::Exit => 3,
            Way::Other(code) => code,
        }
    }
}

impl fmt::Display for Way {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Way::Entry => write!(f, "entry"),
            Way::Exit => write!(f, "exit"),
            Way::Other(code) => write!(f, "unknown({code})"),
        }
    }
}

/// Day of the week a class occurs on, numbered from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeekDay {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl WeekDay {
    /// All days, Sunday first.
    pub const ALL: [WeekDay; 7] = [
        WeekDay::Sunday,
        WeekDay::Monday,
        WeekDay::Tuesday,
        WeekDay::Wednesday,
        WeekDay::Thursday,
        WeekDay::Friday,
        WeekDay::Saturday,
    ];

    /// Numeric value as stored (0-6).
    #[must_use]
    pub fn as_i64(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for WeekDay {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        usize::try_from(value)
            .ok()
            .and_then(|i| WeekDay::ALL.get(i).copied())
            .ok_or_else(|| Error::InvalidField(format!("Week day must be 0-6, got {value}")))
    }
}

impl From<Weekday> for WeekDay {
    fn from(day: Weekday) -> Self {
        WeekDay::ALL[day.num_days_from_sunday() as usize]
    }
}

impl fmt::Display for WeekDay {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
