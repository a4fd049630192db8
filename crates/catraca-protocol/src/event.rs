//! Inbound controller events.
//!
//! The first data field carries the event code; the remaining positions
//! depend on it. Only three codes drive the gateway:
//!
//! | Code | Meaning | Fields used |
//! |------|---------|-------------|
//! | `0` | card read | `[1]` credential, `[5]` way |
//! | `81` | turn started | none |
//! | `82` | turn cancelled | none |

use catraca_core::{MessageIndex, Way, constants::*};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Event decoded from a [`Frame`]'s data section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnstileEvent {
    /// A card was presented.
    ///
    /// `tag_id` is `None` when the credential field is not a number, and
    /// `way` is `None` when the direction field is missing or not a number.
    CardRead {
        index: MessageIndex,
        tag_id: Option<i64>,
        way: Option<Way>,
    },

    /// The turnstile started turning after a release.
    TurnStarted { index: MessageIndex },

    /// The release expired or the turn was aborted.
    TurnCancelled { index: MessageIndex },

    /// Any other event code, or a data section without one.
    Other {
        index: MessageIndex,
        code: Option<u16>,
    },
}

impl TurnstileEvent {
    /// Index of the frame this event came from.
    pub fn index(&self) -> MessageIndex {
        match self {
            TurnstileEvent::CardRead { index, .. }
            | TurnstileEvent::TurnStarted { index }
            | TurnstileEvent::TurnCancelled { index }
            | TurnstileEvent::Other { index, .. } => *index,
        }
    }
}

impl From<&Frame> for TurnstileEvent {
    fn from(frame: &Frame) -> Self {
        let index = frame.index();
        let fields = frame.fields();
        let code = fields.first().and_then(|f| f.trim().parse::<u16>().ok());

        match code {
            Some(EVENT_CARD_READ) => TurnstileEvent::CardRead {
                index,
                tag_id: fields
                    .get(TAG_FIELD_POSITION)
                    .and_then(|f| f.trim().parse::<i64>().ok()),
                way: fields
                    .get(WAY_FIELD_POSITION)
                    .and_then(|f| f.trim().parse::<u8>().ok())
                    .map(Way::from_code),
            },
            Some(EVENT_TURN_STARTED) => TurnstileEvent::TurnStarted { index },
            Some(EVENT_TURN_CANCELLED) => TurnstileEvent::TurnCancelled { index },
            other => TurnstileEvent::Other { index, code: other },
        }
    }
}
