//! Release commands sent from the gateway to the controller.
//!
//! All three commands share one grammar:
//!
//! ```text
//! <INDEX>+REON+00+<CODE>]<RELEASE_SECONDS>]<DISPLAY_MESSAGE>]<ROTATION>
//! ```
//!
//! | Command | Code | Rotation |
//! |---------|------|----------|
//! | Allow entry | `6` | `2` |
//! | Allow exit | `5` | `1` |
//! | Deny | `30` | `1` |
//!
//! # Examples
//!
//! ```
//! use catraca_protocol::ReleaseCommand;
//!
//! let cmd = ReleaseCommand::allow_entry(5, "ACESSO LIBERADO");
//! assert_eq!(cmd.body(), "REON+00+6]5]ACESSO LIBERADO]2");
//!
//! let cmd = ReleaseCommand::deny(5, "ACCESS DENIED");
//! assert_eq!(cmd.body(), "REON+00+30]5]ACCESS DENIED]1");
//! ```

use bytes::Bytes;
use catraca_core::{MessageIndex, Result, constants::*};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::encode_frame;

/// What the controller should do with the turnstile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseKind {
    AllowEntry,
    AllowExit,
    Deny,
}

impl ReleaseKind {
    fn code(self) -> &'static str {
        match self {
            ReleaseKind::AllowEntry => RELEASE_ENTRY_CODE,
            ReleaseKind::AllowExit => RELEASE_EXIT_CODE,
            ReleaseKind::Deny => RELEASE_DENY_CODE,
        }
    }

    fn rotation(self) -> &'static str {
        match self {
            ReleaseKind::AllowEntry => ROTATION_ENTRY,
            ReleaseKind::AllowExit | ReleaseKind::Deny => ROTATION_EXIT,
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReleaseKind::AllowEntry => write!(f, "allow-entry"),
            ReleaseKind::AllowExit => write!(f, "allow-exit"),
            ReleaseKind::Deny => write!(f, "deny"),
        }
    }
}

/// A release command ready to be framed with a message index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCommand {
    kind: ReleaseKind,
    release_seconds: u8,
    message: String,
}

impl ReleaseCommand {
    /// Build a command; the display message is sanitized on construction.
    pub fn new(kind: ReleaseKind, release_seconds: u8, message: &str) -> Self {
        Self {
            kind,
            release_seconds,
            message: sanitize_display_message(message),
        }
    }

    pub fn allow_entry(release_seconds: u8, message: &str) -> Self {
        Self::new(ReleaseKind::AllowEntry, release_seconds, message)
    }

    pub fn allow_exit(release_seconds: u8, message: &str) -> Self {
        Self::new(ReleaseKind::AllowExit, release_seconds, message)
    }

    pub fn deny(release_seconds: u8, message: &str) -> Self {
        Self::new(ReleaseKind::Deny, release_seconds, message)
    }

    pub fn kind(&self) -> ReleaseKind {
        self.kind
    }

    pub fn release_seconds(&self) -> u8 {
        self.release_seconds
    }

    /// Display message as it will be sent.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Payload without the index prefix.
    pub fn body(&self) -> String {
        format!(
            "{PROTOCOL_ID}+{COMMAND_OK}+{}{DELIMITER_FIELD}{}{DELIMITER_FIELD}{}{DELIMITER_FIELD}{}",
            self.kind.code(),
            self.release_seconds,
            self.message,
            self.kind.rotation()
        )
    }

    /// Frame the command for the given message index.
    ///
    /// # Errors
    /// Returns `Error::FrameTooLarge` if the payload does not fit the size byte.
    pub fn encode(&self, index: MessageIndex) -> Result<Bytes> {
        encode_frame(index, &self.body())
    }
}

/// Make a display message safe for the controller.
///
/// Protocol separators and control characters become spaces and the result
/// is cut to [`MAX_DISPLAY_MESSAGE_LENGTH`] characters.
///
/// # Examples
///
/// ```
/// use catraca_protocol::sanitize_display_message;
///
/// assert_eq!(sanitize_display_message("A]B+C"), "A B C");
/// assert_eq!(sanitize_display_message(&"X".repeat(50)).len(), 40);
/// ```
pub fn sanitize_display_message(message: &str) -> String {
    message
        .chars()
        .map(|c| {
            if c == DELIMITER_FIELD || c == DELIMITER_HEADER as char || c.is_control() {
                ' '
            } else {
                c
            }
        })
        .take(MAX_DISPLAY_MESSAGE_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Frame;

    #[test]
    fn test_allow_exit_body() {
        let cmd = ReleaseCommand::allow_exit(7, "ATE LOGO");
        assert_eq!(cmd.body(), "REON+00+5]7]ATE LOGO]1");
    }

    #[test]
    fn test_encode_round_trips_through_frame() {
        let index = MessageIndex::new(42).unwrap();
        let bytes = ReleaseCommand::allow_entry(5, "ACESSO LIBERADO")
            .encode(index)
            .unwrap();

        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.index(), index);
        assert_eq!(frame.command(), "REON");
        assert_eq!(frame.error_or_version(), "00");
        assert_eq!(frame.fields(), vec!["6", "5", "ACESSO LIBERADO", "2"]);
    }

    #[test]
    fn test_status_message_with_separators_is_sanitized() {
        let cmd = ReleaseCommand::deny(5, "PAGAMENTO]PENDENTE+\n");
        assert_eq!(cmd.message(), "PAGAMENTO PENDENTE  ");
        assert_eq!(cmd.body(), "REON+00+30]5]PAGAMENTO PENDENTE  ]1");
    }

    #[test]
    fn test_truncation_counts_characters() {
        let msg = "Á".repeat(45);
        let sanitized = sanitize_display_message(&msg);
        assert_eq!(sanitized.chars().count(), MAX_DISPLAY_MESSAGE_LENGTH);
    }

    #[test]
    fn test_longest_message_fits_frame() {
        let index = MessageIndex::new(99).unwrap();
        let msg = "Ç".repeat(100);
        assert!(ReleaseCommand::deny(u8::MAX, &msg).encode(index).is_ok());
    }
}
