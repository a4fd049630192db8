//! Core constants for the REON turnstile protocol and the access policy.
//!
//! The controller speaks a binary-enveloped ASCII protocol:
//!
//! ```text
//! <STX><SIZE><PAD>II+COMMAND+ERR_OR_VERSION+DATA<CHECKSUM><ETX>
//! ```
//!
//! Where:
//! - `<STX>` - Start of text marker (0x02)
//! - `<SIZE>` - Payload length, low byte
//! - `<PAD>` - High byte of the size, always 0 for the messages used here
//! - `II` - Two ASCII digits echoed back by the controller
//! - `+` - Header separator
//! - `DATA` - Fields separated by `]`
//! - `<CHECKSUM>` - XOR of the payload and the two size bytes
//! - `<ETX>` - End of text marker (0x03)
//!
//! # Usage
//!
//! ```
//! use catraca_core::constants::*;
//!
//! assert_eq!(PROTOCOL_ID, "REON");
//! assert_eq!(MIN_FRAME_LENGTH, 7);
//! ```

use std::time::Duration;

// ============================================================================
// Protocol Delimiters
// ============================================================================

/// Header separator between index, command, error/version and data.
///
/// # Examples
///
/// ```
/// use catraca_core::constants::DELIMITER_HEADER;
///
/// let payload = "01+REON+000+0]1001";
/// let parts: Vec<&str> = payload.split(DELIMITER_HEADER as char).collect();
/// assert_eq!(parts, vec!["01", "REON", "000", "0]1001"]);
/// ```
pub const DELIMITER_HEADER: u8 = b'+';

/// Field separator inside the data section.
///
/// Empty fields (consecutive `]]`) are positional and must be preserved.
///
/// # Examples
///
/// ```
/// use catraca_core::constants::DELIMITER_FIELD;
///
/// let data = "0]1001]]]]2";
/// let fields: Vec<&str> = data.split(DELIMITER_FIELD).collect();
/// assert_eq!(fields.len(), 6);
/// assert_eq!(fields[5], "2");
/// ```
pub const DELIMITER_FIELD: char = ']';

// ============================================================================
// Protocol Identification
// ============================================================================

/// Command family used for every event and release command.
pub const PROTOCOL_ID: &str = "REON";

/// Error/version field sent with release commands.
pub const COMMAND_OK: &str = "00";

// ============================================================================
// Message Framing
// ============================================================================

/// Start of text marker (STX).
pub const START_BYTE: u8 = 0x02;

/// End of text marker (ETX).
pub const END_BYTE: u8 = 0x03;

/// Padding byte that follows the size byte.
pub const SIZE_PAD_BYTE: u8 = 0x00;

/// Shortest buffer that can hold a frame.
///
/// STX + two size bytes + two index digits + checksum + ETX.
pub const MIN_FRAME_LENGTH: usize = 7;

/// Envelope bytes surrounding the payload (STX, size, pad, checksum, ETX).
pub const FRAME_OVERHEAD: usize = 5;

/// Largest payload that fits the single-byte size header.
pub const MAX_PAYLOAD_LENGTH: usize = u8::MAX as usize;

/// Maximum bytes handed to the decoder per inbound chunk.
///
/// Longer bursts are split at this boundary; the tail of an oversized frame
/// arrives as a separate, undecodable chunk.
pub const MAX_CHUNK_SIZE: usize = 4096;

/// Number of ASCII digits in the message index.
pub const INDEX_LENGTH: usize = 2;

/// Largest message index representable with two digits.
pub const MAX_MESSAGE_INDEX: u8 = 99;

// ============================================================================
// Event Codes
// ============================================================================

/// Card read by the RFID reader.
pub const EVENT_CARD_READ: u16 = 0;

/// Physical turn started after a release command.
pub const EVENT_TURN_STARTED: u16 = 81;

/// Turn cancelled or ended without passage.
pub const EVENT_TURN_CANCELLED: u16 = 82;

/// Position of the direction code in a card-read data section.
pub const WAY_FIELD_POSITION: usize = 5;

/// Position of the credential in a card-read data section.
pub const TAG_FIELD_POSITION: usize = 1;

// ============================================================================
// Release Commands
// ============================================================================

/// Release code that opens the turnstile for entry.
pub const RELEASE_ENTRY_CODE: &str = "6";

/// Release code that opens the turnstile for exit.
pub const RELEASE_EXIT_CODE: &str = "5";

/// Release code that keeps the turnstile locked and shows a message.
pub const RELEASE_DENY_CODE: &str = "30";

/// Trailing rotation field for entry releases.
pub const ROTATION_ENTRY: &str = "2";

/// Trailing rotation field for exit releases and denials.
pub const ROTATION_EXIT: &str = "1";

/// Default door-open duration in seconds.
pub const DEFAULT_RELEASE_SECONDS: u8 = 5;

/// Maximum characters shown on the controller display (2 lines x 20).
pub const MAX_DISPLAY_MESSAGE_LENGTH: usize = 40;

// ============================================================================
// Timeouts
// ============================================================================

/// Socket inactivity timeout; exceeding it forces a reconnect.
///
/// # Examples
///
/// ```
/// use catraca_core::constants::SOCKET_IDLE_TIMEOUT;
///
/// assert_eq!(SOCKET_IDLE_TIMEOUT.as_millis(), 30_500);
/// ```
pub const SOCKET_IDLE_TIMEOUT: Duration = Duration::from_millis(30_500);

/// Pause between failed reconnect attempts.
pub const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

// ============================================================================
// Access Policy
// ============================================================================

/// Default admission tolerance around a class start, in minutes.
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 15;

/// Minutes in a day; class starts are in `0..MINUTES_PER_DAY`.
pub const MINUTES_PER_DAY: i64 = 1440;

/// Name of the lock shared by the sync job and the decision engine.
pub const IMPORT_LOCK_NAME: &str = "import";

/// Staleness timeout of the import lock.
pub const IMPORT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_overhead_matches_min_length() {
        // Two index digits are the smallest possible payload.
        assert_eq!(FRAME_OVERHEAD + INDEX_LENGTH, MIN_FRAME_LENGTH);
    }

    #[test]
    fn test_event_codes_are_distinct() {
        assert_ne!(EVENT_CARD_READ, EVENT_TURN_STARTED);
        assert_ne!(EVENT_TURN_STARTED, EVENT_TURN_CANCELLED);
    }
}
