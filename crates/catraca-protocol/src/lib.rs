//! REON wire protocol for the turnstile controller.
//!
//! - [`Frame`] decodes one inbound STX...ETX message; [`encode_frame`] builds one.
//! - [`ReleaseCommand`] renders the allow-entry, allow-exit and deny payloads.
//! - [`TurnstileEvent`] interprets the data section of an inbound frame.
//! - [`ReonCodec`] plugs the socket into `tokio_util::codec`.

pub mod codec;
pub mod event;
pub mod frame;
pub mod release;

pub use codec::ReonCodec;
pub use event::TurnstileEvent;
pub use frame::{Frame, checksum, encode_frame};
pub use release::{ReleaseCommand, ReleaseKind, sanitize_display_message};
