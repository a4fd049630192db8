use thiserror::Error;

/// Wire-level errors raised while framing or parsing controller messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Frame is too short, lacks STX/ETX, or misses a `+` separator.
    #[error("Framing error: {message}")]
    Framing { message: String },

    /// Received checksum byte does not match the computed one.
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Payload does not fit the single-byte size header.
    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    /// A field inside an otherwise well-framed message is unusable.
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for building a [`Error::Framing`].
    pub fn framing(message: impl Into<String>) -> Self {
        Error::Framing {
            message: message.into(),
        }
    }

    /// Whether this error means the inbound frame must be dropped.
    pub fn is_framing(&self) -> bool {
        matches!(self, Error::Framing { .. } | Error::ChecksumMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
