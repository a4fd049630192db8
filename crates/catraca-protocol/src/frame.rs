use bytes::{BufMut, Bytes, BytesMut};
use catraca_core::{Error, MessageIndex, Result, constants::*};
use std::fmt;

/// Frame represents one decoded controller message plus its raw bytes.
///
/// # Wire Format
/// ```text
/// STX SIZE PAD I I + COMMAND + ERR_OR_VERSION + DATA CHECKSUM ETX
/// 02  1B   00  0 1 + REON    + 000            + 0]1001]...  5C   03
/// ```
///
/// - `SIZE` is the payload length (everything between PAD and CHECKSUM). It is
///   informational and not checked against the actual length.
/// - `INDEX` is echoed back by the controller and ties a command to its reply.
/// - `CHECKSUM` is the XOR of the payload bytes and both size bytes.
///
/// # Protocol Flow Example
///
/// **1. Controller reports a card read (entry side)**
/// ```text
/// 01+REON+000+0]1001]18/10/2026 09:00:00]1]0]2
///               ^^^^                          ^
///               credential                    way
/// ```
///
/// **2. Gateway releases the turnstile**
/// ```text
/// 01+REON+00+6]5]ACESSO LIBERADO]2
/// ```
///
/// **3. Controller confirms the turn**
/// ```text
/// 01+REON+000+81]]18/10/2026 09:00:04]1]0]
/// ```
///
/// # Basic Usage
/// ```
/// use catraca_core::MessageIndex;
/// use catraca_protocol::{Frame, encode_frame};
///
/// let index = MessageIndex::new(1).unwrap();
/// let bytes = encode_frame(index, "REON+000+0]1001]]]]2").unwrap();
///
/// let frame = Frame::decode(&bytes).unwrap();
/// assert_eq!(frame.index(), index);
/// assert_eq!(frame.command(), "REON");
/// assert_eq!(frame.error_or_version(), "000");
/// assert_eq!(frame.data(), "0]1001]]]]2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    size: u8,
    index: MessageIndex,
    command: String,
    error_or_version: String,
    data: String,
    checksum: u8,
    raw: Bytes,
}

impl Frame {
    /// Decode one frame from a received buffer.
    ///
    /// The whole buffer is treated as a single frame: byte 0 must be STX and
    /// the last byte ETX.
    ///
    /// # Errors
    /// Returns `Error::Framing` if:
    /// - the buffer is shorter than [`MIN_FRAME_LENGTH`]
    /// - STX or ETX are missing
    /// - the index is not two ASCII digits
    /// - any `+` separator is absent
    /// - a text section is not valid UTF-8
    pub fn decode(buffer: &[u8]) -> Result<Frame> {
        if buffer.len() < MIN_FRAME_LENGTH {
            return Err(Error::framing(format!(
                "Frame too short: {} bytes (min {MIN_FRAME_LENGTH})",
                buffer.len()
            )));
        }

        if buffer[0] != START_BYTE {
            return Err(Error::framing(format!(
                "Expected STX, got {:#04x}",
                buffer[0]
            )));
        }

        let last = buffer.len() - 1;
        if buffer[last] != END_BYTE {
            return Err(Error::framing(format!(
                "Expected ETX, got {:#04x}",
                buffer[last]
            )));
        }

        let size = buffer[1];
        let index = parse_index(&buffer[3..5])?;

        if buffer[5] != DELIMITER_HEADER {
            return Err(Error::framing("Missing '+' separator after index"));
        }

        // Checksum and ETX are never scanned for separators.
        let end = buffer.len() - 2;

        let command_start = 6;
        let command_end = find_separator(buffer, command_start, end)
            .ok_or_else(|| Error::framing("Missing '+' separator after command"))?;

        let error_start = command_end + 1;
        let error_end = find_separator(buffer, error_start, end)
            .ok_or_else(|| Error::framing("Missing '+' separator after error/version"))?;

        let data_start = error_end + 1;

        Ok(Frame {
            size,
            index,
            command: to_text(&buffer[command_start..command_end], "command")?,
            error_or_version: to_text(&buffer[error_start..error_end], "error/version")?,
            data: to_text(&buffer[data_start..end], "data")?,
            checksum: buffer[end],
            raw: Bytes::copy_from_slice(buffer),
        })
    }

    /// Size byte as received.
    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn index(&self) -> MessageIndex {
        self.index
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn error_or_version(&self) -> &str {
        &self.error_or_version
    }

    /// Data section (between the last `+` and the checksum).
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Data section split on `]`, empty fields preserved.
    pub fn fields(&self) -> Vec<&str> {
        self.data.split(DELIMITER_FIELD).collect()
    }

    /// Checksum byte as received.
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Raw frame bytes including STX/ETX, kept for diagnostics.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Checksum recomputed over the received payload and size bytes.
    pub fn computed_checksum(&self) -> u8 {
        let end = self.raw.len() - 2;
        checksum(&self.raw[3..end], [self.raw[1], self.raw[2]])
    }

    /// Compare the received checksum with the computed one.
    ///
    /// [`Frame::decode`] does not call this; callers decide what to do with a
    /// mismatch.
    ///
    /// # Errors
    /// Returns `Error::ChecksumMismatch` if the bytes differ.
    pub fn verify_checksum(&self) -> Result<()> {
        let expected = self.computed_checksum();
        if expected == self.checksum {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                expected,
                actual: self.checksum,
            })
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}+{}+{}+{}",
            self.index, self.command, self.error_or_version, self.data
        )
    }
}

/// Running XOR over the payload bytes followed by the two size bytes.
///
/// # Examples
///
/// ```
/// use catraca_protocol::checksum;
///
/// assert_eq!(checksum(b"", [0, 0]), 0);
/// assert_eq!(checksum(b"A", [1, 0]), b'A' ^ 1);
/// ```
pub fn checksum(payload: &[u8], size: [u8; 2]) -> u8 {
    payload
        .iter()
        .chain(size.iter())
        .fold(0u8, |acc, &b| acc ^ b)
}

/// Build a complete frame for `<index>+<body>`.
///
/// # Errors
/// Returns `Error::FrameTooLarge` if the payload exceeds the single-byte size
/// header.
pub fn encode_frame(index: MessageIndex, body: &str) -> Result<Bytes> {
    let payload = format!("{index}+{body}");
    let payload = payload.as_bytes();

    if payload.len() > MAX_PAYLOAD_LENGTH {
        return Err(Error::FrameTooLarge {
            size: payload.len(),
            max_size: MAX_PAYLOAD_LENGTH,
        });
    }

    let size = [payload.len() as u8, SIZE_PAD_BYTE];

    let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
    buf.put_u8(START_BYTE);
    buf.put_slice(&size);
    buf.put_slice(payload);
    buf.put_u8(checksum(payload, size));
    buf.put_u8(END_BYTE);

    Ok(buf.freeze())
}

fn parse_index(digits: &[u8]) -> Result<MessageIndex> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<MessageIndex>().ok())
        .ok_or_else(|| Error::framing(format!("Invalid message index bytes {digits:?}")))
}

fn find_separator(buffer: &[u8], start: usize, end: usize) -> Option<usize> {
    if start > end {
        return None;
    }
    buffer[start..end]
        .iter()
        .position(|&b| b == DELIMITER_HEADER)
        .map(|pos| start + pos)
}

fn to_text(bytes: &[u8], section: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::framing(format!("Invalid UTF-8 in {section}: {e}")))
}
