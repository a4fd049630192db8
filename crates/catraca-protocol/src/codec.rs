//! Tokio codec for the controller socket.
//!
//! The controller writes one frame per TCP segment and the SIZE byte is only
//! informational, so inbound bytes are handed on as raw chunks rather than
//! delimited frames. Each chunk is what one read produced, capped at
//! [`MAX_CHUNK_SIZE`]; anything past the cap in the same read is dropped.
//! Decoding a chunk into a [`Frame`](crate::Frame) is left to the caller so a
//! malformed chunk can be reported without ending the stream.
//!
//! ```text
//! TCP Stream -> Decoder -> Bytes (one chunk)
//! Bytes (framed by encode_frame) -> Encoder -> TCP Stream
//! ```
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use catraca_core::MessageIndex;
//! use catraca_protocol::{Frame, ReleaseCommand, ReonCodec};
//! use futures::{SinkExt, StreamExt};
//! use tokio::net::TcpStream;
//! use tokio_util::codec::Framed;
//!
//! # async fn example() -> catraca_core::Result<()> {
//! let stream = TcpStream::connect("127.0.0.1:3000").await?;
//! let mut framed = Framed::new(stream, ReonCodec::new());
//!
//! let index = MessageIndex::new(1)?;
//! framed.send(ReleaseCommand::deny(5, "ACCESS DENIED").encode(index)?).await?;
//!
//! if let Some(Ok(chunk)) = framed.next().await {
//!     println!("{}", Frame::decode(&chunk)?);
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{Bytes, BytesMut};
use catraca_core::{Error, Result, constants::*};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

/// Chunk decoder and frame encoder for the REON socket.
#[derive(Debug, Clone)]
pub struct ReonCodec {
    max_chunk_size: usize,
}

impl ReonCodec {
    /// Create a codec with the default [`MAX_CHUNK_SIZE`] cap.
    pub fn new() -> Self {
        Self {
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }

    /// Create a codec with a custom chunk cap.
    pub fn with_max_chunk_size(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }
}

impl Default for ReonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ReonCodec {
    type Item = Bytes;
    type Error = Error;

    /// Yield everything buffered as one chunk.
    ///
    /// Never fails; framing problems surface when the chunk is decoded.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.is_empty() {
            return Ok(None);
        }

        if src.len() > self.max_chunk_size {
            warn!(
                received = src.len(),
                max = self.max_chunk_size,
                "Inbound chunk exceeds cap, truncating"
            );
            let chunk = src.split_to(self.max_chunk_size).freeze();
            src.clear();
            return Ok(Some(chunk));
        }

        Ok(Some(src.split().freeze()))
    }
}

impl Encoder<Bytes> for ReonCodec {
    type Error = Error;

    /// Write an already framed command.
    ///
    /// # Errors
    ///
    /// Returns `Error::Framing` if `item` is not an STX...ETX frame.
    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        if item.len() < MIN_FRAME_LENGTH {
            return Err(Error::framing(format!(
                "Outbound frame too short: {} bytes",
                item.len()
            )));
        }
        if item.first() != Some(&START_BYTE) || item.last() != Some(&END_BYTE) {
            return Err(Error::framing("Outbound frame is missing STX/ETX"));
        }

        dst.extend_from_slice(&item);
        Ok(())
    }
}
