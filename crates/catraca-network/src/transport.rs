//! TCP transport to the turnstile controller.
//!
//! `TcpTransport` owns at most one socket at a time. Writes go through a
//! `FramedWrite` half held behind a mutex; a background task reads the other
//! half and reports everything it sees as [`TransportEvent`]s on an unbounded
//! channel, so the consumer handles connection changes and inbound data in
//! arrival order.
//!
//! # Architecture
//!
//! ```text
//! TurnstileDriver
//!     │
//!     ├─> send(frame) ──> FramedWrite<OwnedWriteHalf, ReonCodec> ──(TCP)──> controller
//!     │
//!     └─< TransportEvent <── read task: FramedRead<OwnedReadHalf, ReonCodec>
//! ```
//!
//! # Teardown
//!
//! Any terminal condition (idle timeout, read or write error, peer close,
//! explicit [`TcpTransport::close`]) drops the socket and emits
//! [`TransportEvent::Closed`]. The next [`TcpTransport::connect`] or
//! [`TcpTransport::send`] opens a fresh one. There is no retry inside the
//! transport itself.
//!
//! # Example
//!
//! ```no_run
//! use catraca_core::MessageIndex;
//! use catraca_network::{TcpTransport, TransportConfig, TransportEvent};
//! use catraca_protocol::ReleaseCommand;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig {
//!     addr: "192.168.0.100:3000".parse()?,
//!     ..TransportConfig::default()
//! };
//! let (transport, mut events) = TcpTransport::new(config);
//! transport.connect().await?;
//!
//! let frame = ReleaseCommand::deny(5, "ACCESS DENIED").encode(MessageIndex::new(1)?)?;
//! transport.send(frame).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let TransportEvent::Data(chunk) = event {
//!         println!("{} bytes", chunk.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use catraca_core::constants::SOCKET_IDLE_TIMEOUT;
use catraca_protocol::ReonCodec;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, trace, warn};

/// Timeout for flushing and shutting down the write half on close.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for the controller connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Controller address
    pub addr: SocketAddr,

    /// Time allowed for the TCP handshake
    pub connect_timeout: Duration,

    /// Receive inactivity after which the socket is dropped
    pub idle_timeout: Duration,

    /// Time allowed for a single write
    pub write_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([192, 168, 0, 100], 3000)),
            connect_timeout: SOCKET_IDLE_TIMEOUT,
            idle_timeout: SOCKET_IDLE_TIMEOUT,
            write_timeout: Duration::from_millis(3000),
        }
    }
}

/// Errors returned by transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handshake failed
    #[error("Connection failed: {0}")]
    Connect(#[source] std::io::Error),

    /// No handshake within the connect timeout
    #[error("Connection timeout after {0}ms")]
    ConnectTimeout(u64),

    /// The write failed and the socket was dropped
    #[error("Send failed: {0}")]
    Send(String),

    /// The write did not complete in time and the socket was dropped
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// The outbound bytes were rejected by the codec
    #[error("Protocol error: {0}")]
    Protocol(#[from] catraca_core::Error),
}

/// Observable socket lifecycle and inbound data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new socket is up.
    Connected,
    /// One inbound chunk.
    Data(Bytes),
    /// Nothing was received within the idle timeout.
    Timeout,
    /// A connect, read or write failed.
    Error(String),
    /// The socket is gone; `had_error` is set when an error caused it.
    Closed { had_error: bool },
}

struct Connection {
    sink: FramedWrite<OwnedWriteHalf, ReonCodec>,
    generation: u64,
    reader: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    connection: Option<Connection>,
    generation: u64,
}

/// Single-socket TCP client emitting [`TransportEvent`]s.
pub struct TcpTransport {
    config: TransportConfig,
    state: Arc<Mutex<State>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TcpTransport {
    /// Create a transport and the receiver for its events.
    ///
    /// Nothing is connected until [`connect`](Self::connect) or
    /// [`send`](Self::send) is called.
    pub fn new(config: TransportConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        debug!(addr = %config.addr, "Creating turnstile transport");
        let (events, receiver) = mpsc::unbounded_channel();

        let transport = Self {
            config,
            state: Arc::new(Mutex::new(State::default())),
            events,
        };
        (transport, receiver)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Open the socket unless one is already live.
    ///
    /// On failure emits `Error` and `Closed { had_error: true }` as well as
    /// returning the error.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connect` or `TransportError::ConnectTimeout`.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.connection.is_some() {
            trace!("Already connected");
            return Ok(());
        }
        self.open(&mut state).await
    }

    /// Write one framed command, connecting first if needed.
    ///
    /// A failed or timed-out write drops the socket and emits `Error` and
    /// `Closed { had_error: true }`. Bytes the codec rejects leave the
    /// socket untouched.
    ///
    /// # Errors
    ///
    /// Returns the connect error, `TransportError::Send`,
    /// `TransportError::WriteTimeout` or `TransportError::Protocol`.
    pub async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.connection.is_none() {
            self.open(&mut state).await?;
        }

        let Some(connection) = state.connection.as_mut() else {
            return Err(TransportError::Send("not connected".to_string()));
        };

        trace!(bytes = frame.len(), "Sending frame");
        let result = tokio::time::timeout(self.config.write_timeout, connection.sink.send(frame)).await;

        let error = match result {
            Ok(Ok(())) => {
                trace!("Frame sent");
                return Ok(());
            }
            Ok(Err(e)) if e.is_framing() => {
                warn!(error = %e, "Refusing to send malformed frame");
                return Err(TransportError::Protocol(e));
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to send frame");
                TransportError::Send(e.to_string())
            }
            Err(_) => {
                let ms = self.config.write_timeout.as_millis() as u64;
                warn!("Write timeout after {ms}ms");
                TransportError::WriteTimeout(ms)
            }
        };

        if let Some(connection) = state.connection.take() {
            connection.reader.abort();
        }
        self.emit(TransportEvent::Error(error.to_string()));
        self.emit(TransportEvent::Closed { had_error: true });
        Err(error)
    }

    /// Whether a socket is currently live.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connection.is_some()
    }

    /// Close the socket gracefully. Idempotent.
    ///
    /// Flush and shutdown get [`CLOSE_TIMEOUT`] each so a dead peer cannot
    /// hang the caller.
    pub async fn close(&self) {
        let Some(mut connection) = self.state.lock().await.connection.take() else {
            return;
        };

        info!(addr = %self.config.addr, "Closing turnstile connection");
        connection.reader.abort();

        match tokio::time::timeout(CLOSE_TIMEOUT, connection.sink.close()).await {
            Ok(Ok(())) => debug!("Connection shut down"),
            Ok(Err(e)) => warn!("Error during shutdown: {}", e),
            Err(_) => warn!("Shutdown timeout during close ({}ms)", CLOSE_TIMEOUT.as_millis()),
        }

        self.emit(TransportEvent::Closed { had_error: false });
    }

    async fn open(&self, state: &mut State) -> Result<(), TransportError> {
        info!(addr = %self.config.addr, "Connecting to turnstile");

        let stream = match tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                error!(addr = %self.config.addr, "Connection failed: {}", e);
                self.emit(TransportEvent::Error(e.to_string()));
                self.emit(TransportEvent::Closed { had_error: true });
                return Err(TransportError::Connect(e));
            }
            Err(_) => {
                let ms = self.config.connect_timeout.as_millis() as u64;
                warn!(addr = %self.config.addr, "Connection timeout after {ms}ms");
                self.emit(TransportEvent::Error(format!("connection timeout after {ms}ms")));
                self.emit(TransportEvent::Closed { had_error: true });
                return Err(TransportError::ConnectTimeout(ms));
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let (read_half, write_half) = stream.into_split();
        state.generation += 1;
        let generation = state.generation;

        info!(addr = %self.config.addr, generation, "Connected to turnstile");
        self.emit(TransportEvent::Connected);

        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, ReonCodec::new()),
            self.config.idle_timeout,
            generation,
            Arc::clone(&self.state),
            self.events.clone(),
        ));

        state.connection = Some(Connection {
            sink: FramedWrite::new(write_half, ReonCodec::new()),
            generation,
            reader,
        });
        Ok(())
    }

    fn emit(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            trace!("Transport event dropped, receiver gone");
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock()
            && let Some(connection) = state.connection.take()
        {
            debug!("TcpTransport dropped while connected - connection will be closed");
            connection.reader.abort();
        }
    }
}

async fn read_loop(
    mut reader: FramedRead<OwnedReadHalf, ReonCodec>,
    idle_timeout: Duration,
    generation: u64,
    state: Arc<Mutex<State>>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let had_error = loop {
        match tokio::time::timeout(idle_timeout, reader.next()).await {
            Ok(Some(Ok(chunk))) => {
                trace!(bytes = chunk.len(), "Received chunk");
                let _ = events.send(TransportEvent::Data(chunk));
            }
            Ok(Some(Err(e))) => {
                error!(error = %e, "Read failed");
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break true;
            }
            Ok(None) => {
                info!("Connection closed by turnstile");
                break false;
            }
            Err(_) => {
                warn!("No data for {}ms, dropping connection", idle_timeout.as_millis());
                let _ = events.send(TransportEvent::Timeout);
                break false;
            }
        }
    };

    // A newer socket may already have replaced this one.
    let mut state = state.lock().await;
    if state
        .connection
        .as_ref()
        .is_some_and(|c| c.generation == generation)
    {
        state.connection = None;
        let _ = events.send(TransportEvent::Closed { had_error });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.addr.port(), 3000);
        assert_eq!(config.idle_timeout, Duration::from_millis(30_500));
        assert_eq!(config.connect_timeout, config.idle_timeout);
    }

    #[tokio::test]
    async fn test_not_connected_initially() {
        let (transport, mut events) = TcpTransport::new(TransportConfig::default());
        assert!(!transport.is_connected().await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connection_timeout() {
        // Non-routable address (RFC 5737 TEST-NET-1)
        let config = TransportConfig {
            addr: "192.0.2.1:9999".parse().unwrap(),
            connect_timeout: Duration::from_millis(100),
            ..TransportConfig::default()
        };

        let (transport, mut events) = TcpTransport::new(config);
        let result = transport.connect().await;

        // Sandboxes without a route fail fast instead of timing out.
        assert!(matches!(
            result,
            Err(TransportError::ConnectTimeout(100) | TransportError::Connect(_))
        ));
        assert!(!transport.is_connected().await);
        assert!(matches!(events.recv().await, Some(TransportEvent::Error(_))));
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Closed { had_error: true })
        );
    }

    #[tokio::test]
    async fn test_close_when_not_connected() {
        let (transport, mut events) = TcpTransport::new(TransportConfig::default());
        transport.close().await;
        transport.close().await;
        assert!(events.try_recv().is_err());
    }
}
