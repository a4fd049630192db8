//! Network transport for the turnstile controller.
//!
//! [`TcpTransport`] keeps one TCP socket to the controller, writes framed
//! commands through [`catraca_protocol::ReonCodec`] and reports inbound
//! chunks and connection changes as [`TransportEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use catraca_network::{TcpTransport, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TransportConfig {
//!     addr: "127.0.0.1:3000".parse()?,
//!     ..TransportConfig::default()
//! };
//!
//! let (transport, _events) = TcpTransport::new(config);
//! transport.connect().await?;
//! # Ok(())
//! # }
//! ```

mod transport;

pub use transport::{TcpTransport, TransportConfig, TransportError, TransportEvent};
