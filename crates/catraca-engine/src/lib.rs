//! Turnstile driver and access decision engine.
//!
//! The [`TurnstileDriver`] keeps the controller connection alive and turns
//! inbound chunks into decoded frames. The [`AccessEngine`] consumes those
//! frames one at a time, decides admit or deny against the local database,
//! commands the turnstile, and records confirmed passages.
//!
//! ```text
//! TcpTransport ─> TurnstileDriver ─> run loop ─> AccessEngine
//!                      ^                              │
//!                      └──── allow_entry/allow_exit/deny_access
//! ```
//!
//! # Example
//!
//! ```no_run
//! use catraca_core::SystemClock;
//! use catraca_engine::{AccessEngine, EngineConfig, TurnstileDriver};
//! use catraca_network::TransportConfig;
//! use catraca_storage::{Database, DatabaseConfig, FileLock};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("catraca.db")).await?;
//! let lock = FileLock::new(".", "import", Duration::from_secs(60));
//! let engine = AccessEngine::new(db.repositories(), lock, SystemClock, EngineConfig::default());
//!
//! let driver = TurnstileDriver::start(TransportConfig::default(), 5).await;
//! engine.run(driver, CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod engine;
pub mod messages;
pub mod policy;

pub use driver::{DriverEvent, TurnstileCommands, TurnstileDriver};
pub use engine::{AccessEngine, Decision, DenyReason, EngineConfig, Outcome, PendingTurn};
pub use messages::DisplayMessages;
pub use policy::ScheduleCheck;
