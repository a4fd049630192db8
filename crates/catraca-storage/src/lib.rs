//! Storage layer for the turnstile gateway.
//!
//! SQLite persistence (through sqlx) for the three records the gateway keeps,
//! plus the file-backed lock that pauses admissions while a sync runs.
//!
//! - [`Database`] - pool manager with embedded migrations
//! - [`TagRepository`], [`ClassRepository`], [`AccessRepository`] - data access traits
//!   with `Sqlite*` adapters
//! - [`SyncLock`] / [`FileLock`] - named, self-expiring mutual exclusion
//!
//! # Example
//!
//! ```no_run
//! use catraca_storage::{Database, DatabaseConfig, TagRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("catraca.db")).await?;
//! let repos = db.repositories();
//!
//! if let Some(tag) = repos.tags.get_by_credential(1001).await? {
//!     println!("{} released={}", tag.user_id, tag.released);
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod lock;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig, Repositories};
pub use error::{StorageError, StorageResult};
pub use lock::{FileLock, SyncLock};
pub use models::{AccessEvent, AccessStatus, ClassSchedule, NewClassSchedule, NewTag, Tag};
pub use repositories::{
    AccessRepository, ClassRepository, SqliteAccessRepository, SqliteClassRepository,
    SqliteTagRepository, TagRepository,
};
