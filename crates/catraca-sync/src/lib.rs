//! Synchronization with the academic API.
//!
//! [`SyncJob`] pulls users and their class schedule into the local database
//! under the `import` lock, then pushes recorded passages back and stores the
//! API's verdict on each.
//!
//! # Example
//!
//! ```no_run
//! use catraca_storage::{Database, DatabaseConfig, FileLock};
//! use catraca_sync::{HttpApiClient, SyncJob};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("catraca.db")).await?;
//! let api = HttpApiClient::new("https://academico.example.com", "secret")?;
//! let lock = FileLock::new(".", "import", Duration::from_secs(60));
//!
//! let report = SyncJob::new(api, db.repositories(), lock).run().await?;
//! println!("imported {} users", report.imported);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod job;
pub mod record;

pub use api::{AccessAck, AccessPayload, AckStatus, CatracaApi, HttpApiClient};
pub use error::{RecordError, SyncError, SyncResult};
pub use job::{SyncJob, SyncReport};
pub use record::{ScheduleEntry, UserRecord};
