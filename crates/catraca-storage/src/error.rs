use thiserror::Error;

/// Storage-specific error types for the gateway.
///
/// Every repository failure surfaces as `Database`; callers log it and carry
/// on with the next record or event.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Lock marker could not be written
    #[error("Lock error: {0}")]
    Lock(String),
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
