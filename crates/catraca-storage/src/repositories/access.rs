#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{AccessEvent, AccessStatus};
use sqlx::SqlitePool;

/// Repository trait for AccessEvent entity operations
///
/// Events are append-only apart from the single status transition and the
/// administrative purge.
pub trait AccessRepository: Send + Sync {
    /// Persist a new event
    async fn create(&self, event: &AccessEvent) -> StorageResult<()>;

    /// Events still waiting for acknowledgement, oldest first
    async fn get_waiting_accesses(&self) -> StorageResult<Vec<AccessEvent>>;

    /// Move a waiting event to `status`. Returns `false` if no waiting event
    /// has that id.
    async fn update_status(&self, id: &str, status: AccessStatus) -> StorageResult<bool>;

    /// Most recent event of a user, any status
    async fn get_last_access_from_user_id(&self, user_id: &str)
    -> StorageResult<Option<AccessEvent>>;

    /// All events, newest first
    async fn get_all(&self) -> StorageResult<Vec<AccessEvent>>;

    async fn erase_all(&self) -> StorageResult<u64>;
}

/// SQLite implementation of AccessRepository
#[derive(Debug, Clone)]
pub struct SqliteAccessRepository {
    pool: SqlitePool,
}

impl SqliteAccessRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AccessRepository for SqliteAccessRepository {
    async fn create(&self, event: &AccessEvent) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_events (id, timestamp, user_id, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(event.timestamp)
        .bind(&event.user_id)
        .bind(event.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_waiting_accesses(&self) -> StorageResult<Vec<AccessEvent>> {
        let events = sqlx::query_as::<_, AccessEvent>(
            r#"
            SELECT id, timestamp, user_id, status
            FROM access_events
            WHERE status = ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(AccessStatus::Waiting)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn update_status(&self, id: &str, status: AccessStatus) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE access_events
            SET status = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(status)
        .bind(id)
        .bind(AccessStatus::Waiting)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_last_access_from_user_id(
        &self,
        user_id: &str,
    ) -> StorageResult<Option<AccessEvent>> {
        let event = sqlx::query_as::<_, AccessEvent>(
            r#"
            SELECT id, timestamp, user_id, status
            FROM access_events
            WHERE user_id = ?
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn get_all(&self) -> StorageResult<Vec<AccessEvent>> {
        let events = sqlx::query_as::<_, AccessEvent>(
            r#"
            SELECT id, timestamp, user_id, status
            FROM access_events
            ORDER BY timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn erase_all(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM access_events")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
