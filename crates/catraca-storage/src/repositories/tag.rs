#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{NewTag, Tag};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;

/// Repository trait for Tag entity operations
///
/// This trait uses native async trait methods (Edition 2024 feature).
pub trait TagRepository: Send + Sync {
    /// Insert the tag, or refresh every attribute of the existing tag with
    /// the same `user_id`.
    ///
    /// A tag of another user holding the same credential is deleted first,
    /// with its classes, so a reissued card follows its new owner.
    async fn create_or_update(&self, tag: &NewTag) -> StorageResult<Tag>;

    /// Find a tag by its RFID credential
    async fn get_by_credential(&self, credential: i64) -> StorageResult<Option<Tag>>;

    /// All tags ordered by user id
    async fn get_all(&self) -> StorageResult<Vec<Tag>>;

    /// Delete every tag (cascades to class schedules). Returns rows removed.
    async fn erase_all(&self) -> StorageResult<u64>;
}

/// SQLite implementation of TagRepository
#[derive(Debug, Clone)]
pub struct SqliteTagRepository {
    pool: SqlitePool,
}

impl SqliteTagRepository {
    /// Create a new SQLite tag repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TagRepository for SqliteTagRepository {
    async fn create_or_update(&self, tag: &NewTag) -> StorageResult<Tag> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query("DELETE FROM tags WHERE credential = ? AND user_id <> ?")
            .bind(tag.credential)
            .bind(&tag.user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if released > 0 {
            warn!(
                credential = tag.credential,
                user_id = %tag.user_id,
                "Credential reassigned, previous owner's tag removed"
            );
        }

        let saved = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (user_id, credential, released, status, admin, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                credential = excluded.credential,
                released = excluded.released,
                status = excluded.status,
                admin = excluded.admin,
                updated_at = excluded.updated_at
            RETURNING id, user_id, credential, released, status, admin, created_at, updated_at
            "#,
        )
        .bind(&tag.user_id)
        .bind(tag.credential)
        .bind(tag.released)
        .bind(&tag.status)
        .bind(tag.admin)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn get_by_credential(&self, credential: i64) -> StorageResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, credential, released, status, admin, created_at, updated_at
            FROM tags
            WHERE credential = ?
            "#,
        )
        .bind(credential)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tag)
    }

    async fn get_all(&self) -> StorageResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT id, user_id, credential, released, status, admin, created_at, updated_at
            FROM tags
            ORDER BY user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    async fn erase_all(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM tags").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
