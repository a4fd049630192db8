#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::{ClassSchedule, NewClassSchedule};
use catraca_core::WeekDay;
use sqlx::SqlitePool;

/// Repository trait for ClassSchedule entity operations
pub trait ClassRepository: Send + Sync {
    /// Insert a class slot. Duplicates of (start, week_day, user_id) are
    /// ignored; returns whether a row was added.
    async fn create(&self, class: &NewClassSchedule) -> StorageResult<bool>;

    /// Remove every slot of a user. Returns rows removed.
    async fn delete_from_user_id(&self, user_id: &str) -> StorageResult<u64>;

    /// Slots of a user on one week day, earliest first
    async fn get_classes_from_user_id_and_week_day(
        &self,
        user_id: &str,
        week_day: WeekDay,
    ) -> StorageResult<Vec<ClassSchedule>>;

    async fn get_all(&self) -> StorageResult<Vec<ClassSchedule>>;

    async fn erase_all(&self) -> StorageResult<u64>;
}

/// SQLite implementation of ClassRepository
#[derive(Debug, Clone)]
pub struct SqliteClassRepository {
    pool: SqlitePool,
}

impl SqliteClassRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ClassRepository for SqliteClassRepository {
    async fn create(&self, class: &NewClassSchedule) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO class_schedules (start, week_day, user_id)
            VALUES (?, ?, ?)
            ON CONFLICT(start, week_day, user_id) DO NOTHING
            "#,
        )
        .bind(class.start)
        .bind(class.week_day.as_i64())
        .bind(&class.user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_from_user_id(&self, user_id: &str) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM class_schedules WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn get_classes_from_user_id_and_week_day(
        &self,
        user_id: &str,
        week_day: WeekDay,
    ) -> StorageResult<Vec<ClassSchedule>> {
        let classes = sqlx::query_as::<_, ClassSchedule>(
            r#"
            SELECT id, start, week_day, user_id
            FROM class_schedules
            WHERE user_id = ? AND week_day = ?
            ORDER BY start ASC
            "#,
        )
        .bind(user_id)
        .bind(week_day.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(classes)
    }

    async fn get_all(&self) -> StorageResult<Vec<ClassSchedule>> {
        let classes = sqlx::query_as::<_, ClassSchedule>(
            r#"
            SELECT id, start, week_day, user_id
            FROM class_schedules
            ORDER BY user_id, week_day, start
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(classes)
    }

    async fn erase_all(&self) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM class_schedules")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
