//! The synchronization job.
//!
//! One run has two phases:
//!
//! 1. **Pull** (under the `import` lock): fetch users, validate each record,
//!    upsert its tag and replace its class slots.
//! 2. **Push** (lock released): send waiting passages and apply the API's
//!    acknowledgements.
//!
//! There is no retry; the next scheduled run is the retry. Failures inside a
//! phase are isolated per user and per passage.

use catraca_storage::{
    AccessRepository, AccessStatus, ClassRepository, NewClassSchedule, Repositories, SyncLock,
    TagRepository,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::{AccessPayload, AckStatus, CatracaApi};
use crate::error::{SyncError, SyncResult};
use crate::record::UserRecord;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Users whose tag and classes were written
    pub imported: usize,
    /// Records rejected by validation
    pub skipped: usize,
    /// Valid records that hit a storage error
    pub failed: usize,
    /// Class slots created
    pub classes: usize,
    /// Passages sent to the API
    pub pushed: usize,
    pub granted: usize,
    pub revoked: usize,
}

/// Pull/merge and push cycle against the academic API.
pub struct SyncJob<A: CatracaApi, L: SyncLock> {
    api: A,
    repos: Repositories,
    lock: L,
    utc_offset_hours: i64,
}

impl<A: CatracaApi, L: SyncLock> SyncJob<A, L> {
    /// Job pushing timestamps with the default offset of -3 hours.
    pub fn new(api: A, repos: Repositories, lock: L) -> Self {
        Self {
            api,
            repos,
            lock,
            utc_offset_hours: -3,
        }
    }

    /// Hours added to UTC before timestamps are pushed.
    ///
    /// The API stores local wall-clock time in an epoch field.
    pub fn with_utc_offset_hours(mut self, hours: i64) -> Self {
        self.utc_offset_hours = hours;
        self
    }

    pub fn lock(&self) -> &L {
        &self.lock
    }

    /// Run both phases.
    ///
    /// # Errors
    ///
    /// - `SyncError::LockContention` if another run holds the lock; nothing
    ///   was touched
    /// - `SyncError::Http`, `Api`, `Parse` or `NoValidRecords` from the pull
    ///   phase; the push phase is skipped
    /// - the same kinds from the push phase, after the pull was applied
    pub async fn run(&self) -> SyncResult<SyncReport> {
        if !self.lock.acquire().await? {
            warn!("Synchronization already running, skipping this run");
            return Err(SyncError::LockContention);
        }

        let mut report = SyncReport::default();
        let pulled = self.pull(&mut report).await;
        self.lock.release().await;
        pulled?;

        self.push(&mut report).await?;

        info!(
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            pushed = report.pushed,
            granted = report.granted,
            revoked = report.revoked,
            "Synchronization finished"
        );
        Ok(report)
    }

    async fn pull(&self, report: &mut SyncReport) -> SyncResult<()> {
        let raw = self.api.fetch_users().await?;
        debug!(count = raw.len(), "Users fetched");

        let mut records = Vec::with_capacity(raw.len());
        for (position, value) in raw.into_iter().enumerate() {
            match UserRecord::from_value(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(position, error = %e, "Skipping invalid user record");
                    report.skipped += 1;
                }
            }
        }

        if records.is_empty() {
            warn!(skipped = report.skipped, "No valid user records, aborting import");
            return Err(SyncError::NoValidRecords {
                skipped: report.skipped,
            });
        }

        for record in &records {
            match self.import(record).await {
                Ok(classes) => {
                    report.imported += 1;
                    report.classes += classes;
                }
                Err(e) => {
                    error!(user_id = %record.matricula, error = %e, "Failed to import user");
                    report.failed += 1;
                }
            }
        }

        info!(
            imported = report.imported,
            skipped = report.skipped,
            failed = report.failed,
            classes = report.classes,
            "Import finished"
        );
        Ok(())
    }

    /// Upsert one user's tag and replace its classes. Returns slots created.
    async fn import(&self, record: &UserRecord) -> SyncResult<usize> {
        let tag = self.repos.tags.create_or_update(&record.to_new_tag()).await?;
        self.repos.classes.delete_from_user_id(&tag.user_id).await?;

        if !record.is_schedulable() {
            debug!(user_id = %tag.user_id, "User not released, no classes");
            return Ok(0);
        }

        let mut created = 0;
        for (start, week_day) in record.class_slots().map_err(|e| SyncError::Parse(e.to_string()))? {
            let class = NewClassSchedule {
                start,
                week_day,
                user_id: tag.user_id.clone(),
            };
            if self.repos.classes.create(&class).await? {
                created += 1;
            }
        }
        Ok(created)
    }

    async fn push(&self, report: &mut SyncReport) -> SyncResult<()> {
        let waiting = self.repos.accesses.get_waiting_accesses().await?;
        if waiting.is_empty() {
            debug!("No waiting accesses to push");
            return Ok(());
        }

        let offset = self.utc_offset_hours * MILLIS_PER_HOUR;
        let payload: Vec<AccessPayload> = waiting
            .iter()
            .map(|access| AccessPayload {
                event_id: access.id.clone(),
                user_id: access.user_id.clone(),
                timestamp_millis: access.timestamp.timestamp_millis() + offset,
            })
            .collect();

        let acks = self.api.push_accesses(&payload).await?;
        report.pushed = payload.len();

        for ack in acks {
            let status = match ack.status {
                AckStatus::Success => AccessStatus::Granted,
                AckStatus::Failed => AccessStatus::Revoked,
            };

            match self.repos.accesses.update_status(&ack.event_id, status).await {
                Ok(true) => {
                    match status {
                        AccessStatus::Granted => report.granted += 1,
                        _ => report.revoked += 1,
                    }
                    debug!(event_id = %ack.event_id, %status, message = ?ack.message, "Access acknowledged");
                }
                Ok(false) => {
                    warn!(event_id = %ack.event_id, "Acknowledgement for unknown or settled access");
                }
                Err(e) => {
                    error!(event_id = %ack.event_id, error = %e, "Failed to update access status");
                }
            }
        }

        Ok(())
    }
}
