//! Scheduled synchronization.
//!
//! Runs follow a cron schedule evaluated in the gateway's time zone. The next
//! time is computed after each run finishes, so runs missed while one was in
//! progress are skipped. A run that overlaps a manual `POST /sync` loses the
//! lock and is skipped.

use catraca_storage::SyncLock;
use catraca_sync::{CatracaApi, SyncError, SyncJob};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Time left until the first run of `schedule` strictly after `now`.
pub fn delay_until_next(schedule: &Schedule, timezone: Tz, now: DateTime<Utc>) -> Option<Duration> {
    let next = schedule.after(&now.with_timezone(&timezone)).next()?;
    Some(
        (next.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}

/// Run the sync loop until `cancel` fires.
pub async fn run<A, L>(
    job: Arc<SyncJob<A, L>>,
    schedule: Schedule,
    timezone: Tz,
    cancel: CancellationToken,
) where
    A: CatracaApi,
    L: SyncLock,
{
    tracing::info!(%schedule, %timezone, "Sync scheduler started");

    loop {
        let Some(delay) = delay_until_next(&schedule, timezone, Utc::now()) else {
            tracing::warn!(%schedule, "Sync schedule has no upcoming run, scheduler stopping");
            break;
        };
        tracing::debug!(delay_secs = delay.as_secs(), "Next scheduled synchronization");

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Sync scheduler stopping");
                break;
            }
            _ = tokio::time::sleep(delay) => {
                match job.run().await {
                    Ok(report) => tracing::debug!(?report, "Scheduled synchronization done"),
                    Err(SyncError::LockContention) => {
                        tracing::debug!("Scheduled synchronization skipped");
                    }
                    Err(e) => tracing::error!(error = %e, "Scheduled synchronization failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catraca_storage::{Database, FileLock};
    use catraca_sync::{AccessAck, AccessPayload, SyncResult};
    use chrono::TimeZone;
    use serde_json::{Value, json};
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct CountingApi {
        fetches: Arc<AtomicUsize>,
    }

    impl CatracaApi for CountingApi {
        async fn fetch_users(&self) -> SyncResult<Vec<Value>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![json!({
                "matricula": "2024001",
                "rfid": 1001,
                "horarios": [],
                "liberado": true
            })])
        }

        async fn push_accesses(&self, _: &[AccessPayload]) -> SyncResult<Vec<AccessAck>> {
            Ok(Vec::new())
        }
    }

    fn job(api: &CountingApi, db: &Database, dir: &TempDir) -> Arc<SyncJob<CountingApi, FileLock>> {
        Arc::new(SyncJob::new(
            api.clone(),
            db.repositories(),
            FileLock::new(dir.path(), "import", Duration::from_secs(60)),
        ))
    }

    fn schedule(expression: &str) -> Schedule {
        Schedule::from_str(expression).unwrap()
    }

    #[test]
    fn test_delay_until_next_uses_timezone() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 3, 0).unwrap();
        let daily = schedule("0 0 6 * * *");

        assert_eq!(
            delay_until_next(&daily, chrono_tz::UTC, now),
            Some(Duration::from_secs((20 * 60 + 57) * 60))
        );
        // 06:00 in Sao Paulo is 09:00 UTC, three minutes ago.
        assert_eq!(
            delay_until_next(&daily, chrono_tz::America::Sao_Paulo, now),
            Some(Duration::from_secs((23 * 60 + 57) * 60))
        );
    }

    #[test]
    fn test_delay_is_none_without_upcoming_run() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 3, 0).unwrap();
        let past = schedule("0 0 0 1 1 * 2020");

        assert_eq!(delay_until_next(&past, chrono_tz::UTC, now), None);
    }

    #[tokio::test]
    async fn test_runs_on_schedule_then_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let db = Database::in_memory().await.unwrap();
        let api = CountingApi::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            job(&api, &db, &dir),
            schedule("* * * * * *"),
            chrono_tz::UTC,
            cancel.clone(),
        ));
        for _ in 0..300 {
            if api.fetches.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(api.fetches.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_skips_run() {
        let dir = TempDir::new().unwrap();
        let db = Database::in_memory().await.unwrap();
        let api = CountingApi::default();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run(
            job(&api, &db, &dir),
            schedule("0 0 0 1 1 *"),
            chrono_tz::UTC,
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
    }
}
