use catraca_storage::{Database, FileLock, Repositories};
use catraca_sync::{HttpApiClient, SyncJob};
use std::sync::Arc;

use crate::rate_limit::RateLimiter;

/// The production synchronization job.
pub type GatewaySyncJob = SyncJob<HttpApiClient, FileLock>;

/// Shared state for the admin HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub repos: Repositories,
    pub sync: Arc<GatewaySyncJob>,
    pub admin_token: Arc<str>,
    pub rate_limiter: Arc<RateLimiter>,
}
