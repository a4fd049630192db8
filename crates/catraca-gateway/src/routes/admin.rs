//! Token-guarded maintenance routes.
//!
//! | Route | Effect |
//! |-------|--------|
//! | `POST /sync` | run one synchronization now |
//! | `GET /tags`, `/classes`, `/accesses` | dump the table |
//! | `DELETE /tags`, `/classes`, `/accesses` | erase the table |

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use catraca_storage::{
    AccessEvent, AccessRepository, ClassRepository, ClassSchedule, Tag, TagRepository,
};
use catraca_sync::SyncReport;
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::AdminToken;
use crate::error::AdminResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Erased {
    pub deleted: u64,
}

async fn trigger_sync(_: AdminToken, State(state): State<AppState>) -> AdminResult<Json<SyncReport>> {
    info!("Manual synchronization requested");
    let report = state.sync.run().await?;
    Ok(Json(report))
}

async fn list_tags(_: AdminToken, State(state): State<AppState>) -> AdminResult<Json<Vec<Tag>>> {
    Ok(Json(state.repos.tags.get_all().await?))
}

async fn erase_tags(_: AdminToken, State(state): State<AppState>) -> AdminResult<Json<Erased>> {
    let deleted = state.repos.tags.erase_all().await?;
    warn!(deleted, "Tags erased by admin");
    Ok(Json(Erased { deleted }))
}

async fn list_classes(
    _: AdminToken,
    State(state): State<AppState>,
) -> AdminResult<Json<Vec<ClassSchedule>>> {
    Ok(Json(state.repos.classes.get_all().await?))
}

async fn erase_classes(_: AdminToken, State(state): State<AppState>) -> AdminResult<Json<Erased>> {
    let deleted = state.repos.classes.erase_all().await?;
    warn!(deleted, "Classes erased by admin");
    Ok(Json(Erased { deleted }))
}

async fn list_accesses(
    _: AdminToken,
    State(state): State<AppState>,
) -> AdminResult<Json<Vec<AccessEvent>>> {
    Ok(Json(state.repos.accesses.get_all().await?))
}

async fn erase_accesses(_: AdminToken, State(state): State<AppState>) -> AdminResult<Json<Erased>> {
    let deleted = state.repos.accesses.erase_all().await?;
    warn!(deleted, "Accesses erased by admin");
    Ok(Json(Erased { deleted }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync", post(trigger_sync))
        .route("/tags", get(list_tags).delete(erase_tags))
        .route("/classes", get(list_classes).delete(erase_classes))
        .route("/accesses", get(list_accesses).delete(erase_accesses))
}
