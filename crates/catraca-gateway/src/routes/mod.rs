//! Admin HTTP surface.

pub mod admin;
pub mod health;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::AdminError;
use crate::state::AppState;

/// Build the full router. Every route, `/health` included, is rate limited
/// per client address.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`;
/// without connection info all clients share one bucket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(admin::router())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state)
}

async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AdminError> {
    let addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip());

    if !state.rate_limiter.check(addr) {
        tracing::warn!(%addr, path = %request.uri().path(), "Rate limit exceeded");
        return Err(AdminError::RateLimited);
    }

    Ok(next.run(request).await)
}
