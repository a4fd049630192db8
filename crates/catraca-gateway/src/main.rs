use anyhow::Context;
use catraca_core::SystemClock;
use catraca_core::constants::{IMPORT_LOCK_NAME, IMPORT_LOCK_TIMEOUT};
use catraca_engine::{AccessEngine, EngineConfig};
use catraca_gateway::rate_limit::RateLimiter;
use catraca_gateway::{AppState, GatewayConfig, routes, scheduler, spawn_engine};
use catraca_network::TransportConfig;
use catraca_storage::{Database, DatabaseConfig, FileLock};
use catraca_sync::{HttpApiClient, SyncJob};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = GatewayConfig::from_env()?;

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "catraca_gateway=info,catraca_engine=info,catraca_sync=info,\
                 catraca_network=info,catraca_storage=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = catraca_core::VERSION,
        turnstile = %config.turnstile_addr,
        port = config.port,
        timezone = %config.timezone,
        "Starting catraca gateway"
    );

    // --- Database ---
    let db = Database::new(DatabaseConfig::new(&config.database_path))
        .await
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    db.health_check().await.context("database health check")?;
    tracing::info!(path = %config.database_path.display(), "Database ready");

    let lock = FileLock::new(&config.lock_dir, IMPORT_LOCK_NAME, IMPORT_LOCK_TIMEOUT);
    let shutdown = CancellationToken::new();

    // --- Sync ---
    let api = HttpApiClient::new(&config.api_base_url, config.api_token.clone())
        .context("building API client")?;
    let sync = Arc::new(
        SyncJob::new(api, db.repositories(), lock.clone())
            .with_utc_offset_hours(config.api_utc_offset_hours),
    );
    let scheduler_handle = tokio::spawn(scheduler::run(
        sync.clone(),
        config.sync_schedule.clone(),
        config.timezone,
        shutdown.clone(),
    ));

    // --- Admin API ---
    let state = AppState {
        db: db.clone(),
        repos: db.repositories(),
        sync,
        admin_token: Arc::from(config.admin_token.as_str()),
        rate_limiter: Arc::new(RateLimiter::per_minute(config.rate_limit_per_minute)),
    };
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Admin API listening");

    // --- Turnstile ---
    let engine = AccessEngine::new(
        db.repositories(),
        lock,
        SystemClock,
        EngineConfig {
            tolerance_minutes: config.tolerance_minutes,
            timezone: config.timezone,
        },
    );
    let transport = TransportConfig {
        addr: config.turnstile_addr,
        ..TransportConfig::default()
    };
    let engine_handle = spawn_engine(engine, transport, config.release_seconds, shutdown.clone());

    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server_shutdown = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
    .await
    .context("admin server")?;

    // --- Post-shutdown cleanup ---
    shutdown.cancel();
    if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, engine_handle).await.is_err() {
        tracing::warn!("Turnstile engine did not stop in time");
    }
    if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, scheduler_handle).await.is_err() {
        tracing::warn!("Sync scheduler did not stop in time");
    }
    db.close().await;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
    token.cancel();
}
