//! Turnstile engine task.

use catraca_engine::{AccessEngine, TurnstileDriver};
use catraca_network::TransportConfig;
use catraca_storage::FileLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The production access engine.
pub type GatewayEngine = AccessEngine<FileLock>;

/// Spawn the engine with its controller connection.
///
/// The first connection attempt happens inside the task, so the caller never
/// waits on the turnstile. Shutdown during that attempt ends the task.
pub fn spawn_engine(
    engine: GatewayEngine,
    transport: TransportConfig,
    release_seconds: u8,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let driver = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown before turnstile connection, engine not started");
                return;
            }
            driver = TurnstileDriver::start(transport, release_seconds) => driver,
        };
        engine.run(driver, shutdown).await;
    })
}
