//! Gateway process: turnstile engine, periodic sync and the admin API.

pub mod auth;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod turnstile;

pub use config::GatewayConfig;
pub use error::{AdminError, AdminResult};
pub use state::{AppState, GatewaySyncJob};
pub use turnstile::{GatewayEngine, spawn_engine};
