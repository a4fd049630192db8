//! Gateway configuration from environment variables.
//!
//! | Env Var | Default |
//! |---------|---------|
//! | `TURNSTILE_HOST` | `192.168.0.100` |
//! | `TURNSTILE_PORT` | `3000` |
//! | `RELEASE_SECONDS` | `5` |
//! | `TOLERANCE_MINUTES` | `15` |
//! | `TIMEZONE` | `America/Sao_Paulo` |
//! | `API_BASE_URL` | required |
//! | `API_TOKEN` | required |
//! | `API_UTC_OFFSET_HOURS` | `-3` |
//! | `SYNC_CRON` | `0 */10 * * * *` |
//! | `ADMIN_TOKEN` | required |
//! | `PORT` | `8080` |
//! | `DATABASE_PATH` | `catraca.db` |
//! | `LOCK_DIR` | `.` |
//! | `RATE_LIMIT_PER_MINUTE` | `60` |
//!
//! `SYNC_CRON` takes six fields (`sec min hour day month weekday`) or the
//! classic five, which run at second zero. It is read in `TIMEZONE`.

use anyhow::{Context, anyhow, bail};
use catraca_core::constants::{DEFAULT_RELEASE_SECONDS, DEFAULT_TOLERANCE_MINUTES};
use chrono_tz::Tz;
use cron::Schedule;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Turnstile controller address
    pub turnstile_addr: SocketAddr,
    /// Door-open time sent with every release command
    pub release_seconds: u8,
    pub tolerance_minutes: i64,
    pub timezone: Tz,
    pub api_base_url: String,
    pub api_token: String,
    /// Offset added to UTC timestamps pushed to the API
    pub api_utc_offset_hours: i64,
    /// When scheduled synchronizations run
    pub sync_schedule: Schedule,
    pub admin_token: String,
    /// Admin HTTP listen port
    pub port: u16,
    pub database_path: PathBuf,
    /// Directory holding lock marker files
    pub lock_dir: PathBuf,
    pub rate_limit_per_minute: u32,
}

impl GatewayConfig {
    /// Load `.env` (if present) and read the process environment.
    ///
    /// # Errors
    ///
    /// Fails naming the variable when a required one is missing or a value
    /// does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host: IpAddr = parse(&lookup, "TURNSTILE_HOST", IpAddr::from([192, 168, 0, 100]))?;
        let turnstile_port: u16 = parse(&lookup, "TURNSTILE_PORT", 3000)?;

        let tolerance_minutes: i64 = parse(&lookup, "TOLERANCE_MINUTES", DEFAULT_TOLERANCE_MINUTES)?;
        if tolerance_minutes < 0 {
            bail!("TOLERANCE_MINUTES must not be negative, got {tolerance_minutes}");
        }

        let sync_schedule = match lookup("SYNC_CRON") {
            Some(raw) => parse_cron(&raw)?,
            None => parse_cron(DEFAULT_SYNC_CRON)?,
        };

        Ok(Self {
            turnstile_addr: SocketAddr::new(host, turnstile_port),
            release_seconds: parse(&lookup, "RELEASE_SECONDS", DEFAULT_RELEASE_SECONDS)?,
            tolerance_minutes,
            timezone: parse(&lookup, "TIMEZONE", chrono_tz::America::Sao_Paulo)?,
            api_base_url: required(&lookup, "API_BASE_URL")?,
            api_token: required(&lookup, "API_TOKEN")?,
            api_utc_offset_hours: parse(&lookup, "API_UTC_OFFSET_HOURS", -3)?,
            sync_schedule,
            admin_token: required(&lookup, "ADMIN_TOKEN")?,
            port: parse(&lookup, "PORT", 8080)?,
            database_path: lookup("DATABASE_PATH")
                .map_or_else(|| PathBuf::from("catraca.db"), PathBuf::from),
            lock_dir: lookup("LOCK_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from),
            rate_limit_per_minute: parse(&lookup, "RATE_LIMIT_PER_MINUTE", 60)?,
        })
    }
}

const DEFAULT_SYNC_CRON: &str = "0 */10 * * * *";

fn parse_cron(raw: &str) -> anyhow::Result<Schedule> {
    let expression = raw.trim();
    let expression = if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    Schedule::from_str(&expression).map_err(|e| anyhow!("SYNC_CRON has invalid value {raw:?}: {e}"))
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<String> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("{key} must be set"))
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}
