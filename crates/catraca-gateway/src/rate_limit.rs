//! Fixed-window request limiter keyed by source address.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, (Instant, u32)>>,
}

impl RateLimiter {
    /// Allow `limit` requests per address per minute.
    pub fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: WINDOW,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request from `addr`; `false` once the window is used up.
    pub fn check(&self, addr: IpAddr) -> bool {
        self.check_at(addr, Instant::now())
    }

    fn check_at(&self, addr: IpAddr, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());

        // Drop expired windows.
        hits.retain(|_, (started, _)| now.duration_since(*started) < self.window);

        let (_, count) = hits.entry(addr).or_insert((now, 0));
        if *count >= self.limit {
            return false;
        }
        *count += 1;
        true
    }
}
