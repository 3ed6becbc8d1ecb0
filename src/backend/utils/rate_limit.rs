use super::error::{BackendError, BackendResult};
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    window_start: Instant,
}

/// Fixed-window request counter per client ip.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    limit: u32,
    window: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new(enabled: bool, limit: u32, window: Duration) -> Self {
        Self {
            enabled,
            limit,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, ip: &str) -> BackendResult<()> {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: &str, now: Instant) -> BackendResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(ip.to_string()).or_insert(Entry {
            count: 0,
            window_start: now,
        });
        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }
        if entry.count >= self.limit {
            return Err(BackendError::TooManyRequests);
        }
        entry.count += 1;
        Ok(())
    }

    /// Drop entries whose window started more than two windows ago. Returns the number of
    /// removed entries.
    pub fn purge_stale(&self) -> usize {
        self.purge_stale_at(Instant::now())
    }

    fn purge_stale_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        let max_age = self.window * 2;
        entries.retain(|_, e| now.duration_since(e.window_start) <= max_age);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
