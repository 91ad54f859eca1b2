use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

/// Fixed-window request counter, one counter per scope key.
///
/// Counters are process-local and best-effort: no cross-instance
/// coordination. The window resets when the epoch minute rolls over, the
/// same reset-on-first-increment shape the usual INCR/EXPIRE counter has.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
}

struct Window {
    /// Epoch minute the current window started in.
    started: u64,
    count: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Record one request against `key` and report whether it fits within
    /// `limit_per_minute`. The entry lock makes increment-and-compare atomic
    /// per key under concurrent callers.
    pub fn allow(&self, key: &str, limit_per_minute: u32) -> bool {
        let minute = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() / 60)
            .unwrap_or(0);
        self.allow_at(key, limit_per_minute, minute)
    }

    fn allow_at(&self, key: &str, limit_per_minute: u32, minute: u64) -> bool {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: minute,
            count: 0,
        });
        if entry.started != minute {
            entry.started = minute;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        entry.count <= limit_per_minute
    }

    /// Drop stale windows so long-lived processes don't accumulate one
    /// entry per address seen. Called from a background sweep.
    pub fn evict_expired(&self) -> usize {
        let minute = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() / 60)
            .unwrap_or(0);
        let before = self.windows.len();
        self.windows.retain(|_, w| w.started >= minute.saturating_sub(1));
        before - self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
