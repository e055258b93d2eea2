//! Sliding-window limit on guest session starts per client.

use dashmap::DashMap;
use histchat_core::config::StartLimitConfig;
use histchat_core::error::{HistchatError, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Counts `Start` calls per client key (e.g. remote address) over a
/// sliding window.
pub struct StartThrottle {
    max_starts: usize,
    window: Duration,
    starts: DashMap<String, VecDeque<Instant>>,
}

impl StartThrottle {
    pub fn new(max_starts: u32, window: Duration) -> Self {
        Self {
            max_starts: max_starts as usize,
            window,
            starts: DashMap::new(),
        }
    }

    pub fn from_config(config: &StartLimitConfig) -> Self {
        Self::new(config.max_starts, Duration::from_secs(config.window_seconds))
    }

    /// Records a start for `client_key` at `now`, or fails with `RateLimited`.
    pub fn check(&self, client_key: &str, now: Instant) -> Result<()> {
        let mut starts = self.starts.entry(client_key.to_string()).or_default();

        while let Some(oldest) = starts.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                starts.pop_front();
            } else {
                break;
            }
        }

        if starts.len() >= self.max_starts {
            let oldest = starts.front().copied().unwrap_or(now);
            let wait = self
                .window
                .saturating_sub(now.saturating_duration_since(oldest));
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return Err(HistchatError::RateLimited {
                retry_after_secs: retry_after_secs.max(1),
            });
        }

        starts.push_back(now);
        Ok(())
    }

    /// Drops clients with no starts inside the window.
    pub fn prune(&self, now: Instant) {
        self.starts.retain(|_, starts| {
            starts
                .back()
                .is_some_and(|last| now.saturating_duration_since(*last) < self.window)
        });
    }
}
