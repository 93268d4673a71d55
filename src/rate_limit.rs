//! Process-local sliding-window rate limiter for the credential endpoints
//! and anonymous page-view tracking.
//!
//! State lives in this process only; a horizontally scaled deployment gets
//! per-instance throttling, not a global limit.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_attempts: usize,
    window: Duration,
    attempts: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            window,
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn check(&self, ip: IpAddr, scope: &str) -> Decision {
        self.check_at(ip, scope, Instant::now())
    }

    /// Records one attempt for `ip` within `scope` unless the window is full.
    pub fn check_at(&self, ip: IpAddr, scope: &str, now: Instant) -> Decision {
        let key = format!("{ip}:{scope}");
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let list = attempts.entry(key).or_default();
        list.retain(|&t| now.duration_since(t) < self.window);

        if list.len() >= self.max_attempts {
            let oldest = list.first().copied().unwrap_or(now);
            let retry_after = self
                .window
                .saturating_sub(now.duration_since(oldest))
                .max(Duration::from_secs(1));
            return Decision::Limited { retry_after };
        }

        list.push(now);
        Decision::Allowed {
            remaining: self.max_attempts - list.len(),
        }
    }

    /// Drops keys whose attempts have all left the window.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub fn prune_at(&self, now: Instant) -> usize {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = attempts.len();
        attempts.retain(|_, list| {
            list.retain(|&t| now.duration_since(t) < self.window);
            !list.is_empty()
        });
        before - attempts.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.attempts.lock().map(|a| a.len()).unwrap_or(0)
    }
}
