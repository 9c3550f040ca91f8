// src/auth/rate_limit.rs
//! Sliding-window rate limiter
//!
//! Each caller owns a queue of recent request instants. Every `check` first
//! drops entries older than the window, then admits the request only if the
//! queue is below the ceiling. There is no background timer; state lives in
//! the limiter instance and disappears with it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::consts::{
    DEFAULT_RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_WINDOW_SECS, RATE_LIMIT_SWEEP_THRESHOLD,
};
use crate::error::{Result, VaultError};

/// Source of monotonic time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

pub struct SlidingWindowRateLimiter {
    max_requests: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request from `caller`, or reject it with retry guidance
    pub fn check(&self, caller: &str) -> Result<()> {
        let now = self.clock.now();
        let window = self.window;
        let mut hits = self.hits.lock();

        if hits.len() >= RATE_LIMIT_SWEEP_THRESHOLD {
            hits.retain(|_, q| q.back().is_some_and(|t| now.duration_since(*t) < window));
        }

        let queue = hits.entry(caller.to_string()).or_default();
        while queue
            .front()
            .is_some_and(|t| now.duration_since(*t) >= window)
        {
            queue.pop_front();
        }

        if queue.len() >= self.max_requests {
            let oldest = queue.front().copied().unwrap_or(now);
            let wait = window.saturating_sub(now.duration_since(oldest));
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return Err(VaultError::RateLimited {
                retry_after_secs: secs.max(1),
            });
        }

        queue.push_back(now);
        Ok(())
    }

    /// Requests `caller` may still make in the current window
    pub fn remaining(&self, caller: &str) -> usize {
        let now = self.clock.now();
        let hits = self.hits.lock();
        let used = hits.get(caller).map_or(0, |q| {
            q.iter()
                .filter(|t| now.duration_since(**t) < self.window)
                .count()
        });
        self.max_requests.saturating_sub(used)
    }

    pub fn tracked_callers(&self) -> usize {
        self.hits.lock().len()
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_RATE_LIMIT_MAX,
            Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        )
    }
}
