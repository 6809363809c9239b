//! Sliding-window login throttle, keyed by login identifier.
//!
//! Time is injected through the Clock trait so the window behavior is
//! testable without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-enough time source in whole seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Bounded sliding-window counter. Entries outside the window are pruned
/// on every touch, so the map only holds identifiers seen recently.
pub struct LoginRateLimiter {
    max_attempts: u32,
    window_secs: u64,
    clock: Arc<dyn Clock>,
    attempts: Mutex<HashMap<String, Vec<u64>>>,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: u32, window_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_attempts,
            window_secs,
            clock,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key` and report whether it is allowed.
    pub fn allow(&self, key: &str) -> bool {
        let now = self.clock.now_secs();
        let cutoff = now.saturating_sub(self.window_secs);

        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            // A poisoned map only loses throttle history.
            Err(poisoned) => poisoned.into_inner(),
        };
        attempts.retain(|_, stamps| {
            stamps.retain(|s| *s > cutoff);
            !stamps.is_empty()
        });

        let stamps = attempts.entry(key.to_string()).or_default();
        if stamps.len() >= self.max_attempts as usize {
            return false;
        }
        stamps.push(now);
        true
    }

    /// Forget the history for `key`. Called after a successful login.
    pub fn reset(&self, key: &str) {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        attempts.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_secs(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let clock = Arc::new(ManualClock(AtomicU64::new(1000)));
        let limiter = LoginRateLimiter::new(3, 60, clock.clone());

        assert!(limiter.allow("m1"));
        assert!(limiter.allow("m1"));
        assert!(limiter.allow("m1"));
        assert!(!limiter.allow("m1"));
        // Other identifiers are untouched.
        assert!(limiter.allow("m2"));
    }

    #[test]
    fn window_expiry_restores_allowance() {
        let clock = Arc::new(ManualClock(AtomicU64::new(1000)));
        let limiter = LoginRateLimiter::new(2, 60, clock.clone());

        assert!(limiter.allow("m1"));
        assert!(limiter.allow("m1"));
        assert!(!limiter.allow("m1"));

        clock.advance(61);
        assert!(limiter.allow("m1"));
    }

    #[test]
    fn reset_clears_history() {
        let clock = Arc::new(ManualClock(AtomicU64::new(1000)));
        let limiter = LoginRateLimiter::new(1, 60, clock);

        assert!(limiter.allow("m1"));
        assert!(!limiter.allow("m1"));
        limiter.reset("m1");
        assert!(limiter.allow("m1"));
    }
}
