//! Abstraction over time to enable deterministic tests
//!
//! Cache TTL and blacklist expiry are both lazy comparisons against "now",
//! so injecting a clock is enough to test them without sleeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of the current instant
pub trait Clock: Send + Sync {
    /// Return the current instant
    fn now(&self) -> Instant;
}

/// Clock implementation using `Instant::now()` for production
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only advances when instructed, for deterministic tests
#[derive(Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a new manual clock starting at the current instant
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Manually advance the clock by `delta`
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_only_on_request() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now(), start + Duration::from_secs(30));
    }
}
