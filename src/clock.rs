//! Monotonic clock abstraction.
//!
//! The control loop and every time-based rule (ramp-up delay, pause
//! hysteresis debounce, station liveness) reason in elapsed seconds since an
//! arbitrary origin, never wall-clock time, so an NTP step never perturbs a
//! tick's decisions. Tests inject a `TestClock` to drive `now()` directly
//! instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A source of monotonic seconds.
pub trait Clock: Send + Sync {
    /// Seconds elapsed since the clock was created. Must never go backwards.
    fn now(&self) -> f64;
}

/// Production clock backed by `std::time::Instant`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Test clock settable by fixtures. Stores the current time as bits of an
/// `f64` inside an `AtomicU64` so it can be shared across threads/tasks
/// without a mutex.
#[derive(Clone)]
pub struct TestClock {
    now_bits: Arc<AtomicU64>,
}

impl TestClock {
    pub fn new(start: f64) -> Self {
        Self {
            now_bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, t: f64) {
        self.now_bits.store(t.to_bits(), Ordering::SeqCst);
    }

    /// Advance the clock by `delta` seconds.
    pub fn advance(&self, delta: f64) {
        let current = f64::from_bits(self.now_bits.load(Ordering::SeqCst));
        self.set(current + delta);
    }
}

impl Clock for TestClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.now_bits.load(Ordering::SeqCst))
    }
}
