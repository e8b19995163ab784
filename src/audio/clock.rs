//! Monotonic time sources used for fade timing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Seconds on a non-decreasing clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

impl<F> Clock for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn now(&self) -> f64 {
        self()
    }
}

/// Wall-independent clock backed by [`Instant`], starting at zero.
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock that only moves when told to. Useful for offline rendering and tests.
#[derive(Default)]
pub struct ManualClock {
    seconds: AtomicU64, // f64 bits
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, seconds: f64) {
        self.seconds.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Acquire))
    }
}
