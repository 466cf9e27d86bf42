//! Lightweight wall clock accounting for equation-system solves.
//!
//! Timing is off unless enabled programmatically or through the `NLS_TIMING`
//! environment variable. When off, timers cost one atomic load.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("NLS_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    start: Instant,
    enabled: bool,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Stop the timer and return elapsed time in seconds.
    /// If timing is disabled, returns None.
    pub fn stop(self) -> Option<f64> {
        self.enabled.then(|| self.start.elapsed().as_secs_f64())
    }

    /// Stop the timer and add the elapsed time to `times` if enabled.
    pub fn stop_into(self, times: &SolveTimes) {
        if let Some(elapsed) = self.stop() {
            times.record(elapsed);
        }
    }
}

/// Wall time of the solves of one system: total, count and slowest.
///
/// Atomic so it can be read through a shared reference while solving.
#[derive(Debug, Default)]
pub struct SolveTimes {
    total_ns: AtomicU64,
    slowest_ns: AtomicU64,
    count: AtomicU64,
}

impl SolveTimes {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            slowest_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn record(&self, seconds: f64) {
        let nanos = (seconds * 1e9) as u64;
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.slowest_ns.fetch_max(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    pub fn slowest_seconds(&self) -> f64 {
        self.slowest_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Number of timed solves (zero while timing is disabled).
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
