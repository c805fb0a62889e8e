//! Monotonic clock wrapper
//!
//! The dispatcher only needs an opaque "now" and elapsed-time reads; this is
//! a thin wrapper around `std::time::Instant` for those call sites.

use std::time::{Duration, Instant};

/// Monotonic timestamp
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    instant: Instant,
}

impl Timestamp {
    /// Create a timestamp representing the current time
    #[inline]
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
        }
    }

    /// Get the elapsed time since this timestamp
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    /// Get the duration between this timestamp and an earlier one
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> Duration {
        self.instant.duration_since(earlier.instant)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}
