//! Shared utilities
//!
//! Small building blocks used across the dispatch and verification code:
//! cooperative cancellation, a monotonic clock wrapper, and thread
//! identification for timestamp entries.

pub mod cancel;
pub mod thread;
pub mod time;
