//! Cooperative cancellation
//!
//! A `CancelToken` is a cloneable handle to a shared cancel flag. The
//! dispatch loops poll it at iteration boundaries; in-flight worker tasks are
//! never forcibly stopped. Tokens are injected into each transfer rather
//! than held in a process-wide global, so independent transfers can run
//! concurrently with independent cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, read-mostly cancel/abort flag for one transfer
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, untripped token
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. All clones observe the cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_visible_through_clones() {
        let token = CancelToken::new();
        let other = token.clone();

        assert!(!token.is_cancelled());
        assert!(!other.is_cancelled());

        other.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_tokens_are_independent() {
        let a = CancelToken::new();
        let b = CancelToken::new();

        a.cancel();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
    }
}
