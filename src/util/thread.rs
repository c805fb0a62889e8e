//! Thread identification
//!
//! Worker threads register their numeric thread id with the pool so the
//! dispatcher can record it in timestamp entries.

/// Get the OS-level id of the calling thread
///
/// Returns 0 on platforms without a numeric thread id.
pub fn current_thread_id() -> u64 {
    #[cfg(target_os = "linux")]
    {
        // SAFETY: gettid has no preconditions and cannot fail
        unsafe { libc::gettid() as u64 }
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}
