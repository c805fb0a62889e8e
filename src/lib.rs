//! iodrive - task dispatch and data integrity core for an IO exerciser
//!
//! iodrive drives a bounded pool of worker threads through many concurrent
//! read/write operations against a target (disk, file, or network endpoint),
//! optionally splitting a transfer across two cooperating instances: a source
//! side that reads data and streams it out, and a destination side that
//! receives and writes it (end-to-end, E2E, mode).
//!
//! # Architecture
//!
//! - **Worker pool**: fixed set of worker slots per target with a
//!   lock-protected busy flag and a fire-and-forget task handoff channel
//! - **Dispatch loops**: the source variant assigns sequential IO tasks by
//!   byte count; the destination variant assigns receive tasks by per-worker
//!   liveness and stops once every worker has seen an end-of-data marker
//! - **Verification engine**: post-read checks of buffer location and
//!   contents against configured binary data patterns
//! - **Timestamp ring**: two-phase per-operation trace entries, reserved by
//!   the dispatcher and completed by the workers
//!
//! The worker execution loop itself, the transport, and statistics reporting
//! are external collaborators; this crate owns the handoff, sequencing, and
//! data-integrity rules between them.

pub mod config;
pub mod dispatch;
pub mod pattern;
pub mod pool;
pub mod timestamp;
pub mod util;
pub mod verify;

// Re-export commonly used types
pub use config::TargetConfig;
pub use dispatch::TargetContext;
pub use pool::WorkerPool;

/// Result type used throughout iodrive
pub type Result<T> = anyhow::Result<T>;
