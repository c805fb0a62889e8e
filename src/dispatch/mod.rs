//! Task dispatch
//!
//! One dispatch loop per target hands tasks to that target's worker pool for
//! the duration of a pass. The source variant assigns sequential IO tasks by
//! byte count and finishes with an end-of-data fan-out; the destination
//! variant assigns receive tasks for as long as any worker is still live.
//! Both end with a pass-drain that forces every slot idle so the pool can be
//! reused for the next pass.
//!
//! The dispatch loop never waits for an individual task to complete; workers
//! rendezvous at a separate pass-completion barrier owned by the embedding
//! tool.

pub mod dest;
pub mod e2e;
pub mod monitor;
pub mod source;

use crate::config::{OpKind, TargetConfig, TargetOptions};
use crate::pattern::DataPatternSpec;
use crate::pool::WorkerPool;
use crate::timestamp::{TimestampTable, TsIssue};
use crate::util::time::Timestamp;
use crate::verify::Verifier;
use thiserror::Error;

/// Error recorded in a target's error slot and consulted after each pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PassError {
    /// A worker reported a failed IO; the failing status lives in
    /// `TargetContext::last_io_status`
    #[error("I/O error during pass")]
    Io,
}

/// Verdict of the pre-IO gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Continue,
    /// Normal pass termination (time or pass limit reached); not an error
    Stop,
}

/// Pre-IO gate evaluated before each source-side task is built
///
/// The embedding tool supplies the real implementation (elapsed-time and
/// pass-limit checks); the dispatch loop only consumes the verdict.
pub trait PassGate {
    fn before_io(&mut self, ctx: &TargetContext) -> GateVerdict;
}

/// Gate that never stops the pass
#[derive(Debug, Default)]
pub struct Unlimited;

impl PassGate for Unlimited {
    fn before_io(&mut self, _ctx: &TargetContext) -> GateVerdict {
        GateVerdict::Continue
    }
}

/// Gate that stops the pass after a fixed number of operations
#[derive(Debug)]
pub struct OpCountGate {
    remaining: u64,
}

impl OpCountGate {
    pub fn new(ops: u64) -> Self {
        Self { remaining: ops }
    }
}

impl PassGate for OpCountGate {
    fn before_io(&mut self, _ctx: &TargetContext) -> GateVerdict {
        if self.remaining == 0 {
            return GateVerdict::Stop;
        }
        self.remaining -= 1;
        GateVerdict::Continue
    }
}

/// Per-target transfer state, owned by the dispatch loop for one pass
#[derive(Debug)]
pub struct TargetContext {
    pub target_id: u32,
    pub queue_depth: usize,
    pub io_size: u64,
    pub block_size: u64,
    pub total_bytes: u64,
    pub bytes_remaining: u64,
    pub bytes_issued: u64,
    pub current_op: u64,
    pub current_pass: u32,
    pub current_offset: u64,
    /// Total operations one full pass issues
    pub target_ops: u64,
    /// Precomputed per-operation descriptors, indexed by op number
    pub ops: Vec<OpKind>,
    pub options: TargetOptions,
    pub pattern: DataPatternSpec,
    pub max_errors_to_print: u64,
    /// E2E message sequence counter, advanced once per issued IO task
    pub sequence: u64,
    /// Status of the most recent IO, written by workers; nonzero means the
    /// pass failed
    pub last_io_status: i32,
    /// Error slot consulted by the caller after the pass
    pub error: Option<PassError>,
    pub first_op_start: Option<Timestamp>,
    pub timestamps: TimestampTable,
}

impl TargetContext {
    /// Build a context from a validated target configuration
    ///
    /// The per-operation descriptors default to reads (the source side of an
    /// E2E transfer reads data and streams it out); use [`set_ops`] for
    /// mixed sequences. The destination side ignores the descriptors.
    ///
    /// [`set_ops`]: TargetContext::set_ops
    pub fn new(config: &TargetConfig) -> Self {
        let target_ops = config.target_ops();
        Self {
            target_id: config.target_id,
            queue_depth: config.queue_depth,
            io_size: config.io_size,
            block_size: config.block_size,
            total_bytes: config.total_bytes,
            bytes_remaining: config.total_bytes,
            bytes_issued: 0,
            current_op: 0,
            current_pass: 1,
            current_offset: 0,
            target_ops,
            ops: vec![OpKind::Read; target_ops as usize],
            options: config.options,
            pattern: config.pattern.clone(),
            max_errors_to_print: config.max_errors_to_print,
            sequence: 0,
            last_io_status: 0,
            error: None,
            first_op_start: None,
            timestamps: TimestampTable::new(config.timestamp),
        }
    }

    /// Replace the per-operation descriptors
    pub fn set_ops(&mut self, ops: Vec<OpKind>) {
        self.ops = ops;
    }

    /// Descriptor for an op number; past-the-end ops are no-ops
    pub fn op_kind(&self, op_number: u64) -> OpKind {
        self.ops
            .get(op_number as usize)
            .copied()
            .unwrap_or(OpKind::NoOp)
    }

    /// Reset counters for the next pass; the sequence counter and timestamp
    /// ring continue across passes
    pub fn begin_pass(&mut self) {
        self.current_pass += 1;
        self.bytes_remaining = self.total_bytes;
        self.bytes_issued = 0;
        self.current_op = 0;
        self.current_offset = 0;
        self.last_io_status = 0;
        self.error = None;
        self.first_op_start = None;
    }

    /// Verification engine configured for this target
    pub fn verifier(&self) -> Verifier<'_> {
        Verifier::new(
            self.target_id,
            self.options,
            &self.pattern,
            self.block_size,
            self.max_errors_to_print,
        )
    }
}

/// Claim a timestamp ring entry for a task being issued to `worker` and
/// write the static fields. The worker fills in sizes (and, on the
/// destination side, op number and offset) after completion.
pub(crate) fn reserve_timestamp(
    ctx: &mut TargetContext,
    pool: &WorkerPool,
    worker: usize,
    op_kind: OpKind,
    op_number: i64,
    byte_offset: i64,
) -> Option<usize> {
    let issue = TsIssue {
        pass_number: ctx.current_pass,
        worker_index: worker,
        thread_id: pool.thread_id(worker),
        op_kind,
        op_number,
        byte_offset,
    };
    ctx.timestamps.reserve(issue)
}
