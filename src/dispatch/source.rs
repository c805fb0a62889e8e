//! Source-side dispatch loop
//!
//! Walks the target's byte range front to back, handing one IO task at a
//! time to whichever worker slot frees up first. Workers may therefore run
//! operations out of order relative to each other; the E2E sequence number
//! on each task is what lets the destination reorder. The loop is paced
//! purely by slot availability and never waits for an individual task.

use super::e2e;
use super::monitor;
use super::{reserve_timestamp, GateVerdict, PassError, PassGate, TargetContext};
use crate::pool::{Side, Task, TaskKind, WorkerPool};
use crate::util::cancel::CancelToken;
use crate::util::time::Timestamp;
use std::io::Write;

/// Run one source-side pass
///
/// Issues IO tasks until the target's byte count is exhausted, the gate
/// stops the pass, or the cancel token trips. Normal and gate-stopped
/// passes finish with the end-of-data fan-out and a pass-drain; a cancelled
/// pass sends no end-of-data, leaving the destination to time out on its
/// own, which is the intended shutdown path for a killed source.
pub fn run_source_pass(
    ctx: &mut TargetContext,
    pool: &WorkerPool,
    gate: &mut dyn PassGate,
    cancel: &CancelToken,
    sink: &mut dyn Write,
) {
    while ctx.bytes_remaining > 0 {
        let worker = match pool.acquire_any_available(Side::Source, cancel) {
            Some(worker) => worker,
            None => break,
        };
        if cancel.is_cancelled() {
            pool.mark_idle(worker);
            break;
        }
        if gate.before_io(ctx) == GateVerdict::Stop {
            pool.mark_idle(worker);
            break;
        }

        let task = setup_task(ctx, pool, worker);
        let size = task.size.unwrap_or(0);
        ctx.bytes_issued += size;
        ctx.bytes_remaining -= size;
        ctx.current_offset += size;
        ctx.current_op += 1;
        debug_assert_eq!(ctx.bytes_issued + ctx.bytes_remaining, ctx.total_bytes);

        if ctx.options.e2e_source_monitor {
            monitor::report_progress(ctx, pool, sink);
        }

        pool.release(worker, task);
    }

    if cancel.is_cancelled() {
        let _ = writeln!(sink, "run_source_pass: target {}: canceled", ctx.target_id);
        return;
    }

    e2e::emit_end_of_data(ctx, pool);

    // Pass-drain: force every slot idle so the next pass can reuse the pool
    for worker in 0..pool.queue_depth() {
        pool.mark_idle(worker);
        if cancel.is_cancelled() {
            let _ = writeln!(
                sink,
                "run_source_pass: target {}: canceled during drain",
                ctx.target_id
            );
            break;
        }
    }

    if ctx.last_io_status != 0 {
        ctx.error = Some(PassError::Io);
    }
}

/// Build the next IO task for `worker` and advance the timestamp ring
///
/// The final task of a pass may be short: its size is whatever remains of
/// the target's byte count.
fn setup_task(ctx: &mut TargetContext, pool: &WorkerPool, worker: usize) -> Task {
    let op_kind = ctx.op_kind(ctx.current_op);
    let size = ctx.io_size.min(ctx.bytes_remaining);
    let sequence = e2e::next_sequence(ctx);
    if ctx.current_op == 0 {
        ctx.first_op_start = Some(Timestamp::now());
    }
    let ts_index = reserve_timestamp(
        ctx,
        pool,
        worker,
        op_kind,
        ctx.current_op as i64,
        ctx.current_offset as i64,
    );
    Task {
        kind: TaskKind::Io,
        op_kind,
        op_number: ctx.current_op,
        byte_offset: Some(ctx.current_offset),
        size: Some(size),
        sequence: Some(sequence),
        ts_index,
    }
}
