//! Destination-side dispatch loop
//!
//! The destination does not know how many bytes are coming; it keeps
//! handing receive tasks to available workers until every worker slot has
//! observed an end-of-data marker from its source peer. Receive tasks are
//! issued with offset and size unresolved; the worker learns both from the
//! header of the data it receives and writes the payload where the header
//! says.

use super::{reserve_timestamp, PassError, TargetContext};
use crate::config::OpKind;
use crate::pool::{Side, Task, TaskKind, WorkerPool};
use crate::util::cancel::CancelToken;
use crate::util::time::Timestamp;
use std::io::Write;

/// Run one destination-side pass
///
/// Terminates when every slot has observed end-of-data or the cancel token
/// trips. The pass-drain runs on both paths so a later pass can reuse the
/// pool after cancellation.
pub fn run_destination_pass(
    ctx: &mut TargetContext,
    pool: &WorkerPool,
    cancel: &CancelToken,
    sink: &mut dyn Write,
) {
    loop {
        let worker = match pool.acquire_any_available(Side::Destination, cancel) {
            Some(worker) => worker,
            None => break,
        };
        if cancel.is_cancelled() {
            pool.mark_idle(worker);
            break;
        }
        if ctx.current_op == 0 {
            ctx.first_op_start = Some(Timestamp::now());
        }
        // Offset and size stay unresolved until the worker sees the data;
        // the timestamp entry is back-filled the same way
        let ts_index = reserve_timestamp(ctx, pool, worker, OpKind::Write, -1, -1);
        pool.release(
            worker,
            Task {
                kind: TaskKind::Io,
                op_kind: OpKind::Write,
                op_number: ctx.current_op,
                byte_offset: None,
                size: None,
                sequence: None,
                ts_index,
            },
        );
        ctx.current_op += 1;
    }

    if cancel.is_cancelled() {
        let _ = writeln!(
            sink,
            "run_destination_pass: target {}: canceled",
            ctx.target_id
        );
    }

    // Pass-drain runs even after cancellation
    for worker in 0..pool.queue_depth() {
        pool.mark_idle(worker);
    }

    if ctx.last_io_status != 0 {
        ctx.error = Some(PassError::Io);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TargetConfig, TargetOptions};
    use crate::pattern::DataPatternSpec;
    use crate::timestamp::{TimestampConfig, TsPolicy, TsState};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::thread;

    fn context(queue_depth: usize) -> TargetContext {
        TargetContext::new(&TargetConfig {
            target_id: 1,
            queue_depth,
            block_size: 4096,
            io_size: 8,
            total_bytes: 0, // unknown on the destination side
            options: TargetOptions::default(),
            pattern: DataPatternSpec::default(),
            timestamp: Some(TimestampConfig {
                size: 16,
                policy: TsPolicy::OneShot,
            }),
            max_errors_to_print: 10,
        })
    }

    /// Drive a pass with one consuming thread per slot. Each worker treats
    /// the shared budget as the incoming data stream: while it holds out,
    /// tasks complete normally; once exhausted, the next task plays the
    /// part of the end-of-data marker from the source peer.
    fn run_with_workers(ctx: &mut TargetContext, pool: &WorkerPool, budget: i64) -> Vec<usize> {
        let cancel = CancelToken::new();
        let mut sink = Vec::new();
        let budget = AtomicI64::new(budget);
        thread::scope(|s| {
            let handles: Vec<_> = (0..pool.queue_depth())
                .map(|i| {
                    let rx = pool.take_receiver(i).unwrap();
                    let pool = &*pool;
                    let budget = &budget;
                    s.spawn(move || {
                        let mut received = 0usize;
                        while let Ok(task) = rx.recv() {
                            assert_eq!(task.kind, TaskKind::Io);
                            assert_eq!(task.byte_offset, None);
                            assert_eq!(task.size, None);
                            assert_eq!(task.sequence, None);
                            if budget.fetch_sub(1, Ordering::SeqCst) > 0 {
                                received += 1;
                                pool.mark_idle(i);
                            } else {
                                pool.observe_end_of_data(i);
                                break;
                            }
                        }
                        received
                    })
                })
                .collect();

            run_destination_pass(ctx, pool, &cancel, &mut sink);
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_pass_runs_until_all_slots_see_end_of_data() {
        let mut ctx = context(2);
        let pool = WorkerPool::new(2);

        let received = run_with_workers(&mut ctx, &pool, 3);

        assert_eq!(received.iter().sum::<usize>(), 3);
        assert!(ctx.error.is_none());
        // Drain left the pool idle despite the retained end-of-data slots
        assert_eq!(pool.busy_count(), 0);
        assert!(ctx.first_op_start.is_some());
    }

    #[test]
    fn test_timestamp_entries_left_unresolved() {
        let mut ctx = context(1);
        let pool = WorkerPool::new(1);

        run_with_workers(&mut ctx, &pool, 2);

        let entry = ctx.timestamps.entry(0);
        assert_eq!(entry.state, TsState::Reserved);
        assert_eq!(entry.op_kind, OpKind::Write);
        assert_eq!(entry.op_number, -1);
        assert_eq!(entry.byte_offset, -1);
    }

    #[test]
    fn test_cancelled_pass_drains_and_pool_is_reusable() {
        let mut ctx = context(2);
        let pool = WorkerPool::new(2);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut sink = Vec::new();

        run_destination_pass(&mut ctx, &pool, &cancel, &mut sink);

        assert_eq!(ctx.current_op, 0);
        let log = String::from_utf8(sink).unwrap();
        assert!(log.contains("canceled"));
        assert_eq!(pool.busy_count(), 0);

        pool.reset_for_pass();
        let fresh = CancelToken::new();
        assert!(pool
            .acquire_any_available(Side::Destination, &fresh)
            .is_some());
    }
}
