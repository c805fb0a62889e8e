//! E2E sequencing and end-of-data fan-out
//!
//! The source side of an E2E transfer stamps every outbound IO task with a
//! monotonically increasing message sequence number, and closes the pass by
//! fanning an end-of-data task out to every worker slot so each destination
//! worker learns that no more data is coming on its channel.
//!
//! End-of-data tasks deliberately do not consume a sequence number; whether
//! the destination protocol could rely on sequence continuity for loss
//! detection is an open question, and both behaviors are preserved as-is.

use super::{reserve_timestamp, TargetContext};
use crate::config::OpKind;
use crate::pool::{Task, TaskKind, WorkerPool};

/// Take the next E2E message sequence number for an outbound IO task
#[inline]
pub fn next_sequence(ctx: &mut TargetContext) -> u64 {
    let sequence = ctx.sequence;
    ctx.sequence += 1;
    sequence
}

/// Fan an end-of-data task out to every worker slot, busy or not
///
/// Each slot gets the marker exactly once. Timestamp entries for the
/// fan-out are tagged with the end-of-data op kind and the negated worker
/// index as op number, so they stand out from data operations in dumps.
/// This call does not wait; the pass-drain that follows it is what
/// ultimately synchronizes.
pub fn emit_end_of_data(ctx: &mut TargetContext, pool: &WorkerPool) {
    for worker in 0..pool.queue_depth() {
        let ts_index = reserve_timestamp(ctx, pool, worker, OpKind::Eof, -(worker as i64), -1);
        pool.release(
            worker,
            Task {
                kind: TaskKind::EndOfData,
                op_kind: OpKind::Eof,
                op_number: ctx.current_op,
                byte_offset: None,
                size: None,
                sequence: None,
                ts_index,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TargetConfig, TargetOptions};
    use crate::pattern::DataPatternSpec;
    use crate::timestamp::{TimestampConfig, TsPolicy};

    fn context_with_timestamps(queue_depth: usize) -> TargetContext {
        TargetContext::new(&TargetConfig {
            target_id: 0,
            queue_depth,
            block_size: 4096,
            io_size: 8,
            total_bytes: 64,
            options: TargetOptions::default(),
            pattern: DataPatternSpec::default(),
            timestamp: Some(TimestampConfig {
                size: 8,
                policy: TsPolicy::OneShot,
            }),
            max_errors_to_print: 10,
        })
    }

    #[test]
    fn test_sequence_strictly_increases() {
        let mut ctx = context_with_timestamps(1);
        assert_eq!(next_sequence(&mut ctx), 0);
        assert_eq!(next_sequence(&mut ctx), 1);
        assert_eq!(next_sequence(&mut ctx), 2);
    }

    #[test]
    fn test_fan_out_reaches_every_slot_once() {
        let mut ctx = context_with_timestamps(2);
        let pool = WorkerPool::new(2);
        let rx0 = pool.take_receiver(0).unwrap();
        let rx1 = pool.take_receiver(1).unwrap();

        emit_end_of_data(&mut ctx, &pool);

        for rx in [&rx0, &rx1] {
            let task = rx.try_recv().unwrap();
            assert_eq!(task.kind, TaskKind::EndOfData);
            assert_eq!(task.op_kind, OpKind::Eof);
            // End-of-data carries no sequence number
            assert_eq!(task.sequence, None);
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_fan_out_timestamp_entries_are_marked() {
        let mut ctx = context_with_timestamps(2);
        let pool = WorkerPool::new(2);

        emit_end_of_data(&mut ctx, &pool);

        let entries = ctx.timestamps.entries();
        assert_eq!(entries[0].op_kind, OpKind::Eof);
        assert_eq!(entries[0].op_number, 0);
        assert_eq!(entries[1].op_number, -1);
        assert_eq!(entries[1].byte_offset, -1);
        assert_eq!(entries[1].worker_index, 1);
    }
}
