//! Source-side progress monitor
//!
//! Periodic lead/lag diagnostics for the worker slots of an E2E source.
//! Purely observational; never affects dispatch decisions.

use super::TargetContext;
use crate::pool::WorkerPool;
use std::io::Write;

/// Emit one diagnostic line every `queue_depth` operations
///
/// Partitions the slots into busy and available, finds the busy slots
/// furthest ahead and furthest behind, and reports their operation numbers,
/// worker indices, separation, the busy count, and percent complete.
pub fn report_progress(ctx: &TargetContext, pool: &WorkerPool, sink: &mut dyn Write) {
    if ctx.current_op == 0 || ctx.current_op % ctx.queue_depth as u64 != 0 {
        return;
    }

    let mut min: Option<(u64, usize)> = None;
    let mut max: Option<(u64, usize)> = None;
    let mut busy = 0usize;
    for view in pool.slot_views() {
        if !view.busy {
            continue;
        }
        busy += 1;
        if min.map_or(true, |(op, _)| view.current_op < op) {
            min = Some((view.current_op, view.index));
        }
        if max.map_or(true, |(op, _)| view.current_op > op) {
            max = Some((view.current_op, view.index));
        }
    }
    let (Some((opmin, qmin)), Some((opmax, qmax))) = (min, max) else {
        return;
    };

    let percent = if ctx.target_ops > 0 {
        opmax * 100 / ctx.target_ops
    } else {
        0
    };
    let _ = writeln!(
        sink,
        "monitor: target {}: opmin {}, qmin {}, opmax {}, qmax {}, separation {}, {} workers busy, {} percent complete",
        ctx.target_id,
        opmin,
        qmin,
        opmax,
        qmax,
        opmax - opmin + 1,
        busy,
        percent
    );
}
