//! Worker pool and task handoff
//!
//! Each target owns a fixed set of worker slots, one per concurrency unit.
//! The dispatch loop acquires an available slot, fills in a task, and
//! releases it through a per-slot channel that wakes exactly that worker;
//! the release never waits for the task to complete. Workers mark their
//! slot idle when they finish, and on the destination side of an E2E
//! transfer they flag the slot once they receive an end-of-data marker,
//! which is how the destination loop learns the transfer is over.
//!
//! All slot bookkeeping (busy and end-of-data flags) lives under a single
//! pool-wide lock. Earlier designs of this protocol cleared the busy flag
//! without the lock on some paths; that is a latent race, and every
//! mutation here goes through the lock instead.

use crate::config::OpKind;
use crate::util::cancel::CancelToken;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// What a released worker should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Perform one IO (or receive+write) operation
    Io,
    /// Send the end-of-data marker to the peer worker and stop
    EndOfData,
}

/// One unit of work handed to a worker slot
///
/// The source side resolves every field at issue time. The destination side
/// issues receive tasks with `byte_offset` and `size` unresolved (`None`);
/// the worker learns them from the data it receives.
#[derive(Debug, Clone, Copy)]
pub struct Task {
    pub kind: TaskKind,
    pub op_kind: OpKind,
    pub op_number: u64,
    pub byte_offset: Option<u64>,
    pub size: Option<u64>,
    /// E2E message sequence number. Every IO task carries one; end-of-data
    /// tasks do not.
    pub sequence: Option<u64>,
    /// Reserved timestamp ring index, if recording is on
    pub ts_index: Option<usize>,
}

/// Which side of an E2E transfer is asking for a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    /// Excludes slots that already observed end-of-data; once all slots
    /// have, acquisition returns `None`
    Destination,
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotState {
    busy: bool,
    eof_observed: bool,
    /// Op number of the most recently released task, for the progress monitor
    current_op: u64,
    thread_id: u64,
}

/// Snapshot of one slot for diagnostics
#[derive(Debug, Clone, Copy)]
pub struct SlotView {
    pub index: usize,
    pub busy: bool,
    pub current_op: u64,
}

/// Fixed-size pool of worker slots for one target
pub struct WorkerPool {
    slots: Mutex<Vec<SlotState>>,
    available: Condvar,
    senders: Vec<Sender<Task>>,
    receivers: Mutex<Vec<Option<Receiver<Task>>>>,
}

impl WorkerPool {
    /// Create a pool with `queue_depth` worker slots
    pub fn new(queue_depth: usize) -> Self {
        assert!(queue_depth > 0, "queue_depth must be greater than 0");
        let mut senders = Vec::with_capacity(queue_depth);
        let mut receivers = Vec::with_capacity(queue_depth);
        for _ in 0..queue_depth {
            let (tx, rx) = unbounded();
            senders.push(tx);
            receivers.push(Some(rx));
        }
        Self {
            slots: Mutex::new(vec![SlotState::default(); queue_depth]),
            available: Condvar::new(),
            senders,
            receivers: Mutex::new(receivers),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.senders.len()
    }

    /// Scan for an available slot, mark it busy, and return its index
    ///
    /// Blocks in a condition wait until a slot qualifies. Returns `None`
    /// when the cancel token trips, or on the destination side once every
    /// slot has observed an end-of-data marker, which is the destination
    /// loop's termination signal.
    pub fn acquire_any_available(&self, side: Side, cancel: &CancelToken) -> Option<usize> {
        let mut slots = self.slots.lock().unwrap();
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if side == Side::Destination && slots.iter().all(|s| s.eof_observed) {
                return None;
            }
            let found = slots
                .iter()
                .position(|s| !s.busy && !(side == Side::Destination && s.eof_observed));
            if let Some(index) = found {
                slots[index].busy = true;
                return Some(index);
            }
            // Bounded wait so a cancellation with no worker activity still
            // gets noticed
            let (guard, _timeout) = self
                .available
                .wait_timeout(slots, Duration::from_millis(1))
                .unwrap();
            slots = guard;
        }
    }

    /// Publish a task to a slot and wake its worker
    ///
    /// Fire-and-forget: the call returns as soon as the task is in the
    /// slot's channel, without waiting for the worker to start or finish.
    /// End-of-data fan-out releases to every slot by index, busy or not.
    pub fn release(&self, index: usize, task: Task) {
        {
            let mut slots = self.slots.lock().unwrap();
            if task.kind == TaskKind::Io {
                slots[index].current_op = task.op_number;
            }
        }
        // A dropped receiver just means the worker already exited; the
        // task has nowhere to go and that is fine
        let _ = self.senders[index].send(task);
    }

    /// Clear a slot's busy flag under the lock
    ///
    /// Used by workers when a task finishes and by the pass-drain step,
    /// which forces every slot idle by index at the end of a pass. Drain is
    /// bookkeeping, not a completion acknowledgment.
    pub fn mark_idle(&self, index: usize) {
        let mut slots = self.slots.lock().unwrap();
        slots[index].busy = false;
        drop(slots);
        self.available.notify_all();
    }

    /// Destination worker side: record that this slot received an
    /// end-of-data marker. The slot stays unavailable for the rest of the
    /// pass.
    pub fn observe_end_of_data(&self, index: usize) {
        let mut slots = self.slots.lock().unwrap();
        slots[index].eof_observed = true;
        drop(slots);
        // Wake the acquisition scan so it can see the all-EOF condition
        self.available.notify_all();
    }

    /// Worker side: hand out the task receiver for a slot, once
    pub fn take_receiver(&self, index: usize) -> Option<Receiver<Task>> {
        self.receivers.lock().unwrap()[index].take()
    }

    /// Worker side: record the worker thread's OS id for timestamp entries
    pub fn register_worker_thread(&self, index: usize, thread_id: u64) {
        self.slots.lock().unwrap()[index].thread_id = thread_id;
    }

    /// Registered thread id for a slot (0 if never registered)
    pub fn thread_id(&self, index: usize) -> u64 {
        self.slots.lock().unwrap()[index].thread_id
    }

    /// Number of slots currently marked busy
    pub fn busy_count(&self) -> usize {
        self.slots.lock().unwrap().iter().filter(|s| s.busy).count()
    }

    /// Snapshot all slots for the progress monitor
    pub fn slot_views(&self) -> Vec<SlotView> {
        self.slots
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(index, s)| SlotView {
                index,
                busy: s.busy,
                current_op: s.current_op,
            })
            .collect()
    }

    /// Reset slot state between passes; registered thread ids persist
    pub fn reset_for_pass(&self) {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.iter_mut() {
            slot.busy = false;
            slot.eof_observed = false;
            slot.current_op = 0;
        }
        drop(slots);
        self.available.notify_all();
    }
}
