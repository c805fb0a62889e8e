//! Per-operation timestamp ring
//!
//! Each target can carry a fixed-size ring of trace entries, one per issued
//! operation. Entries are two-phase: the dispatcher reserves an entry at
//! task-issue time and writes the static fields (pass, worker, thread, op
//! kind, op number, byte offset); the worker fills in the transfer sizes
//! after completion and flips the entry to `Completed`. An entry is not
//! fully valid until it is `Completed`.
//!
//! The ring index advances under one of two policies: one-shot stops
//! recording once the ring fills, wrap overwrites circularly.

use crate::config::OpKind;
use serde::{Deserialize, Serialize};

/// Ring index advancement policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TsPolicy {
    /// Stop recording once the ring is full
    OneShot,
    /// Overwrite the oldest entries circularly
    Wrap,
}

/// Timestamp recording configuration for one target
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// Number of entries in the ring
    pub size: usize,
    pub policy: TsPolicy,
}

/// Lifecycle state of a ring entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TsState {
    #[default]
    Empty,
    /// Static fields written by the dispatcher at issue time
    Reserved,
    /// Dynamic fields filled in by the worker after the IO finished
    Completed,
}

/// One trace entry
///
/// `op_number` and `byte_offset` are signed: the destination side reserves
/// them as -1 until the data arrives, and end-of-data entries carry the
/// negated worker index so they stand out from data operations in dumps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TsEntry {
    pub state: TsState,
    pub pass_number: u32,
    pub worker_index: usize,
    pub thread_id: u64,
    pub op_kind: OpKind,
    pub op_number: i64,
    pub byte_offset: i64,
    pub disk_xfer_size: u64,
    pub net_xfer_size: u64,
}

impl Default for TsEntry {
    fn default() -> Self {
        Self {
            state: TsState::Empty,
            pass_number: 0,
            worker_index: 0,
            thread_id: 0,
            op_kind: OpKind::NoOp,
            op_number: -1,
            byte_offset: -1,
            disk_xfer_size: 0,
            net_xfer_size: 0,
        }
    }
}

/// Static fields written when the dispatcher reserves an entry
#[derive(Debug, Clone, Copy)]
pub struct TsIssue {
    pub pass_number: u32,
    pub worker_index: usize,
    pub thread_id: u64,
    pub op_kind: OpKind,
    pub op_number: i64,
    pub byte_offset: i64,
}

/// Dynamic fields filled in by the worker after completion
///
/// The destination side resolves `op_number` and `byte_offset` here, since
/// it only learns them once the data has arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsCompletion {
    pub disk_xfer_size: u64,
    pub net_xfer_size: u64,
    pub op_number: Option<i64>,
    pub byte_offset: Option<i64>,
}

/// Fixed-size timestamp ring for one target, allocated once
#[derive(Debug, Clone)]
pub struct TimestampTable {
    entries: Vec<TsEntry>,
    current: usize,
    recording: bool,
    policy: TsPolicy,
}

impl TimestampTable {
    /// Build a table from the target's timestamp configuration; `None`
    /// yields a disabled table that never reserves entries.
    pub fn new(config: Option<TimestampConfig>) -> Self {
        match config {
            Some(cfg) => Self {
                entries: vec![TsEntry::default(); cfg.size],
                current: 0,
                recording: cfg.size > 0,
                policy: cfg.policy,
            },
            None => Self {
                entries: Vec::new(),
                current: 0,
                recording: false,
                policy: TsPolicy::OneShot,
            },
        }
    }

    /// Whether the table is still recording new entries
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Claim the next ring index and write the static fields
    ///
    /// Returns `None` when recording is disabled or a one-shot ring has
    /// filled up.
    pub fn reserve(&mut self, issue: TsIssue) -> Option<usize> {
        if !self.recording {
            return None;
        }
        let index = self.current;
        self.current += 1;
        if self.current == self.entries.len() {
            match self.policy {
                TsPolicy::OneShot => self.recording = false,
                TsPolicy::Wrap => self.current = 0,
            }
        }
        self.entries[index] = TsEntry {
            state: TsState::Reserved,
            pass_number: issue.pass_number,
            worker_index: issue.worker_index,
            thread_id: issue.thread_id,
            op_kind: issue.op_kind,
            op_number: issue.op_number,
            byte_offset: issue.byte_offset,
            disk_xfer_size: 0,
            net_xfer_size: 0,
        };
        Some(index)
    }

    /// Worker side: fill in the dynamic fields and mark the entry complete
    pub fn complete(&mut self, index: usize, completion: TsCompletion) {
        let entry = &mut self.entries[index];
        entry.disk_xfer_size = completion.disk_xfer_size;
        entry.net_xfer_size = completion.net_xfer_size;
        if let Some(op_number) = completion.op_number {
            entry.op_number = op_number;
        }
        if let Some(byte_offset) = completion.byte_offset {
            entry.byte_offset = byte_offset;
        }
        entry.state = TsState::Completed;
    }

    pub fn entry(&self, index: usize) -> &TsEntry {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[TsEntry] {
        &self.entries
    }

    /// Dump the ring as pretty JSON for offline inspection
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(worker: usize, op: i64) -> TsIssue {
        TsIssue {
            pass_number: 1,
            worker_index: worker,
            thread_id: 7,
            op_kind: OpKind::Read,
            op_number: op,
            byte_offset: op * 8,
        }
    }

    fn table(size: usize, policy: TsPolicy) -> TimestampTable {
        TimestampTable::new(Some(TimestampConfig { size, policy }))
    }

    #[test]
    fn test_disabled_table_reserves_nothing() {
        let mut ts = TimestampTable::new(None);
        assert!(!ts.is_recording());
        assert_eq!(ts.reserve(issue(0, 0)), None);
    }

    #[test]
    fn test_oneshot_stops_at_capacity() {
        let mut ts = table(2, TsPolicy::OneShot);
        assert_eq!(ts.reserve(issue(0, 0)), Some(0));
        assert_eq!(ts.reserve(issue(1, 1)), Some(1));
        assert!(!ts.is_recording());
        assert_eq!(ts.reserve(issue(0, 2)), None);
        // Entries from before the ring filled are still intact
        assert_eq!(ts.entry(1).op_number, 1);
    }

    #[test]
    fn test_wrap_overwrites_circularly() {
        let mut ts = table(2, TsPolicy::Wrap);
        assert_eq!(ts.reserve(issue(0, 0)), Some(0));
        assert_eq!(ts.reserve(issue(1, 1)), Some(1));
        assert_eq!(ts.reserve(issue(0, 2)), Some(0));
        assert!(ts.is_recording());
        assert_eq!(ts.entry(0).op_number, 2);
        assert_eq!(ts.entry(1).op_number, 1);
    }

    #[test]
    fn test_two_phase_completion() {
        let mut ts = table(4, TsPolicy::OneShot);
        let index = ts.reserve(issue(0, 5)).unwrap();
        assert_eq!(ts.entry(index).state, TsState::Reserved);
        assert_eq!(ts.entry(index).disk_xfer_size, 0);

        ts.complete(
            index,
            TsCompletion {
                disk_xfer_size: 4096,
                net_xfer_size: 4104,
                ..Default::default()
            },
        );
        let entry = ts.entry(index);
        assert_eq!(entry.state, TsState::Completed);
        assert_eq!(entry.disk_xfer_size, 4096);
        assert_eq!(entry.net_xfer_size, 4104);
        // Static fields written at reserve time are untouched
        assert_eq!(entry.op_number, 5);
    }

    #[test]
    fn test_destination_resolves_fields_at_completion() {
        let mut ts = table(1, TsPolicy::OneShot);
        let index = ts
            .reserve(TsIssue {
                pass_number: 1,
                worker_index: 0,
                thread_id: 0,
                op_kind: OpKind::Write,
                op_number: -1,
                byte_offset: -1,
            })
            .unwrap();
        ts.complete(
            index,
            TsCompletion {
                disk_xfer_size: 8192,
                net_xfer_size: 8192,
                op_number: Some(3),
                byte_offset: Some(24576),
            },
        );
        let entry = ts.entry(index);
        assert_eq!(entry.op_number, 3);
        assert_eq!(entry.byte_offset, 24576);
    }

    #[test]
    fn test_json_dump_contains_fields() {
        let mut ts = table(1, TsPolicy::OneShot);
        ts.reserve(issue(3, 9)).unwrap();
        let json = ts.to_json().unwrap();
        assert!(json.contains("\"worker_index\": 3"));
        assert!(json.contains("\"op_number\": 9"));
    }
}
