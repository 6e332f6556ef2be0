//! Append-only session log, one slot per operation kind.
//!
//! Each [`OperationKind`] owns an ordered `Vec` of sessions behind its own
//! `Mutex`, so recording AES never contends with recording SHA-256. Insertion
//! order is temporal order; entries are never reordered, deduplicated, or
//! evicted. The store is a plain owned object — share it with `Arc`, there is
//! no global instance.

use std::sync::Mutex;

use crate::kind::OperationKind;
use crate::session::MeasurementSession;

/// Per-kind measurement log with per-slot exclusive access.
pub struct SessionStore {
    slots: [Mutex<Vec<MeasurementSession>>; 8],
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            slots: [const { Mutex::new(Vec::new()) }; 8],
        }
    }

    fn slot(&self, kind: OperationKind) -> &Mutex<Vec<MeasurementSession>> {
        &self.slots[kind.slot()]
    }

    /// Append a session to its kind's log, assigning its sequence number.
    /// The sequence equals the session's position in the log.
    pub fn append(&self, mut session: MeasurementSession) -> u64 {
        let mut log = self.slot(session.kind).lock().unwrap();
        let sequence = log.len() as u64;
        session.sequence = sequence;
        log.push(session);
        sequence
    }

    /// Run `f` against the session at `sequence` in `kind`'s log.
    /// Returns false when no such session exists.
    pub fn with_session<F>(&self, kind: OperationKind, sequence: u64, f: F) -> bool
    where
        F: FnOnce(&mut MeasurementSession),
    {
        let mut log = self.slot(kind).lock().unwrap();
        match log.get_mut(sequence as usize) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    /// Run `f` against the most recent open session of `kind`.
    /// Returns false when no session of `kind` is open.
    pub fn with_latest_open<F>(&self, kind: OperationKind, f: F) -> bool
    where
        F: FnOnce(&mut MeasurementSession),
    {
        let mut log = self.slot(kind).lock().unwrap();
        match log.iter_mut().rev().find(|s| s.is_open()) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    /// Number of sessions recorded for `kind`.
    pub fn count(&self, kind: OperationKind) -> usize {
        self.slot(kind).lock().unwrap().len()
    }

    /// Total sessions across all kinds.
    pub fn total(&self) -> usize {
        OperationKind::ALL.iter().map(|&k| self.count(k)).sum()
    }

    /// Clone the full log for `kind`. Analysis works on these copies so the
    /// slot lock is held only for the clone.
    pub fn snapshot(&self, kind: OperationKind) -> Vec<MeasurementSession> {
        self.slot(kind).lock().unwrap().clone()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
