//! Session lifecycle: begin, round marks, end.
//!
//! [`Recorder::begin`] returns a [`SessionHandle`] naming the exact session
//! it opened; handle-targeted marks can never land on a neighbor that opened
//! later. For transport callers that hold no handles there are
//! latest-open variants targeting the most recent open session of a kind.
//! Every mark on a closed, stale, or absent session is a silent no-op —
//! instrumentation must never take the measured operation down with it.

use std::sync::Arc;

use crate::counters::{CounterSource, SimulatedCounters};
use crate::kind::{OperationKind, UnknownOperationKind};
use crate::session::{MeasurementSession, SessionParams};
use crate::store::SessionStore;

/// Addresses one session in the store: the kind plus its log position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub kind: OperationKind,
    pub sequence: u64,
}

/// Records measurement sessions into a shared [`SessionStore`].
pub struct Recorder {
    store: Arc<SessionStore>,
    counters: Box<dyn CounterSource>,
}

impl Recorder {
    /// Create a recorder with a fresh store.
    pub fn new(counters: Box<dyn CounterSource>) -> Self {
        Self::with_store(Arc::new(SessionStore::new()), counters)
    }

    /// Create a recorder writing into an existing store.
    pub fn with_store(store: Arc<SessionStore>, counters: Box<dyn CounterSource>) -> Self {
        Self { store, counters }
    }

    /// Recorder backed by [`SimulatedCounters`] seeded from OS randomness.
    pub fn simulated() -> Self {
        Self::new(Box::new(SimulatedCounters::new()))
    }

    /// Recorder backed by seeded [`SimulatedCounters`] for reproducible runs.
    pub fn simulated_with_seed(seed: u64) -> Self {
        Self::new(Box::new(SimulatedCounters::with_seed(seed)))
    }

    /// Shared handle to the underlying store, for analyzers.
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    /// Name of the counter source feeding this recorder.
    pub fn source_name(&self) -> &'static str {
        self.counters.name()
    }

    /// Open a new session of `kind`, capturing all begin snapshots.
    pub fn begin(&self, kind: OperationKind, params: SessionParams) -> SessionHandle {
        let session = MeasurementSession::start(kind, params, self.counters.as_ref());
        let sequence = self.store.append(session);
        SessionHandle { kind, sequence }
    }

    /// Open a new session for a wire-named operation.
    ///
    /// Unknown names are rejected and logged — they are caller bugs, and
    /// recording them under some default kind would poison that kind's log.
    pub fn begin_named(
        &self,
        name: &str,
        params: SessionParams,
    ) -> Result<SessionHandle, UnknownOperationKind> {
        match name.parse::<OperationKind>() {
            Ok(kind) => Ok(self.begin(kind, params)),
            Err(err) => {
                log::warn!("dropping measurement for unknown operation kind {name:?}");
                Err(err)
            }
        }
    }

    /// Append a round mark to the session named by `handle`.
    /// Silent no-op if that session has already ended.
    pub fn mark_round(&self, handle: &SessionHandle, round: u64) {
        let counters = self.counters.as_ref();
        let hit = self
            .store
            .with_session(handle.kind, handle.sequence, |session| {
                session.record_round(round, counters);
            });
        if !hit {
            log::debug!(
                "round mark for {}#{} dropped: no such session",
                handle.kind,
                handle.sequence
            );
        }
    }

    /// Close the session named by `handle`, recording end snapshots.
    /// Silent no-op if it already ended.
    pub fn end(&self, handle: &SessionHandle) {
        let counters = self.counters.as_ref();
        let hit = self
            .store
            .with_session(handle.kind, handle.sequence, |session| {
                session.finish(counters);
            });
        if !hit {
            log::debug!(
                "end mark for {}#{} dropped: no such session",
                handle.kind,
                handle.sequence
            );
        }
    }

    /// Append a round mark to the most recent open session of `kind`.
    /// Silent no-op when none is open — round marks may arrive before the
    /// begin mark has landed, and that must not crash the caller.
    pub fn mark_round_latest(&self, kind: OperationKind, round: u64) {
        let counters = self.counters.as_ref();
        let hit = self.store.with_latest_open(kind, |session| {
            session.record_round(round, counters);
        });
        if !hit {
            log::debug!("round mark dropped: no open {kind} session");
        }
    }

    /// Close the most recent open session of `kind`.
    /// Silent no-op when none is open.
    pub fn end_latest(&self, kind: OperationKind) {
        let counters = self.counters.as_ref();
        let hit = self.store.with_latest_open(kind, |session| {
            session.finish(counters);
        });
        if !hit {
            log::debug!("end mark dropped: no open {kind} session");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> Recorder {
        Recorder::simulated_with_seed(0xbeef)
    }

    #[test]
    fn test_begin_mark_end_by_handle() {
        let recorder = recorder();
        let handle = recorder.begin(OperationKind::AesEncrypt, SessionParams::with_key_size(128));
        assert_eq!(handle.sequence, 0);

        for round in 0..10 {
            recorder.mark_round(&handle, round);
        }
        recorder.end(&handle);

        let log = recorder.store().snapshot(OperationKind::AesEncrypt);
        assert_eq!(log.len(), 1);
        assert!(!log[0].is_open());
        assert_eq!(log[0].rounds, 10);
        assert_eq!(log[0].round_marks.len(), 10);
    }

    #[test]
    fn test_round_mark_before_any_begin_changes_nothing() {
        let recorder = recorder();
        recorder.mark_round_latest(OperationKind::AesEncrypt, 0);

        let store = recorder.store();
        for kind in OperationKind::ALL {
            assert_eq!(store.count(kind), 0, "phantom session for {kind}");
        }
    }

    #[test]
    fn test_end_begin_end_yields_two_sessions_in_order() {
        let recorder = recorder();

        recorder.begin(OperationKind::Sha256Hash, SessionParams::default());
        recorder.end_latest(OperationKind::Sha256Hash);
        recorder.begin(OperationKind::Sha256Hash, SessionParams::default());
        recorder.end_latest(OperationKind::Sha256Hash);
        // Nothing left open; this must change nothing.
        recorder.end_latest(OperationKind::Sha256Hash);

        let log = recorder.store().snapshot(OperationKind::Sha256Hash);
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|s| !s.is_open()));
        assert_eq!(log[0].sequence, 0);
        assert_eq!(log[1].sequence, 1);
        assert!(log[0].started_ns < log[1].started_ns);
    }

    #[test]
    fn test_stale_handle_marks_are_ignored() {
        let recorder = recorder();
        let handle = recorder.begin(OperationKind::EcdsaVerify, SessionParams::default());
        recorder.end(&handle);

        recorder.mark_round(&handle, 3);
        recorder.end(&handle);

        let log = recorder.store().snapshot(OperationKind::EcdsaVerify);
        assert_eq!(log.len(), 1);
        assert!(log[0].round_marks.is_empty());
    }

    #[test]
    fn test_handle_targets_its_own_session_among_open_ones() {
        let recorder = recorder();
        let first = recorder.begin(OperationKind::KeyDerivation, SessionParams::default());
        let second = recorder.begin(OperationKind::KeyDerivation, SessionParams::default());

        // Latest-open targeting hits the second session.
        recorder.mark_round_latest(OperationKind::KeyDerivation, 0);
        // Handle targeting still reaches the first.
        recorder.end(&first);

        let log = recorder.store().snapshot(OperationKind::KeyDerivation);
        assert!(!log[first.sequence as usize].is_open());
        assert!(log[second.sequence as usize].is_open());
        assert_eq!(log[second.sequence as usize].round_marks.len(), 1);
        assert!(log[first.sequence as usize].round_marks.is_empty());
    }

    #[test]
    fn test_begin_named_accepts_wire_names() {
        let recorder = recorder();
        let handle = recorder
            .begin_named("RSA_DECRYPT", SessionParams::with_key_size(2048))
            .unwrap();
        assert_eq!(handle.kind, OperationKind::RsaDecrypt);
        assert_eq!(recorder.store().count(OperationKind::RsaDecrypt), 1);
    }

    #[test]
    fn test_begin_named_rejects_unknown_names() {
        let recorder = recorder();
        let err = recorder
            .begin_named("ROT13_ENCRYPT", SessionParams::default())
            .unwrap_err();
        assert_eq!(err.name, "ROT13_ENCRYPT");

        // Nothing recorded anywhere — especially not under AES_ENCRYPT.
        let store = recorder.store();
        for kind in OperationKind::ALL {
            assert_eq!(store.count(kind), 0);
        }
    }

    #[test]
    fn test_kinds_do_not_cross_talk() {
        let recorder = recorder();
        let aes = recorder.begin(OperationKind::AesEncrypt, SessionParams::default());
        recorder.begin(OperationKind::AesDecrypt, SessionParams::default());

        recorder.mark_round_latest(OperationKind::AesDecrypt, 0);
        recorder.end(&aes);

        let enc = recorder.store().snapshot(OperationKind::AesEncrypt);
        let dec = recorder.store().snapshot(OperationKind::AesDecrypt);
        assert!(enc[0].round_marks.is_empty());
        assert_eq!(dec[0].round_marks.len(), 1);
        assert!(dec[0].is_open());
    }
}
