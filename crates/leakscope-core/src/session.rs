//! Measurement sessions: the per-invocation sample bundle.
//!
//! One [`MeasurementSession`] covers a single instrumented execution of a
//! cryptographic operation, from its begin mark to its end mark. The recorder
//! snapshots counters at the boundaries and at round marks; nothing samples
//! continuously. Once finished (or once a later session of the same kind
//! opens) a session is never mutated again.

use serde::{Deserialize, Serialize};

use crate::counters::{
    BranchSnapshot, CacheSnapshot, CounterSource, MemorySnapshot, PowerSnapshot, RsaProbe,
};
use crate::kind::OperationKind;

// ---------------------------------------------------------------------------
// Session parameters
// ---------------------------------------------------------------------------

/// Operation parameters supplied at session begin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Key size in bits.
    pub key_size: Option<u64>,
    /// Cipher block size in bits.
    pub block_size: Option<u64>,
    /// RSA modulus size in bits. Defaults to the key size when unset.
    pub modulus_size: Option<u64>,
}

impl SessionParams {
    /// Parameters for a keyed operation.
    pub fn with_key_size(key_size: u64) -> Self {
        Self {
            key_size: Some(key_size),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Metric blocks
// ---------------------------------------------------------------------------

/// Cache counters captured at session begin and end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheBlock {
    pub begin: CacheSnapshot,
    pub end: Option<CacheSnapshot>,
    /// L1 miss rate from the end snapshot; 0.0 while the session is open.
    pub miss_rate: f64,
}

/// Branch predictor counters captured at session begin and end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchBlock {
    pub begin: BranchSnapshot,
    pub end: Option<BranchSnapshot>,
    /// Misprediction rate from the end snapshot; 0.0 while open.
    pub mispredict_rate: f64,
}

/// Power observations for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerBlock {
    /// Energy meter reading at begin, joules.
    pub start_energy: f64,
    /// Energy meter reading at end, joules.
    pub end_energy: Option<f64>,
    /// Supply voltage deviation observed at begin, volts.
    pub voltage_fluctuation: f64,
    /// Current draw observed at begin, amperes.
    pub current_draw: f64,
    /// Instantaneous power samples: one at begin, one per round mark, one at
    /// end.
    pub trace: Vec<f64>,
}

impl PowerBlock {
    /// Energy consumed across the session, joules. `None` while open.
    pub fn energy_delta(&self) -> Option<f64> {
        self.end_energy.map(|end| end - self.start_energy)
    }
}

/// Memory subsystem counters captured at session begin and end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub begin: MemorySnapshot,
    pub end: Option<MemorySnapshot>,
    /// Access-probe samples taken at begin and end.
    pub access_pattern: Vec<u64>,
}

/// RSA-specific metrics, present only for RSA operation kinds.
///
/// Rounds on an RSA session are modular-exponentiation steps: each round mark
/// appends one square/multiply/reduce timing sample and one working-set
/// access-probe sample, which is what the RSA analyses difference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsaBlock {
    /// Modulus size in bits.
    pub modulus_size: u64,
    /// Modular-exponentiation steps observed (one per round mark).
    pub modexp_steps: u64,
    /// Montgomery multiplications: square plus multiply per step.
    pub montgomery_multiplications: u64,
    /// Timestamp samples around squaring, one per step.
    pub square_timings: Vec<u64>,
    /// Timestamp samples around multiplication, one per step.
    pub multiply_timings: Vec<u64>,
    /// Timestamp samples around reduction, one per step.
    pub reduce_timings: Vec<u64>,
    pub key_load_misses: u64,
    pub modulus_load_misses: u64,
    pub montgomery_cache_misses: u64,
    pub key_memory_accesses: u64,
    pub temp_buffer_accesses: u64,
    /// Working-set access-probe samples, one at begin plus one per step.
    pub access_pattern: Vec<u64>,
}

impl RsaBlock {
    fn absorb_probe(&mut self, probe: RsaProbe) {
        self.key_load_misses = probe.key_load_misses;
        self.modulus_load_misses = probe.modulus_load_misses;
        self.montgomery_cache_misses = probe.montgomery_cache_misses;
        self.key_memory_accesses = probe.key_memory_accesses;
        self.temp_buffer_accesses = probe.temp_buffer_accesses;
    }
}

/// One round mark inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundMark {
    /// Caller-supplied round index.
    pub index: u64,
    /// Timestamp at the mark, nanoseconds.
    pub timestamp_ns: u64,
    /// Instantaneous power at the mark, watts.
    pub power: f64,
}

// ---------------------------------------------------------------------------
// MeasurementSession
// ---------------------------------------------------------------------------

/// One instrumented execution of an operation, begin mark to end mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementSession {
    pub kind: OperationKind,
    /// Position in the kind's log; assigned by the store on append.
    pub sequence: u64,
    pub params: SessionParams,
    /// True from begin until the end mark lands.
    pub open: bool,
    pub started_ns: u64,
    pub ended_ns: Option<u64>,
    pub start_instructions: u64,
    pub end_instructions: Option<u64>,
    pub cache: CacheBlock,
    pub branch: BranchBlock,
    pub power: PowerBlock,
    pub memory: MemoryBlock,
    /// Round count: highest observed round index plus one.
    pub rounds: u64,
    pub round_marks: Vec<RoundMark>,
    /// Present only for RSA kinds.
    pub rsa: Option<RsaBlock>,
}

impl MeasurementSession {
    /// Open a new session, capturing all begin snapshots.
    pub(crate) fn start(
        kind: OperationKind,
        params: SessionParams,
        counters: &dyn CounterSource,
    ) -> Self {
        let started_ns = counters.timestamp_ns();
        let start_instructions = counters.instruction_count();
        let PowerSnapshot {
            energy,
            voltage_fluctuation,
            current_draw,
        } = counters.power_snapshot();

        let cache_begin = counters.cache_snapshot();
        let branch_begin = counters.branch_snapshot();
        let memory_begin = counters.memory_snapshot();

        let rsa = kind.is_rsa().then(|| {
            let probe = counters.rsa_probe();
            let mut block = RsaBlock {
                modulus_size: params
                    .modulus_size
                    .or(params.key_size)
                    .unwrap_or_default(),
                ..RsaBlock::default()
            };
            block.absorb_probe(probe);
            block.access_pattern.push(probe.access_probe);
            block.square_timings.push(counters.timestamp_ns());
            block
        });

        Self {
            kind,
            sequence: 0,
            params,
            open: true,
            started_ns,
            ended_ns: None,
            start_instructions,
            end_instructions: None,
            cache: CacheBlock {
                begin: cache_begin,
                end: None,
                miss_rate: 0.0,
            },
            branch: BranchBlock {
                begin: branch_begin,
                end: None,
                mispredict_rate: 0.0,
            },
            power: PowerBlock {
                start_energy: energy,
                end_energy: None,
                voltage_fluctuation,
                current_draw,
                trace: vec![counters.power_sample()],
            },
            memory: MemoryBlock {
                access_pattern: vec![memory_begin.access_probe],
                begin: memory_begin,
                end: None,
            },
            rounds: 0,
            round_marks: Vec::new(),
            rsa,
        }
    }

    /// Append a round mark. No-op once the session has ended.
    pub(crate) fn record_round(&mut self, index: u64, counters: &dyn CounterSource) {
        if !self.open {
            return;
        }

        let timestamp_ns = counters.timestamp_ns();
        let power = counters.power_sample();
        self.round_marks.push(RoundMark {
            index,
            timestamp_ns,
            power,
        });
        self.power.trace.push(power);
        self.rounds = index + 1;

        if let Some(rsa) = &mut self.rsa {
            rsa.square_timings.push(counters.timestamp_ns());
            rsa.multiply_timings.push(counters.timestamp_ns());
            rsa.reduce_timings.push(counters.timestamp_ns());
            let probe = counters.rsa_probe();
            rsa.absorb_probe(probe);
            rsa.access_pattern.push(probe.access_probe);
            rsa.modexp_steps += 1;
            rsa.montgomery_multiplications += 2;
        }
    }

    /// Record end snapshots and close the session. No-op if already closed.
    pub(crate) fn finish(&mut self, counters: &dyn CounterSource) {
        if !self.open {
            return;
        }

        self.ended_ns = Some(counters.timestamp_ns());
        self.end_instructions = Some(counters.instruction_count());

        self.power.end_energy = Some(counters.power_snapshot().energy);
        self.power.trace.push(counters.power_sample());

        let cache_end = counters.cache_snapshot();
        self.cache.miss_rate = cache_end.miss_rate();
        self.cache.end = Some(cache_end);

        let branch_end = counters.branch_snapshot();
        self.branch.mispredict_rate = branch_end.mispredict_rate();
        self.branch.end = Some(branch_end);

        let memory_end = counters.memory_snapshot();
        self.memory.access_pattern.push(memory_end.access_probe);
        self.memory.end = Some(memory_end);

        if let Some(rsa) = &mut self.rsa {
            let probe = counters.rsa_probe();
            rsa.absorb_probe(probe);
            rsa.access_pattern.push(probe.access_probe);
        }

        self.open = false;
    }

    /// Wall time between begin and end marks, nanoseconds. `None` while open.
    pub fn execution_time_ns(&self) -> Option<u64> {
        self.ended_ns
            .map(|ended| ended.saturating_sub(self.started_ns))
    }

    /// Whether the session is still recording.
    pub fn is_open(&self) -> bool {
        self.open
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
