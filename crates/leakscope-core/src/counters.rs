//! Performance-counter abstraction and the simulated implementation.
//!
//! The recorder never reads hardware directly. Everything it samples —
//! timestamps, instruction counts, energy, cache/branch/memory counters —
//! comes through the [`CounterSource`] trait, so a PMU-backed reader can be
//! swapped in without touching session or analysis code. [`SimulatedCounters`]
//! is the default implementation: monotonic counters with seeded jitter,
//! good enough to exercise the full pipeline deterministically.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Cache hierarchy counters at one probe point. Cumulative, never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub accesses: u64,
    pub l1_misses: u64,
    pub l2_misses: u64,
    pub l3_misses: u64,
}

impl CacheSnapshot {
    /// L1 miss rate. 0.0 when no accesses have been counted.
    pub fn miss_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.l1_misses as f64 / self.accesses as f64
        }
    }
}

/// Branch predictor counters at one probe point. Cumulative, never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    pub total_branches: u64,
    pub mispredictions: u64,
}

impl BranchSnapshot {
    /// Misprediction rate. 0.0 when no branches have been counted.
    pub fn mispredict_rate(&self) -> f64 {
        if self.total_branches == 0 {
            0.0
        } else {
            self.mispredictions as f64 / self.total_branches as f64
        }
    }
}

/// Memory subsystem counters at one probe point. Cumulative, never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub page_faults: u64,
    pub tlb_misses: u64,
    pub bandwidth: u64,
    /// Running memory-access probe value; first differences between probes
    /// approximate access-pattern stride.
    pub access_probe: u64,
}

/// Energy meter reading plus supply-rail observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSnapshot {
    /// Cumulative energy meter in joules. Monotonic.
    pub energy: f64,
    /// Observed supply voltage deviation in volts.
    pub voltage_fluctuation: f64,
    /// Observed current draw in amperes.
    pub current_draw: f64,
}

/// RSA-specific counters: key/modulus load behavior and Montgomery machinery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RsaProbe {
    pub key_load_misses: u64,
    pub modulus_load_misses: u64,
    pub montgomery_cache_misses: u64,
    pub key_memory_accesses: u64,
    pub temp_buffer_accesses: u64,
    /// Running access probe for the modular-exponentiation working set.
    pub access_probe: u64,
}

// ---------------------------------------------------------------------------
// CounterSource trait
// ---------------------------------------------------------------------------

/// Source of raw measurement samples.
///
/// All counters are cumulative: the recorder snapshots them at session
/// boundaries and round marks, and analysis works on differences. Timestamps
/// must be strictly increasing across calls on the same source.
pub trait CounterSource: Send + Sync {
    /// Monotonic timestamp in nanoseconds.
    fn timestamp_ns(&self) -> u64;

    /// Retired-instruction proxy counter.
    fn instruction_count(&self) -> u64;

    /// Energy meter plus voltage/current observations.
    fn power_snapshot(&self) -> PowerSnapshot;

    /// Instantaneous power draw in watts.
    fn power_sample(&self) -> f64;

    /// Cache hierarchy counters.
    fn cache_snapshot(&self) -> CacheSnapshot;

    /// Branch predictor counters.
    fn branch_snapshot(&self) -> BranchSnapshot;

    /// Memory subsystem counters.
    fn memory_snapshot(&self) -> MemorySnapshot;

    /// RSA working-set counters.
    fn rsa_probe(&self) -> RsaProbe;

    /// Whether this source can operate on the current machine.
    fn is_available(&self) -> bool {
        true
    }

    /// Human-readable source name.
    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// SimulatedCounters
// ---------------------------------------------------------------------------

/// Simulated counter source.
///
/// Counters advance by jittered strides on every probe, so snapshots are
/// monotonically non-decreasing and differences look like plausible hardware
/// activity. The energy meter follows a fixed ramp; instantaneous power is
/// jittered around a nominal draw. Seeded construction gives reproducible
/// counter sequences (timestamps still come from the real clock).
pub struct SimulatedCounters {
    origin: Instant,
    ticks: AtomicU64,
    instructions: AtomicU64,
    cache_accesses: AtomicU64,
    cache_l1_misses: AtomicU64,
    cache_l2_misses: AtomicU64,
    cache_l3_misses: AtomicU64,
    branches: AtomicU64,
    mispredictions: AtomicU64,
    page_faults: AtomicU64,
    tlb_misses: AtomicU64,
    bandwidth: AtomicU64,
    memory_probe: AtomicU64,
    energy_steps: AtomicU64,
    rsa_key_load: AtomicU64,
    rsa_modulus_load: AtomicU64,
    rsa_montgomery: AtomicU64,
    rsa_key_accesses: AtomicU64,
    rsa_temp_accesses: AtomicU64,
    rsa_probe: AtomicU64,
    rng: Mutex<StdRng>,
}

impl SimulatedCounters {
    /// Create a simulated source seeded from OS randomness.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Create a simulated source with a fixed seed for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            origin: Instant::now(),
            ticks: AtomicU64::new(0),
            instructions: AtomicU64::new(0),
            cache_accesses: AtomicU64::new(0),
            cache_l1_misses: AtomicU64::new(0),
            cache_l2_misses: AtomicU64::new(0),
            cache_l3_misses: AtomicU64::new(0),
            branches: AtomicU64::new(0),
            mispredictions: AtomicU64::new(0),
            page_faults: AtomicU64::new(0),
            tlb_misses: AtomicU64::new(0),
            bandwidth: AtomicU64::new(0),
            memory_probe: AtomicU64::new(0),
            energy_steps: AtomicU64::new(0),
            rsa_key_load: AtomicU64::new(0),
            rsa_modulus_load: AtomicU64::new(0),
            rsa_montgomery: AtomicU64::new(0),
            rsa_key_accesses: AtomicU64::new(0),
            rsa_temp_accesses: AtomicU64::new(0),
            rsa_probe: AtomicU64::new(0),
            rng: Mutex::new(rng),
        }
    }

    /// Jittered counter stride in `lo..=hi`.
    fn stride(&self, lo: u64, hi: u64) -> u64 {
        let mut rng = self.rng.lock().unwrap();
        rng.random_range(lo..=hi)
    }

    fn jitter_f64(&self, lo: f64, hi: f64) -> f64 {
        let mut rng = self.rng.lock().unwrap();
        rng.random_range(lo..hi)
    }

    fn bump(counter: &AtomicU64, by: u64) -> u64 {
        counter.fetch_add(by, Ordering::Relaxed) + by
    }
}

impl Default for SimulatedCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SimulatedCounters {
    fn timestamp_ns(&self) -> u64 {
        // The tick keeps timestamps strictly increasing even when the OS
        // clock reports the same nanosecond twice.
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        self.origin.elapsed().as_nanos() as u64 + tick
    }

    fn instruction_count(&self) -> u64 {
        let step = self.stride(5_000, 15_000);
        Self::bump(&self.instructions, step)
    }

    fn power_snapshot(&self) -> PowerSnapshot {
        let steps = Self::bump(&self.energy_steps, 1);
        PowerSnapshot {
            // Same ramp for every instance: 0.1 J baseline, 10 mJ per probe.
            energy: 0.1 + 0.01 * steps as f64,
            voltage_fluctuation: self.jitter_f64(0.005, 0.050),
            current_draw: self.jitter_f64(0.40, 0.60),
        }
    }

    fn power_sample(&self) -> f64 {
        self.jitter_f64(0.45, 0.55)
    }

    fn cache_snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            accesses: Self::bump(&self.cache_accesses, self.stride(800, 1_200)),
            l1_misses: Self::bump(&self.cache_l1_misses, self.stride(16, 48)),
            l2_misses: Self::bump(&self.cache_l2_misses, self.stride(4, 12)),
            l3_misses: Self::bump(&self.cache_l3_misses, self.stride(0, 4)),
        }
    }

    fn branch_snapshot(&self) -> BranchSnapshot {
        BranchSnapshot {
            total_branches: Self::bump(&self.branches, self.stride(150, 250)),
            mispredictions: Self::bump(&self.mispredictions, self.stride(2, 8)),
        }
    }

    fn memory_snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            page_faults: Self::bump(&self.page_faults, self.stride(0, 1)),
            tlb_misses: Self::bump(&self.tlb_misses, self.stride(3, 9)),
            bandwidth: Self::bump(&self.bandwidth, self.stride(2_048, 8_192)),
            access_probe: Self::bump(&self.memory_probe, self.stride(32, 96)),
        }
    }

    fn rsa_probe(&self) -> RsaProbe {
        RsaProbe {
            key_load_misses: Self::bump(&self.rsa_key_load, self.stride(0, 3)),
            modulus_load_misses: Self::bump(&self.rsa_modulus_load, self.stride(0, 2)),
            montgomery_cache_misses: Self::bump(&self.rsa_montgomery, self.stride(1, 5)),
            key_memory_accesses: Self::bump(&self.rsa_key_accesses, self.stride(40, 80)),
            temp_buffer_accesses: Self::bump(&self.rsa_temp_accesses, self.stride(20, 60)),
            access_probe: Self::bump(&self.rsa_probe, self.stride(16, 48)),
        }
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
