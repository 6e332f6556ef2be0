//! Per-kind leakage analyses over the session log.
//!
//! Each `analyze_*` operation pulls a snapshot of one kind's sessions,
//! derives the family's measurement sequences (closed sessions only; an open
//! session has no end boundary to difference against), and reduces them with
//! [`crate::stats`] and [`crate::leakage`]. Results are typed serde structs.
//!
//! The [`Analyzer`] also keeps the most recent result per (kind, family).
//! Report building reads that cache rather than recomputing, so a report
//! reflects what has actually been analyzed; a family that was never
//! successfully analyzed stays absent instead of being fabricated from
//! whatever happens to be in the log.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::counters::CacheSnapshot;
use crate::kind::OperationKind;
use crate::leakage::{self, CachePatternReport, DpaReport, SideChannelRisk};
use crate::session::{MeasurementSession, RsaBlock};
use crate::stats::{self, BasicStats, Distribution, TimeSeries};
use crate::store::SessionStore;

/// Buckets in every execution-time histogram.
const HISTOGRAM_BUCKETS: usize = 10;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Analysis family produced by the [`Analyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricFamily {
    Timing,
    Cache,
    Power,
    Rsa,
}

impl fmt::Display for MetricFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricFamily::Timing => "timing",
            MetricFamily::Cache => "cache",
            MetricFamily::Power => "power",
            MetricFamily::Rsa => "rsa",
        };
        f.write_str(name)
    }
}

/// Execution-timing leakage analysis for one operation kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingAnalysis {
    pub kind: OperationKind,
    /// Closed sessions the execution-time sequence was drawn from.
    pub sessions_analyzed: usize,
    /// Statistics over per-session wall times, nanoseconds.
    pub execution: BasicStats,
    pub execution_distribution: Distribution,
    pub execution_series: TimeSeries,
    pub risk: SideChannelRisk,
    /// Round-to-round intervals within a session, pooled across sessions.
    /// `None` until some session records two round marks.
    pub round_interval: Option<BasicStats>,
    /// Round-to-round power steps within a session, pooled across sessions.
    pub power_step: Option<BasicStats>,
}

/// Cache-behavior analysis for one operation kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheAnalysis {
    pub kind: OperationKind,
    pub sessions_analyzed: usize,
    /// Statistics over the per-session L1 miss-rate sequence.
    pub l1_miss_rate: BasicStats,
    /// Motif and burst screening over that same sequence.
    pub patterns: CachePatternReport,
    /// Per-session end-snapshot L2 miss counts.
    pub l2_misses: BasicStats,
    /// Per-session end-snapshot L3 miss counts.
    pub l3_misses: BasicStats,
}

/// Power-consumption analysis for one operation kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerAnalysis {
    pub kind: OperationKind,
    pub sessions_analyzed: usize,
    /// Per-session consumed energy (end meter minus begin meter), joules.
    pub energy_delta: BasicStats,
    /// Differential power analysis over the pooled session traces.
    pub dpa: DpaReport,
    /// Order structure of the pooled trace.
    pub trace_series: TimeSeries,
}

/// RSA-specific cache-miss summary across sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsaCacheSummary {
    /// Per-session key-load miss counts.
    pub key_load_misses: Vec<u64>,
    /// Per-session modulus-load miss counts.
    pub modulus_load_misses: Vec<u64>,
    /// Per-session Montgomery working-set miss counts.
    pub montgomery_misses: Vec<u64>,
    pub mean_key_misses: f64,
    pub mean_modulus_misses: f64,
}

/// Modular-exponentiation analysis, meaningful only for RSA kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsaAnalysis {
    pub kind: OperationKind,
    pub sessions_analyzed: usize,
    /// Modulus size per session, bits.
    pub modulus_sizes: Vec<u64>,
    /// Square-timing first differences pooled across sessions. `None` until
    /// some session marks a modular-exponentiation step.
    pub modexp_interval: Option<BasicStats>,
    /// Working-set access-probe first differences pooled across sessions.
    pub memory_pattern: Option<BasicStats>,
    pub cache_behavior: RsaCacheSummary,
}

/// Every analysis family for one kind, computed in a single pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchMetrics {
    pub kind: OperationKind,
    pub timing: Option<TimingAnalysis>,
    pub cache: Option<CacheAnalysis>,
    pub power: Option<PowerAnalysis>,
    pub rsa: Option<RsaAnalysis>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AnalysisCache {
    timing: HashMap<OperationKind, TimingAnalysis>,
    cache: HashMap<OperationKind, CacheAnalysis>,
    power: HashMap<OperationKind, PowerAnalysis>,
    rsa: HashMap<OperationKind, RsaAnalysis>,
}

/// Computes leakage analyses over a shared [`SessionStore`] and remembers
/// the most recent result per (kind, family).
pub struct Analyzer {
    store: Arc<SessionStore>,
    cache: Mutex<AnalysisCache>,
}

impl Analyzer {
    /// Analyzer over an existing store, typically `recorder.store()`.
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(AnalysisCache::default()),
        }
    }

    /// Execution-timing analysis. `None` while no closed session of `kind`
    /// exists.
    pub fn analyze_timing(&self, kind: OperationKind) -> Option<TimingAnalysis> {
        let sessions = self.store.snapshot(kind);
        let analysis = timing_analysis(kind, &sessions)?;
        self.cache
            .lock()
            .unwrap()
            .timing
            .insert(kind, analysis.clone());
        Some(analysis)
    }

    /// Cache-behavior analysis. `None` while no closed session of `kind`
    /// exists.
    pub fn analyze_cache(&self, kind: OperationKind) -> Option<CacheAnalysis> {
        let sessions = self.store.snapshot(kind);
        let analysis = cache_analysis(kind, &sessions)?;
        self.cache
            .lock()
            .unwrap()
            .cache
            .insert(kind, analysis.clone());
        Some(analysis)
    }

    /// Power-consumption analysis. `None` while no closed session of `kind`
    /// exists.
    pub fn analyze_power(&self, kind: OperationKind) -> Option<PowerAnalysis> {
        let sessions = self.store.snapshot(kind);
        let analysis = power_analysis(kind, &sessions)?;
        self.cache
            .lock()
            .unwrap()
            .power
            .insert(kind, analysis.clone());
        Some(analysis)
    }

    /// Modular-exponentiation analysis. Always `None` for non-RSA kinds;
    /// otherwise `None` until a closed RSA session exists.
    pub fn analyze_rsa(&self, kind: OperationKind) -> Option<RsaAnalysis> {
        let sessions = self.store.snapshot(kind);
        let analysis = rsa_analysis(kind, &sessions)?;
        self.cache
            .lock()
            .unwrap()
            .rsa
            .insert(kind, analysis.clone());
        Some(analysis)
    }

    /// Run every family for `kind` and bundle the results.
    pub fn research_metrics(&self, kind: OperationKind) -> ResearchMetrics {
        ResearchMetrics {
            kind,
            timing: self.analyze_timing(kind),
            cache: self.analyze_cache(kind),
            power: self.analyze_power(kind),
            rsa: self.analyze_rsa(kind),
        }
    }

    pub(crate) fn cached_timing(&self, kind: OperationKind) -> Option<TimingAnalysis> {
        self.cache.lock().unwrap().timing.get(&kind).cloned()
    }

    pub(crate) fn cached_cache(&self, kind: OperationKind) -> Option<CacheAnalysis> {
        self.cache.lock().unwrap().cache.get(&kind).cloned()
    }

    pub(crate) fn cached_power(&self, kind: OperationKind) -> Option<PowerAnalysis> {
        self.cache.lock().unwrap().power.get(&kind).cloned()
    }

    pub(crate) fn cached_rsa(&self, kind: OperationKind) -> Option<RsaAnalysis> {
        self.cache.lock().unwrap().rsa.get(&kind).cloned()
    }
}

// ---------------------------------------------------------------------------
// Family analyses
// ---------------------------------------------------------------------------

fn timing_analysis(
    kind: OperationKind,
    sessions: &[MeasurementSession],
) -> Option<TimingAnalysis> {
    let times = execution_times(sessions);
    let execution = stats::basic_stats(&times)?;
    let execution_distribution = stats::distribution(&times, HISTOGRAM_BUCKETS)?;
    let execution_series = stats::time_series(&times)?;
    let risk = leakage::side_channel_risk(&times)?;

    let round_interval = stats::basic_stats(&round_intervals(sessions));
    let power_step = stats::basic_stats(&power_steps(sessions));

    Some(TimingAnalysis {
        kind,
        sessions_analyzed: times.len(),
        execution,
        execution_distribution,
        execution_series,
        risk,
        round_interval,
        power_step,
    })
}

fn cache_analysis(
    kind: OperationKind,
    sessions: &[MeasurementSession],
) -> Option<CacheAnalysis> {
    let rates = l1_miss_rates(sessions);
    let l1_miss_rate = stats::basic_stats(&rates)?;
    let patterns = leakage::cache_patterns(&rates)?;
    let l2_misses = stats::basic_stats(&level_misses(sessions, |c| c.l2_misses))?;
    let l3_misses = stats::basic_stats(&level_misses(sessions, |c| c.l3_misses))?;

    Some(CacheAnalysis {
        kind,
        sessions_analyzed: rates.len(),
        l1_miss_rate,
        patterns,
        l2_misses,
        l3_misses,
    })
}

fn power_analysis(
    kind: OperationKind,
    sessions: &[MeasurementSession],
) -> Option<PowerAnalysis> {
    let deltas = energy_deltas(sessions);
    let energy_delta = stats::basic_stats(&deltas)?;

    let trace = pooled_trace(sessions);
    let dpa = leakage::differential_power_analysis(&trace)?;
    let trace_series = stats::time_series(&trace)?;

    Some(PowerAnalysis {
        kind,
        sessions_analyzed: deltas.len(),
        energy_delta,
        dpa,
        trace_series,
    })
}

fn rsa_analysis(kind: OperationKind, sessions: &[MeasurementSession]) -> Option<RsaAnalysis> {
    if !kind.is_rsa() {
        return None;
    }
    let blocks: Vec<&RsaBlock> = closed(sessions).filter_map(|s| s.rsa.as_ref()).collect();
    if blocks.is_empty() {
        return None;
    }

    let modexp_interval = stats::basic_stats(&pooled_rsa_diffs(sessions, |r| &r.square_timings));
    let memory_pattern = stats::basic_stats(&pooled_rsa_diffs(sessions, |r| &r.access_pattern));

    let key_load_misses: Vec<u64> = blocks.iter().map(|b| b.key_load_misses).collect();
    let modulus_load_misses: Vec<u64> = blocks.iter().map(|b| b.modulus_load_misses).collect();
    let montgomery_misses: Vec<u64> =
        blocks.iter().map(|b| b.montgomery_cache_misses).collect();
    let n = blocks.len() as f64;
    let cache_behavior = RsaCacheSummary {
        mean_key_misses: key_load_misses.iter().sum::<u64>() as f64 / n,
        mean_modulus_misses: modulus_load_misses.iter().sum::<u64>() as f64 / n,
        key_load_misses,
        modulus_load_misses,
        montgomery_misses,
    };

    Some(RsaAnalysis {
        kind,
        sessions_analyzed: blocks.len(),
        modulus_sizes: blocks.iter().map(|b| b.modulus_size).collect(),
        modexp_interval,
        memory_pattern,
        cache_behavior,
    })
}

// ---------------------------------------------------------------------------
// Sequence extraction
// ---------------------------------------------------------------------------

fn closed(sessions: &[MeasurementSession]) -> impl Iterator<Item = &MeasurementSession> {
    sessions.iter().filter(|s| !s.is_open())
}

fn execution_times(sessions: &[MeasurementSession]) -> Vec<f64> {
    closed(sessions)
        .filter_map(|s| s.execution_time_ns())
        .map(|ns| ns as f64)
        .collect()
}

/// Timestamp first differences between consecutive round marks, per session.
fn round_intervals(sessions: &[MeasurementSession]) -> Vec<f64> {
    let mut diffs = Vec::new();
    for s in closed(sessions) {
        for pair in s.round_marks.windows(2) {
            diffs.push(pair[1].timestamp_ns as f64 - pair[0].timestamp_ns as f64);
        }
    }
    diffs
}

/// Power first differences between consecutive round marks, per session.
fn power_steps(sessions: &[MeasurementSession]) -> Vec<f64> {
    let mut diffs = Vec::new();
    for s in closed(sessions) {
        for pair in s.round_marks.windows(2) {
            diffs.push(pair[1].power - pair[0].power);
        }
    }
    diffs
}

fn l1_miss_rates(sessions: &[MeasurementSession]) -> Vec<f64> {
    closed(sessions).map(|s| s.cache.miss_rate).collect()
}

fn level_misses(
    sessions: &[MeasurementSession],
    pick: impl Fn(&CacheSnapshot) -> u64,
) -> Vec<f64> {
    closed(sessions)
        .filter_map(|s| s.cache.end)
        .map(|snap| pick(&snap) as f64)
        .collect()
}

fn energy_deltas(sessions: &[MeasurementSession]) -> Vec<f64> {
    closed(sessions)
        .filter_map(|s| s.power.energy_delta())
        .collect()
}

/// Session power traces concatenated in log order.
fn pooled_trace(sessions: &[MeasurementSession]) -> Vec<f64> {
    let mut trace = Vec::new();
    for s in closed(sessions) {
        trace.extend_from_slice(&s.power.trace);
    }
    trace
}

/// Within-session first differences of an RSA sample vector, pooled.
fn pooled_rsa_diffs(
    sessions: &[MeasurementSession],
    pick: impl Fn(&RsaBlock) -> &[u64],
) -> Vec<f64> {
    let mut diffs = Vec::new();
    for s in closed(sessions) {
        if let Some(rsa) = &s.rsa {
            for pair in pick(rsa).windows(2) {
                diffs.push(pair[1] as f64 - pair[0] as f64);
            }
        }
    }
    diffs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
