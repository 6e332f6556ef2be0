//! # leakscope-core
//!
//! **Record the operation, read the side channels.**
//!
//! `leakscope-core` instruments cryptographic operations — block ciphers,
//! modular exponentiation, signatures, hashing, key derivation — and turns
//! raw per-session samples into statistical evidence of side-channel
//! leakage: timing variance, cache-miss structure, power-trace anomalies,
//! and a differential-power verdict.
//!
//! ## Quick Start
//!
//! ```no_run
//! use leakscope_core::{Analyzer, OperationKind, Recorder, SessionParams};
//!
//! // Record a few instrumented AES runs against simulated counters.
//! let recorder = Recorder::simulated();
//! for _ in 0..32 {
//!     let run = recorder.begin(OperationKind::AesEncrypt, SessionParams::with_key_size(256));
//!     for round in 0..10 {
//!         recorder.mark_round(&run, round);
//!     }
//!     recorder.end(&run);
//! }
//!
//! // Analyze, then package the results.
//! let analyzer = Analyzer::new(recorder.store());
//! analyzer.research_metrics(OperationKind::AesEncrypt);
//! let report = analyzer.build_report(OperationKind::AesEncrypt);
//! println!("overall risk: {}", report.overall_risk);
//! ```
//!
//! ## Architecture
//!
//! Counters → Recorder → SessionStore → {stats, leakage} → Analyzer → Report
//!
//! - A [`CounterSource`] supplies timestamps, cache/branch/memory snapshots,
//!   and power samples; [`SimulatedCounters`] stands in where no PMU backend
//!   is wired up.
//! - The [`Recorder`] owns session lifecycle: begin, round marks, end.
//!   Sessions land in an append-only per-kind log inside [`SessionStore`],
//!   one lock per kind, so different kinds never contend.
//! - [`stats`] and [`leakage`] are pure functions over `&[f64]` — no state,
//!   no I/O, defined sentinels instead of NaN.
//! - The [`Analyzer`] derives per-family sequences from closed sessions,
//!   reduces them, and keeps the most recent result per (kind, family);
//!   [`Analyzer::build_report`] packages that cache without recomputing,
//!   naming any family that was never analyzed.

pub mod analysis;
pub mod counters;
pub mod kind;
pub mod leakage;
pub mod recorder;
pub mod report;
pub mod session;
pub mod stats;
pub mod store;

pub use analysis::{
    Analyzer, CacheAnalysis, MetricFamily, PowerAnalysis, ResearchMetrics, RsaAnalysis,
    RsaCacheSummary, TimingAnalysis,
};
pub use counters::{
    BranchSnapshot, CacheSnapshot, CounterSource, MemorySnapshot, PowerSnapshot, RsaProbe,
    SimulatedCounters,
};
pub use kind::{OperationKind, UnknownOperationKind};
pub use leakage::{
    CachePatternReport, DpaReport, Mitigation, PatternMotif, RiskLevel, SideChannelRisk,
    cache_patterns, differential_power_analysis, side_channel_risk,
};
pub use recorder::{Recorder, SessionHandle};
pub use report::Report;
pub use session::{
    BranchBlock, CacheBlock, MeasurementSession, MemoryBlock, PowerBlock, RoundMark, RsaBlock,
    SessionParams,
};
pub use stats::{
    BasicStats, Distribution, HistogramBucket, LagCorrelation, Outlier, TimeSeries, basic_stats,
    distribution, time_series,
};
pub use store::SessionStore;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
