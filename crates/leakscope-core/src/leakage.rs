//! Leakage heuristics: timing-risk flags, cache access motifs, and a
//! first-order differential power analysis.
//!
//! These are screening passes, not proofs. Each function reduces one
//! measurement sequence to flags, indices, and a score that a report can act
//! on. Thresholds are the conventional screening values: 1% relative timing
//! spread, 3σ access bursts, 2σ power peaks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stats::{self, LagCorrelation};

/// Coefficient of variation (percent) above which timing counts as variable.
pub(crate) const VARIABLE_TIMING_CV: f64 = 1.0;

/// Outlier fraction above which access timing counts as irregular.
const OUTLIER_RISK_RATIO: f64 = 0.05;

/// Minimum autocorrelation for a lag to count as a recurring motif.
const MOTIF_THRESHOLD: f64 = 0.4;

/// Longest lag scanned for cache motifs.
const MOTIF_MAX_LAG: usize = 32;

/// Longest lag scanned in power-trace self-correlation.
const DPA_MAX_LAG: usize = 16;

/// Burst threshold, in trailing-window standard deviations.
const BURST_SIGMAS: f64 = 3.0;

/// Peak threshold, in trailing-window standard deviations.
const PEAK_SIGMAS: f64 = 2.0;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Countermeasure suggested by a tripped risk flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mitigation {
    ConstantTimePadding,
    CachePartitioning,
    NoiseInjection,
}

impl Mitigation {
    /// Actionable guidance for reports.
    pub fn description(&self) -> &'static str {
        match self {
            Mitigation::ConstantTimePadding => {
                "pad the operation to constant time; execution time varies with input"
            }
            Mitigation::CachePartitioning => {
                "partition or preload cache lines; access timing is irregular"
            }
            Mitigation::NoiseInjection => {
                "inject scheduling noise; timing and access patterns leak together"
            }
        }
    }
}

impl fmt::Display for Mitigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mitigation::ConstantTimePadding => "constant_time_padding",
            Mitigation::CachePartitioning => "cache_partitioning",
            Mitigation::NoiseInjection => "noise_injection",
        };
        f.write_str(name)
    }
}

/// Timing-variance screening verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideChannelRisk {
    /// Relative timing spread exceeds 1%, or is unbounded (zero mean with
    /// nonzero spread).
    pub variable_timing: bool,
    /// `1 − min(1, std_dev / |mean|)`: 1.0 is perfectly repeatable.
    pub consistency_score: f64,
    /// More than 5% of samples fall outside the Tukey fences.
    pub outlier_risk: bool,
    /// Fraction of samples flagged as outliers.
    pub outlier_ratio: f64,
    pub recommendations: Vec<Mitigation>,
}

/// Coarse severity grade, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(name)
    }
}

/// A lag at which the sequence repeats itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PatternMotif {
    pub lag: usize,
    /// Autocorrelation at this lag, above [`MOTIF_THRESHOLD`].
    pub strength: f64,
}

/// Recurring structure and spikes in an access-timing sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachePatternReport {
    /// Lags whose autocorrelation exceeds 0.4, ascending.
    pub motifs: Vec<PatternMotif>,
    /// Indices deviating more than 3σ from the trailing-window mean.
    pub bursts: Vec<usize>,
    /// High when both motifs and bursts are present, Medium when exactly one
    /// is, Low otherwise.
    pub risk: RiskLevel,
}

/// First-order differential power analysis summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DpaReport {
    /// Power-trace self-correlation at lags `1..=min(16, n/2)`. Sustained
    /// high values are a proxy for key-dependent branching.
    pub lag_correlations: Vec<LagCorrelation>,
    /// Strict local maxima more than 2σ above the trailing-window mean.
    pub anomalous_peaks: Vec<usize>,
    /// `½·min(1, 10·peaks/n) + ½·max |lag correlation|`, in [0, 1].
    pub vulnerability_score: f64,
}

// ---------------------------------------------------------------------------
// side_channel_risk
// ---------------------------------------------------------------------------

/// Screen a timing sequence for data-dependent behavior. `None` on empty
/// input.
pub fn side_channel_risk(xs: &[f64]) -> Option<SideChannelRisk> {
    let summary = stats::basic_stats(xs)?;

    // An undefined CV (zero mean, nonzero spread) means relative variation
    // is unbounded, the worst case rather than a pass.
    let variable_timing = summary
        .coefficient_of_variation
        .is_none_or(|cv| cv > VARIABLE_TIMING_CV);

    let consistency_score = if summary.mean != 0.0 {
        1.0 - (summary.std_dev / summary.mean.abs()).min(1.0)
    } else if summary.std_dev == 0.0 {
        1.0
    } else {
        0.0
    };

    let outlier_ratio = stats::iqr_outliers(xs, &summary).len() as f64 / xs.len() as f64;
    let outlier_risk = outlier_ratio > OUTLIER_RISK_RATIO;

    let mut recommendations = Vec::new();
    if variable_timing {
        recommendations.push(Mitigation::ConstantTimePadding);
    }
    if outlier_risk {
        recommendations.push(Mitigation::CachePartitioning);
    }
    if variable_timing && outlier_risk {
        recommendations.push(Mitigation::NoiseInjection);
    }

    Some(SideChannelRisk {
        variable_timing,
        consistency_score,
        outlier_risk,
        outlier_ratio,
        recommendations,
    })
}

// ---------------------------------------------------------------------------
// cache_patterns
// ---------------------------------------------------------------------------

/// Detect recurring motifs and bursts in access timing. `None` on empty
/// input.
pub fn cache_patterns(xs: &[f64]) -> Option<CachePatternReport> {
    if xs.is_empty() {
        return None;
    }

    let n = xs.len();
    let mean = xs.iter().sum::<f64>() / n as f64;
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    let mut motifs = Vec::new();
    for lag in 2..=MOTIF_MAX_LAG.min(n / 2) {
        let strength = stats::autocorr_at(xs, mean, variance, lag);
        if strength > MOTIF_THRESHOLD {
            motifs.push(PatternMotif { lag, strength });
        }
    }

    let w = rolling_width(n);
    let mut bursts = Vec::new();
    for i in w..n {
        let (win_mean, win_dev) = trailing_window(xs, i, w);
        if (xs[i] - win_mean).abs() > BURST_SIGMAS * win_dev.max(1e-12) {
            bursts.push(i);
        }
    }

    let risk = match (motifs.is_empty(), bursts.is_empty()) {
        (false, false) => RiskLevel::High,
        (true, true) => RiskLevel::Low,
        _ => RiskLevel::Medium,
    };

    Some(CachePatternReport { motifs, bursts, risk })
}

// ---------------------------------------------------------------------------
// differential_power_analysis
// ---------------------------------------------------------------------------

/// Correlate a power trace against itself and flag anomalous peaks. `None`
/// on empty input.
///
/// A peak must be a strict local maximum, so a monotonic ramp produces none
/// however steep it is.
pub fn differential_power_analysis(xs: &[f64]) -> Option<DpaReport> {
    if xs.is_empty() {
        return None;
    }

    let n = xs.len();
    let mean = xs.iter().sum::<f64>() / n as f64;
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    let mut lag_correlations = Vec::new();
    for lag in 1..=DPA_MAX_LAG.min(n / 2) {
        lag_correlations.push(LagCorrelation {
            lag,
            correlation: stats::autocorr_at(xs, mean, variance, lag),
        });
    }

    let w = rolling_width(n);
    let mut anomalous_peaks = Vec::new();
    for i in w..n.saturating_sub(1) {
        let (win_mean, win_dev) = trailing_window(xs, i, w);
        if xs[i] > xs[i - 1]
            && xs[i] > xs[i + 1]
            && xs[i] > win_mean + PEAK_SIGMAS * win_dev.max(1e-12)
        {
            anomalous_peaks.push(i);
        }
    }

    let peak_density = anomalous_peaks.len() as f64 / n as f64;
    let max_correlation = lag_correlations
        .iter()
        .map(|lc| lc.correlation.abs())
        .fold(0.0, f64::max);
    let vulnerability_score =
        0.5 * (peak_density * 10.0).min(1.0) + 0.5 * max_correlation.min(1.0);

    Some(DpaReport {
        lag_correlations,
        anomalous_peaks,
        vulnerability_score,
    })
}

/// Rolling-window width for burst and peak detection.
fn rolling_width(n: usize) -> usize {
    (n / 8).clamp(4, 32)
}

/// Mean and population deviation of the `w` samples before index `i`.
/// Caller guarantees `i >= w`.
fn trailing_window(xs: &[f64], i: usize, w: usize) -> (f64, f64) {
    let window = &xs[i - w..i];
    let mean = window.iter().sum::<f64>() / w as f64;
    let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / w as f64;
    (mean, variance.sqrt())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_none() {
        assert!(side_channel_risk(&[]).is_none());
        assert!(cache_patterns(&[]).is_none());
        assert!(differential_power_analysis(&[]).is_none());
    }

    #[test]
    fn test_constant_timing_is_clean() {
        let risk = side_channel_risk(&[7.0; 32]).unwrap();
        assert!(!risk.variable_timing);
        assert!(!risk.outlier_risk);
        assert_eq!(risk.consistency_score, 1.0);
        assert_eq!(risk.outlier_ratio, 0.0);
        assert!(risk.recommendations.is_empty());
    }

    #[test]
    fn test_small_jitter_stays_below_threshold() {
        // CV ≈ 0.07%, well under the 1% flag.
        let risk = side_channel_risk(&[1000.0, 1001.0, 999.0, 1000.0]).unwrap();
        assert!(!risk.variable_timing);
        assert!(risk.consistency_score > 0.99);
        assert!(risk.recommendations.is_empty());
    }

    #[test]
    fn test_spike_trips_every_flag() {
        let risk = side_channel_risk(&[1.0, 1.0, 1.0, 1.0, 100.0]).unwrap();
        assert!(risk.variable_timing);
        assert!(risk.outlier_risk);
        assert!((risk.outlier_ratio - 0.2).abs() < 1e-12);
        assert_eq!(risk.consistency_score, 0.0);
        assert_eq!(
            risk.recommendations,
            vec![
                Mitigation::ConstantTimePadding,
                Mitigation::CachePartitioning,
                Mitigation::NoiseInjection,
            ]
        );
    }

    #[test]
    fn test_zero_mean_spread_counts_as_variable() {
        let risk = side_channel_risk(&[-5.0, 5.0, -5.0, 5.0]).unwrap();
        assert!(risk.variable_timing);
        assert_eq!(risk.consistency_score, 0.0);
        assert!(!risk.outlier_risk);
        assert_eq!(risk.recommendations, vec![Mitigation::ConstantTimePadding]);
    }

    #[test]
    fn test_constant_access_timing_is_low_risk() {
        let report = cache_patterns(&[3.0; 64]).unwrap();
        assert!(report.motifs.is_empty());
        assert!(report.bursts.is_empty());
        assert_eq!(report.risk, RiskLevel::Low);
    }

    #[test]
    fn test_periodic_access_without_bursts_is_medium() {
        let xs: Vec<f64> = (0..64)
            .map(|i| if (i / 2) % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let report = cache_patterns(&xs).unwrap();
        assert!(report.motifs.iter().any(|m| m.lag == 4));
        assert!(report.bursts.is_empty());
        assert_eq!(report.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_lone_burst_without_motifs_is_medium() {
        let mut xs = vec![10.0; 100];
        xs[70] = 500.0;
        let report = cache_patterns(&xs).unwrap();
        assert!(report.motifs.is_empty());
        assert_eq!(report.bursts, vec![70]);
        assert_eq!(report.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_motif_plus_burst_is_high() {
        let mut xs: Vec<f64> = (0..64)
            .map(|i| if (i / 2) % 2 == 0 { 20.0 } else { -20.0 })
            .collect();
        xs[40] = 100.0;
        let report = cache_patterns(&xs).unwrap();
        assert!(report.motifs.iter().any(|m| m.lag == 4 && m.strength > 0.4));
        assert_eq!(report.bursts, vec![40]);
        assert_eq!(report.risk, RiskLevel::High);
    }

    #[test]
    fn test_monotonic_ramp_has_no_dpa_peaks() {
        let xs: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let report = differential_power_analysis(&xs).unwrap();
        assert!(report.anomalous_peaks.is_empty());
        assert_eq!(report.lag_correlations.len(), 16);
        // Everything rides on the correlation half of the score.
        assert!(report.vulnerability_score < 0.5);
        // The ramp is still visible as trend, just not as peaks.
        assert!(stats::time_series(&xs).unwrap().trend_slope > 0.9);
    }

    #[test]
    fn test_flat_trace_scores_zero() {
        let report = differential_power_analysis(&[0.5; 80]).unwrap();
        assert!(report.anomalous_peaks.is_empty());
        assert!(report.lag_correlations.iter().all(|lc| lc.correlation == 0.0));
        assert_eq!(report.vulnerability_score, 0.0);
    }

    #[test]
    fn test_periodic_spikes_are_flagged_as_peaks() {
        // Spike every 7th sample; the first falls inside the warmup window
        // and the last has no right neighbor.
        let xs: Vec<f64> = (0..70)
            .map(|i| if i % 7 == 6 { 10.0 } else { 1.0 })
            .collect();
        let report = differential_power_analysis(&xs).unwrap();
        assert_eq!(report.anomalous_peaks, vec![13, 20, 27, 34, 41, 48, 55, 62]);
        let lag7 = &report.lag_correlations[6];
        assert_eq!(lag7.lag, 7);
        assert!(lag7.correlation > 0.95);
        assert!(report.vulnerability_score > 0.9);
    }

    #[test]
    fn test_risk_levels_are_ordered() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::High.to_string(), "high");
    }

    #[test]
    fn test_mitigations_describe_themselves() {
        for m in [
            Mitigation::ConstantTimePadding,
            Mitigation::CachePartitioning,
            Mitigation::NoiseInjection,
        ] {
            assert!(!m.description().is_empty());
            assert!(!m.to_string().contains(' '));
        }
    }

    #[test]
    fn test_leakage_serde_roundtrip() {
        let xs: Vec<f64> = (0..64).map(|i| (i % 9) as f64).collect();
        let risk = side_channel_risk(&xs).unwrap();
        let json = serde_json::to_string(&risk).unwrap();
        let parsed: SideChannelRisk = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.consistency_score, risk.consistency_score);
        assert_eq!(parsed.recommendations, risk.recommendations);

        let dpa = differential_power_analysis(&xs).unwrap();
        let json = serde_json::to_string(&dpa).unwrap();
        let parsed: DpaReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.vulnerability_score, dpa.vulnerability_score);
        assert_eq!(parsed.anomalous_peaks, dpa.anomalous_peaks);
    }
}
