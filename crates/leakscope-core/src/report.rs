//! Exportable per-kind reports assembled from cached analyses.
//!
//! A report never recomputes anything. It collects whatever the [`Analyzer`]
//! has most recently produced for the requested kind, names every family it
//! could not include, and merges the families' mitigation lists into one
//! deduplicated recommendation sequence. Consumers therefore see exactly the
//! state of analysis at build time, including its gaps.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{
    Analyzer, CacheAnalysis, MetricFamily, PowerAnalysis, RsaAnalysis, TimingAnalysis,
};
use crate::kind::OperationKind;
use crate::leakage::{self, Mitigation, RiskLevel};

/// DPA score above which power leakage is rated high and worth masking.
const DPA_RISK_SCORE: f64 = 0.5;

/// DPA score above which power leakage is rated medium.
const DPA_WATCH_SCORE: f64 = 0.25;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Leakage report for one operation kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Random v4 identifier stamped at build time.
    pub id: String,
    pub kind: OperationKind,
    /// Unix timestamp of generation, milliseconds.
    pub generated_at_ms: u64,
    /// Library version that produced the report.
    pub version: String,
    pub timing: Option<TimingAnalysis>,
    pub cache: Option<CacheAnalysis>,
    pub power: Option<PowerAnalysis>,
    /// Requested only for RSA kinds; always `None` otherwise.
    pub rsa: Option<RsaAnalysis>,
    /// Requested families with no analysis to include.
    pub missing_families: Vec<MetricFamily>,
    /// Mitigations merged in timing, cache, power, rsa order; first
    /// occurrence kept.
    pub recommendations: Vec<Mitigation>,
    /// Worst risk grade across the included families.
    pub overall_risk: RiskLevel,
}

impl Analyzer {
    /// Assemble a report for `kind` from the most recently computed analyses.
    ///
    /// Families that were never analyzed are listed in
    /// [`Report::missing_families`] — absent, not fabricated from the log.
    pub fn build_report(&self, kind: OperationKind) -> Report {
        let timing = self.cached_timing(kind);
        let cache = self.cached_cache(kind);
        let power = self.cached_power(kind);
        let rsa = if kind.is_rsa() { self.cached_rsa(kind) } else { None };

        let mut missing_families = Vec::new();
        if timing.is_none() {
            missing_families.push(MetricFamily::Timing);
        }
        if cache.is_none() {
            missing_families.push(MetricFamily::Cache);
        }
        if power.is_none() {
            missing_families.push(MetricFamily::Power);
        }
        if kind.is_rsa() && rsa.is_none() {
            missing_families.push(MetricFamily::Rsa);
        }

        let mut recommendations = Vec::new();
        if let Some(t) = &timing {
            merge_into(&mut recommendations, t.risk.recommendations.clone());
        }
        if let Some(c) = &cache {
            merge_into(&mut recommendations, cache_mitigations(c));
        }
        if let Some(p) = &power {
            merge_into(&mut recommendations, power_mitigations(p));
        }
        if let Some(r) = &rsa {
            merge_into(&mut recommendations, rsa_mitigations(r));
        }

        let mut overall_risk = RiskLevel::Low;
        if let Some(t) = &timing {
            overall_risk = overall_risk.max(timing_level(t));
        }
        if let Some(c) = &cache {
            overall_risk = overall_risk.max(c.patterns.risk);
        }
        if let Some(p) = &power {
            overall_risk = overall_risk.max(power_level(p));
        }
        if let Some(r) = &rsa {
            overall_risk = overall_risk.max(rsa_level(r));
        }

        Report {
            id: Uuid::new_v4().to_string(),
            kind,
            generated_at_ms: unix_ms_now(),
            version: crate::VERSION.to_string(),
            timing,
            cache,
            power,
            rsa,
            missing_families,
            recommendations,
            overall_risk,
        }
    }
}

// ---------------------------------------------------------------------------
// Merge policy
// ---------------------------------------------------------------------------

/// Append `src` to `dst`, keeping the first occurrence of each mitigation.
fn merge_into(dst: &mut Vec<Mitigation>, src: Vec<Mitigation>) {
    for m in src {
        if !dst.contains(&m) {
            dst.push(m);
        }
    }
}

fn cache_mitigations(cache: &CacheAnalysis) -> Vec<Mitigation> {
    match cache.patterns.risk {
        RiskLevel::Low => Vec::new(),
        RiskLevel::Medium => vec![Mitigation::CachePartitioning],
        RiskLevel::High => vec![Mitigation::CachePartitioning, Mitigation::NoiseInjection],
    }
}

fn power_mitigations(power: &PowerAnalysis) -> Vec<Mitigation> {
    if power.dpa.vulnerability_score > DPA_RISK_SCORE {
        vec![Mitigation::NoiseInjection]
    } else {
        Vec::new()
    }
}

fn rsa_mitigations(rsa: &RsaAnalysis) -> Vec<Mitigation> {
    if variable_modexp(rsa) {
        vec![Mitigation::ConstantTimePadding]
    } else {
        Vec::new()
    }
}

fn timing_level(timing: &TimingAnalysis) -> RiskLevel {
    match (timing.risk.variable_timing, timing.risk.outlier_risk) {
        (true, true) => RiskLevel::High,
        (false, false) => RiskLevel::Low,
        _ => RiskLevel::Medium,
    }
}

fn power_level(power: &PowerAnalysis) -> RiskLevel {
    if power.dpa.vulnerability_score > DPA_RISK_SCORE {
        RiskLevel::High
    } else if power.dpa.vulnerability_score > DPA_WATCH_SCORE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn rsa_level(rsa: &RsaAnalysis) -> RiskLevel {
    if variable_modexp(rsa) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Whether modular-exponentiation step timing shows the same variability
/// that trips the execution-time flag.
fn variable_modexp(rsa: &RsaAnalysis) -> bool {
    rsa.modexp_interval.as_ref().is_some_and(|stats| {
        stats
            .coefficient_of_variation
            .is_none_or(|cv| cv > leakage::VARIABLE_TIMING_CV)
    })
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
