//! Pure statistics over measurement sequences.
//!
//! Everything here is a stateless function over `&[f64]` returning a typed,
//! serializable result. Empty input yields `None`; division-by-zero cases
//! yield documented sentinels, never NaN, so downstream risk decisions are
//! always comparing real numbers.
//!
//! Conventions, applied identically everywhere:
//! - median is the sorted element at index `n/2` (upper middle for even n)
//! - quartiles are the sorted elements at `n/4` and `3n/4`
//! - standard deviation is the population form (divide by n)

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Maximum autocorrelation lag examined by [`time_series`].
const MAX_LAG: usize = 24;

/// Minimum autocorrelation for a lag to count as a dominant period.
const PERIOD_THRESHOLD: f64 = 0.3;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Moment and order statistics for one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicStats {
    pub count: usize,
    pub mean: f64,
    /// Sorted element at index `n/2`.
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Relative spread: `std_dev / |mean| * 100`. `Some(0.0)` for an all-zero
    /// sequence; `None` when the mean is zero but the spread is not (the
    /// relative variation is unbounded, and a non-finite value would not
    /// survive JSON export).
    pub coefficient_of_variation: Option<f64>,
    pub min: f64,
    pub max: f64,
    /// Sorted element at index `n/4`.
    pub q1: f64,
    /// Sorted element at index `3n/4`.
    pub q3: f64,
    /// Third standardized central moment; 0.0 for near-constant input.
    pub skewness: f64,
    /// Excess kurtosis; 0.0 for near-constant input.
    pub kurtosis: f64,
}

impl BasicStats {
    /// Interquartile range.
    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

/// One equal-width histogram bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
}

/// A value flagged by the 1.5×IQR rule, with its position in the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    pub index: usize,
    pub value: f64,
}

/// Shape of a sequence's value distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub buckets: Vec<HistogramBucket>,
    pub bucket_width: f64,
    /// Jarque–Bera p-value in [0, 1]; higher means more consistent with a
    /// normal distribution. Constant input scores 1.0 (no evidence against).
    pub normality: f64,
    pub outliers: Vec<Outlier>,
}

/// Autocorrelation at a single lag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LagCorrelation {
    pub lag: usize,
    pub correlation: f64,
}

/// Order-sensitive structure of a sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Least-squares slope of value against index.
    pub trend_slope: f64,
    /// Normalized autocorrelation at lags `1..=min(24, n/2)`.
    pub autocorrelation: Vec<LagCorrelation>,
    /// Strongest candidate period: the smallest lag ≥ 2 whose correlation is
    /// maximal and above 0.3.
    pub dominant_period: Option<usize>,
    /// Indices where adjacent sliding-window means shift abruptly.
    pub change_points: Vec<usize>,
}

// ---------------------------------------------------------------------------
// basic_stats
// ---------------------------------------------------------------------------

/// Compute moment and order statistics. `None` on empty input.
pub fn basic_stats(xs: &[f64]) -> Option<BasicStats> {
    if xs.is_empty() {
        return None;
    }

    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = sorted[sorted.len() / 2];
    let q1 = sorted[sorted.len() / 4];
    let q3 = sorted[3 * sorted.len() / 4];
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    let coefficient_of_variation = if mean != 0.0 {
        Some(std_dev / mean.abs() * 100.0)
    } else if std_dev == 0.0 {
        Some(0.0)
    } else {
        None
    };

    let skewness = if std_dev > 1e-10 {
        xs.iter()
            .map(|x| ((x - mean) / std_dev).powi(3))
            .sum::<f64>()
            / n
    } else {
        0.0
    };

    let kurtosis = if std_dev > 1e-10 {
        xs.iter()
            .map(|x| ((x - mean) / std_dev).powi(4))
            .sum::<f64>()
            / n
            - 3.0 // excess kurtosis
    } else {
        0.0
    };

    Some(BasicStats {
        count: xs.len(),
        mean,
        median,
        std_dev,
        coefficient_of_variation,
        min,
        max,
        q1,
        q3,
        skewness,
        kurtosis,
    })
}

// ---------------------------------------------------------------------------
// distribution
// ---------------------------------------------------------------------------

/// Histogram, normality score, and 1.5×IQR outliers. `None` on empty input.
///
/// The histogram spans `[min, max]` in `n_buckets` equal-width buckets; a
/// constant sequence degenerates to a single bucket holding every sample.
pub fn distribution(xs: &[f64], n_buckets: usize) -> Option<Distribution> {
    let stats = basic_stats(xs)?;
    let n_buckets = n_buckets.max(1);

    let range = stats.max - stats.min;
    let (buckets, bucket_width) = if range == 0.0 {
        let single = vec![HistogramBucket {
            lo: stats.min,
            hi: stats.max,
            count: xs.len(),
        }];
        (single, 0.0)
    } else {
        let width = range / n_buckets as f64;
        let mut counts = vec![0usize; n_buckets];
        for &x in xs {
            let idx = (((x - stats.min) / width) as usize).min(n_buckets - 1);
            counts[idx] += 1;
        }
        let buckets = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| HistogramBucket {
                lo: stats.min + i as f64 * width,
                hi: stats.min + (i + 1) as f64 * width,
                count,
            })
            .collect();
        (buckets, width)
    };

    // Jarque–Bera: n/6 * (S² + K²/4) against chi-squared with 2 dof.
    let jb = xs.len() as f64 / 6.0
        * (stats.skewness.powi(2) + stats.kurtosis.powi(2) / 4.0);
    let normality = ChiSquared::new(2.0).unwrap().sf(jb).clamp(0.0, 1.0);

    let outliers = iqr_outliers(xs, &stats);

    Some(Distribution {
        buckets,
        bucket_width,
        normality,
        outliers,
    })
}

/// Values outside the Tukey fences `[q1 - 1.5·IQR, q3 + 1.5·IQR]`.
pub(crate) fn iqr_outliers(xs: &[f64], stats: &BasicStats) -> Vec<Outlier> {
    let iqr = stats.iqr();
    let lo_fence = stats.q1 - 1.5 * iqr;
    let hi_fence = stats.q3 + 1.5 * iqr;
    xs.iter()
        .enumerate()
        .filter(|&(_, &x)| x < lo_fence || x > hi_fence)
        .map(|(index, &value)| Outlier { index, value })
        .collect()
}

// ---------------------------------------------------------------------------
// time_series
// ---------------------------------------------------------------------------

/// Trend, autocorrelation, seasonality, and change points. `None` on empty
/// input; a single sample yields a flat, feature-free result.
pub fn time_series(xs: &[f64]) -> Option<TimeSeries> {
    if xs.is_empty() {
        return None;
    }

    let n = xs.len();
    let mean = xs.iter().sum::<f64>() / n as f64;
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;

    let trend_slope = ols_slope(xs, mean);

    let max_lag = MAX_LAG.min(n / 2);
    let mut autocorrelation = Vec::with_capacity(max_lag);
    for lag in 1..=max_lag {
        autocorrelation.push(LagCorrelation {
            lag,
            correlation: autocorr_at(xs, mean, variance, lag),
        });
    }

    // Smallest lag attaining the maximum wins: a periodic signal correlates
    // equally at every multiple of its fundamental period.
    let mut dominant: Option<LagCorrelation> = None;
    for lc in autocorrelation.iter().filter(|lc| lc.lag >= 2) {
        if dominant.is_none_or(|best| lc.correlation > best.correlation) {
            dominant = Some(*lc);
        }
    }
    let dominant_period = dominant
        .filter(|lc| lc.correlation > PERIOD_THRESHOLD)
        .map(|lc| lc.lag);

    let change_points = change_points(xs);

    Some(TimeSeries {
        trend_slope,
        autocorrelation,
        dominant_period,
        change_points,
    })
}

/// Least-squares slope of value against index. 0.0 when fewer than 2 samples.
fn ols_slope(xs: &[f64], mean: f64) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let idx_mean = (n - 1) as f64 / 2.0;
    let mut cov = 0.0;
    let mut idx_var = 0.0;
    for (i, &x) in xs.iter().enumerate() {
        let di = i as f64 - idx_mean;
        cov += di * (x - mean);
        idx_var += di * di;
    }
    if idx_var == 0.0 { 0.0 } else { cov / idx_var }
}

/// Normalized autocorrelation at one lag; 0.0 for near-constant input.
pub(crate) fn autocorr_at(xs: &[f64], mean: f64, variance: f64, lag: usize) -> f64 {
    if variance < 1e-10 || lag >= xs.len() {
        return 0.0;
    }
    let count = xs.len() - lag;
    let mut sum = 0.0;
    for i in 0..count {
        sum += (xs[i] - mean) * (xs[i + lag] - mean);
    }
    sum / (count as f64 * variance)
}

/// Sliding-window mean-shift detection.
///
/// Flags index `i` when the means of the windows before and after `i` differ
/// by more than twice the pooled within-window deviation. Flagged points are
/// at least one window apart.
fn change_points(xs: &[f64]) -> Vec<usize> {
    let n = xs.len();
    let w = (n / 10).clamp(4, 50);
    if n < 2 * w {
        return Vec::new();
    }

    let mut points = Vec::new();
    let mut i = w;
    while i + w <= n {
        let before = &xs[i - w..i];
        let after = &xs[i..i + w];
        let mean_before = before.iter().sum::<f64>() / w as f64;
        let mean_after = after.iter().sum::<f64>() / w as f64;
        let var_before =
            before.iter().map(|x| (x - mean_before).powi(2)).sum::<f64>() / w as f64;
        let var_after =
            after.iter().map(|x| (x - mean_after).powi(2)).sum::<f64>() / w as f64;
        let pooled = ((var_before + var_after) / 2.0).sqrt();

        if (mean_after - mean_before).abs() > 2.0 * pooled.max(1e-12) {
            points.push(i);
            i += w;
        } else {
            i += 1;
        }
    }
    points
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
