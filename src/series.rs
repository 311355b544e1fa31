//! Hourly series helpers shared by the technology models and the aggregator.
//!
//! An hourly series is a plain `Vec<f64>`, one sample per hour. Years follow
//! the non-leap 8760-hour convention; multi-year series are concatenations.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ordered_float::OrderedFloat;

/// One sample per hour, implicitly time-indexed from the series start.
pub type HourlySeries = Vec<f64>;

pub const HOURS_PER_YEAR: usize = 8760;

/// Replace NaN and infinite samples with `fallback`
pub fn sanitize(values: &[f64], fallback: f64) -> HourlySeries {
    values
        .iter()
        .map(|v| if v.is_finite() { *v } else { fallback })
        .collect()
}

/// Plant capacity with negative and non-finite values treated as zero
pub fn sanitize_capacity(capacity_kw: f64) -> f64 {
    if capacity_kw.is_finite() {
        capacity_kw.max(0.0)
    } else {
        0.0
    }
}

/// Number of non-finite samples, used for diagnostics only
pub fn count_invalid(values: &[f64]) -> usize {
    values.iter().filter(|v| !v.is_finite()).count()
}

/// Shortest length among series that are combined sample-by-sample.
///
/// Series of mismatched length are never zipped silently past the shortest one.
pub fn aligned_len(series: &[&[f64]]) -> usize {
    series.iter().map(|s| s.len()).min().unwrap_or(0)
}

/// Percentile with linear interpolation between closest ranks.
///
/// Non-finite samples are ignored. Returns `None` when no finite sample exists.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_unstable_by_key(|v| OrderedFloat(*v));

    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

/// Trailing rolling mean over `window` samples.
///
/// The first `window - 1` outputs average whatever history is available, so the
/// output has the same length as the input and no warm-up gap.
pub fn rolling_mean(values: &[f64], window: usize) -> HourlySeries {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        let n = (i + 1).min(window);
        out.push(sum / n as f64);
    }
    out
}

/// `n` evenly spaced samples over `[start, end]`, both ends included
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Hourly timestamps starting at January 1st 00:00 of `year`
pub fn hourly_stamps(year: i32, hours: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (0..hours)
        .map(|h| start + Duration::hours(h as i64))
        .collect()
}

/// Fractional number of 8760-hour years covered by `hours` samples
pub fn years_covered(hours: usize) -> f64 {
    hours as f64 / HOURS_PER_YEAR as f64
}
