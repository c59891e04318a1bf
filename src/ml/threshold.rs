//! Percentile thresholds over reconstruction errors

/// Percentile used to derive the anomaly threshold
pub const ANOMALY_PERCENTILE: f64 = 95.0;

/// Compute percentile of sorted values using linear interpolation
///
/// `p` is in percent. The rank is `p/100 * (n-1)`, interpolated between
/// the neighbouring order statistics. Empty input yields 0.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Percentile of unsorted values
pub fn percentile_of(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, p)
}

/// Flag every value strictly above the threshold
pub fn flag_above(values: &[f64], threshold: f64) -> Vec<bool> {
    values.iter().map(|&v| v > threshold).collect()
}
