// =============================================================================
// Hurst Exponent — Rescaled Range (R/S) analysis
// =============================================================================
//
// H characterises the long-term memory of a series:
//   H > 0.5 — trending / persistent
//   H ~ 0.5 — random walk
//   H < 0.5 — mean-reverting / anti-persistent
//
// Algorithm (on log-returns of the input):
//   1. For each group size s in {min_period, min_period+5, ..., N/2} that
//      fits at least 2 non-overlapping groups:
//      a. Per group: zero-mean the samples, cumulate the deviations,
//         R = max(cum) - min(cum), S = sample standard deviation,
//         R/S = R / S (0 when S = 0).
//      b. Average R/S across the groups.
//   2. OLS slope of ln(avg R/S) against ln(s) is the Hurst exponent.
//   3. Clamp to [0, 1].
//
// This estimator feeds the regime classifier, which must stay NaN-free, so
// every failure path collapses to the random-walk value 0.5 instead of an
// error.

use tracing::trace;

/// Neutral value returned on any numeric failure.
const NEUTRAL_HURST: f64 = 0.5;

/// Group sizes advance in steps of 5 from `min_period`.
const GROUP_SIZE_STEP: usize = 5;

/// Estimate the Hurst exponent of `values` via R/S analysis.
///
/// Returns 0.5 when:
/// - the series yields too few log-returns,
/// - fewer than three group sizes are usable (a two-point regression is too
///   fragile to act on),
/// - the average R/S of a size is zero (flat groups) or the regression is
///   degenerate.
pub fn hurst_exponent(values: &[f64], min_period: usize) -> f64 {
    let min_period = min_period.max(2);

    // Log-returns, skipping non-positive prices.
    let mut returns = Vec::with_capacity(values.len().saturating_sub(1));
    for pair in values.windows(2) {
        if pair[0] > 0.0 && pair[1] > 0.0 {
            returns.push((pair[1] / pair[0]).ln());
        }
    }

    let n = returns.len();
    if n < 2 * min_period {
        trace!(returns = n, min_period, "hurst: insufficient data");
        return NEUTRAL_HURST;
    }

    let mut log_sizes = Vec::new();
    let mut log_rs = Vec::new();

    let mut size = min_period;
    while size <= n / 2 {
        if let Some(avg_rs) = average_rs(&returns, size) {
            if avg_rs > 0.0 {
                log_sizes.push((size as f64).ln());
                log_rs.push(avg_rs.ln());
            }
        }
        size += GROUP_SIZE_STEP;
    }

    if log_sizes.len() <= 2 {
        trace!(sizes = log_sizes.len(), "hurst: too few group sizes");
        return NEUTRAL_HURST;
    }

    match ols_slope(&log_sizes, &log_rs) {
        Some(slope) if slope.is_finite() => slope.clamp(0.0, 1.0),
        _ => NEUTRAL_HURST,
    }
}

/// Average R/S statistic over all non-overlapping groups of `size`.
/// `None` when fewer than 2 groups fit.
fn average_rs(returns: &[f64], size: usize) -> Option<f64> {
    let group_count = returns.len() / size;
    if group_count < 2 {
        return None;
    }

    let mut sum = 0.0_f64;
    for g in 0..group_count {
        sum += rescaled_range(&returns[g * size..(g + 1) * size]);
    }
    Some(sum / group_count as f64)
}

/// R/S of a single group; 0 when the sample deviation is zero.
fn rescaled_range(group: &[f64]) -> f64 {
    let len = group.len() as f64;
    let mean = group.iter().sum::<f64>() / len;

    let mut running = 0.0_f64;
    let mut max_dev = f64::NEG_INFINITY;
    let mut min_dev = f64::INFINITY;
    for &r in group {
        running += r - mean;
        max_dev = max_dev.max(running);
        min_dev = min_dev.min(running);
    }
    let range = max_dev - min_dev;

    // Sample (n-1) standard deviation.
    let variance = group.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (len - 1.0);
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        0.0
    } else {
        range / std_dev
    }
}

/// Ordinary least-squares slope; `None` on zero x-variance.
fn ols_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut num = 0.0_f64;
    let mut den = 0.0_f64;
    for (x, y) in xs.iter().zip(ys) {
        num += (x - x_mean) * (y - y_mean);
        den += (x - x_mean) * (x - x_mean);
    }

    (den.abs() > f64::EPSILON).then(|| num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_series(len: usize) -> Vec<f64> {
        let mut price = 100.0;
        (0..len)
            .map(|i| {
                price += 0.5 + 0.1 * (i as f64).sin().abs();
                price
            })
            .collect()
    }

    fn oscillating_series(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 100.0 + if i % 2 == 0 { 4.0 } else { -4.0 })
            .collect()
    }

    fn pseudorandom_walk(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        let mut price = 100.0;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                price += (state as f64 / u64::MAX as f64) - 0.5;
                price
            })
            .collect()
    }

    #[test]
    fn hurst_insufficient_data_neutral() {
        assert_eq!(hurst_exponent(&[100.0, 101.0, 102.0], 10), 0.5);
        assert_eq!(hurst_exponent(&[], 10), 0.5);
    }

    #[test]
    fn hurst_flat_series_neutral() {
        // Zero returns everywhere: every group has S = 0, avg R/S = 0.
        let values = vec![42.0; 300];
        assert_eq!(hurst_exponent(&values, 10), 0.5);
    }

    #[test]
    fn hurst_non_positive_prices_skipped() {
        // Interleaved zeros must not poison the estimator.
        let mut values = trending_series(300);
        values.insert(50, 0.0);
        let h = hurst_exponent(&values, 10);
        assert!((0.0..=1.0).contains(&h));
    }

    #[test]
    fn hurst_trending_above_half() {
        let h = hurst_exponent(&trending_series(400), 10);
        assert!(h > 0.5, "trending series should exceed 0.5, got {h:.4}");
    }

    #[test]
    fn hurst_mean_reverting_below_half() {
        let h = hurst_exponent(&oscillating_series(400), 10);
        assert!(h < 0.5, "oscillating series should undercut 0.5, got {h:.4}");
    }

    #[test]
    fn hurst_random_walk_broadly_near_half() {
        let h = hurst_exponent(&pseudorandom_walk(800, 987_654_321), 10);
        assert!((0.3..=0.75).contains(&h), "random walk H={h:.4}");
    }

    #[test]
    fn hurst_clamped_to_unit_interval() {
        let h = hurst_exponent(&trending_series(200), 10);
        assert!((0.0..=1.0).contains(&h));
    }

    #[test]
    fn hurst_deterministic() {
        let values = pseudorandom_walk(500, 7);
        assert_eq!(hurst_exponent(&values, 10), hurst_exponent(&values, 10));
    }
}
