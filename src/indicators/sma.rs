// =============================================================================
// Simple Moving Average (SMA) + crossover detection
// =============================================================================
//
// The SMA series drives the adaptive fast/slow crossover signal and the slow
// trend filter. Crossover detection compares only the last two samples of
// each series, which is all the fused signal needs.

/// Compute the SMA series for `values` with the given look-back `period`.
///
/// The result has length `values.len() - period + 1`; element `i` is the
/// mean of `values[i..i+period]`.
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `values.len() < period` => empty vec
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut result = Vec::with_capacity(values.len() - period + 1);

    // Sliding sum: subtract the departing sample, add the arriving one.
    let mut sum: f64 = values[..period].iter().sum();
    result.push(sum / period_f);

    for i in period..values.len() {
        sum += values[i] - values[i - period];
        result.push(sum / period_f);
    }

    result
}

/// Result of comparing the last two samples of a fast and a slow series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Crossover {
    /// Fast crossed above slow on the most recent sample.
    pub bullish: bool,
    /// Fast crossed below slow on the most recent sample.
    pub bearish: bool,
}

/// Detect a crossover between two series by looking at their last two
/// samples. Either series shorter than two samples yields no crossover.
pub fn detect_crossover(fast: &[f64], slow: &[f64]) -> Crossover {
    let (Some(f_prev), Some(f_now)) = (nth_from_end(fast, 1), nth_from_end(fast, 0)) else {
        return Crossover::default();
    };
    let (Some(s_prev), Some(s_now)) = (nth_from_end(slow, 1), nth_from_end(slow, 0)) else {
        return Crossover::default();
    };

    Crossover {
        bullish: f_prev <= s_prev && f_now > s_now,
        bearish: f_prev >= s_prev && f_now < s_now,
    }
}

fn nth_from_end(series: &[f64], n: usize) -> Option<f64> {
    if series.len() <= n {
        return None;
    }
    Some(series[series.len() - 1 - n])
}
