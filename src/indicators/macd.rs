// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
// MACD line = EMA(fast) - EMA(slow), signal = EMA(MACD line, signal_period),
// histogram = MACD - signal. Standard parameters 12/26/9.

use crate::indicators::ema::calculate_ema;

/// Most recent MACD values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Calculate MACD over `values`.
///
/// Returns `None` when the series is too short to produce the slow EMA plus
/// `signal_period` samples of the MACD line.
pub fn calculate_macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Option<Macd> {
    if fast_period == 0 || slow_period == 0 || signal_period == 0 || fast_period >= slow_period {
        return None;
    }

    let fast = calculate_ema(values, fast_period);
    let slow = calculate_ema(values, slow_period);
    if slow.is_empty() {
        return None;
    }

    // Align the two series on their tails: the slow EMA starts later, so
    // drop the fast EMA's head.
    let overlap = slow.len().min(fast.len());
    let macd_line: Vec<f64> = fast[fast.len() - overlap..]
        .iter()
        .zip(&slow[slow.len() - overlap..])
        .map(|(f, s)| f - s)
        .collect();

    let signal_series = calculate_ema(&macd_line, signal_period);
    let signal = *signal_series.last()?;
    let macd = *macd_line.last()?;

    Some(Macd {
        macd,
        signal,
        histogram: macd - signal,
    })
}
