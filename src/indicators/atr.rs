// =============================================================================
// Average True Range (ATR) — Wilder's smoothing
// =============================================================================
//
// True Range per bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR_0 = SMA of the first `period` TR values,
// ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period.

use crate::market_data::Bar;

/// Compute the most recent ATR value from `bars` (oldest first).
///
/// Returns `None` when `period` is zero, fewer than `period + 1` bars are
/// available (every TR needs a predecessor), or an intermediate is
/// non-finite.
pub fn calculate_atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let mut tr_values = Vec::with_capacity(bars.len() - 1);
    for pair in bars.windows(2) {
        let prev_close = pair[0].close;
        let bar = &pair[1];
        let tr = (bar.high - bar.low)
            .max((bar.high - prev_close).abs())
            .max((bar.low - prev_close).abs());
        tr_values.push(tr);
    }

    let period_f = period as f64;
    let mut atr: f64 = tr_values[..period].iter().sum::<f64>() / period_f;
    if !atr.is_finite() {
        return None;
    }

    for &tr in &tr_values[period..] {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        if !atr.is_finite() {
            return None;
        }
    }

    Some(atr)
}

/// ATR normalized to the latest close: `100 * ATR / close`.
///
/// Comparable across assets with different price scales; this is the form
/// the regime detector ranks into a percentile.
pub fn calculate_atr_normalized(bars: &[Bar], period: usize) -> Option<f64> {
    let atr = calculate_atr(bars, period)?;
    let close = bars.last()?.close;
    if close <= 0.0 {
        return None;
    }
    Some(100.0 * atr / close)
}
