// =============================================================================
// Stochastic Oscillator
// =============================================================================
//
// %K = 100 * (close - lowest_low(k_period)) / (highest_high - lowest_low)
// %D = SMA(%K, d_period)

use crate::indicators::sma::calculate_sma;
use crate::market_data::Bar;

/// Most recent %K / %D pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stochastic {
    pub k: f64,
    pub d: f64,
}

/// Calculate the stochastic oscillator over `bars` (oldest first).
///
/// Returns `None` when fewer than `k_period + d_period - 1` bars are
/// available or every window in the %D span is degenerate (flat range).
pub fn calculate_stochastic(bars: &[Bar], k_period: usize, d_period: usize) -> Option<Stochastic> {
    if k_period == 0 || d_period == 0 || bars.len() < k_period + d_period - 1 {
        return None;
    }

    // %K series over the last d_period windows.
    let mut k_series = Vec::with_capacity(d_period);
    for offset in (0..d_period).rev() {
        let end = bars.len() - offset;
        let window = &bars[end - k_period..end];

        let highest = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let lowest = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let close = window.last()?.close;

        let range = highest - lowest;
        let k = if range == 0.0 {
            // Flat window: price sits mid-range by convention.
            50.0
        } else {
            100.0 * (close - lowest) / range
        };
        if !k.is_finite() {
            return None;
        }
        k_series.push(k);
    }

    let d = *calculate_sma(&k_series, d_period).last()?;
    let k = *k_series.last()?;
    Some(Stochastic { k, d })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::test_support::bar_ohlc;

    #[test]
    fn stochastic_insufficient_data() {
        let bars: Vec<Bar> = (0..10)
            .map(|i| bar_ohlc(i as i64, 100.0, 101.0, 99.0, 100.0))
            .collect();
        assert!(calculate_stochastic(&bars, 14, 3).is_none());
    }

    #[test]
    fn stochastic_close_at_high_yields_100() {
        let bars: Vec<Bar> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                bar_ohlc(i as i64, base - 0.5, base, base - 1.0, base)
            })
            .collect();
        let s = calculate_stochastic(&bars, 14, 3).unwrap();
        assert!(s.k > 90.0, "close at window high should push %K up, got {}", s.k);
    }

    #[test]
    fn stochastic_close_at_low_yields_0() {
        let bars: Vec<Bar> = (0..20)
            .map(|i| {
                let base = 200.0 - i as f64;
                bar_ohlc(i as i64, base + 0.5, base + 1.0, base, base)
            })
            .collect();
        let s = calculate_stochastic(&bars, 14, 3).unwrap();
        assert!(s.k < 10.0, "close at window low should push %K down, got {}", s.k);
    }

    #[test]
    fn stochastic_flat_window_mid_range() {
        let bars: Vec<Bar> = (0..20)
            .map(|i| bar_ohlc(i as i64, 100.0, 100.0, 100.0, 100.0))
            .collect();
        let s = calculate_stochastic(&bars, 14, 3).unwrap();
        assert!((s.k - 50.0).abs() < 1e-12);
        assert!((s.d - 50.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_bounded() {
        let bars: Vec<Bar> = (0..60)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.5).sin() * 5.0;
                bar_ohlc(i as i64, base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let s = calculate_stochastic(&bars, 14, 3).unwrap();
        assert!((0.0..=100.0).contains(&s.k));
        assert!((0.0..=100.0).contains(&s.d));
    }
}
