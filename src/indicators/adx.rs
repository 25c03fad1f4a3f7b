// =============================================================================
// Average Directional Index (ADX) with +DI / -DI
// =============================================================================
//
// Pipeline (standard Wilder):
//   1. +DM, -DM and True Range per bar.
//   2. Wilder-smooth +DM, -DM, TR over `period`.
//   3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//      -DI = 100 * smoothed(-DM) / smoothed(TR)
//   4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//   5. ADX = Wilder-smoothed average of DX.
//
// The regime rules need the DI pair as well as ADX (trend direction comes
// from +DI vs -DI), so the full triplet is returned.

use crate::market_data::Bar;

/// ADX triplet: trend strength plus the directional index pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxResult {
    pub adx: f64,
    /// +DI — positive directional index.
    pub pdi: f64,
    /// -DI — negative directional index.
    pub mdi: f64,
}

/// Compute the most recent ADX/+DI/-DI from `bars` (oldest first).
///
/// Returns `None` when `period` is zero, fewer than `2 * period + 1` bars
/// are available (`period` transitions seed the DM/TR smoothing and another
/// `period` DX values seed the ADX average), or any intermediate is
/// non-finite.
pub fn calculate_adx(bars: &[Bar], period: usize) -> Option<AdxResult> {
    if period == 0 || bars.len() < 2 * period + 1 {
        return None;
    }

    let period_f = period as f64;
    let transitions = bars.len() - 1;

    let mut plus_dm = Vec::with_capacity(transitions);
    let mut minus_dm = Vec::with_capacity(transitions);
    let mut tr_vals = Vec::with_capacity(transitions);

    for pair in bars.windows(2) {
        let prev = &pair[0];
        let bar = &pair[1];

        let tr = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());

        let up_move = bar.high - prev.high;
        let down_move = prev.low - bar.low;

        plus_dm.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dm.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
        tr_vals.push(tr);
    }

    // Initial sums, then Wilder's running smoothing.
    let mut smooth_plus: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = tr_vals[..period].iter().sum();

    let mut dx_values = Vec::with_capacity(transitions - period + 1);
    let (mut pdi, mut mdi, dx) = directional_values(smooth_plus, smooth_minus, smooth_tr)?;
    dx_values.push(dx);

    for i in period..transitions {
        smooth_plus = smooth_plus - smooth_plus / period_f + plus_dm[i];
        smooth_minus = smooth_minus - smooth_minus / period_f + minus_dm[i];
        smooth_tr = smooth_tr - smooth_tr / period_f + tr_vals[i];

        let (p, m, dx) = directional_values(smooth_plus, smooth_minus, smooth_tr)?;
        pdi = p;
        mdi = m;
        dx_values.push(dx);
    }

    if dx_values.len() < period {
        return None;
    }

    let mut adx: f64 = dx_values[..period].iter().sum::<f64>() / period_f;
    for &dx in &dx_values[period..] {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
    }

    if !adx.is_finite() {
        return None;
    }

    Some(AdxResult { adx, pdi, mdi })
}

/// (+DI, -DI, DX) from smoothed sums. `None` when TR is zero or the result
/// is non-finite; a zero DI sum is legitimate (no directional movement) and
/// yields DX = 0.
fn directional_values(smooth_plus: f64, smooth_minus: f64, smooth_tr: f64) -> Option<(f64, f64, f64)> {
    if smooth_tr == 0.0 {
        return None;
    }

    let pdi = 100.0 * smooth_plus / smooth_tr;
    let mdi = 100.0 * smooth_minus / smooth_tr;

    let di_sum = pdi + mdi;
    let dx = if di_sum == 0.0 {
        0.0
    } else {
        100.0 * (pdi - mdi).abs() / di_sum
    };

    (pdi.is_finite() && mdi.is_finite() && dx.is_finite()).then_some((pdi, mdi, dx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::test_support::bar_ohlc;

    fn uptrend(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                bar_ohlc(i as i64, base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect()
    }

    fn downtrend(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let base = 300.0 - i as f64 * 2.0;
                bar_ohlc(i as i64, base, base + 0.5, base - 1.5, base - 1.0)
            })
            .collect()
    }

    #[test]
    fn adx_period_zero() {
        assert!(calculate_adx(&uptrend(50), 0).is_none());
    }

    #[test]
    fn adx_insufficient_data() {
        assert!(calculate_adx(&uptrend(10), 14).is_none());
    }

    #[test]
    fn adx_minimum_bars_exact() {
        let period = 5;
        let bars = uptrend(2 * period + 1);
        assert!(calculate_adx(&bars, period).is_some());
        assert!(calculate_adx(&bars[..bars.len() - 1], period).is_none());
    }

    #[test]
    fn adx_strong_uptrend_pdi_dominates() {
        let result = calculate_adx(&uptrend(60), 14).unwrap();
        assert!(result.adx > 25.0, "expected trending ADX, got {}", result.adx);
        assert!(result.pdi > result.mdi);
    }

    #[test]
    fn adx_strong_downtrend_mdi_dominates() {
        let result = calculate_adx(&downtrend(60), 14).unwrap();
        assert!(result.adx > 25.0);
        assert!(result.mdi > result.pdi);
    }

    #[test]
    fn adx_flat_market_near_zero() {
        let bars: Vec<Bar> = (0..60)
            .map(|i| bar_ohlc(i as i64, 100.0, 101.0, 99.0, 100.0))
            .collect();
        let result = calculate_adx(&bars, 14).unwrap();
        assert!(result.adx < 1.0, "got {}", result.adx);
    }

    #[test]
    fn adx_bounded() {
        let bars: Vec<Bar> = (0..120)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                bar_ohlc(i as i64, base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let result = calculate_adx(&bars, 14).unwrap();
        assert!((0.0..=100.0).contains(&result.adx));
        assert!(result.pdi >= 0.0 && result.mdi >= 0.0);
    }
}
