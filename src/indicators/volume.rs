// =============================================================================
// Volume-based indicators — OBV and MFI
// =============================================================================
//
// OBV: running sum of volume signed by the close-to-close direction.
// MFI: volume-weighted RSI analogue on typical price * volume flows.

use crate::market_data::Bar;

/// On-Balance Volume series (one output per bar, first element 0).
///
/// Volume is added on an up-close, subtracted on a down-close, and ignored
/// on an unchanged close.
pub fn calculate_obv(bars: &[Bar]) -> Vec<f64> {
    if bars.is_empty() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(bars.len());
    let mut obv = 0.0_f64;
    result.push(obv);

    for pair in bars.windows(2) {
        let prev_close = pair[0].close;
        let bar = &pair[1];
        if bar.close > prev_close {
            obv += bar.volume;
        } else if bar.close < prev_close {
            obv -= bar.volume;
        }
        result.push(obv);
    }

    result
}

/// Money Flow Index over the last `period` transitions.
///
/// Raw money flow = typical price * volume, classified positive or negative
/// by the typical-price direction. MFI = 100 - 100 / (1 + positive/negative).
///
/// Returns `None` with fewer than `period + 1` bars; saturates at 100 when
/// there is no negative flow and 0 when there is no positive flow.
pub fn calculate_mfi(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let window = &bars[bars.len() - period - 1..];

    let mut positive = 0.0_f64;
    let mut negative = 0.0_f64;

    for pair in window.windows(2) {
        let prev_tp = pair[0].typical_price();
        let tp = pair[1].typical_price();
        let flow = tp * pair[1].volume;

        if tp > prev_tp {
            positive += flow;
        } else if tp < prev_tp {
            negative += flow;
        }
    }

    if negative == 0.0 {
        return Some(if positive == 0.0 { 50.0 } else { 100.0 });
    }
    if positive == 0.0 {
        return Some(0.0);
    }

    let mfi = 100.0 - 100.0 / (1.0 + positive / negative);
    mfi.is_finite().then_some(mfi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::test_support::bar_ohlc;

    fn bar_cv(ts: i64, close: f64, volume: f64) -> Bar {
        let mut b = bar_ohlc(ts, close, close + 1.0, close - 1.0, close);
        b.volume = volume;
        b
    }

    #[test]
    fn obv_empty() {
        assert!(calculate_obv(&[]).is_empty());
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let bars = vec![
            bar_cv(0, 100.0, 10.0),
            bar_cv(1, 101.0, 20.0), // up: +20
            bar_cv(2, 100.5, 30.0), // down: -30
            bar_cv(3, 100.5, 40.0), // flat: ignored
            bar_cv(4, 102.0, 5.0),  // up: +5
        ];
        let obv = calculate_obv(&bars);
        assert_eq!(obv, vec![0.0, 20.0, -10.0, -10.0, -5.0]);
    }

    #[test]
    fn mfi_insufficient_data() {
        let bars: Vec<Bar> = (0..14).map(|i| bar_cv(i as i64, 100.0, 10.0)).collect();
        assert!(calculate_mfi(&bars, 14).is_none());
    }

    #[test]
    fn mfi_all_up_saturates_100() {
        let bars: Vec<Bar> = (0..20)
            .map(|i| bar_cv(i as i64, 100.0 + i as f64, 10.0))
            .collect();
        assert!((calculate_mfi(&bars, 14).unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn mfi_all_down_saturates_0() {
        let bars: Vec<Bar> = (0..20)
            .map(|i| bar_cv(i as i64, 200.0 - i as f64, 10.0))
            .collect();
        assert!(calculate_mfi(&bars, 14).unwrap().abs() < 1e-9);
    }

    #[test]
    fn mfi_flat_is_neutral() {
        let bars: Vec<Bar> = (0..20).map(|i| bar_cv(i as i64, 100.0, 10.0)).collect();
        assert!((calculate_mfi(&bars, 14).unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn mfi_bounded() {
        let bars: Vec<Bar> = (0..40)
            .map(|i| bar_cv(i as i64, 100.0 + (i as f64 * 0.8).sin() * 4.0, 10.0 + i as f64))
            .collect();
        let mfi = calculate_mfi(&bars, 14).unwrap();
        assert!((0.0..=100.0).contains(&mfi));
    }
}
