// =============================================================================
// Commodity Channel Index (CCI)
// =============================================================================
//
// CCI = (TP - SMA(TP)) / (0.015 * mean_deviation)
// where TP is the typical price (H + L + C) / 3. Lambert's 0.015 constant
// keeps roughly 70-80 % of values inside ±100.

use crate::market_data::Bar;

const LAMBERT_CONSTANT: f64 = 0.015;

/// Calculate the most recent CCI over `bars` (oldest first).
///
/// Returns `None` when fewer than `period` bars are available or the mean
/// deviation is zero (flat typical prices).
pub fn calculate_cci(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }

    let window = &bars[bars.len() - period..];
    let typical: Vec<f64> = window.iter().map(Bar::typical_price).collect();

    let mean = typical.iter().sum::<f64>() / period as f64;
    let mean_dev = typical.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;

    if mean_dev == 0.0 {
        return None;
    }

    let cci = (typical.last()? - mean) / (LAMBERT_CONSTANT * mean_dev);
    cci.is_finite().then_some(cci)
}
