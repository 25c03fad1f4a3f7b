// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band = SMA, upper/lower = SMA ± k·σ (population σ over the window).
// Width = (upper - lower) / middle, the normalized volatility proxy the
// regime detector ranks into a percentile.

/// Bands for the most recent window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Normalized band width `(upper - lower) / middle`.
    pub width: f64,
}

/// Calculate Bollinger Bands over the last `period` values.
///
/// Returns `None` when fewer than `period` values are available, the middle
/// band is zero (degenerate input), or the width is non-finite.
pub fn calculate_bollinger(values: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if period == 0 || values.len() < period {
        return None;
    }

    let window = &values[values.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle;

    width.is_finite().then_some(BollingerBands {
        upper,
        middle,
        lower,
        width,
    })
}
