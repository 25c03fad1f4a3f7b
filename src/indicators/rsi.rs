// =============================================================================
// Relative Strength Index (RSI) — Wilder's smoothing
// =============================================================================
//
// Step 1 — price deltas from consecutive values.
// Step 2 — seed average gain / loss with the SMA of the first `period` deltas.
// Step 3 — Wilder's smoothing:
//            avg = (prev_avg * (period - 1) + current) / period
// Step 4 — RS = avg_gain / avg_loss, RSI = 100 - 100 / (1 + RS).
//
// With zero average loss (no down moves in the window) RSI saturates at 100.

/// Compute the RSI series for `values` with the given `period`.
///
/// One output per value starting at index `period` (the first `period`
/// deltas seed the averages).
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `values.len() < period + 1` => empty vec
/// - Non-finite results truncate the series.
pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    let period_f = period as f64;
    let mut avg_gain = deltas[..period].iter().filter(|d| **d > 0.0).sum::<f64>() / period_f;
    let mut avg_loss = deltas[..period]
        .iter()
        .filter(|d| **d < 0.0)
        .map(|d| d.abs())
        .sum::<f64>()
        / period_f;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_value(avg_gain, avg_loss) {
        Some(rsi) => result.push(rsi),
        None => return Vec::new(),
    }

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_value(avg_gain, avg_loss) {
            Some(rsi) => result.push(rsi),
            None => break,
        }
    }

    result
}

/// RSI from smoothed averages. `None` on non-finite input.
fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if !avg_gain.is_finite() || !avg_loss.is_finite() {
        return None;
    }
    if avg_loss == 0.0 {
        // No losses in the window: fully overbought by definition.
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    let rsi = 100.0 - 100.0 / (1.0 + rs);
    rsi.is_finite().then_some(rsi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).is_empty());
    }

    #[test]
    fn rsi_period_zero() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn rsi_insufficient_data() {
        // Need period + 1 values for `period` deltas.
        let values: Vec<f64> = (0..14).map(|x| x as f64).collect();
        assert!(calculate_rsi(&values, 14).is_empty());
    }

    #[test]
    fn rsi_all_gains_saturates_at_100() {
        let values: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let rsi = calculate_rsi(&values, 14);
        assert!(!rsi.is_empty());
        assert!(rsi.iter().all(|&r| (r - 100.0).abs() < 1e-9));
    }

    #[test]
    fn rsi_all_losses_near_zero() {
        let values: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let rsi = calculate_rsi(&values, 14);
        assert!(!rsi.is_empty());
        assert!(rsi.iter().all(|&r| r < 1.0), "got {:?}", rsi);
    }

    #[test]
    fn rsi_bounded_zero_to_100() {
        let values: Vec<f64> = (0..100)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();
        for r in calculate_rsi(&values, 14) {
            assert!((0.0..=100.0).contains(&r), "RSI {r} out of range");
        }
    }

    #[test]
    fn rsi_alternating_moves_near_midline() {
        // Equal-magnitude up/down alternation should hover around 50.
        let values: Vec<f64> = (0..60)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let rsi = calculate_rsi(&values, 14);
        let last = *rsi.last().unwrap();
        assert!((35.0..=65.0).contains(&last), "got {last}");
    }

    #[test]
    fn rsi_series_length() {
        let values: Vec<f64> = (0..30).map(|x| x as f64).collect();
        // 29 deltas, period 14 => 29 - 14 + 1 = 16 outputs.
        assert_eq!(calculate_rsi(&values, 14).len(), 16);
    }
}
