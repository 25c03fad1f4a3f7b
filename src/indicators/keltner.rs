// =============================================================================
// Keltner Channels
// =============================================================================
//
// Middle = EMA(close, period); upper/lower = EMA ± mult · ATR(period).
// A volatility channel that, unlike Bollinger, scales with true range rather
// than close-to-close deviation.

use crate::indicators::atr::calculate_atr;
use crate::indicators::ema::calculate_ema;
use crate::market_data::Bar;

/// Channel values for the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeltnerChannels {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Calculate Keltner Channels over `bars` (oldest first).
///
/// Returns `None` when either the EMA or the ATR cannot be produced from
/// the available bars.
pub fn calculate_keltner(bars: &[Bar], period: usize, atr_mult: f64) -> Option<KeltnerChannels> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let middle = *calculate_ema(&closes, period).last()?;
    let atr = calculate_atr(bars, period)?;

    let offset = atr_mult * atr;
    Some(KeltnerChannels {
        upper: middle + offset,
        middle,
        lower: middle - offset,
    })
}
