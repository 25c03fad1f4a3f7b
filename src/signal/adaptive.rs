// =============================================================================
// Adaptive parameters — thresholds that track the detected regime
// =============================================================================
//
// Three groups of strategy parameters retune on every bar:
//
//   SMA periods   — compress in high volatility (react faster), stretch in
//                   low volatility (filter noise). Both scale by the same
//                   factor 1 + range * (1 - 2v), v in [0, 1].
//   RSI bands     — widen to (25, 75) in trends so pullbacks are not read
//                   as reversals; tighten to (35, 65) in ranges.
//   Bollinger σ   — tracks the ATR percentile linearly between the
//                   configured min and max.
//
// Invariants after every update: 5 <= fast < slow, fast <= 30, slow >= 15,
// bb_min_std <= bb_std_dev <= bb_max_std, oversold < overbought.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::SignalConfig;
use crate::regime::MarketRegime;

const SMA_FAST_MIN: usize = 5;
const SMA_FAST_MAX: usize = 30;
const SMA_SLOW_MIN: usize = 15;
const SMA_SLOW_MAX: usize = 60;

/// Current per-strategy parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveParams {
    pub sma_fast_period: usize,
    pub sma_slow_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub bb_std_dev: f64,
}

impl AdaptiveParams {
    /// Seed from the configured base values.
    pub fn from_config(cfg: &SignalConfig) -> Self {
        Self {
            sma_fast_period: cfg.sma_base_fast,
            sma_slow_period: cfg.sma_base_slow,
            rsi_oversold: cfg.rsi_base_oversold,
            rsi_overbought: cfg.rsi_base_overbought,
            bb_std_dev: (cfg.bb_min_std + cfg.bb_max_std) / 2.0,
        }
    }

    /// Retune for the current regime and volatility readings.
    ///
    /// `volatility_index` and `atr_percentile` are both in [0, 100]. The
    /// caller skips this entirely while the regime is Extreme.
    pub fn update(
        &mut self,
        regime: MarketRegime,
        volatility_index: f64,
        atr_percentile: f64,
        cfg: &SignalConfig,
    ) {
        if cfg.adapt_sma_periods {
            self.update_sma_periods(volatility_index, cfg);
        }
        if cfg.adapt_rsi_thresholds {
            self.update_rsi_bands(regime, cfg);
        }
        if cfg.adapt_bb_std {
            self.bb_std_dev = (cfg.bb_min_std
                + (cfg.bb_max_std - cfg.bb_min_std) * (atr_percentile / 100.0))
                .clamp(cfg.bb_min_std, cfg.bb_max_std);
        }

        trace!(
            fast = self.sma_fast_period,
            slow = self.sma_slow_period,
            rsi_oversold = self.rsi_oversold,
            rsi_overbought = self.rsi_overbought,
            bb_std = format!("{:.2}", self.bb_std_dev),
            "adaptive params updated"
        );
    }

    fn update_sma_periods(&mut self, volatility_index: f64, cfg: &SignalConfig) {
        let v = volatility_factor(volatility_index, cfg.vol_low_threshold, cfg.vol_high_threshold);
        let factor = 1.0 + cfg.adjustment_range * (1.0 - 2.0 * v);

        let fast = (cfg.sma_base_fast as f64 * factor).round() as i64;
        let slow = (cfg.sma_base_slow as f64 * factor).round() as i64;

        self.sma_fast_period = (fast.max(SMA_FAST_MIN as i64) as usize).min(SMA_FAST_MAX);
        self.sma_slow_period = (slow.max(SMA_SLOW_MIN as i64) as usize).min(SMA_SLOW_MAX);

        if self.sma_fast_period >= self.sma_slow_period {
            self.sma_slow_period = self.sma_fast_period + 10;
        }
    }

    fn update_rsi_bands(&mut self, regime: MarketRegime, cfg: &SignalConfig) {
        let (oversold, overbought) = match regime {
            MarketRegime::TrendingUp | MarketRegime::TrendingDown => {
                (cfg.rsi_trending_oversold, cfg.rsi_trending_overbought)
            }
            MarketRegime::Ranging => (cfg.rsi_ranging_oversold, cfg.rsi_ranging_overbought),
            MarketRegime::HighVolatility => (cfg.rsi_base_oversold, cfg.rsi_base_overbought),
            // Extreme leaves the bands untouched.
            MarketRegime::Extreme => (self.rsi_oversold, self.rsi_overbought),
        };
        self.rsi_oversold = oversold;
        self.rsi_overbought = overbought;
    }
}

/// Map the volatility index into [0, 1]: 0 at or below `low`, 1 at or above
/// `high`, linear between.
fn volatility_factor(volatility_index: f64, low: f64, high: f64) -> f64 {
    if volatility_index <= low {
        0.0
    } else if volatility_index >= high {
        1.0
    } else {
        (volatility_index - low) / (high - low)
    }
}
