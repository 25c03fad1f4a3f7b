// =============================================================================
// Regime Detector — multi-factor classification with hysteresis
// =============================================================================
//
// Detection hierarchy (evaluated top-to-bottom; first match wins):
//
//   1. EXTREME         — volatility index >= 95th percentile
//   2. HIGH_VOLATILITY — volatility index >= 75th percentile
//   3. TRENDING_UP     — ADX >= 25 AND +DI > -DI AND MA spread > +0.5 %
//   4. TRENDING_DOWN   — ADX >= 25 AND -DI > +DI AND MA spread < -0.5 %
//   5. RANGING         — everything else
//
// The volatility index is the mean of two self-referential percentiles
// (Bollinger width and normalized ATR ranked against their own recent
// history), so "extreme" always means extreme *for this instrument*.
//
// Debounce: a candidate regime must repeat for `min_regime_duration`
// consecutive bars before the switch is confirmed. Entry into EXTREME is the
// one exception and happens immediately; leaving EXTREME is debounced like
// any other transition.

use tracing::debug;

use crate::config::RegimeConfig;
use crate::indicators::{
    calculate_adx, calculate_atr_normalized, calculate_bollinger, calculate_ema, calculate_rsi,
    calculate_sma, hurst_exponent, percentile_rank,
};
use crate::market_data::{Bar, RollingWindow};
use crate::regime::{MarketRegime, RegimeEvent, RegimeIndicators, RegimeState, RegimeUpdate};

/// Stateful per-instrument regime classifier.
pub struct RegimeDetector {
    config: RegimeConfig,
    current: MarketRegime,
    prev: MarketRegime,
    /// Candidate awaiting confirmation: (regime, consecutive count).
    pending: Option<(MarketRegime, u32)>,
    width_history: RollingWindow<f64>,
    atr_history: RollingWindow<f64>,
    history: RollingWindow<RegimeState>,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        let vol_lookback = config.vol_lookback;
        let history_limit = config.history_limit;
        Self {
            config,
            current: MarketRegime::Ranging,
            prev: MarketRegime::Ranging,
            pending: None,
            width_history: RollingWindow::new(vol_lookback),
            atr_history: RollingWindow::new(vol_lookback),
            history: RollingWindow::new(history_limit),
        }
    }

    pub fn current_regime(&self) -> MarketRegime {
        self.current
    }

    pub fn prev_regime(&self) -> MarketRegime {
        self.prev
    }

    /// Retained classification snapshots, oldest first.
    pub fn history(&self) -> Vec<RegimeState> {
        self.history.to_vec()
    }

    /// Classify the latest bar. `history` is the full candle window, oldest
    /// first, with `bar` as its final element.
    pub fn update(&mut self, bar: &Bar, history: &[Bar]) -> RegimeUpdate {
        if history.len() < self.config.required_history() {
            return RegimeUpdate {
                regime: self.current,
                prev_regime: self.prev,
                confidence: 0.0,
                indicators: RegimeIndicators::default(),
                recommendation: self.current.recommendation(),
                events: Vec::new(),
                reason: Some("insufficient data"),
            };
        }

        let indicators = self.compute_indicators(history);
        let candidate = classify(&indicators, &self.config);
        let events = self.confirm(candidate);

        let confidence = confidence_score(self.current, &indicators, &self.config);

        debug!(
            symbol = %bar.symbol,
            regime = %self.current,
            candidate = %candidate,
            adx = format!("{:.2}", indicators.adx),
            vol_index = format!("{:.1}", indicators.volatility_index),
            ma_spread = format!("{:.3}", indicators.ma_spread),
            hurst = format!("{:.3}", indicators.hurst),
            confidence = format!("{:.0}", confidence),
            "regime updated"
        );

        self.history.push(RegimeState {
            regime: self.current,
            confidence,
            indicators,
            timestamp: bar.timestamp,
        });

        RegimeUpdate {
            regime: self.current,
            prev_regime: self.prev,
            confidence,
            indicators,
            recommendation: self.current.recommendation(),
            events,
            reason: None,
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn compute_indicators(&mut self, history: &[Bar]) -> RegimeIndicators {
        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let cfg = &self.config;

        let adx = calculate_adx(history, cfg.adx_period);
        let (adx_val, pdi, mdi) = adx.map_or((0.0, 0.0, 0.0), |a| (a.adx, a.pdi, a.mdi));

        // Width percentile: push first, rank against the refreshed buffer.
        let bb_width = calculate_bollinger(&closes, cfg.bb_period, cfg.bb_std)
            .map_or(0.0, |bb| bb.width);
        self.width_history.push(bb_width);
        let width_snapshot = self.width_history.to_vec();
        let bb_width_percentile = percentile_rank(bb_width, &width_snapshot);

        let atr = calculate_atr_normalized(history, cfg.atr_period).unwrap_or(0.0);
        self.atr_history.push(atr);
        let atr_snapshot = self.atr_history.to_vec();
        let atr_percentile = percentile_rank(atr, &atr_snapshot);

        let volatility_index = (bb_width_percentile + atr_percentile) / 2.0;

        let fast = calculate_ema(&closes, cfg.fast_ma_period).last().copied();
        let slow = calculate_sma(&closes, cfg.slow_ma_period).last().copied();
        let ma_spread = match (fast, slow) {
            (Some(f), Some(s)) if s != 0.0 => 100.0 * (f - s) / s,
            _ => 0.0,
        };

        let hurst_start = closes.len().saturating_sub(cfg.hurst_period);
        let hurst = hurst_exponent(&closes[hurst_start..], 10);

        let rsi = calculate_rsi(&closes, 14).last().copied().unwrap_or(50.0);

        let momentum = if closes.len() > cfg.momentum_period {
            let past = closes[closes.len() - 1 - cfg.momentum_period];
            if past != 0.0 {
                100.0 * (closes[closes.len() - 1] / past - 1.0)
            } else {
                0.0
            }
        } else {
            0.0
        };

        RegimeIndicators {
            adx: adx_val,
            pdi,
            mdi,
            bb_width,
            bb_width_percentile,
            atr,
            atr_percentile,
            volatility_index,
            ma_spread,
            hurst,
            rsi,
            momentum,
        }
    }

    /// Run the debounce state machine for `candidate`; returns the events of
    /// a confirmed switch (empty when the regime held or is still pending).
    fn confirm(&mut self, candidate: MarketRegime) -> Vec<RegimeEvent> {
        if candidate == self.current {
            self.pending = None;
            return Vec::new();
        }

        let confirmed = if candidate == MarketRegime::Extreme {
            // Tail volatility is acted on immediately.
            true
        } else {
            let count = match self.pending {
                Some((pending, n)) if pending == candidate => n + 1,
                _ => 1,
            };
            if count >= self.config.min_regime_duration {
                true
            } else {
                self.pending = Some((candidate, count));
                false
            }
        };

        if !confirmed {
            return Vec::new();
        }

        self.pending = None;
        self.prev = self.current;
        self.current = candidate;

        let mut events = vec![RegimeEvent::RegimeChange];
        match candidate {
            MarketRegime::Extreme => events.push(RegimeEvent::ExtremeDetected),
            MarketRegime::HighVolatility => events.push(RegimeEvent::VolatilitySpike),
            _ => {}
        }
        if self.prev.is_trending() && candidate.is_trending() {
            events.push(RegimeEvent::TrendReversal);
        }

        events
    }
}

/// Candidate classification from raw indicator values; first match wins.
fn classify(ind: &RegimeIndicators, cfg: &RegimeConfig) -> MarketRegime {
    if ind.volatility_index >= cfg.extreme_vol_percentile {
        return MarketRegime::Extreme;
    }
    if ind.volatility_index >= cfg.high_vol_percentile {
        return MarketRegime::HighVolatility;
    }
    if ind.adx >= cfg.adx_trend_threshold
        && ind.pdi > ind.mdi
        && ind.ma_spread > cfg.ma_spread_threshold
    {
        return MarketRegime::TrendingUp;
    }
    if ind.adx >= cfg.adx_trend_threshold
        && ind.mdi > ind.pdi
        && ind.ma_spread < -cfg.ma_spread_threshold
    {
        return MarketRegime::TrendingDown;
    }
    MarketRegime::Ranging
}

/// Confidence in [0, 100] for the (possibly just-switched) active regime.
fn confidence_score(regime: MarketRegime, ind: &RegimeIndicators, cfg: &RegimeConfig) -> f64 {
    let mut confidence = 50.0;

    match regime {
        MarketRegime::TrendingUp | MarketRegime::TrendingDown => {
            confidence += ((ind.adx - cfg.adx_trend_threshold) * 1.5).clamp(0.0, 25.0);
            if ind.hurst > 0.55 {
                confidence += 15.0;
            }
        }
        MarketRegime::Ranging => {
            confidence += ((cfg.adx_trend_threshold - ind.adx) * 2.0).clamp(0.0, 25.0);
            if ind.hurst < 0.45 {
                confidence += 15.0;
            }
        }
        MarketRegime::HighVolatility | MarketRegime::Extreme => {
            confidence += ((ind.volatility_index - 75.0) * 1.5).clamp(0.0, 30.0);
        }
    }

    confidence.clamp(0.0, 100.0)
}
