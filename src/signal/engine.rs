// =============================================================================
// Signal engine — sub-signal generation and regime-aware fusion
// =============================================================================
//
// Per bar, in order: retune adaptive params, compute the SMA / RSI / BB
// sub-signals plus the optional trend filter, then fuse into one decision.
// The engine stands down entirely (no signal, no param update) while the
// regime is Extreme.

use tracing::debug;

use crate::config::SignalConfig;
use crate::indicators::{calculate_bollinger, calculate_rsi, calculate_sma, detect_crossover};
use crate::regime::{MarketRegime, RegimeUpdate};
use crate::signal::{AdaptiveParams, FusedSignal, FusionWeights, SignalDecision, SubSignal};

/// Stateful per-strategy signal engine.
pub struct AdaptiveSignalEngine {
    config: SignalConfig,
    params: AdaptiveParams,
    trading_allowed: bool,
}

impl AdaptiveSignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        let params = AdaptiveParams::from_config(&config);
        Self {
            config,
            params,
            trading_allowed: true,
        }
    }

    /// Current adaptive parameter set.
    pub fn params(&self) -> &AdaptiveParams {
        &self.params
    }

    /// False while the engine is halted by an Extreme regime.
    pub fn trading_allowed(&self) -> bool {
        self.trading_allowed
    }

    /// Run the full pipeline for one bar. `closes` is the candle window's
    /// close series, oldest first, current bar last.
    ///
    /// Returns `None` (and flags `trading_allowed = false`) in an Extreme
    /// regime; otherwise always returns a fused signal, which may well be a
    /// `SignalDecision::None` hold.
    pub fn evaluate(&mut self, closes: &[f64], regime: &RegimeUpdate) -> Option<FusedSignal> {
        if regime.regime == MarketRegime::Extreme {
            self.trading_allowed = false;
            debug!("extreme regime: signal engine halted");
            return None;
        }
        self.trading_allowed = true;

        self.params.update(
            regime.regime,
            regime.indicators.volatility_index,
            regime.indicators.atr_percentile,
            &self.config,
        );

        let sma = sma_signal(closes, &self.params);
        let rsi = rsi_signal(closes, &self.params, &self.config);
        let bb = bb_signal(closes, &self.params, &self.config);
        let trend = self
            .config
            .use_trend_filter
            .then(|| trend_signal(closes, &self.config));

        let fused = fuse(
            &sma,
            &rsi,
            &bb,
            trend.as_ref(),
            regime.regime,
            &self.config,
        );

        debug!(
            decision = %fused.decision,
            raw = format!("{:.3}", fused.raw_score),
            confidence = format!("{:.3}", fused.confidence),
            regime = %regime.regime,
            "signal fused"
        );

        Some(fused)
    }
}

// =============================================================================
// Sub-signals
// =============================================================================

/// SMA crossover: direction from the fast/slow cross, strength from the
/// normalized separation of the two averages.
fn sma_signal(closes: &[f64], params: &AdaptiveParams) -> SubSignal {
    let fast = calculate_sma(closes, params.sma_fast_period);
    let slow = calculate_sma(closes, params.sma_slow_period);
    if fast.len() < 2 || slow.len() < 2 {
        return SubSignal::neutral();
    }

    let cross = detect_crossover(&fast, &slow);
    if !cross.bullish && !cross.bearish {
        return SubSignal::neutral();
    }

    let (Some(&f), Some(&s)) = (fast.last(), slow.last()) else {
        return SubSignal::neutral();
    };
    if s == 0.0 {
        return SubSignal::neutral();
    }
    let strength = (100.0 * (f - s).abs() / s).min(1.0);

    if cross.bullish {
        SubSignal {
            direction: 1.0,
            strength,
            reason: format!(
                "sma bullish cross ({}/{})",
                params.sma_fast_period, params.sma_slow_period
            ),
        }
    } else {
        SubSignal {
            direction: -1.0,
            strength,
            reason: format!(
                "sma bearish cross ({}/{})",
                params.sma_fast_period, params.sma_slow_period
            ),
        }
    }
}

/// RSI bands: full-strength inside the oversold/overbought zones, a weak
/// half-signal on the recovery cross back out of a zone.
fn rsi_signal(closes: &[f64], params: &AdaptiveParams, cfg: &SignalConfig) -> SubSignal {
    let series = calculate_rsi(closes, cfg.rsi_period);
    let Some(&rsi) = series.last() else {
        return SubSignal::neutral();
    };

    if rsi <= params.rsi_oversold {
        return SubSignal {
            direction: 1.0,
            strength: ((params.rsi_oversold - rsi) / params.rsi_oversold).clamp(0.0, 1.0),
            reason: format!("rsi oversold ({rsi:.1} <= {:.0})", params.rsi_oversold),
        };
    }
    if rsi >= params.rsi_overbought {
        return SubSignal {
            direction: -1.0,
            strength: ((rsi - params.rsi_overbought) / (100.0 - params.rsi_overbought))
                .clamp(0.0, 1.0),
            reason: format!("rsi overbought ({rsi:.1} >= {:.0})", params.rsi_overbought),
        };
    }

    // Recovery cross: previous sample outside a band, current back inside.
    if series.len() >= 2 {
        let prev = series[series.len() - 2];
        if prev <= params.rsi_oversold {
            return SubSignal {
                direction: 0.5,
                strength: 0.5,
                reason: "rsi recovering from oversold".to_string(),
            };
        }
        if prev >= params.rsi_overbought {
            return SubSignal {
                direction: -0.5,
                strength: 0.5,
                reason: "rsi retreating from overbought".to_string(),
            };
        }
    }

    SubSignal::neutral()
}

/// Bollinger touches: full-strength outside the bands, a 0.7 bounce signal
/// on re-entry from outside.
fn bb_signal(closes: &[f64], params: &AdaptiveParams, cfg: &SignalConfig) -> SubSignal {
    let Some(bands) = calculate_bollinger(closes, cfg.bb_period, params.bb_std_dev) else {
        return SubSignal::neutral();
    };
    let Some(&price) = closes.last() else {
        return SubSignal::neutral();
    };

    if price <= bands.lower && bands.lower > 0.0 {
        return SubSignal {
            direction: 1.0,
            strength: (100.0 * (bands.lower - price) / bands.lower).min(1.0),
            reason: "price below lower band".to_string(),
        };
    }
    if price >= bands.upper && bands.upper > 0.0 {
        return SubSignal {
            direction: -1.0,
            strength: (100.0 * (price - bands.upper) / bands.upper).min(1.0),
            reason: "price above upper band".to_string(),
        };
    }

    // Bounce back inside: previous close outside the previous bands.
    if closes.len() > cfg.bb_period {
        let prev_closes = &closes[..closes.len() - 1];
        if let Some(prev_bands) =
            calculate_bollinger(prev_closes, cfg.bb_period, params.bb_std_dev)
        {
            let prev_price = prev_closes[prev_closes.len() - 1];
            if prev_price <= prev_bands.lower {
                return SubSignal {
                    direction: 0.7,
                    strength: 0.7,
                    reason: "bounce off lower band".to_string(),
                };
            }
            if prev_price >= prev_bands.upper {
                return SubSignal {
                    direction: -0.7,
                    strength: 0.7,
                    reason: "rejection off upper band".to_string(),
                };
            }
        }
    }

    SubSignal::neutral()
}

/// Slow-SMA trend filter: direction from price vs the trend MA, strength
/// from the normalized distance.
fn trend_signal(closes: &[f64], cfg: &SignalConfig) -> SubSignal {
    let series = calculate_sma(closes, cfg.trend_ma_period);
    let (Some(&ma), Some(&price)) = (series.last(), closes.last()) else {
        return SubSignal::neutral();
    };
    if ma == 0.0 || price == ma {
        return SubSignal::neutral();
    }

    let direction = if price > ma { 1.0 } else { -1.0 };
    SubSignal {
        direction,
        strength: (100.0 * (price - ma).abs() / ma).min(1.0),
        reason: if direction > 0.0 {
            "price above trend ma".to_string()
        } else {
            "price below trend ma".to_string()
        },
    }
}

// =============================================================================
// Fusion
// =============================================================================

/// Regime multipliers for the three sub-signal weights.
fn regime_weight_multipliers(regime: MarketRegime) -> (f64, f64, f64) {
    match regime {
        MarketRegime::TrendingUp | MarketRegime::TrendingDown => (1.5, 0.8, 1.0),
        MarketRegime::Ranging => (0.7, 1.3, 1.2),
        MarketRegime::HighVolatility => (0.8, 0.8, 0.8),
        // Extreme never reaches fusion; neutral multipliers keep the match
        // exhaustive.
        MarketRegime::Extreme => (1.0, 1.0, 1.0),
    }
}

/// Fuse the three sub-signals (plus optional trend filter) into a decision.
pub(crate) fn fuse(
    sma: &SubSignal,
    rsi: &SubSignal,
    bb: &SubSignal,
    trend: Option<&SubSignal>,
    regime: MarketRegime,
    cfg: &SignalConfig,
) -> FusedSignal {
    let (m_sma, m_rsi, m_bb) = regime_weight_multipliers(regime);
    let mut w_sma = cfg.sma_weight * m_sma;
    let mut w_rsi = cfg.rsi_weight * m_rsi;
    let mut w_bb = cfg.bb_weight * m_bb;

    let total = w_sma + w_rsi + w_bb;
    if total > 0.0 {
        w_sma /= total;
        w_rsi /= total;
        w_bb /= total;
    }

    let pairs = [(sma, w_sma), (rsi, w_rsi), (bb, w_bb)];
    let numerator: f64 = pairs
        .iter()
        .map(|(s, w)| s.direction * s.strength * w)
        .sum();
    let denominator: f64 = pairs
        .iter()
        .filter(|(s, _)| s.is_active())
        .map(|(_, w)| w)
        .sum();

    let mut raw = if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    };

    // Trend filter: reward alignment, penalize fighting the trend.
    if let Some(t) = trend {
        if t.direction != 0.0 && raw != 0.0 {
            raw *= if raw * t.direction > 0.0 { 1.2 } else { 0.7 };
        }
    }

    let decision = if raw >= cfg.signal_threshold {
        SignalDecision::Buy
    } else if raw <= -cfg.signal_threshold {
        SignalDecision::Sell
    } else {
        SignalDecision::None
    };

    let mut reasons: Vec<String> = pairs
        .iter()
        .filter(|(s, _)| s.is_active())
        .map(|(s, _)| s.reason.clone())
        .collect();
    if let Some(t) = trend {
        if t.is_active() {
            reasons.push(t.reason.clone());
        }
    }

    FusedSignal {
        decision,
        raw_score: raw,
        confidence: raw.abs().min(1.0),
        reasons,
        weights: FusionWeights {
            sma: w_sma,
            rsi: w_rsi,
            bb: w_bb,
        },
    }
}
