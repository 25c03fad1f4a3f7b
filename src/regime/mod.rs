// =============================================================================
// Market Regime Detection
// =============================================================================
//
// Classifies each bar into one of five regimes from a multi-factor indicator
// snapshot, with hysteresis so that one noisy bar cannot flip the regime.
// Each regime carries a recommendation (position scale + posture) so that
// downstream strategy modules can adapt automatically.

mod detector;

pub use detector::RegimeDetector;

use serde::{Deserialize, Serialize};

/// High-level market regime classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    /// Directional move up with persistence.
    TrendingUp,
    /// Directional move down with persistence.
    TrendingDown,
    /// Sideways chop — mean-reverting price action.
    Ranging,
    /// Elevated volatility — wide swings, reduced conviction.
    HighVolatility,
    /// Volatility at the tail of its own history — stand down.
    Extreme,
}

impl MarketRegime {
    /// True for either trending direction.
    pub fn is_trending(self) -> bool {
        matches!(self, Self::TrendingUp | Self::TrendingDown)
    }
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrendingUp => write!(f, "TRENDING_UP"),
            Self::TrendingDown => write!(f, "TRENDING_DOWN"),
            Self::Ranging => write!(f, "RANGING"),
            Self::HighVolatility => write!(f, "HIGH_VOLATILITY"),
            Self::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// All indicator readings that fed a classification.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegimeIndicators {
    pub adx: f64,
    pub pdi: f64,
    pub mdi: f64,
    pub bb_width: f64,
    pub bb_width_percentile: f64,
    pub atr: f64,
    pub atr_percentile: f64,
    /// Mean of the BB-width and normalized-ATR percentiles, in [0, 100].
    pub volatility_index: f64,
    /// `100 * (fast EMA - slow SMA) / slow SMA`.
    pub ma_spread: f64,
    pub hurst: f64,
    pub rsi: f64,
    /// Percent change over the momentum look-back.
    pub momentum: f64,
}

/// Per-regime trading posture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeRecommendation {
    /// Fraction of normal position size appropriate for the regime.
    pub position_scale: f64,
    /// Short posture label for logs and dashboards.
    pub posture: &'static str,
}

impl MarketRegime {
    /// Decision matrix: how aggressively to trade each regime.
    pub fn recommendation(self) -> RegimeRecommendation {
        match self {
            // Trends reward full size and patience.
            Self::TrendingUp | Self::TrendingDown => RegimeRecommendation {
                position_scale: 1.0,
                posture: "trend-following",
            },
            // Ranges favour tighter mean-reversion scalps.
            Self::Ranging => RegimeRecommendation {
                position_scale: 0.6,
                posture: "mean-reversion",
            },
            Self::HighVolatility => RegimeRecommendation {
                position_scale: 0.4,
                posture: "reduced-size",
            },
            Self::Extreme => RegimeRecommendation {
                position_scale: 0.0,
                posture: "halt",
            },
        }
    }
}

/// Notable transitions reported by a confirmed regime switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeEvent {
    RegimeChange,
    ExtremeDetected,
    VolatilitySpike,
    /// TrendingUp <-> TrendingDown flip.
    TrendReversal,
}

/// Snapshot retained in the detector's history ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeState {
    pub regime: MarketRegime,
    pub confidence: f64,
    pub indicators: RegimeIndicators,
    pub timestamp: i64,
}

/// Full result of one `update` call.
#[derive(Debug, Clone)]
pub struct RegimeUpdate {
    pub regime: MarketRegime,
    pub prev_regime: MarketRegime,
    /// Classification confidence in [0, 100].
    pub confidence: f64,
    pub indicators: RegimeIndicators,
    pub recommendation: RegimeRecommendation,
    /// Transitions confirmed by this bar (empty when the regime held).
    pub events: Vec<RegimeEvent>,
    /// Set when classification was skipped (warm-up).
    pub reason: Option<&'static str>,
}
