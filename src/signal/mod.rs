// =============================================================================
// Adaptive Signal Engine
// =============================================================================
//
// Per-strategy signal pipeline: adaptive parameter updates driven by the
// detected regime, three weighted sub-signals (SMA crossover, RSI bands,
// Bollinger touches), and a regime-aware fusion step that produces one
// trade decision per bar.

mod adaptive;
mod engine;

pub use adaptive::AdaptiveParams;
pub use engine::AdaptiveSignalEngine;

use serde::{Deserialize, Serialize};

/// Final trade decision for a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDecision {
    Buy,
    Sell,
    None,
}

impl std::fmt::Display for SignalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// One contributing signal before fusion.
///
/// `direction` in [-1, 1] (0 means no contribution), `strength` in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSignal {
    pub direction: f64,
    pub strength: f64,
    pub reason: String,
}

impl SubSignal {
    pub fn neutral() -> Self {
        Self {
            direction: 0.0,
            strength: 0.0,
            reason: String::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.direction != 0.0
    }
}

/// Regime-adjusted fusion weights, normalized to sum 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub sma: f64,
    pub rsi: f64,
    pub bb: f64,
}

/// Output of the fusion step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedSignal {
    pub decision: SignalDecision,
    /// Weighted score before the decision thresholds, trend filter applied.
    pub raw_score: f64,
    /// `min(1, |raw_score|)`.
    pub confidence: f64,
    /// Messages from every active sub-signal.
    pub reasons: Vec<String>,
    pub weights: FusionWeights,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_display() {
        assert_eq!(SignalDecision::Buy.to_string(), "BUY");
        assert_eq!(SignalDecision::None.to_string(), "NONE");
    }

    #[test]
    fn neutral_subsignal_is_inactive() {
        assert!(!SubSignal::neutral().is_active());
        let active = SubSignal {
            direction: -1.0,
            strength: 0.4,
            reason: "rsi overbought".into(),
        };
        assert!(active.is_active());
    }
}
