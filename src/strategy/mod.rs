// =============================================================================
// Strategy Runtime
// =============================================================================
//
// The portfolio drives user strategies through the `Strategy` capability
// trait; `StrategyEnvelope` wraps each instance with its candle window,
// key-value state, indicator snapshot, and latest signal. The bundled
// `AdaptiveStrategy` wires the regime detector and signal engine into this
// runtime.

mod adaptive;
mod envelope;

pub use adaptive::AdaptiveStrategy;
pub use envelope::StrategyEnvelope;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::executor::OrderSide;
use crate::market_data::Bar;
use crate::regime::RegimeUpdate;
use crate::signal::SignalDecision;

/// Latest signal emitted by a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub decision: SignalDecision,
    pub reason: String,
    pub timestamp: i64,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    MomentumReversal,
    ExtremeExit,
    TrendReversal,
    /// Ordinary sell signal from the fused decision.
    Signal,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StopLoss => "stop_loss",
            Self::MomentumReversal => "momentum_reversal",
            Self::ExtremeExit => "extreme_exit",
            Self::TrendReversal => "trend_reversal",
            Self::Signal => "signal",
        };
        write!(f, "{name}")
    }
}

/// A completed round trip reported back to the portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub amount: f64,
    pub pnl: f64,
    pub exit_reason: ExitReason,
    pub opened_at: i64,
    pub closed_at: i64,
}

/// Everything a strategy reports from one bar.
#[derive(Debug, Clone, Default)]
pub struct BarReport {
    /// Signal emitted this bar, if any.
    pub signal: Option<StrategySignal>,
    /// Round trips completed this bar.
    pub trades: Vec<TradeRecord>,
    /// Regime update computed this bar (None for strategies that do not
    /// run a detector).
    pub regime: Option<RegimeUpdate>,
    /// False while the strategy has halted itself (e.g. Extreme regime).
    pub trading_allowed: bool,
}

impl BarReport {
    pub fn idle() -> Self {
        Self {
            signal: None,
            trades: Vec::new(),
            regime: None,
            trading_allowed: true,
        }
    }
}

/// User-implementable strategy capability.
///
/// `on_bar` receives the bar plus the envelope's full candle window
/// (oldest first, current bar last) and reports signals and completed
/// trades; insufficient data is an early `BarReport::idle()`, never an
/// error.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn on_init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_bar(&mut self, bar: &Bar, history: &[Bar]) -> anyhow::Result<BarReport>;

    async fn on_finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after a rebalance with the strategy's new capital allocation.
    async fn on_allocation_change(&mut self, allocation: f64) -> anyhow::Result<()> {
        let _ = allocation;
        Ok(())
    }
}
