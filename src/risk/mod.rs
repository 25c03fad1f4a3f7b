// =============================================================================
// Portfolio Risk Management
// =============================================================================
//
// Typed vocabulary for the risk engine: severity-ordered actions and levels,
// per-dimension check results, the pre-order gate verdict, and the bounded
// risk event history entries.

mod manager;

pub use manager::PortfolioRiskManager;

use serde::{Deserialize, Serialize};

/// De-risking actions, ordered by severity. The periodic check executes
/// only the single most severe action produced in a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskAction {
    None,
    Alert,
    Rebalance,
    PauseNewTrades,
    ReduceExposure,
    ReduceAll,
    EmergencyClose,
}

impl std::fmt::Display for RiskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Alert => "alert",
            Self::Rebalance => "rebalance",
            Self::PauseNewTrades => "pause_new_trades",
            Self::ReduceExposure => "reduce_exposure",
            Self::ReduceAll => "reduce_all",
            Self::EmergencyClose => "emergency_close",
        };
        write!(f, "{name}")
    }
}

/// Portfolio risk level, ordered from calm to crisis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum RiskLevel {
    Safe,
    #[default]
    Normal,
    Elevated,
    High,
    Critical,
    Emergency,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Safe => "safe",
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Emergency => "emergency",
        };
        write!(f, "{name}")
    }
}

/// Which of the four periodic dimensions produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCheckKind {
    Drawdown,
    Position,
    Correlation,
    Var,
}

/// One triggered condition from the periodic multi-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckResult {
    pub kind: RiskCheckKind,
    pub action: RiskAction,
    pub level: RiskLevel,
    pub details: serde_json::Value,
    pub message: Option<String>,
}

/// Hypothetical-loss allowance per strategy, decremented by approved orders.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RiskBudget {
    pub budget: f64,
    pub used: f64,
}

impl RiskBudget {
    pub fn new(budget: f64) -> Self {
        Self { budget, used: 0.0 }
    }

    pub fn remaining(&self) -> f64 {
        (self.budget - self.used).max(0.0)
    }
}

/// Risk-relevant view of one strategy, pushed in by the portfolio manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRiskState {
    pub strategy_id: String,
    /// Primary traded symbol (target of de-risk orders).
    pub symbol: String,
    pub position_value: f64,
    pub equity: f64,
    /// Current capital allocation in account currency.
    pub allocation: f64,
    pub daily_pnl: f64,
    pub open_positions: usize,
    pub trading_allowed: bool,
    pub risk_budget: RiskBudget,
}

/// Aggregate portfolio state maintained by the risk manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub total_equity: f64,
    pub total_position_value: f64,
    /// `total_position_value / total_equity` (0 when equity is 0).
    pub position_ratio: f64,
    /// All-time equity high-water mark; never decreases.
    pub peak_equity: f64,
    /// `(peak - equity) / peak`, in [0, 1].
    pub current_drawdown: f64,
    pub daily_start_equity: f64,
    pub daily_drawdown: f64,
    pub weekly_start_equity: f64,
    pub weekly_drawdown: f64,
    pub risk_level: RiskLevel,
    pub trading_allowed: bool,
    pub pause_reason: Option<String>,
}

impl PortfolioState {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            total_equity: initial_equity,
            total_position_value: 0.0,
            position_ratio: 0.0,
            peak_equity: initial_equity,
            current_drawdown: 0.0,
            daily_start_equity: initial_equity,
            daily_drawdown: 0.0,
            weekly_start_equity: initial_equity,
            weekly_drawdown: 0.0,
            risk_level: RiskLevel::Normal,
            trading_allowed: true,
            pause_reason: None,
        }
    }
}

/// An order about to be placed, as seen by the pre-order gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub strategy_id: String,
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
}

impl OrderRequest {
    pub fn value(&self) -> f64 {
        self.amount * self.price
    }
}

/// Verdict of the pre-order gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCheck {
    pub allowed: bool,
    /// Hard denial reasons (any entry means `allowed == false`).
    pub reasons: Vec<String>,
    /// Soft warnings; the order may still proceed.
    pub warnings: Vec<String>,
    pub risk_level: RiskLevel,
    /// Suggested position-size haircut in (0, 1] when risk is Critical.
    pub suggested_reduction: Option<f64>,
}

/// Bounded-history entry capturing a risk occurrence with its context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub kind: String,
    pub details: serde_json::Value,
    pub state: PortfolioState,
    pub timestamp: i64,
}
