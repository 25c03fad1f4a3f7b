// =============================================================================
// Meridian Core — portfolio coordination core for multi-strategy trading
// =============================================================================
//
// The crate wires four pillars around a strategy runtime:
//
//   regime      — five-regime market classifier with debounce hysteresis
//   signal      — adaptive parameters + weighted sub-signal fusion
//   allocation  — seven capital-weighting methods with rebalance accounting
//   risk        — pre-order gate, periodic multi-check, prioritized actions
//
// Everything outward-facing is a capability trait (`OrderExecutor`,
// `Strategy`) or a typed event on the broadcast bus; exchange connectivity,
// persistence, and transports live in the embedding application.

pub mod allocation;
pub mod clock;
pub mod config;
pub mod correlation;
pub mod error;
pub mod events;
pub mod executor;
pub mod indicators;
pub mod market_data;
pub mod portfolio;
pub mod regime;
pub mod risk;
pub mod signal;
pub mod strategy;

pub use allocation::{
    AllocationAdjustment, AllocationMethod, AllocationResult, CapitalAllocator, StrategyStats,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    CorrelationConfig, MonitoringConfig, PortfolioConfig, RegimeConfig, RiskConfig, SignalConfig,
};
pub use correlation::{CorrelationAnalyzer, CorrelationPair, StrategyMatrix};
pub use error::{CoreError, CoreResult};
pub use events::{EventBus, PortfolioEvent};
pub use executor::{MarketOrderRequest, Order, OrderExecutor, OrderSide, PositionInfo};
pub use market_data::{Bar, BarWindow, RollingWindow};
pub use portfolio::{
    PortfolioManager, PortfolioReport, PortfolioStatus, StrategyPerformance, StrategyStateUpdate,
};
pub use regime::{MarketRegime, RegimeDetector, RegimeState, RegimeUpdate};
pub use risk::{
    OrderCheck, OrderRequest, PortfolioRiskManager, PortfolioState, RiskAction, RiskBudget,
    RiskCheckKind, RiskCheckResult, RiskEvent, RiskLevel, StrategyRiskState,
};
pub use signal::{AdaptiveParams, AdaptiveSignalEngine, FusedSignal, SignalDecision, SubSignal};
pub use strategy::{
    AdaptiveStrategy, BarReport, ExitReason, Strategy, StrategyEnvelope, StrategySignal,
    TradeRecord,
};
