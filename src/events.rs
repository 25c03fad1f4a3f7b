// =============================================================================
// Typed portfolio events
// =============================================================================
//
// One statically typed event enum delivered through a broadcast channel, in
// occurrence order. Zero subscribers is a legal steady state: `emit` simply
// drops the event. Subscribers receive clones and can never mutate core
// state.

use tokio::sync::broadcast;

use crate::allocation::{AllocationAdjustment, AllocationResult};
use crate::correlation::CorrelationPair;
use crate::portfolio::{PortfolioReport, PortfolioStatus};
use crate::regime::MarketRegime;
use crate::risk::RiskLevel;

/// Default buffered capacity of the broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything the core announces to the outside world.
#[derive(Debug, Clone)]
pub enum PortfolioEvent {
    StrategyAdded {
        strategy_id: String,
    },
    StrategyRemoved {
        strategy_id: String,
    },
    AllocationUpdated {
        result: AllocationResult,
    },
    Rebalanced {
        trigger: String,
        allocation: AllocationResult,
        adjustments: Vec<AllocationAdjustment>,
    },
    TradingPaused {
        reason: String,
    },
    TradingResumed,
    RiskLevelChanged {
        previous: RiskLevel,
        current: RiskLevel,
    },
    RiskAlert {
        level: RiskLevel,
        message: String,
    },
    EmergencyClose {
        reason: String,
    },
    ReduceAll {
        ratio: f64,
    },
    ReduceExposure {
        strategy_id: String,
        ratio: f64,
    },
    RebalanceTriggered {
        reason: String,
    },
    HighCorrelationWarning {
        pairs: Vec<CorrelationPair>,
    },
    RegimeChange {
        strategy_id: String,
        symbol: String,
        from: MarketRegime,
        to: MarketRegime,
    },
    VolatilitySpike {
        strategy_id: String,
        symbol: String,
    },
    TrendReversal {
        strategy_id: String,
        symbol: String,
        from: MarketRegime,
        to: MarketRegime,
    },
    ExtremeDetected {
        strategy_id: String,
        symbol: String,
    },
    StatusUpdated {
        status: PortfolioStatus,
    },
    ReportGenerated {
        report: PortfolioReport,
    },
}

impl PortfolioEvent {
    /// Stable kind label for logs, history entries, and test assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StrategyAdded { .. } => "strategy_added",
            Self::StrategyRemoved { .. } => "strategy_removed",
            Self::AllocationUpdated { .. } => "allocation_updated",
            Self::Rebalanced { .. } => "rebalanced",
            Self::TradingPaused { .. } => "trading_paused",
            Self::TradingResumed => "trading_resumed",
            Self::RiskLevelChanged { .. } => "risk_level_changed",
            Self::RiskAlert { .. } => "risk_alert",
            Self::EmergencyClose { .. } => "emergency_close",
            Self::ReduceAll { .. } => "reduce_all",
            Self::ReduceExposure { .. } => "reduce_exposure",
            Self::RebalanceTriggered { .. } => "rebalance_triggered",
            Self::HighCorrelationWarning { .. } => "high_correlation_warning",
            Self::RegimeChange { .. } => "regime_change",
            Self::VolatilitySpike { .. } => "volatility_spike",
            Self::TrendReversal { .. } => "trend_reversal",
            Self::ExtremeDetected { .. } => "extreme_detected",
            Self::StatusUpdated { .. } => "status_updated",
            Self::ReportGenerated { .. } => "report_generated",
        }
    }
}

/// Cloneable handle to the portfolio's event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PortfolioEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Subscribe from this point forward; earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<PortfolioEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. With no subscribers the event is dropped, which is
    /// fine: emission must never fail the emitting code path.
    pub fn emit(&self, event: PortfolioEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(PortfolioEvent::TradingPaused {
            reason: "daily drawdown".into(),
        });
        bus.emit(PortfolioEvent::TradingResumed);
        bus.emit(PortfolioEvent::RiskAlert {
            level: RiskLevel::High,
            message: "var breach".into(),
        });

        assert_eq!(rx.recv().await.unwrap().kind(), "trading_paused");
        assert_eq!(rx.recv().await.unwrap().kind(), "trading_resumed");
        assert_eq!(rx.recv().await.unwrap().kind(), "risk_alert");
    }

    #[test]
    fn emit_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        // Must not panic or error.
        bus.emit(PortfolioEvent::TradingResumed);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_a_copy() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(PortfolioEvent::StrategyAdded {
            strategy_id: "alpha".into(),
        });

        assert_eq!(rx1.recv().await.unwrap().kind(), "strategy_added");
        assert_eq!(rx2.recv().await.unwrap().kind(), "strategy_added");
    }
}
