// =============================================================================
// Order executor capability
// =============================================================================
//
// The core never talks to an exchange. It consumes this capability trait;
// the embedding application implements it against a real venue, a paper
// account, or a backtest fill simulator. Strategies hold it only to request
// trades; the risk manager holds it for de-risking and emergency closes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// An accepted order as reported back by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Executor-assigned id (UUID v4 in the in-memory implementations).
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: f64,
    /// Fill or reference price.
    pub price: f64,
    pub reduce_only: bool,
    pub timestamp: i64,
}

/// Parameters for a de-risking market order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub amount: f64,
    /// Reduce-only orders may only shrink an existing position.
    pub reduce_only: bool,
}

/// Snapshot of an open position held at the executor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub amount: f64,
    pub side: OrderSide,
    pub entry_price: f64,
}

/// Capability consumed by the core for all order flow.
///
/// Implementations must be safe to call concurrently; the core serializes
/// bar processing and risk ticks but in-flight calls may outlive a `stop`.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    /// Market-buy `amount` units of `symbol`.
    async fn buy(&self, symbol: &str, amount: f64) -> anyhow::Result<Order>;

    /// Market-sell `amount` units of `symbol`.
    async fn sell(&self, symbol: &str, amount: f64) -> anyhow::Result<Order>;

    /// Buy using a percentage of current account equity.
    async fn buy_percent(&self, symbol: &str, pct_of_equity: f64) -> anyhow::Result<Order>;

    /// Close the full position in `symbol`. `Ok(None)` when flat.
    async fn close_position(&self, symbol: &str) -> anyhow::Result<Option<Order>>;

    /// Place an explicit market order; used by de-risking with
    /// `reduce_only = true`.
    async fn execute_market_order(&self, request: MarketOrderRequest) -> anyhow::Result<Order>;

    /// Liquidate every open position. Last-resort path for the
    /// EmergencyClose risk action.
    async fn emergency_close_all(&self) -> anyhow::Result<()>;

    /// Current position in `symbol`, if any.
    async fn position(&self, symbol: &str) -> Option<PositionInfo>;

    /// Free capital.
    async fn capital(&self) -> f64;

    /// Total account equity.
    async fn equity(&self) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_side_display() {
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }

    #[test]
    fn market_order_request_serialises() {
        let req = MarketOrderRequest {
            symbol: "ETHUSDT".into(),
            side: OrderSide::Sell,
            amount: 0.5,
            reduce_only: true,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: MarketOrderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.symbol, "ETHUSDT");
        assert!(back.reduce_only);
    }
}
