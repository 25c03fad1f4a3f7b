// =============================================================================
// Strategy envelope — stateful wrapper around one strategy instance
// =============================================================================
//
// Owns the per-strategy candle window and bookkeeping surface: key-value
// state, an indicator snapshot, and the latest emitted signal. `on_bar`
// appends to the window (evicting the oldest bar when full) before
// delegating to the wrapped strategy.

use std::collections::HashMap;

use tracing::warn;

use crate::market_data::{Bar, BarWindow};
use crate::strategy::{BarReport, Strategy, StrategySignal};

pub struct StrategyEnvelope {
    id: String,
    symbol: String,
    window: BarWindow,
    state: HashMap<String, serde_json::Value>,
    indicators: HashMap<String, f64>,
    signal: Option<StrategySignal>,
    strategy: Box<dyn Strategy>,
}

impl StrategyEnvelope {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        max_candle_history: usize,
        strategy: Box<dyn Strategy>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            window: BarWindow::new(max_candle_history),
            state: HashMap::new(),
            indicators: HashMap::new(),
            signal: None,
            strategy,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn history_len(&self) -> usize {
        self.window.len()
    }

    /// Candle window snapshot, oldest first.
    pub fn history(&self) -> Vec<Bar> {
        self.window.to_vec()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub async fn on_init(&mut self) -> anyhow::Result<()> {
        self.strategy.on_init().await
    }

    /// Append the bar and delegate to the wrapped strategy.
    ///
    /// Bars for a different symbol or failing OHLC validation are dropped
    /// with a warning, reported as an idle bar.
    pub async fn on_bar(&mut self, bar: &Bar) -> anyhow::Result<BarReport> {
        if bar.symbol != self.symbol {
            warn!(
                strategy = %self.id,
                expected = %self.symbol,
                got = %bar.symbol,
                "bar for wrong symbol dropped"
            );
            return Ok(BarReport::idle());
        }
        if !bar.is_valid() {
            warn!(strategy = %self.id, timestamp = bar.timestamp, "invalid bar dropped");
            return Ok(BarReport::idle());
        }

        self.window.push(bar.clone());
        let history = self.window.to_vec();

        let report = self.strategy.on_bar(bar, &history).await?;
        if let Some(signal) = &report.signal {
            self.signal = Some(signal.clone());
        }
        Ok(report)
    }

    pub async fn on_finish(&mut self) -> anyhow::Result<()> {
        self.strategy.on_finish().await
    }

    pub async fn on_allocation_change(&mut self, allocation: f64) -> anyhow::Result<()> {
        self.strategy.on_allocation_change(allocation).await
    }

    // -------------------------------------------------------------------------
    // State surface
    // -------------------------------------------------------------------------

    pub fn set_state(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.state.insert(key.into(), value);
    }

    pub fn state(&self, key: &str) -> Option<&serde_json::Value> {
        self.state.get(key)
    }

    pub fn set_indicator(&mut self, key: impl Into<String>, value: f64) {
        self.indicators.insert(key.into(), value);
    }

    pub fn indicator(&self, key: &str) -> Option<f64> {
        self.indicators.get(key).copied()
    }

    pub fn indicators(&self) -> &HashMap<String, f64> {
        &self.indicators
    }

    /// Latest emitted signal.
    pub fn signal(&self) -> Option<&StrategySignal> {
        self.signal.as_ref()
    }
}
