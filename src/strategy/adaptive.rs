// =============================================================================
// Adaptive strategy — regime detection + fused signals + ATR risk exits
// =============================================================================
//
// The bundled reference strategy. Per bar, strictly in order: classify the
// regime, retune and fuse signals, then manage the (long-only) position:
//
//   entry   — fused Buy while flat, gated by the portfolio risk manager;
//             sized via `buy_percent`, stop at entry - mult * ATR.
//   trail   — stop ratchets monotonically to highest-since-entry - mult * ATR.
//   exits   — ExtremeExit > TrendReversal > StopLoss > MomentumReversal >
//             plain Sell signal.
//
// Executor failures are contained here: an entry that fails places no
// position; a close that fails still resets local state (reconciliation
// against the venue is the embedding application's job).

use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{RegimeConfig, SignalConfig};
use crate::executor::{OrderExecutor, OrderSide};
use crate::indicators::{calculate_atr, calculate_bollinger};
use crate::market_data::Bar;
use crate::regime::{MarketRegime, RegimeDetector, RegimeEvent, RegimeUpdate};
use crate::risk::{OrderRequest, PortfolioRiskManager};
use crate::signal::{AdaptiveSignalEngine, FusedSignal, SignalDecision};
use crate::strategy::{BarReport, ExitReason, Strategy, StrategySignal, TradeRecord};

use async_trait::async_trait;

/// ATR look-back for the initial and trailing stop distance.
const TRAILING_ATR_PERIOD: usize = 14;

/// Open long position state.
#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    amount: f64,
    entry_price: f64,
    stop_loss: f64,
    highest_since_entry: f64,
    opened_at: i64,
}

impl OpenPosition {
    fn new(entry_price: f64, amount: f64, atr: f64, atr_mult: f64, opened_at: i64) -> Self {
        Self {
            amount,
            entry_price,
            stop_loss: entry_price - atr_mult * atr,
            highest_since_entry: entry_price,
            opened_at,
        }
    }

    /// Ratchet the trailing stop. The stop never moves down for a long.
    fn update_trailing(&mut self, high: f64, atr: f64, atr_mult: f64) {
        if high > self.highest_since_entry {
            self.highest_since_entry = high;
        }
        let candidate = self.highest_since_entry - atr_mult * atr;
        if candidate > self.stop_loss {
            self.stop_loss = candidate;
        }
    }

    fn stopped_out(&self, price: f64) -> bool {
        price <= self.stop_loss
    }
}

pub struct AdaptiveStrategy {
    id: String,
    symbol: String,
    config: SignalConfig,
    detector: RegimeDetector,
    engine: AdaptiveSignalEngine,
    executor: Arc<dyn OrderExecutor>,
    /// Pre-order gate; entries proceed unchecked when absent (tests,
    /// standalone runs).
    risk: Option<Arc<PortfolioRiskManager>>,
    position: Option<OpenPosition>,
}

impl AdaptiveStrategy {
    pub fn new(
        id: impl Into<String>,
        symbol: impl Into<String>,
        regime_config: RegimeConfig,
        signal_config: SignalConfig,
        executor: Arc<dyn OrderExecutor>,
        risk: Option<Arc<PortfolioRiskManager>>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            detector: RegimeDetector::new(regime_config),
            engine: AdaptiveSignalEngine::new(signal_config.clone()),
            config: signal_config,
            executor,
            risk,
            position: None,
        }
    }

    pub fn in_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.position.map(|p| p.stop_loss)
    }

    pub fn current_regime(&self) -> MarketRegime {
        self.detector.current_regime()
    }

    // -------------------------------------------------------------------------
    // Position management
    // -------------------------------------------------------------------------

    async fn manage_position(
        &mut self,
        bar: &Bar,
        history: &[Bar],
        closes: &[f64],
        fused: Option<&FusedSignal>,
        regime: &RegimeUpdate,
    ) -> Vec<TradeRecord> {
        let atr = calculate_atr(history, TRAILING_ATR_PERIOD);

        if self.position.is_some() {
            if let (Some(pos), Some(atr)) = (self.position.as_mut(), atr) {
                pos.update_trailing(bar.high, atr, self.config.stop_loss_atr_multiplier);
            }
            if let Some(reason) = self.determine_exit(bar, closes, fused, regime) {
                if let Some(trade) = self.close_long(bar, reason).await {
                    return vec![trade];
                }
            }
            return Vec::new();
        }

        // Flat: consider an entry.
        let wants_entry = fused.map_or(false, |f| f.decision == SignalDecision::Buy)
            && regime.regime != MarketRegime::Extreme;
        if wants_entry && self.entry_approved(bar).await {
            self.open_long(bar, atr).await;
        }
        Vec::new()
    }

    /// Exit decision for the open long, highest-priority reason first.
    fn determine_exit(
        &self,
        bar: &Bar,
        closes: &[f64],
        fused: Option<&FusedSignal>,
        regime: &RegimeUpdate,
    ) -> Option<ExitReason> {
        let pos = self.position.as_ref()?;

        if self.config.disable_in_extreme && regime.regime == MarketRegime::Extreme {
            return Some(ExitReason::ExtremeExit);
        }

        if regime.events.contains(&RegimeEvent::TrendReversal)
            && regime.regime == MarketRegime::TrendingDown
        {
            return Some(ExitReason::TrendReversal);
        }

        if pos.stopped_out(bar.close) {
            return Some(ExitReason::StopLoss);
        }

        // Momentum rolled over below the mid band.
        if let Some(f) = fused {
            if f.raw_score < 0.0 {
                if let Some(bands) =
                    calculate_bollinger(closes, self.config.bb_period, self.engine.params().bb_std_dev)
                {
                    if bar.close < bands.middle {
                        return Some(ExitReason::MomentumReversal);
                    }
                }
                if f.decision == SignalDecision::Sell {
                    return Some(ExitReason::Signal);
                }
            }
        }

        None
    }

    async fn entry_approved(&self, bar: &Bar) -> bool {
        let Some(risk) = &self.risk else {
            return true;
        };

        let equity = self.executor.equity().await;
        let price = bar.close.max(f64::EPSILON);
        let amount = equity * self.config.position_percent / 100.0 / price;

        let check = risk.check_order(&OrderRequest {
            strategy_id: self.id.clone(),
            symbol: self.symbol.clone(),
            amount,
            price: bar.close,
        });
        if !check.allowed {
            debug!(strategy = %self.id, reasons = ?check.reasons, "entry blocked by risk gate");
        }
        check.allowed
    }

    async fn open_long(&mut self, bar: &Bar, atr: Option<f64>) {
        // Without an ATR there is no stop distance; skip the entry rather
        // than enter unprotected.
        let Some(atr) = atr else {
            debug!(strategy = %self.id, "entry skipped: ATR not ready");
            return;
        };

        let order = match self
            .executor
            .buy_percent(&self.symbol, self.config.position_percent)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                error!(strategy = %self.id, error = %e, "entry order failed");
                return;
            }
        };

        let entry_price = if order.price > 0.0 { order.price } else { bar.close };
        let position = OpenPosition::new(
            entry_price,
            order.amount,
            atr,
            self.config.stop_loss_atr_multiplier,
            bar.timestamp,
        );

        info!(
            strategy = %self.id,
            symbol = %self.symbol,
            entry = entry_price,
            amount = order.amount,
            stop = position.stop_loss,
            "long opened"
        );
        self.position = Some(position);
    }

    async fn close_long(&mut self, bar: &Bar, reason: ExitReason) -> Option<TradeRecord> {
        let pos = self.position.take()?;

        let exit_price = match self.executor.close_position(&self.symbol).await {
            Ok(Some(order)) if order.price > 0.0 => order.price,
            Ok(_) => bar.close,
            Err(e) => {
                // Contained: local state resets either way; venue-side
                // reconciliation belongs to the embedding application.
                error!(strategy = %self.id, error = %e, "close order failed");
                bar.close
            }
        };

        let pnl = (exit_price - pos.entry_price) * pos.amount;
        info!(
            strategy = %self.id,
            symbol = %self.symbol,
            reason = %reason,
            entry = pos.entry_price,
            exit = exit_price,
            pnl,
            "long closed"
        );

        Some(TradeRecord {
            id: Uuid::new_v4().to_string(),
            strategy_id: self.id.clone(),
            symbol: self.symbol.clone(),
            side: OrderSide::Sell,
            entry_price: pos.entry_price,
            exit_price,
            amount: pos.amount,
            pnl,
            exit_reason: reason,
            opened_at: pos.opened_at,
            closed_at: bar.timestamp,
        })
    }
}

#[async_trait]
impl Strategy for AdaptiveStrategy {
    async fn on_bar(&mut self, bar: &Bar, history: &[Bar]) -> anyhow::Result<BarReport> {
        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();

        // Strict per-bar order: classify, retune + fuse, then execute.
        let regime = self.detector.update(bar, history);
        let fused = self.engine.evaluate(&closes, &regime);
        let trades = self
            .manage_position(bar, history, &closes, fused.as_ref(), &regime)
            .await;

        let signal = match &fused {
            Some(f) if f.decision != SignalDecision::None => Some(StrategySignal {
                decision: f.decision,
                reason: f.reasons.join("; "),
                timestamp: bar.timestamp,
            }),
            _ => None,
        };

        Ok(BarReport {
            signal,
            trades,
            regime: Some(regime),
            trading_allowed: self.engine.trading_allowed(),
        })
    }

    async fn on_finish(&mut self) -> anyhow::Result<()> {
        // Leave any open position to the operator; just surface it.
        if let Some(pos) = &self.position {
            info!(
                strategy = %self.id,
                entry = pos.entry_price,
                amount = pos.amount,
                "strategy finished with open position"
            );
        }
        Ok(())
    }
}
