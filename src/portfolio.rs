// =============================================================================
// Portfolio Manager — the orchestrator
// =============================================================================
//
// Owns the strategy envelopes and wires the correlation analyzer, capital
// allocator, and risk manager together. Bar processing and the periodic
// risk tick share one async guard, so a risk action never interleaves a
// bar's signal computation. All component events flow through one broadcast
// bus in occurrence order.
//
// Lifecycle: new (Initializing) -> start (Running) -> stop (Stopped).
// `stop` cancels the periodic tasks, refuses further bar submissions, waits
// for an in-flight tick to finish, and is idempotent.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::allocation::{AllocationAdjustment, AllocationResult, CapitalAllocator, StrategyStats};
use crate::clock::Clock;
use crate::config::PortfolioConfig;
use crate::correlation::CorrelationAnalyzer;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, PortfolioEvent};
use crate::executor::OrderExecutor;
use crate::market_data::Bar;
use crate::regime::RegimeEvent;
use crate::risk::{PortfolioRiskManager, PortfolioState, RiskBudget, RiskLevel, StrategyRiskState};
use crate::strategy::{Strategy, StrategyEnvelope, TradeRecord};

/// Fraction of a strategy's allocation granted as hypothetical-loss budget.
const RISK_BUDGET_FRACTION: f64 = 0.1;

/// Portfolio lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortfolioStatus {
    Initializing,
    Running,
    Paused,
    Rebalancing,
    Emergency,
    Stopped,
}

impl std::fmt::Display for PortfolioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Rebalancing => "rebalancing",
            Self::Emergency => "emergency",
            Self::Stopped => "stopped",
        };
        write!(f, "{name}")
    }
}

/// Incrementally maintained per-strategy trade statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub gross_win: f64,
    pub gross_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl StrategyPerformance {
    /// Fold one completed trade into the running statistics.
    fn record(&mut self, pnl: f64) {
        self.trades += 1;
        self.total_pnl += pnl;
        if pnl >= 0.0 {
            self.wins += 1;
            self.gross_win += pnl;
        } else {
            self.gross_loss += pnl.abs();
        }

        self.win_rate = self.wins as f64 / self.trades as f64;
        self.avg_win = if self.wins > 0 {
            self.gross_win / self.wins as f64
        } else {
            0.0
        };
        let losses = self.trades - self.wins;
        self.avg_loss = if losses > 0 {
            self.gross_loss / losses as f64
        } else {
            0.0
        };
    }
}

/// Per-strategy section of a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyReport {
    pub strategy_id: String,
    pub symbol: String,
    pub equity: f64,
    pub position_value: f64,
    pub allocation: f64,
    pub performance: StrategyPerformance,
}

/// Periodic portfolio report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub timestamp: i64,
    pub status: PortfolioStatus,
    pub state: PortfolioState,
    pub strategies: Vec<StrategyReport>,
    pub allocation: Option<AllocationResult>,
}

/// Strategy-side state pushed into the core by the embedding application.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StrategyStateUpdate {
    pub position_value: f64,
    pub equity: f64,
    pub daily_pnl: f64,
    pub open_positions: usize,
    /// When present, recorded into the correlation analyzer's return series.
    pub daily_return: Option<f64>,
}

pub struct PortfolioManager {
    /// Self-handle for spawning the periodic loops from `start(&self)`.
    me: std::sync::Weak<Self>,
    config: PortfolioConfig,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn OrderExecutor>,
    events: EventBus,
    analyzer: Arc<RwLock<CorrelationAnalyzer>>,
    allocator: Arc<RwLock<CapitalAllocator>>,
    risk: Arc<PortfolioRiskManager>,
    status: RwLock<PortfolioStatus>,
    strategies: tokio::sync::Mutex<BTreeMap<String, StrategyEnvelope>>,
    performance: RwLock<BTreeMap<String, StrategyPerformance>>,
    /// Serializes bar processing with the periodic risk tick.
    tick_guard: tokio::sync::Mutex<()>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl PortfolioManager {
    /// Build the full component stack. Fails fast on an invalid config.
    pub fn new(
        config: PortfolioConfig,
        executor: Arc<dyn OrderExecutor>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Arc<Self>> {
        config.validate()?;

        let events = EventBus::new();
        let analyzer = Arc::new(RwLock::new(CorrelationAnalyzer::new(
            config.correlation.clone(),
        )));
        let allocator = Arc::new(RwLock::new(CapitalAllocator::new(
            config.allocation_method,
            config.total_capital,
            config.risk.max_single_strategy_ratio,
        )));
        let risk = Arc::new(PortfolioRiskManager::new(
            config.risk.clone(),
            config.total_capital,
            clock.clone(),
            executor.clone(),
            analyzer.clone(),
            allocator.clone(),
            events.clone(),
        ));

        info!(
            total_capital = config.total_capital,
            allocation_method = %config.allocation_method,
            auto_rebalance = config.auto_rebalance,
            "portfolio manager initialised"
        );

        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            clock,
            executor,
            events,
            analyzer,
            allocator,
            risk,
            status: RwLock::new(PortfolioStatus::Initializing),
            strategies: tokio::sync::Mutex::new(BTreeMap::new()),
            performance: RwLock::new(BTreeMap::new()),
            tick_guard: tokio::sync::Mutex::new(()),
            tasks: parking_lot::Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }))
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn status(&self) -> PortfolioStatus {
        *self.status.read()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PortfolioEvent> {
        self.events.subscribe()
    }

    pub fn portfolio_state(&self) -> PortfolioState {
        self.risk.portfolio_state()
    }

    /// Direct risk-manager handle, e.g. for custom strategies that want the
    /// pre-order gate.
    pub fn risk_manager(&self) -> Arc<PortfolioRiskManager> {
        self.risk.clone()
    }

    /// The executor capability the portfolio was built with; strategies
    /// constructed outside the manager share it from here.
    pub fn executor(&self) -> Arc<dyn OrderExecutor> {
        self.executor.clone()
    }

    pub fn current_allocation(&self) -> Option<AllocationResult> {
        self.allocator.read().current_allocation().cloned()
    }

    pub async fn strategy_ids(&self) -> Vec<String> {
        self.strategies.lock().await.keys().cloned().collect()
    }

    pub fn performance_of(&self, id: &str) -> Option<StrategyPerformance> {
        self.performance.read().get(id).copied()
    }

    // -------------------------------------------------------------------------
    // Strategy registry
    // -------------------------------------------------------------------------

    /// Register a strategy: wrap it in an envelope, init it, seed the
    /// analyzer / allocator / risk manager, and recompute the allocation.
    pub async fn add_strategy(
        &self,
        id: &str,
        symbol: &str,
        strategy: Box<dyn Strategy>,
    ) -> CoreResult<()> {
        let mut strategies = self.strategies.lock().await;
        if strategies.contains_key(id) {
            warn!(strategy = id, "add_strategy: id already registered");
            return Err(CoreError::StrategyAlreadyRegistered(id.to_string()));
        }

        let mut envelope =
            StrategyEnvelope::new(id, symbol, self.config.max_candle_history, strategy);
        envelope.on_init().await?;
        strategies.insert(id.to_string(), envelope);
        let count = strategies.len();
        drop(strategies);

        self.analyzer.write().register_strategy(id);
        self.performance
            .write()
            .insert(id.to_string(), StrategyPerformance::default());
        self.allocator
            .write()
            .upsert_stats(id, StrategyStats::default());

        // Provisional equal-split allocation until the first rebalance.
        let provisional = self.config.total_capital / count as f64;
        self.risk.register_strategy(StrategyRiskState {
            strategy_id: id.to_string(),
            symbol: symbol.to_string(),
            position_value: 0.0,
            equity: provisional,
            allocation: provisional,
            daily_pnl: 0.0,
            open_positions: 0,
            trading_allowed: true,
            risk_budget: RiskBudget::new(provisional * RISK_BUDGET_FRACTION),
        });

        info!(strategy = id, symbol, "strategy added");
        self.events.emit(PortfolioEvent::StrategyAdded {
            strategy_id: id.to_string(),
        });

        if self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.rebalance("strategy_added").await {
                warn!(error = %e, "post-add rebalance failed");
            }
        }
        Ok(())
    }

    /// Unregister a strategy and unwind its footprint in every component.
    pub async fn remove_strategy(&self, id: &str) -> CoreResult<()> {
        let mut strategies = self.strategies.lock().await;
        let Some(mut envelope) = strategies.remove(id) else {
            warn!(strategy = id, "remove_strategy: unknown id");
            return Err(CoreError::UnknownStrategy(id.to_string()));
        };
        drop(strategies);

        if let Err(e) = envelope.on_finish().await {
            warn!(strategy = id, error = %e, "on_finish failed during removal");
        }

        self.analyzer.write().remove_strategy(id);
        self.allocator.write().remove_strategy(id);
        self.risk.remove_strategy(id);
        self.performance.write().remove(id);

        info!(strategy = id, "strategy removed");
        self.events.emit(PortfolioEvent::StrategyRemoved {
            strategy_id: id.to_string(),
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Bar processing
    // -------------------------------------------------------------------------

    /// Route a bar to every strategy trading its symbol. Bars submitted
    /// while the portfolio is not running are dropped with a warning.
    pub async fn submit_bar(&self, bar: &Bar) {
        if !self.running.load(Ordering::SeqCst) {
            warn!(symbol = %bar.symbol, "bar dropped: portfolio not running");
            return;
        }

        // Serialize with the risk tick.
        let _guard = self.tick_guard.lock().await;

        let mut completed_trades: Vec<TradeRecord> = Vec::new();
        {
            let mut strategies = self.strategies.lock().await;
            for envelope in strategies
                .values_mut()
                .filter(|e| e.symbol() == bar.symbol)
            {
                let strategy_id = envelope.id().to_string();
                match envelope.on_bar(bar).await {
                    Ok(report) => {
                        if let Some(regime) = &report.regime {
                            self.emit_regime_events(&strategy_id, &bar.symbol, regime);
                        }
                        completed_trades.extend(report.trades);
                    }
                    Err(e) => {
                        error!(strategy = %strategy_id, error = %e, "strategy on_bar failed");
                    }
                }
            }
        }

        for trade in completed_trades {
            self.record_trade(trade);
        }
    }

    fn emit_regime_events(
        &self,
        strategy_id: &str,
        symbol: &str,
        regime: &crate::regime::RegimeUpdate,
    ) {
        for event in &regime.events {
            let e = match event {
                RegimeEvent::RegimeChange => PortfolioEvent::RegimeChange {
                    strategy_id: strategy_id.to_string(),
                    symbol: symbol.to_string(),
                    from: regime.prev_regime,
                    to: regime.regime,
                },
                RegimeEvent::ExtremeDetected => PortfolioEvent::ExtremeDetected {
                    strategy_id: strategy_id.to_string(),
                    symbol: symbol.to_string(),
                },
                RegimeEvent::VolatilitySpike => PortfolioEvent::VolatilitySpike {
                    strategy_id: strategy_id.to_string(),
                    symbol: symbol.to_string(),
                },
                RegimeEvent::TrendReversal => PortfolioEvent::TrendReversal {
                    strategy_id: strategy_id.to_string(),
                    symbol: symbol.to_string(),
                    from: regime.prev_regime,
                    to: regime.regime,
                },
            };
            self.events.emit(e);
        }
    }

    // -------------------------------------------------------------------------
    // State and trade bookkeeping
    // -------------------------------------------------------------------------

    /// Push a strategy-side state refresh into the core: risk view, return
    /// series, and the aggregate equity figures.
    pub fn update_strategy_state(&self, id: &str, update: StrategyStateUpdate) -> CoreResult<()> {
        let Some(mut state) = self.risk.strategy_state(id) else {
            return Err(CoreError::UnknownStrategy(id.to_string()));
        };

        state.position_value = update.position_value;
        state.equity = update.equity;
        state.daily_pnl = update.daily_pnl;
        state.open_positions = update.open_positions;
        self.risk.update_strategy_state(state);

        if let Some(r) = update.daily_return {
            self.analyzer.write().record_return(id, r);
        }

        self.refresh_portfolio_totals();
        Ok(())
    }

    /// Record a completed trade: performance stats, allocator stats, and
    /// the strategy's risk view all refresh incrementally.
    pub fn record_trade(&self, trade: TradeRecord) {
        let id = trade.strategy_id.clone();
        debug!(
            strategy = %id,
            pnl = trade.pnl,
            reason = %trade.exit_reason,
            "trade recorded"
        );

        let performance = {
            let mut map = self.performance.write();
            let entry = map.entry(id.clone()).or_default();
            entry.record(trade.pnl);
            *entry
        };

        // Return statistics for the allocator come from the analyzer's
        // rolling series; trade statistics come from the ledger above.
        let (expected_return, volatility) = self
            .analyzer
            .read()
            .returns_of(&id)
            .map(|returns| return_stats(&returns))
            .unwrap_or((0.0, 0.0));

        self.allocator.write().upsert_stats(
            &id,
            StrategyStats {
                expected_return,
                volatility,
                win_rate: performance.win_rate,
                avg_win: performance.avg_win,
                avg_loss: performance.avg_loss,
            },
        );

        if let Some(mut state) = self.risk.strategy_state(&id) {
            state.daily_pnl += trade.pnl;
            self.risk.update_strategy_state(state);
        }
    }

    /// Recompute the aggregate equity/position figures from the per-strategy
    /// risk states and push them into the risk manager.
    fn refresh_portfolio_totals(&self) {
        let mut total_equity = 0.0;
        let mut total_position_value = 0.0;
        for id in self.analyzer.read().strategy_ids() {
            if let Some(s) = self.risk.strategy_state(&id) {
                total_equity += s.equity;
                total_position_value += s.position_value;
            }
        }
        self.risk.update_equity(total_equity, total_position_value);
    }

    // -------------------------------------------------------------------------
    // Rebalancing
    // -------------------------------------------------------------------------

    /// Recompute the allocation, refresh per-strategy risk budgets, and
    /// notify every strategy of its new capital share.
    pub async fn rebalance(&self, reason: &str) -> CoreResult<Vec<AllocationAdjustment>> {
        let previous_status = {
            let mut status = self.status.write();
            let prev = *status;
            *status = PortfolioStatus::Rebalancing;
            prev
        };

        let outcome = self.rebalance_inner(reason).await;

        *self.status.write() = match outcome {
            Ok(_) if self.running.load(Ordering::SeqCst) => PortfolioStatus::Running,
            _ => previous_status,
        };
        outcome
    }

    async fn rebalance_inner(&self, reason: &str) -> CoreResult<Vec<AllocationAdjustment>> {
        let (covariance, correlation) = {
            let analyzer = self.analyzer.read();
            (analyzer.covariance_matrix(), analyzer.correlation_matrix())
        };

        let (result, adjustments) = {
            let mut allocator = self.allocator.write();
            allocator.update_matrices(covariance, correlation);
            allocator.rebalance(reason, self.clock.now_ms())?
        };

        // Refresh the risk manager's allocation + budget view.
        for (id, allocation) in &result.allocations {
            if let Some(mut state) = self.risk.strategy_state(id) {
                state.allocation = allocation.amount;
                state.risk_budget = RiskBudget {
                    budget: allocation.amount * RISK_BUDGET_FRACTION,
                    used: state.risk_budget.used,
                };
                self.risk.update_strategy_state(state);
            }
        }

        // Notify strategies.
        {
            let mut strategies = self.strategies.lock().await;
            for (id, envelope) in strategies.iter_mut() {
                if let Some(allocation) = result.allocations.get(id) {
                    if let Err(e) = envelope.on_allocation_change(allocation.amount).await {
                        warn!(strategy = %id, error = %e, "on_allocation_change failed");
                    }
                }
            }
        }

        info!(reason, adjustments = adjustments.len(), "rebalanced");
        self.events.emit(PortfolioEvent::Rebalanced {
            trigger: reason.to_string(),
            allocation: result.clone(),
            adjustments: adjustments.clone(),
        });
        self.events
            .emit(PortfolioEvent::AllocationUpdated { result });

        Ok(adjustments)
    }

    // -------------------------------------------------------------------------
    // Manual pause / resume
    // -------------------------------------------------------------------------

    pub fn pause_trading(&self, reason: &str) {
        self.risk.pause_trading(reason);
        *self.status.write() = PortfolioStatus::Paused;
    }

    pub fn resume_trading(&self) {
        self.risk.resume_trading();
        if self.running.load(Ordering::SeqCst) {
            *self.status.write() = PortfolioStatus::Running;
        }
    }

    // -------------------------------------------------------------------------
    // Periodic work
    // -------------------------------------------------------------------------

    /// One risk tick, serialized with bar processing. The periodic loop
    /// calls this; tests can call it directly for deterministic timing.
    pub async fn run_risk_check(&self) {
        let _guard = self.tick_guard.lock().await;
        self.risk.run_periodic_check().await;

        let state = self.risk.portfolio_state();
        if state.risk_level == RiskLevel::Emergency {
            let mut status = self.status.write();
            if *status == PortfolioStatus::Running {
                *status = PortfolioStatus::Emergency;
            }
        }
    }

    /// Build a point-in-time report.
    pub fn build_report(&self) -> PortfolioReport {
        let performance = self.performance.read().clone();
        let mut strategies = Vec::new();
        for (id, perf) in &performance {
            if let Some(state) = self.risk.strategy_state(id) {
                strategies.push(StrategyReport {
                    strategy_id: id.clone(),
                    symbol: state.symbol.clone(),
                    equity: state.equity,
                    position_value: state.position_value,
                    allocation: state.allocation,
                    performance: *perf,
                });
            }
        }

        PortfolioReport {
            timestamp: self.clock.now_ms(),
            status: self.status(),
            state: self.risk.portfolio_state(),
            strategies,
            allocation: self.current_allocation(),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start the periodic loops: risk tick, status updates, reports, and
    /// (when enabled) scheduled rebalances.
    pub fn start(&self) {
        let Some(me) = self.me.upgrade() else {
            // Unreachable through the public constructor; be safe anyway.
            warn!("start called on a detached portfolio handle");
            return;
        };
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("start called on a running portfolio");
            return;
        }
        *self.status.write() = PortfolioStatus::Running;
        info!("portfolio started");

        let mut tasks = self.tasks.lock();

        // Risk tick.
        let this = Arc::clone(&me);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                this.config.risk.check_interval_ms,
            ));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !this.running.load(Ordering::SeqCst) {
                    break;
                }
                this.run_risk_check().await;
            }
        }));

        // Status updates.
        let this = Arc::clone(&me);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                this.config.monitoring.status_update_interval_ms,
            ));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !this.running.load(Ordering::SeqCst) {
                    break;
                }
                this.events.emit(PortfolioEvent::StatusUpdated {
                    status: this.status(),
                });
            }
        }));

        // Reports.
        let this = Arc::clone(&me);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                this.config.monitoring.report_interval_ms,
            ));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !this.running.load(Ordering::SeqCst) {
                    break;
                }
                let report = this.build_report();
                this.events.emit(PortfolioEvent::ReportGenerated { report });
            }
        }));

        // Scheduled rebalances.
        if self.config.auto_rebalance && self.config.rebalance_period_ms > 0 {
            let this = Arc::clone(&me);
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_millis(
                    this.config.rebalance_period_ms as u64,
                ));
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // The first tick fires immediately; skip it so the first
                // scheduled rebalance happens one full period after start.
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if !this.running.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Err(e) = this.rebalance("scheduled").await {
                        // Periodic failures never kill the loop: alert and
                        // retry on the next tick.
                        warn!(error = %e, "scheduled rebalance failed");
                        this.events.emit(PortfolioEvent::RiskAlert {
                            level: RiskLevel::Critical,
                            message: format!("scheduled rebalance failed: {e}"),
                        });
                    }
                }
            }));
        }
    }

    /// Stop the portfolio: refuse new bars, wait out any in-flight tick,
    /// cancel the loops, and finish every strategy. Idempotent.
    pub async fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);

        // An in-flight tick or bar holds the guard; waiting here lets it
        // complete instead of cancelling mid-executor-call.
        let _guard = self.tick_guard.lock().await;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        if *self.status.read() != PortfolioStatus::Stopped {
            *self.status.write() = PortfolioStatus::Stopped;
            self.events.emit(PortfolioEvent::StatusUpdated {
                status: PortfolioStatus::Stopped,
            });
        }

        if was_running {
            let mut strategies = self.strategies.lock().await;
            for (id, envelope) in strategies.iter_mut() {
                if let Err(e) = envelope.on_finish().await {
                    warn!(strategy = %id, error = %e, "on_finish failed during stop");
                }
            }
            info!("portfolio stopped");
        }
    }
}

/// Mean and sample standard deviation of a return series.
fn return_stats(returns: &[f64]) -> (f64, f64) {
    let n = returns.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, variance.sqrt())
}
