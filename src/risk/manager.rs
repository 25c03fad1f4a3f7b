// =============================================================================
// Portfolio Risk Manager — pre-order gate + periodic multi-dimension check
// =============================================================================
//
// Two entry points:
//
//   `check_order`        — synchronous gate every order passes before it
//                          reaches the executor. Denials are hard; warnings
//                          ride along with the verdict.
//   `run_periodic_check` — the tick. Runs four independent dimensions
//                          (drawdown, position, correlation, VaR), updates
//                          the portfolio risk level, and executes the single
//                          most severe action produced.
//
// De-risk executions (ReduceAll / ReduceExposure) are gated by a cooldown
// read from the injected clock, so simulated replay behaves identically to
// live operation. Executor failures during de-risking are logged per
// strategy and the action continues; partial completion is not rolled back.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::RwLock;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::allocation::CapitalAllocator;
use crate::clock::Clock;
use crate::config::RiskConfig;
use crate::correlation::CorrelationAnalyzer;
use crate::events::{EventBus, PortfolioEvent};
use crate::executor::{MarketOrderRequest, OrderExecutor, OrderSide};
use crate::market_data::RollingWindow;
use crate::risk::{
    OrderCheck, OrderRequest, PortfolioState, RiskAction, RiskCheckKind, RiskCheckResult,
    RiskEvent, RiskLevel, StrategyRiskState,
};

/// Assumed fraction of order value at risk for budget accounting.
const ASSUMED_ORDER_RISK: f64 = 0.02;
/// Bounded risk-event history length.
const RISK_HISTORY_LIMIT: usize = 200;
/// Simplified VaR parameters used below the minimum sample count.
const SIMPLIFIED_VAR_FACTOR: f64 = 0.02 * 1.65;
const SIMPLIFIED_CVAR_MULT: f64 = 1.2;
/// Minimum return samples for historical-simulation VaR.
const MIN_VAR_SAMPLES: usize = 10;

/// Calendar anchors for the daily/weekly reset windows.
#[derive(Debug, Clone, Copy)]
struct WindowAnchors {
    day: NaiveDate,
    week_start: NaiveDate,
}

pub struct PortfolioRiskManager {
    config: RiskConfig,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn OrderExecutor>,
    analyzer: Arc<RwLock<CorrelationAnalyzer>>,
    allocator: Arc<RwLock<CapitalAllocator>>,
    events: EventBus,
    state: RwLock<PortfolioState>,
    strategies: RwLock<BTreeMap<String, StrategyRiskState>>,
    history: RwLock<RollingWindow<RiskEvent>>,
    last_de_risk: RwLock<Option<i64>>,
    windows: RwLock<WindowAnchors>,
}

impl PortfolioRiskManager {
    pub fn new(
        config: RiskConfig,
        initial_equity: f64,
        clock: Arc<dyn Clock>,
        executor: Arc<dyn OrderExecutor>,
        analyzer: Arc<RwLock<CorrelationAnalyzer>>,
        allocator: Arc<RwLock<CapitalAllocator>>,
        events: EventBus,
    ) -> Self {
        let anchors = window_anchors(clock.now_ms());
        info!(
            initial_equity,
            max_portfolio_drawdown = config.max_portfolio_drawdown,
            max_var = config.max_var,
            check_interval_ms = config.check_interval_ms,
            "risk manager initialised"
        );
        Self {
            config,
            clock,
            executor,
            analyzer,
            allocator,
            events,
            state: RwLock::new(PortfolioState::new(initial_equity)),
            strategies: RwLock::new(BTreeMap::new()),
            history: RwLock::new(RollingWindow::new(RISK_HISTORY_LIMIT)),
            last_de_risk: RwLock::new(None),
            windows: RwLock::new(anchors),
        }
    }

    // -------------------------------------------------------------------------
    // State access
    // -------------------------------------------------------------------------

    pub fn portfolio_state(&self) -> PortfolioState {
        self.state.read().clone()
    }

    pub fn strategy_state(&self, id: &str) -> Option<StrategyRiskState> {
        self.strategies.read().get(id).cloned()
    }

    /// Bounded risk-event history, oldest first.
    pub fn risk_events(&self) -> Vec<RiskEvent> {
        self.history.read().to_vec()
    }

    /// Timestamp of the last executed de-risk action. Survives `stop`; only
    /// an executed ReduceAll/ReduceExposure moves it.
    pub fn last_de_risk_time(&self) -> Option<i64> {
        *self.last_de_risk.read()
    }

    pub fn register_strategy(&self, state: StrategyRiskState) {
        self.strategies
            .write()
            .insert(state.strategy_id.clone(), state);
    }

    pub fn remove_strategy(&self, id: &str) {
        self.strategies.write().remove(id);
    }

    pub fn update_strategy_state(&self, state: StrategyRiskState) {
        self.register_strategy(state);
    }

    /// Refresh the aggregate equity/position figures and every derived
    /// drawdown. Peak equity is the all-time high-water mark.
    pub fn update_equity(&self, total_equity: f64, total_position_value: f64) {
        self.maybe_reset_windows();

        let mut s = self.state.write();
        s.total_equity = total_equity;
        s.total_position_value = total_position_value;
        s.position_ratio = if total_equity > 0.0 {
            total_position_value / total_equity
        } else {
            0.0
        };
        if total_equity > s.peak_equity {
            s.peak_equity = total_equity;
        }
        s.current_drawdown = if s.peak_equity > 0.0 {
            ((s.peak_equity - total_equity) / s.peak_equity).clamp(0.0, 1.0)
        } else {
            0.0
        };
        s.daily_drawdown = if s.daily_start_equity > 0.0 {
            ((s.daily_start_equity - total_equity) / s.daily_start_equity).max(0.0)
        } else {
            0.0
        };
        s.weekly_drawdown = if s.weekly_start_equity > 0.0 {
            ((s.weekly_start_equity - total_equity) / s.weekly_start_equity).max(0.0)
        } else {
            0.0
        };
    }

    // -------------------------------------------------------------------------
    // Manual pause / resume
    // -------------------------------------------------------------------------

    pub fn pause_trading(&self, reason: &str) {
        {
            let mut s = self.state.write();
            s.trading_allowed = false;
            s.pause_reason = Some(reason.to_string());
        }
        warn!(reason, "trading paused");
        self.events.emit(PortfolioEvent::TradingPaused {
            reason: reason.to_string(),
        });
    }

    pub fn resume_trading(&self) {
        {
            let mut s = self.state.write();
            s.trading_allowed = true;
            s.pause_reason = None;
        }
        info!("trading resumed");
        self.events.emit(PortfolioEvent::TradingResumed);
    }

    // -------------------------------------------------------------------------
    // Pre-order gate
    // -------------------------------------------------------------------------

    /// Gate an order before it reaches the executor. Approval charges the
    /// strategy's risk budget; the write lock serializes concurrent checks
    /// on that ledger.
    pub fn check_order(&self, order: &OrderRequest) -> OrderCheck {
        self.maybe_reset_windows();

        let order_value = order.value();
        let assumed_risk = ASSUMED_ORDER_RISK * order_value;

        let mut reasons = Vec::new();
        let mut warnings = Vec::new();
        let mut suggested_reduction = None;

        let state = self.state.read().clone();
        let mut strategies = self.strategies.write();

        // 1. Portfolio-wide pause.
        if !state.trading_allowed {
            reasons.push(
                state
                    .pause_reason
                    .clone()
                    .unwrap_or_else(|| "trading paused".to_string()),
            );
        }

        // 2. Strategy-level gate.
        let strategy = strategies.get(&order.strategy_id);
        match strategy {
            None => reasons.push(format!("unknown strategy: {}", order.strategy_id)),
            Some(s) if !s.trading_allowed => {
                reasons.push(format!("strategy {} not allowed to trade", s.strategy_id));
            }
            _ => {}
        }

        // 3. Global position ratio.
        if state.total_equity > 0.0 {
            let new_ratio = (state.total_position_value + order_value) / state.total_equity;
            if new_ratio > self.config.max_total_position_ratio {
                reasons.push(format!(
                    "total position ratio {:.2} would exceed limit {:.2}",
                    new_ratio, self.config.max_total_position_ratio
                ));
            } else if new_ratio > self.config.position_warning_ratio {
                warnings.push(format!(
                    "total position ratio {:.2} above warning level {:.2}",
                    new_ratio, self.config.position_warning_ratio
                ));
            }

            // 4. Single-strategy concentration.
            if let Some(s) = strategy {
                let strategy_ratio = (s.position_value + order_value) / state.total_equity;
                if strategy_ratio > self.config.max_single_strategy_ratio {
                    reasons.push(format!(
                        "strategy {} position ratio {:.2} would exceed limit {:.2}",
                        s.strategy_id, strategy_ratio, self.config.max_single_strategy_ratio
                    ));
                }
            }
        }

        // 5. Risk budget.
        if let Some(s) = strategy {
            if assumed_risk > s.risk_budget.remaining() {
                reasons.push(format!(
                    "assumed risk {:.2} exceeds remaining budget {:.2}",
                    assumed_risk,
                    s.risk_budget.remaining()
                ));
            }
        }

        // 6. Drawdown proximity.
        if state.current_drawdown > self.config.drawdown_warning_threshold {
            warnings.push(format!(
                "drawdown {:.1}% above warning threshold",
                state.current_drawdown * 100.0
            ));
        }

        // 7. Elevated risk level.
        if state.risk_level >= RiskLevel::High {
            warnings.push(format!("portfolio risk level {}", state.risk_level));
            if state.risk_level >= RiskLevel::Critical {
                suggested_reduction = Some(0.5);
            }
        }

        let allowed = reasons.is_empty();
        if allowed {
            // Charge the ledger inside the same lock that validated it.
            if let Some(s) = strategies.get_mut(&order.strategy_id) {
                s.risk_budget.used += assumed_risk;
            }
        } else {
            debug!(
                strategy = %order.strategy_id,
                symbol = %order.symbol,
                ?reasons,
                "order denied"
            );
        }

        OrderCheck {
            allowed,
            reasons,
            warnings,
            risk_level: state.risk_level,
            suggested_reduction,
        }
    }

    // -------------------------------------------------------------------------
    // Periodic multi-check
    // -------------------------------------------------------------------------

    /// One tick: reset calendar windows, evaluate all four dimensions,
    /// update the risk level, record history, and execute the single most
    /// severe action. Returns the triggered results.
    pub async fn run_periodic_check(&self) -> Vec<RiskCheckResult> {
        self.maybe_reset_windows();

        let results = self.evaluate_checks();

        // Risk level = max across results, Normal baseline.
        let new_level = results
            .iter()
            .map(|r| r.level)
            .max()
            .unwrap_or(RiskLevel::Normal);
        let previous = {
            let mut s = self.state.write();
            let prev = s.risk_level;
            s.risk_level = new_level;
            prev
        };
        if previous != new_level {
            info!(previous = %previous, current = %new_level, "risk level changed");
            self.events.emit(PortfolioEvent::RiskLevelChanged {
                previous,
                current: new_level,
            });
        }

        let now = self.clock.now_ms();
        for r in &results {
            self.record_event(
                format!("check:{:?}", r.kind).to_lowercase(),
                r.details.clone(),
                now,
            );
        }

        if let Some(top) = results.iter().max_by_key(|r| r.action) {
            if top.action != RiskAction::None {
                self.execute_action(top).await;
            }
        }

        results
    }

    fn evaluate_checks(&self) -> Vec<RiskCheckResult> {
        let mut results = Vec::new();
        if let Some(r) = self.drawdown_check() {
            results.push(r);
        }
        if let Some(r) = self.position_check() {
            results.push(r);
        }
        if let Some(r) = self.correlation_check() {
            results.push(r);
        }
        if let Some(r) = self.var_check() {
            results.push(r);
        }
        results
    }

    fn drawdown_check(&self) -> Option<RiskCheckResult> {
        let s = self.state.read().clone();
        let cfg = &self.config;

        let mut candidates: Vec<(RiskAction, RiskLevel, String)> = Vec::new();
        if s.current_drawdown >= cfg.max_portfolio_drawdown {
            candidates.push((
                RiskAction::EmergencyClose,
                RiskLevel::Emergency,
                format!(
                    "portfolio drawdown {:.1}% breached emergency limit {:.1}%",
                    s.current_drawdown * 100.0,
                    cfg.max_portfolio_drawdown * 100.0
                ),
            ));
        } else if s.current_drawdown >= cfg.drawdown_warning_threshold {
            candidates.push((
                RiskAction::ReduceExposure,
                RiskLevel::High,
                format!(
                    "portfolio drawdown {:.1}% above warning {:.1}%",
                    s.current_drawdown * 100.0,
                    cfg.drawdown_warning_threshold * 100.0
                ),
            ));
        }
        if s.daily_drawdown >= cfg.max_daily_drawdown {
            candidates.push((
                RiskAction::PauseNewTrades,
                RiskLevel::High,
                format!(
                    "daily drawdown {:.1}% reached limit {:.1}%",
                    s.daily_drawdown * 100.0,
                    cfg.max_daily_drawdown * 100.0
                ),
            ));
        }
        if s.weekly_drawdown >= cfg.max_weekly_drawdown {
            candidates.push((
                RiskAction::ReduceAll,
                RiskLevel::Critical,
                format!(
                    "weekly drawdown {:.1}% reached limit {:.1}%",
                    s.weekly_drawdown * 100.0,
                    cfg.max_weekly_drawdown * 100.0
                ),
            ));
        }

        let (action, level, message) = candidates.into_iter().max_by_key(|c| c.0)?;
        Some(RiskCheckResult {
            kind: RiskCheckKind::Drawdown,
            action,
            level,
            details: json!({
                "current_drawdown": s.current_drawdown,
                "daily_drawdown": s.daily_drawdown,
                "weekly_drawdown": s.weekly_drawdown,
                "peak_equity": s.peak_equity,
                "total_equity": s.total_equity,
            }),
            message: Some(message),
        })
    }

    fn position_check(&self) -> Option<RiskCheckResult> {
        let s = self.state.read().clone();
        let open_positions: usize = self
            .strategies
            .read()
            .values()
            .map(|st| st.open_positions)
            .sum();
        let cfg = &self.config;

        let mut candidates: Vec<(RiskAction, RiskLevel, String)> = Vec::new();
        if s.position_ratio >= cfg.max_total_position_ratio {
            candidates.push((
                RiskAction::PauseNewTrades,
                RiskLevel::High,
                format!(
                    "position ratio {:.2} at or above limit {:.2}",
                    s.position_ratio, cfg.max_total_position_ratio
                ),
            ));
        } else if s.position_ratio >= cfg.position_warning_ratio {
            candidates.push((
                RiskAction::Alert,
                RiskLevel::Elevated,
                format!(
                    "position ratio {:.2} above warning {:.2}",
                    s.position_ratio, cfg.position_warning_ratio
                ),
            ));
        }
        if open_positions > cfg.max_position_count {
            candidates.push((
                RiskAction::Alert,
                RiskLevel::Elevated,
                format!(
                    "{open_positions} open positions above limit {}",
                    cfg.max_position_count
                ),
            ));
        }

        let (action, level, message) = candidates.into_iter().max_by_key(|c| c.0)?;
        Some(RiskCheckResult {
            kind: RiskCheckKind::Position,
            action,
            level,
            details: json!({
                "position_ratio": s.position_ratio,
                "open_positions": open_positions,
            }),
            message: Some(message),
        })
    }

    fn correlation_check(&self) -> Option<RiskCheckResult> {
        let cfg = &self.config;
        let analyzer = self.analyzer.read();

        let high_pairs = analyzer.high_correlation_pairs(cfg.high_correlation_threshold);
        if !high_pairs.is_empty() {
            self.events.emit(PortfolioEvent::HighCorrelationWarning {
                pairs: high_pairs.clone(),
            });
        }

        let mut candidates: Vec<(RiskAction, RiskLevel, String)> = Vec::new();
        if high_pairs.len() > cfg.max_high_correlation_pairs {
            candidates.push((
                RiskAction::Rebalance,
                RiskLevel::Elevated,
                format!(
                    "{} highly correlated pairs above limit {}",
                    high_pairs.len(),
                    cfg.max_high_correlation_pairs
                ),
            ));
        }

        let ids = analyzer.strategy_ids();
        'outer: for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                if let Some(shift) = analyzer.correlation_regime_change(
                    &ids[i],
                    &ids[j],
                    cfg.correlation_change_threshold,
                ) {
                    if shift.detected {
                        candidates.push((
                            RiskAction::Alert,
                            RiskLevel::Elevated,
                            format!(
                                "correlation regime change {} / {}: {:.2} -> {:.2}",
                                ids[i], ids[j], shift.first_half, shift.second_half
                            ),
                        ));
                        break 'outer;
                    }
                }
            }
        }

        let (action, level, message) = candidates.into_iter().max_by_key(|c| c.0)?;
        Some(RiskCheckResult {
            kind: RiskCheckKind::Correlation,
            action,
            level,
            details: json!({
                "high_correlation_pairs": high_pairs.len(),
            }),
            message: Some(message),
        })
    }

    fn var_check(&self) -> Option<RiskCheckResult> {
        let s = self.state.read().clone();
        if s.total_equity <= 0.0 {
            return None;
        }

        let returns = self.analyzer.read().all_returns();
        let (var, cvar) = compute_var_cvar(
            &returns,
            s.total_position_value,
            self.config.var_confidence_level,
        );

        let var_ratio = var / s.total_equity;
        let cvar_ratio = cvar / s.total_equity;
        let cfg = &self.config;

        let mut candidates: Vec<(RiskAction, RiskLevel, String)> = Vec::new();
        if var_ratio >= cfg.max_var {
            candidates.push((
                RiskAction::ReduceExposure,
                RiskLevel::High,
                format!(
                    "VaR {:.1}% of equity at or above limit {:.1}%",
                    var_ratio * 100.0,
                    cfg.max_var * 100.0
                ),
            ));
        }
        if cvar_ratio >= cfg.max_cvar {
            candidates.push((
                RiskAction::ReduceAll,
                RiskLevel::Critical,
                format!(
                    "CVaR {:.1}% of equity at or above limit {:.1}%",
                    cvar_ratio * 100.0,
                    cfg.max_cvar * 100.0
                ),
            ));
        }

        let (action, level, message) = candidates.into_iter().max_by_key(|c| c.0)?;
        Some(RiskCheckResult {
            kind: RiskCheckKind::Var,
            action,
            level,
            details: json!({
                "var": var,
                "cvar": cvar,
                "var_ratio": var_ratio,
                "cvar_ratio": cvar_ratio,
                "samples": returns.len(),
            }),
            message: Some(message),
        })
    }

    // -------------------------------------------------------------------------
    // Action execution
    // -------------------------------------------------------------------------

    async fn execute_action(&self, result: &RiskCheckResult) {
        let message = result
            .message
            .clone()
            .unwrap_or_else(|| result.action.to_string());

        match result.action {
            RiskAction::None => {}
            RiskAction::Alert => {
                self.events.emit(PortfolioEvent::RiskAlert {
                    level: result.level,
                    message,
                });
            }
            RiskAction::Rebalance => {
                self.events.emit(PortfolioEvent::RebalanceTriggered {
                    reason: "risk_triggered".to_string(),
                });
                let now = self.clock.now_ms();
                let outcome = self.allocator.write().rebalance("risk_triggered", now);
                match outcome {
                    Ok((allocation, adjustments)) => {
                        self.events.emit(PortfolioEvent::Rebalanced {
                            trigger: "risk_triggered".to_string(),
                            allocation,
                            adjustments,
                        });
                    }
                    Err(e) => warn!(error = %e, "risk-triggered rebalance failed"),
                }
            }
            RiskAction::PauseNewTrades => {
                self.pause_trading(&message);
                self.record_event(
                    "pause_new_trades".into(),
                    json!({ "message": message }),
                    self.clock.now_ms(),
                );
            }
            RiskAction::ReduceExposure => {
                self.reduce_exposure(&message).await;
            }
            RiskAction::ReduceAll => {
                self.reduce_all(&message).await;
            }
            RiskAction::EmergencyClose => {
                self.emergency_close(&message).await;
            }
        }
    }

    /// Shed `de_risk_ratio / 2` of the single largest strategy position.
    async fn reduce_exposure(&self, message: &str) {
        if !self.config.enable_auto_de_risk {
            debug!("auto de-risk disabled, emitting alert instead");
            self.events.emit(PortfolioEvent::RiskAlert {
                level: RiskLevel::High,
                message: message.to_string(),
            });
            return;
        }
        if self.in_cooldown() {
            return;
        }

        let target = {
            let strategies = self.strategies.read();
            strategies
                .values()
                .filter(|s| s.position_value > 0.0)
                .max_by(|a, b| {
                    a.position_value
                        .partial_cmp(&b.position_value)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|s| (s.strategy_id.clone(), s.symbol.clone()))
        };
        let Some((strategy_id, symbol)) = target else {
            debug!("reduce_exposure: no strategy holds positions");
            return;
        };

        let ratio = self.config.de_risk_ratio / 2.0;
        *self.last_de_risk.write() = Some(self.clock.now_ms());

        self.reduce_position(&strategy_id, &symbol, ratio).await;

        self.record_event(
            "reduce_exposure".into(),
            json!({ "strategy": strategy_id, "ratio": ratio, "message": message }),
            self.clock.now_ms(),
        );
        self.events.emit(PortfolioEvent::ReduceExposure {
            strategy_id,
            ratio,
        });
    }

    /// Shed `de_risk_ratio` of every strategy's position.
    async fn reduce_all(&self, message: &str) {
        if !self.config.enable_auto_de_risk {
            debug!("auto de-risk disabled, emitting alert instead");
            self.events.emit(PortfolioEvent::RiskAlert {
                level: RiskLevel::Critical,
                message: message.to_string(),
            });
            return;
        }
        if self.in_cooldown() {
            return;
        }

        let targets: Vec<(String, String)> = {
            let strategies = self.strategies.read();
            strategies
                .values()
                .filter(|s| s.position_value > 0.0)
                .map(|s| (s.strategy_id.clone(), s.symbol.clone()))
                .collect()
        };

        let ratio = self.config.de_risk_ratio;
        *self.last_de_risk.write() = Some(self.clock.now_ms());
        warn!(ratio, strategies = targets.len(), "{message}");

        for (strategy_id, symbol) in &targets {
            self.reduce_position(strategy_id, symbol, ratio).await;
        }

        self.record_event(
            "reduce_all".into(),
            json!({ "ratio": ratio, "strategies": targets.len(), "message": message }),
            self.clock.now_ms(),
        );
        self.events.emit(PortfolioEvent::ReduceAll { ratio });
    }

    /// Place one reduce-only market order shrinking a strategy's position.
    /// Executor failures are contained: log and move on.
    async fn reduce_position(&self, strategy_id: &str, symbol: &str, ratio: f64) {
        let Some(position) = self.executor.position(symbol).await else {
            debug!(strategy = strategy_id, symbol, "no live position to reduce");
            return;
        };
        let amount = position.amount.abs() * ratio;
        if amount <= 0.0 {
            return;
        }
        let side = match position.side {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        };

        let request = MarketOrderRequest {
            symbol: symbol.to_string(),
            side,
            amount,
            reduce_only: true,
        };
        match self.executor.execute_market_order(request).await {
            Ok(order) => info!(
                strategy = strategy_id,
                symbol,
                amount,
                order_id = %order.id,
                "position reduced"
            ),
            Err(e) => error!(
                strategy = strategy_id,
                symbol,
                error = %e,
                "de-risk order failed, continuing with remaining strategies"
            ),
        }
    }

    async fn emergency_close(&self, message: &str) {
        {
            let mut s = self.state.write();
            s.trading_allowed = false;
            s.pause_reason = Some(message.to_string());
        }
        error!("{message} — closing all positions");

        self.record_event(
            "emergency_close".into(),
            json!({ "message": message }),
            self.clock.now_ms(),
        );
        self.events.emit(PortfolioEvent::EmergencyClose {
            reason: message.to_string(),
        });

        if let Err(e) = self.executor.emergency_close_all().await {
            error!(error = %e, "emergency close-all failed at executor");
        }
    }

    /// True (and logs) when the de-risk cooldown has not elapsed.
    fn in_cooldown(&self) -> bool {
        let now = self.clock.now_ms();
        if let Some(last) = *self.last_de_risk.read() {
            let elapsed = now - last;
            if elapsed < self.config.de_risk_cooldown_ms {
                debug!(
                    elapsed_ms = elapsed,
                    cooldown_ms = self.config.de_risk_cooldown_ms,
                    "de-risk suppressed by cooldown"
                );
                return true;
            }
        }
        false
    }

    // -------------------------------------------------------------------------
    // Calendar windows
    // -------------------------------------------------------------------------

    /// Roll the daily/weekly windows when the calendar moved. A pause that
    /// was caused by the corresponding drawdown limit clears on rollover.
    fn maybe_reset_windows(&self) {
        let now = self.clock.now_ms();
        let current = window_anchors(now);

        let mut anchors = self.windows.write();
        if current.day != anchors.day {
            let mut s = self.state.write();
            info!(
                old = %anchors.day,
                new = %current.day,
                "new trading day, resetting daily window"
            );
            s.daily_start_equity = s.total_equity;
            s.daily_drawdown = 0.0;
            anchors.day = current.day;

            if pause_mentions(&s.pause_reason, "daily drawdown") {
                s.trading_allowed = true;
                s.pause_reason = None;
                drop(s);
                self.events.emit(PortfolioEvent::TradingResumed);
            }
        }

        if current.week_start != anchors.week_start {
            let mut s = self.state.write();
            info!(
                old = %anchors.week_start,
                new = %current.week_start,
                "new trading week, resetting weekly window"
            );
            s.weekly_start_equity = s.total_equity;
            s.weekly_drawdown = 0.0;
            anchors.week_start = current.week_start;

            if pause_mentions(&s.pause_reason, "weekly drawdown") {
                s.trading_allowed = true;
                s.pause_reason = None;
                drop(s);
                self.events.emit(PortfolioEvent::TradingResumed);
            }
        }
    }

    fn record_event(&self, kind: String, details: serde_json::Value, timestamp: i64) {
        let state = self.state.read().clone();
        self.history.write().push(RiskEvent {
            kind,
            details,
            state,
            timestamp,
        });
    }
}

/// Day and Sunday-based week anchors for a millisecond timestamp.
fn window_anchors(now_ms: i64) -> WindowAnchors {
    let date = Utc
        .timestamp_millis_opt(now_ms)
        .single()
        .map(|dt| dt.date_naive())
        .unwrap_or_default();
    let week_start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    WindowAnchors {
        day: date,
        week_start,
    }
}

fn pause_mentions(reason: &Option<String>, needle: &str) -> bool {
    reason.as_deref().is_some_and(|r| r.contains(needle))
}

/// VaR / CVaR in account currency. Below the minimum sample count a
/// simplified parametric estimate stands in; otherwise historical
/// simulation at the given confidence.
fn compute_var_cvar(returns: &[f64], position_value: f64, confidence: f64) -> (f64, f64) {
    if returns.len() < MIN_VAR_SAMPLES {
        let var = position_value * SIMPLIFIED_VAR_FACTOR;
        return (var, var * SIMPLIFIED_CVAR_MULT);
    }

    let mut sorted: Vec<f64> = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let idx = ((sorted.len() as f64) * (1.0 - confidence)).floor() as usize;
    let idx = idx.min(sorted.len() - 1);

    let var = sorted[idx].abs() * position_value;
    let tail = &sorted[..idx.max(1)];
    let cvar =
        tail.iter().map(|r| r.abs()).sum::<f64>() / tail.len() as f64 * position_value;

    (var, cvar)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{AllocationMethod, StrategyStats};
    use crate::clock::ManualClock;
    use crate::config::CorrelationConfig;
    use crate::executor::{Order, PositionInfo};
    use crate::risk::RiskBudget;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Recording executor: counts calls, serves a configurable position.
    struct MockExecutor {
        position: parking_lot::Mutex<Option<PositionInfo>>,
        market_orders: AtomicUsize,
        emergency_closes: AtomicUsize,
        fail_market_orders: bool,
    }

    impl MockExecutor {
        fn new(position: Option<PositionInfo>) -> Self {
            Self {
                position: parking_lot::Mutex::new(position),
                market_orders: AtomicUsize::new(0),
                emergency_closes: AtomicUsize::new(0),
                fail_market_orders: false,
            }
        }

        fn order(symbol: &str, side: OrderSide, amount: f64) -> Order {
            Order {
                id: uuid::Uuid::new_v4().to_string(),
                symbol: symbol.to_string(),
                side,
                amount,
                price: 100.0,
                reduce_only: true,
                timestamp: 0,
            }
        }
    }

    #[async_trait]
    impl OrderExecutor for MockExecutor {
        async fn buy(&self, symbol: &str, amount: f64) -> anyhow::Result<Order> {
            Ok(Self::order(symbol, OrderSide::Buy, amount))
        }

        async fn sell(&self, symbol: &str, amount: f64) -> anyhow::Result<Order> {
            Ok(Self::order(symbol, OrderSide::Sell, amount))
        }

        async fn buy_percent(&self, symbol: &str, _pct: f64) -> anyhow::Result<Order> {
            Ok(Self::order(symbol, OrderSide::Buy, 1.0))
        }

        async fn close_position(&self, _symbol: &str) -> anyhow::Result<Option<Order>> {
            Ok(None)
        }

        async fn execute_market_order(
            &self,
            request: MarketOrderRequest,
        ) -> anyhow::Result<Order> {
            if self.fail_market_orders {
                anyhow::bail!("simulated venue outage");
            }
            self.market_orders.fetch_add(1, Ordering::SeqCst);
            Ok(Self::order(&request.symbol, request.side, request.amount))
        }

        async fn emergency_close_all(&self) -> anyhow::Result<()> {
            self.emergency_closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn position(&self, _symbol: &str) -> Option<PositionInfo> {
            *self.position.lock()
        }

        async fn capital(&self) -> f64 {
            100_000.0
        }

        async fn equity(&self) -> f64 {
            100_000.0
        }
    }

    struct Fixture {
        manager: PortfolioRiskManager,
        clock: Arc<ManualClock>,
        executor: Arc<MockExecutor>,
    }

    fn fixture_with(executor: MockExecutor, config: RiskConfig) -> Fixture {
        // Mid-week noon so window tests control rollovers explicitly.
        let start_ms = 1_700_000_000_000; // 2023-11-14 22:13:20 UTC (Tuesday)
        let clock = Arc::new(ManualClock::new(start_ms));
        let executor = Arc::new(executor);
        let analyzer = Arc::new(RwLock::new(CorrelationAnalyzer::new(
            CorrelationConfig::default(),
        )));
        let allocator = Arc::new(RwLock::new(CapitalAllocator::new(
            AllocationMethod::EqualWeight,
            100_000.0,
            0.25,
        )));
        let manager = PortfolioRiskManager::new(
            config,
            100_000.0,
            clock.clone(),
            executor.clone(),
            analyzer,
            allocator,
            EventBus::new(),
        );
        Fixture {
            manager,
            clock,
            executor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockExecutor::new(Some(PositionInfo {
                amount: 2.0,
                side: OrderSide::Buy,
                entry_price: 100.0,
            })),
            RiskConfig::default(),
        )
    }

    fn strategy_state(id: &str, position_value: f64) -> StrategyRiskState {
        StrategyRiskState {
            strategy_id: id.to_string(),
            symbol: "BTCUSDT".to_string(),
            position_value,
            equity: 25_000.0,
            allocation: 25_000.0,
            daily_pnl: 0.0,
            open_positions: if position_value > 0.0 { 1 } else { 0 },
            trading_allowed: true,
            risk_budget: RiskBudget::new(2_500.0),
        }
    }

    // ---- equity / drawdown bookkeeping -------------------------------------

    #[test]
    fn peak_equity_is_monotone() {
        let f = fixture();
        f.manager.update_equity(110_000.0, 10_000.0);
        assert_eq!(f.manager.portfolio_state().peak_equity, 110_000.0);

        f.manager.update_equity(90_000.0, 10_000.0);
        let s = f.manager.portfolio_state();
        assert_eq!(s.peak_equity, 110_000.0);
        assert!((s.current_drawdown - 20_000.0 / 110_000.0).abs() < 1e-12);

        f.manager.update_equity(120_000.0, 10_000.0);
        let s = f.manager.portfolio_state();
        assert_eq!(s.peak_equity, 120_000.0);
        assert_eq!(s.current_drawdown, 0.0);
    }

    #[test]
    fn drawdown_bounded_zero_to_one() {
        let f = fixture();
        for equity in [150_000.0, 80_000.0, 40_000.0, 1.0] {
            f.manager.update_equity(equity, 0.0);
            let s = f.manager.portfolio_state();
            assert!((0.0..=1.0).contains(&s.current_drawdown));
        }
    }

    #[test]
    fn position_ratio_zero_when_equity_zero() {
        let f = fixture();
        f.manager.update_equity(0.0, 5_000.0);
        assert_eq!(f.manager.portfolio_state().position_ratio, 0.0);
    }

    // ---- pre-order gate ----------------------------------------------------

    fn order(strategy: &str, amount: f64, price: f64) -> OrderRequest {
        OrderRequest {
            strategy_id: strategy.to_string(),
            symbol: "BTCUSDT".to_string(),
            amount,
            price,
        }
    }

    #[test]
    fn order_allowed_in_normal_conditions() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 0.0));
        f.manager.update_equity(100_000.0, 0.0);

        let check = f.manager.check_order(&order("alpha", 0.1, 50_000.0));
        assert!(check.allowed, "reasons: {:?}", check.reasons);
        assert!(check.warnings.is_empty());
    }

    #[test]
    fn order_denied_when_paused() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 0.0));
        f.manager.pause_trading("manual halt");

        let check = f.manager.check_order(&order("alpha", 0.1, 50_000.0));
        assert!(!check.allowed);
        assert!(check.reasons.iter().any(|r| r.contains("manual halt")));
    }

    #[test]
    fn order_denied_for_unknown_strategy() {
        let f = fixture();
        let check = f.manager.check_order(&order("ghost", 0.1, 50_000.0));
        assert!(!check.allowed);
        assert!(check.reasons.iter().any(|r| r.contains("unknown strategy")));
    }

    #[test]
    fn order_denied_over_total_position_limit() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 0.0));
        // 55k existing + 10k order = 65% > 60% limit.
        f.manager.update_equity(100_000.0, 55_000.0);

        let check = f.manager.check_order(&order("alpha", 0.2, 50_000.0));
        assert!(!check.allowed);
        assert!(check
            .reasons
            .iter()
            .any(|r| r.contains("total position ratio")));
    }

    #[test]
    fn order_warns_above_warning_ratio() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 0.0));
        // 45k + 10k = 55% (warn zone, under the 60% limit)
        f.manager.update_equity(100_000.0, 45_000.0);

        let check = f.manager.check_order(&order("alpha", 0.2, 50_000.0));
        assert!(check.allowed);
        assert!(check
            .warnings
            .iter()
            .any(|w| w.contains("warning level")));
    }

    #[test]
    fn order_denied_over_single_strategy_limit() {
        let f = fixture();
        // Strategy already holds 20k; +10k = 30% > 25%.
        f.manager.register_strategy(strategy_state("alpha", 20_000.0));
        f.manager.update_equity(100_000.0, 20_000.0);

        let check = f.manager.check_order(&order("alpha", 0.2, 50_000.0));
        assert!(!check.allowed);
        assert!(check
            .reasons
            .iter()
            .any(|r| r.contains("strategy alpha position ratio")));
    }

    #[test]
    fn order_denied_when_budget_exhausted() {
        let f = fixture();
        let mut state = strategy_state("alpha", 0.0);
        state.risk_budget = RiskBudget::new(10.0); // tiny budget
        f.manager.register_strategy(state);
        f.manager.update_equity(100_000.0, 0.0);

        // Assumed risk = 2% of 10k = 200 > 10.
        let check = f.manager.check_order(&order("alpha", 0.2, 50_000.0));
        assert!(!check.allowed);
        assert!(check.reasons.iter().any(|r| r.contains("budget")));
    }

    #[test]
    fn approved_orders_charge_the_budget() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 0.0));
        f.manager.update_equity(100_000.0, 0.0);

        // 2% of 10_000 = 200 per approval; budget 2_500.
        for _ in 0..3 {
            let check = f.manager.check_order(&order("alpha", 0.2, 50_000.0));
            assert!(check.allowed);
        }
        let used = f.manager.strategy_state("alpha").unwrap().risk_budget.used;
        assert!((used - 600.0).abs() < 1e-9);
    }

    #[test]
    fn critical_risk_level_suggests_reduction() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 0.0));
        f.manager.update_equity(100_000.0, 0.0);
        f.manager.state.write().risk_level = RiskLevel::Critical;

        let check = f.manager.check_order(&order("alpha", 0.1, 50_000.0));
        assert_eq!(check.suggested_reduction, Some(0.5));
        assert!(check.warnings.iter().any(|w| w.contains("risk level")));
    }

    // ---- periodic check: drawdown (S3) -------------------------------------

    #[tokio::test]
    async fn emergency_close_on_drawdown_breach() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 10_000.0));
        // peak 100k, equity 84k => 16% >= 15%.
        f.manager.update_equity(84_000.0, 10_000.0);

        let results = f.manager.run_periodic_check().await;
        let drawdown = results
            .iter()
            .find(|r| r.kind == RiskCheckKind::Drawdown)
            .expect("drawdown result");
        assert_eq!(drawdown.action, RiskAction::EmergencyClose);
        assert_eq!(drawdown.level, RiskLevel::Emergency);

        let s = f.manager.portfolio_state();
        assert!(!s.trading_allowed);
        assert!(s.pause_reason.is_some());
        assert_eq!(s.risk_level, RiskLevel::Emergency);
        assert_eq!(f.executor.emergency_closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drawdown_warning_reduces_exposure() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 10_000.0));
        // 12% drawdown: warning zone, not emergency.
        f.manager.update_equity(88_000.0, 10_000.0);

        let results = f.manager.run_periodic_check().await;
        let drawdown = results
            .iter()
            .find(|r| r.kind == RiskCheckKind::Drawdown)
            .expect("drawdown result");
        assert_eq!(drawdown.action, RiskAction::ReduceExposure);
        assert_eq!(f.executor.emergency_closes.load(Ordering::SeqCst), 0);
        // Half the de-risk ratio applied to the only position.
        assert_eq!(f.executor.market_orders.load(Ordering::SeqCst), 1);
    }

    // ---- periodic check: cooldown (S4) -------------------------------------

    /// Push equity into ReduceAll territory via weekly drawdown without
    /// tripping the harder current-drawdown limits.
    fn weekly_drawdown_setup(f: &Fixture) {
        f.manager.register_strategy(strategy_state("alpha", 10_000.0));
        // 10.5% weekly (and current) drawdown: ReduceAll/Critical from the
        // weekly rule, ReduceExposure/High from current drawdown; ReduceAll
        // wins on severity.
        f.manager.update_equity(89_500.0, 10_000.0);
    }

    #[tokio::test]
    async fn de_risk_cooldown_suppresses_and_releases() {
        let f = fixture();
        weekly_drawdown_setup(&f);

        // First trigger executes.
        f.manager.run_periodic_check().await;
        assert_eq!(f.executor.market_orders.load(Ordering::SeqCst), 1);
        let first_time = f.manager.last_de_risk_time().unwrap();

        // 10 minutes later: still inside the 30-minute cooldown.
        f.clock.advance(10 * 60 * 1000);
        f.manager.run_periodic_check().await;
        assert_eq!(f.executor.market_orders.load(Ordering::SeqCst), 1);
        assert_eq!(f.manager.last_de_risk_time().unwrap(), first_time);

        // 31 minutes after the first execution: released.
        f.clock.advance(21 * 60 * 1000);
        f.manager.run_periodic_check().await;
        assert_eq!(f.executor.market_orders.load(Ordering::SeqCst), 2);
        assert!(f.manager.last_de_risk_time().unwrap() > first_time);
    }

    #[tokio::test]
    async fn executor_failure_does_not_roll_back_cooldown() {
        let mut executor = MockExecutor::new(Some(PositionInfo {
            amount: 2.0,
            side: OrderSide::Buy,
            entry_price: 100.0,
        }));
        executor.fail_market_orders = true;
        let f = fixture_with(executor, RiskConfig::default());
        weekly_drawdown_setup(&f);

        f.manager.run_periodic_check().await;
        // No successful orders, but the attempt still stamps the cooldown.
        assert_eq!(f.executor.market_orders.load(Ordering::SeqCst), 0);
        assert!(f.manager.last_de_risk_time().is_some());
    }

    #[tokio::test]
    async fn auto_de_risk_disabled_emits_alert_only() {
        let config = RiskConfig {
            enable_auto_de_risk: false,
            ..RiskConfig::default()
        };
        let f = fixture_with(
            MockExecutor::new(Some(PositionInfo {
                amount: 2.0,
                side: OrderSide::Buy,
                entry_price: 100.0,
            })),
            config,
        );
        weekly_drawdown_setup(&f);

        f.manager.run_periodic_check().await;
        assert_eq!(f.executor.market_orders.load(Ordering::SeqCst), 0);
        assert!(f.manager.last_de_risk_time().is_none());
    }

    // ---- periodic check: positions -----------------------------------------

    #[tokio::test]
    async fn position_ratio_breach_pauses_new_trades() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 65_000.0));
        f.manager.update_equity(100_000.0, 65_000.0);

        let results = f.manager.run_periodic_check().await;
        let position = results
            .iter()
            .find(|r| r.kind == RiskCheckKind::Position)
            .expect("position result");
        assert_eq!(position.action, RiskAction::PauseNewTrades);
        assert!(!f.manager.portfolio_state().trading_allowed);
    }

    #[tokio::test]
    async fn position_count_over_limit_alerts() {
        let f = fixture();
        let mut s = strategy_state("alpha", 10_000.0);
        s.open_positions = 11;
        f.manager.register_strategy(s);
        f.manager.update_equity(100_000.0, 10_000.0);

        let results = f.manager.run_periodic_check().await;
        let position = results
            .iter()
            .find(|r| r.kind == RiskCheckKind::Position)
            .expect("position result");
        assert_eq!(position.action, RiskAction::Alert);
        assert_eq!(position.level, RiskLevel::Elevated);
    }

    // ---- periodic check: VaR -----------------------------------------------

    #[test]
    fn var_simplified_under_min_samples() {
        let (var, cvar) = compute_var_cvar(&[0.01, -0.02], 50_000.0, 0.95);
        assert!((var - 50_000.0 * 0.02 * 1.65).abs() < 1e-9);
        assert!((cvar - var * 1.2).abs() < 1e-9);
    }

    #[test]
    fn var_historical_simulation() {
        // 20 samples, 95% confidence => idx = floor(20 * 0.05) = 1.
        let mut returns: Vec<f64> = (0..18).map(|i| 0.001 * (i + 1) as f64).collect();
        returns.push(-0.08);
        returns.push(-0.05);
        let (var, cvar) = compute_var_cvar(&returns, 100_000.0, 0.95);
        // Sorted ascending: [-0.08, -0.05, ...]; VaR = |-0.05| * PV.
        assert!((var - 5_000.0).abs() < 1e-9);
        // CVaR = mean(|returns[0..1]|) = 0.08 * PV.
        assert!((cvar - 8_000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn var_breach_reduces_exposure() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 60_000.0));
        // Fat left tail in the recorded returns.
        {
            let mut analyzer = f.manager.analyzer.write();
            for i in 0..25 {
                let r = if i % 5 == 0 { -0.12 } else { 0.002 };
                analyzer.record_return("alpha", r);
            }
        }
        f.manager.update_equity(100_000.0, 60_000.0);

        let results = f.manager.run_periodic_check().await;
        let var = results
            .iter()
            .find(|r| r.kind == RiskCheckKind::Var)
            .expect("var result");
        // VaR = 0.12 * 60k = 7.2% of equity >= 5%; CVaR = 0.12 * 60k * ... also breached.
        assert!(var.action >= RiskAction::ReduceExposure);
    }

    // ---- time-window resets ------------------------------------------------

    #[tokio::test]
    async fn daily_rollover_resets_window_and_clears_pause() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 1_000.0));

        // 6% daily loss pauses new trades.
        f.manager.update_equity(94_000.0, 1_000.0);
        f.manager.run_periodic_check().await;
        let s = f.manager.portfolio_state();
        assert!(!s.trading_allowed);
        assert!(pause_mentions(&s.pause_reason, "daily drawdown"));

        // Next day: window resets, pause clears.
        f.clock.advance(24 * 60 * 60 * 1000);
        f.manager.run_periodic_check().await;
        let s = f.manager.portfolio_state();
        assert!(s.trading_allowed);
        assert!(s.pause_reason.is_none());
        assert_eq!(s.daily_start_equity, 94_000.0);
        assert_eq!(s.daily_drawdown, 0.0);
    }

    #[tokio::test]
    async fn weekly_rollover_resets_weekly_window() {
        let f = fixture();
        f.manager.update_equity(95_000.0, 0.0);
        assert!(f.manager.portfolio_state().weekly_drawdown > 0.0);

        // Jump a full week.
        f.clock.advance(7 * 24 * 60 * 60 * 1000);
        f.manager.update_equity(95_000.0, 0.0);
        let s = f.manager.portfolio_state();
        assert_eq!(s.weekly_start_equity, 95_000.0);
        assert_eq!(s.weekly_drawdown, 0.0);
    }

    #[test]
    fn window_anchors_sunday_based() {
        // 2023-11-14 is a Tuesday; its week starts Sunday 2023-11-12.
        let anchors = window_anchors(1_700_000_000_000);
        assert_eq!(anchors.day, NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
        assert_eq!(
            anchors.week_start,
            NaiveDate::from_ymd_opt(2023, 11, 12).unwrap()
        );
    }

    // ---- manual pause round-trip -------------------------------------------

    #[test]
    fn pause_resume_round_trip() {
        let f = fixture();
        f.manager.pause_trading("operator request");
        let s = f.manager.portfolio_state();
        assert!(!s.trading_allowed);
        assert_eq!(s.pause_reason.as_deref(), Some("operator request"));

        f.manager.resume_trading();
        let s = f.manager.portfolio_state();
        assert!(s.trading_allowed);
        assert!(s.pause_reason.is_none());
    }

    // ---- history bound -----------------------------------------------------

    #[tokio::test]
    async fn risk_history_is_bounded() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 1_000.0));
        f.manager.update_equity(88_000.0, 1_000.0); // persistent warning zone

        for _ in 0..250 {
            // Stay within cooldown so most ticks only record check results.
            f.manager.run_periodic_check().await;
            f.clock.advance(1_000);
        }
        assert!(f.manager.risk_events().len() <= RISK_HISTORY_LIMIT);
    }

    #[tokio::test]
    async fn executed_action_is_max_of_results() {
        let f = fixture();
        f.manager.register_strategy(strategy_state("alpha", 65_000.0));
        // Both a position breach (PauseNewTrades) and an emergency drawdown.
        f.manager.update_equity(84_000.0, 65_000.0);

        f.manager.run_periodic_check().await;
        // EmergencyClose outranks PauseNewTrades: the executor must see the
        // close-all, and the pause reason must be the emergency one.
        assert_eq!(f.executor.emergency_closes.load(Ordering::SeqCst), 1);
        let s = f.manager.portfolio_state();
        assert!(pause_mentions(&s.pause_reason, "emergency"));
    }
}
