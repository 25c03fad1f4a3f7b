// =============================================================================
// End-to-end portfolio flow against a simulated executor
// =============================================================================
//
// Exercises the full stack the way an embedding application would: an
// in-memory fill simulator behind the `OrderExecutor` capability, adaptive
// strategies wrapped by the portfolio manager, a manual clock driving the
// cooldown and calendar logic, and the broadcast bus observed from outside.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use meridian_core::{
    Bar, BarReport, ManualClock, MarketOrderRequest, Order, OrderExecutor, OrderSide,
    PortfolioConfig, PortfolioEvent, PortfolioManager, PortfolioStatus, PositionInfo,
    SignalDecision, Strategy, StrategySignal, StrategyStateUpdate,
};

// ---------------------------------------------------------------------------
// Simulated executor
// ---------------------------------------------------------------------------

/// In-memory fill simulator: every order fills instantly at the posted
/// reference price; positions are tracked per symbol.
struct SimExecutor {
    price: Mutex<f64>,
    positions: Mutex<HashMap<String, PositionInfo>>,
    equity: Mutex<f64>,
    market_orders: AtomicUsize,
    emergency_closes: AtomicUsize,
}

impl SimExecutor {
    fn new(equity: f64, price: f64) -> Arc<Self> {
        Arc::new(Self {
            price: Mutex::new(price),
            positions: Mutex::new(HashMap::new()),
            equity: Mutex::new(equity),
            market_orders: AtomicUsize::new(0),
            emergency_closes: AtomicUsize::new(0),
        })
    }

    fn fill(&self, symbol: &str, side: OrderSide, amount: f64, reduce_only: bool) -> Order {
        Order {
            id: uuid_like(),
            symbol: symbol.to_string(),
            side,
            amount,
            price: *self.price.lock(),
            reduce_only,
            timestamp: 0,
        }
    }

    fn open_position(&self, symbol: &str, amount: f64) {
        let price = *self.price.lock();
        self.positions.lock().insert(
            symbol.to_string(),
            PositionInfo {
                amount,
                side: OrderSide::Buy,
                entry_price: price,
            },
        );
    }
}

/// Deterministic pseudo-id; the simulator does not need real UUIDs.
fn uuid_like() -> String {
    use std::sync::atomic::AtomicU64;
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("sim-{:08}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

#[async_trait]
impl OrderExecutor for SimExecutor {
    async fn buy(&self, symbol: &str, amount: f64) -> anyhow::Result<Order> {
        self.open_position(symbol, amount);
        Ok(self.fill(symbol, OrderSide::Buy, amount, false))
    }

    async fn sell(&self, symbol: &str, amount: f64) -> anyhow::Result<Order> {
        Ok(self.fill(symbol, OrderSide::Sell, amount, false))
    }

    async fn buy_percent(&self, symbol: &str, pct_of_equity: f64) -> anyhow::Result<Order> {
        let price = *self.price.lock();
        let amount = *self.equity.lock() * pct_of_equity / 100.0 / price;
        self.open_position(symbol, amount);
        Ok(self.fill(symbol, OrderSide::Buy, amount, false))
    }

    async fn close_position(&self, symbol: &str) -> anyhow::Result<Option<Order>> {
        match self.positions.lock().remove(symbol) {
            Some(p) => Ok(Some(self.fill(symbol, OrderSide::Sell, p.amount, true))),
            None => Ok(None),
        }
    }

    async fn execute_market_order(&self, request: MarketOrderRequest) -> anyhow::Result<Order> {
        self.market_orders.fetch_add(1, Ordering::SeqCst);
        if request.reduce_only {
            let mut positions = self.positions.lock();
            if let Some(p) = positions.get_mut(&request.symbol) {
                p.amount = (p.amount - request.amount).max(0.0);
            }
        }
        Ok(self.fill(
            &request.symbol,
            request.side,
            request.amount,
            request.reduce_only,
        ))
    }

    async fn emergency_close_all(&self) -> anyhow::Result<()> {
        self.emergency_closes.fetch_add(1, Ordering::SeqCst);
        self.positions.lock().clear();
        Ok(())
    }

    async fn position(&self, symbol: &str) -> Option<PositionInfo> {
        self.positions.lock().get(symbol).copied()
    }

    async fn capital(&self) -> f64 {
        *self.equity.lock()
    }

    async fn equity(&self) -> f64 {
        *self.equity.lock()
    }
}

// ---------------------------------------------------------------------------
// Scripted strategy
// ---------------------------------------------------------------------------

/// Deterministic strategy for orchestration tests: emits a fixed decision
/// sequence, no real trading.
struct Scripted {
    decisions: Vec<SignalDecision>,
    cursor: usize,
}

impl Scripted {
    fn new(decisions: Vec<SignalDecision>) -> Self {
        Self {
            decisions,
            cursor: 0,
        }
    }
}

#[async_trait]
impl Strategy for Scripted {
    async fn on_bar(&mut self, bar: &Bar, _history: &[Bar]) -> anyhow::Result<BarReport> {
        let decision = self
            .decisions
            .get(self.cursor)
            .copied()
            .unwrap_or(SignalDecision::None);
        self.cursor += 1;

        let mut report = BarReport::idle();
        if decision != SignalDecision::None {
            report.signal = Some(StrategySignal {
                decision,
                reason: "scripted".into(),
                timestamp: bar.timestamp,
            });
        }
        Ok(report)
    }
}

fn bar(ts: i64, close: f64) -> Bar {
    Bar {
        timestamp: ts,
        open: close * 0.999,
        high: close * 1.002,
        low: close * 0.997,
        close,
        volume: 1_000.0,
        symbol: "BTCUSDT".to_string(),
    }
}

fn setup() -> (Arc<PortfolioManager>, Arc<SimExecutor>, Arc<ManualClock>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();

    let executor = SimExecutor::new(100_000.0, 50_000.0);
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let pm = PortfolioManager::new(PortfolioConfig::default(), executor.clone(), clock.clone())
        .expect("default config valid");
    (pm, executor, clock)
}

async fn add_scripted(pm: &Arc<PortfolioManager>, id: &str) {
    pm.add_strategy(id, "BTCUSDT", Box::new(Scripted::new(vec![])))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle_with_events() {
    let (pm, _executor, _clock) = setup();
    let mut rx = pm.subscribe();

    for id in ["alpha", "beta", "gamma", "delta"] {
        add_scripted(&pm, id).await;
    }
    pm.start();
    assert_eq!(pm.status(), PortfolioStatus::Running);

    // Four StrategyAdded events, in registration order.
    for expected in ["alpha", "beta", "gamma", "delta"] {
        loop {
            let event = rx.recv().await.unwrap();
            if let PortfolioEvent::StrategyAdded { strategy_id } = event {
                assert_eq!(strategy_id, expected);
                break;
            }
        }
    }

    // Feed a few bars; scripted strategies just observe them.
    for i in 0..5 {
        pm.submit_bar(&bar(i, 50_000.0 + i as f64)).await;
    }

    pm.stop().await;
    assert_eq!(pm.status(), PortfolioStatus::Stopped);
    // Idempotent.
    pm.stop().await;
    assert_eq!(pm.status(), PortfolioStatus::Stopped);
}

#[tokio::test]
async fn drawdown_emergency_closes_all_positions_once() {
    let (pm, executor, _clock) = setup();
    for id in ["alpha", "beta", "gamma", "delta"] {
        add_scripted(&pm, id).await;
    }
    let mut rx = pm.subscribe();

    // Equal books summing to 84k equity against the 100k starting peak:
    // 16% portfolio drawdown, over the 15% emergency limit.
    for id in ["alpha", "beta", "gamma", "delta"] {
        pm.update_strategy_state(
            id,
            StrategyStateUpdate {
                position_value: 2_000.0,
                equity: 21_000.0,
                daily_pnl: -4_000.0,
                open_positions: 1,
                daily_return: Some(-0.04),
            },
        )
        .unwrap();
    }

    pm.run_risk_check().await;

    let state = pm.portfolio_state();
    assert!(!state.trading_allowed);
    assert!(state.pause_reason.is_some());
    assert_eq!(executor.emergency_closes.load(Ordering::SeqCst), 1);

    // Emergency event observed on the bus.
    let mut saw_emergency = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, PortfolioEvent::EmergencyClose { .. }) {
            saw_emergency = true;
        }
    }
    assert!(saw_emergency);

    // Emergency close has no cooldown: while the breach persists, every
    // tick re-executes it. The "exactly once" guarantee is per trigger.
    pm.run_risk_check().await;
    assert_eq!(executor.emergency_closes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn de_risk_cooldown_across_ticks() {
    let (pm, executor, clock) = setup();
    for id in ["alpha", "beta", "gamma", "delta"] {
        add_scripted(&pm, id).await;
    }

    // 10.5% weekly drawdown: ReduceAll territory without the emergency
    // limit. One strategy holds a live position at the executor.
    executor.open_position("BTCUSDT", 2.0);
    for id in ["alpha", "beta", "gamma", "delta"] {
        pm.update_strategy_state(
            id,
            StrategyStateUpdate {
                position_value: 5_000.0,
                equity: 22_375.0, // 4 x 22_375 = 89_500
                daily_pnl: 0.0,
                open_positions: 1,
                daily_return: None,
            },
        )
        .unwrap();
    }

    pm.run_risk_check().await;
    let after_first = executor.market_orders.load(Ordering::SeqCst);
    assert!(after_first > 0, "first trigger must de-risk");

    // 10 minutes later: inside the 30-minute cooldown, no new orders.
    clock.advance(10 * 60 * 1000);
    pm.run_risk_check().await;
    assert_eq!(executor.market_orders.load(Ordering::SeqCst), after_first);

    // 31+ minutes after the first execution: released.
    clock.advance(21 * 60 * 1000);
    pm.run_risk_check().await;
    assert!(executor.market_orders.load(Ordering::SeqCst) > after_first);
}

#[tokio::test]
async fn rebalance_emits_allocation_events() {
    let (pm, _executor, _clock) = setup();
    for id in ["alpha", "beta", "gamma", "delta"] {
        add_scripted(&pm, id).await;
    }
    let mut rx = pm.subscribe();

    let adjustments = pm.rebalance("manual").await.unwrap();
    assert_eq!(adjustments.len(), 4, "all four books move from zero");

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind());
    }
    assert!(kinds.contains(&"rebalanced"));
    assert!(kinds.contains(&"allocation_updated"));

    let allocation = pm.current_allocation().unwrap();
    let total: f64 = allocation.weights.values().sum();
    assert!((total - 1.0).abs() < 1e-9);
    for weight in allocation.weights.values() {
        assert!(*weight <= 0.25 + 1e-9);
    }
}

#[tokio::test]
async fn pause_resume_round_trip_via_manager() {
    let (pm, _executor, _clock) = setup();
    add_scripted(&pm, "alpha").await;
    pm.start();

    pm.pause_trading("maintenance window");
    assert_eq!(pm.status(), PortfolioStatus::Paused);
    assert!(!pm.portfolio_state().trading_allowed);

    pm.resume_trading();
    assert_eq!(pm.status(), PortfolioStatus::Running);
    let state = pm.portfolio_state();
    assert!(state.trading_allowed);
    assert!(state.pause_reason.is_none());

    pm.stop().await;
}

#[tokio::test]
async fn daily_window_reset_restores_trading() {
    let (pm, _executor, clock) = setup();
    for id in ["alpha", "beta", "gamma", "delta"] {
        add_scripted(&pm, id).await;
    }

    // 6% daily loss: pauses new trades but is below every harder limit.
    for id in ["alpha", "beta", "gamma", "delta"] {
        pm.update_strategy_state(
            id,
            StrategyStateUpdate {
                position_value: 1_000.0,
                equity: 23_500.0, // 94k total
                daily_pnl: -1_500.0,
                open_positions: 1,
                daily_return: None,
            },
        )
        .unwrap();
    }
    pm.run_risk_check().await;
    assert!(!pm.portfolio_state().trading_allowed);

    // Next calendar day: the pause clears automatically.
    clock.advance(24 * 60 * 60 * 1000);
    pm.run_risk_check().await;
    let state = pm.portfolio_state();
    assert!(state.trading_allowed);
    assert_eq!(state.daily_drawdown, 0.0);
    assert_eq!(state.daily_start_equity, 94_000.0);
}

#[tokio::test]
async fn report_generation_round_trip() {
    let (pm, _executor, _clock) = setup();
    for id in ["alpha", "beta", "gamma", "delta"] {
        add_scripted(&pm, id).await;
    }
    pm.rebalance("manual").await.unwrap();

    let report = pm.build_report();
    assert_eq!(report.strategies.len(), 4);
    assert!(report.allocation.is_some());

    // Reports serialize cleanly for downstream consumers.
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"strategies\""));
}
