// =============================================================================
// Configuration — nested, serde-tolerant engine settings
// =============================================================================
//
// Every tunable lives here. All fields carry serde defaults so that a
// partial JSON document (or an older one missing newer fields) still
// deserialises; `PortfolioConfig::validate` is the single fatal gate at
// construction time.

use serde::{Deserialize, Serialize};

use crate::allocation::AllocationMethod;
use crate::error::{CoreError, CoreResult};

// =============================================================================
// Default-value helpers (required by serde `default = "..."`)
// =============================================================================

fn default_total_capital() -> f64 {
    100_000.0
}

fn default_true() -> bool {
    true
}

fn default_rebalance_period_ms() -> i64 {
    86_400_000
}

fn default_max_candle_history() -> usize {
    200
}

// --- regime ---

fn default_adx_period() -> usize {
    14
}

fn default_bb_period() -> usize {
    20
}

fn default_bb_std() -> f64 {
    2.0
}

fn default_atr_period() -> usize {
    14
}

fn default_fast_ma_period() -> usize {
    10
}

fn default_slow_ma_period() -> usize {
    50
}

fn default_hurst_period() -> usize {
    100
}

fn default_vol_lookback() -> usize {
    100
}

fn default_adx_trend_threshold() -> f64 {
    25.0
}

fn default_high_vol_percentile() -> f64 {
    75.0
}

fn default_extreme_vol_percentile() -> f64 {
    95.0
}

fn default_ma_spread_threshold() -> f64 {
    0.5
}

fn default_min_regime_duration() -> u32 {
    3
}

fn default_momentum_period() -> usize {
    20
}

fn default_regime_history_limit() -> usize {
    500
}

// --- signal ---

fn default_sma_base_fast() -> usize {
    10
}

fn default_sma_base_slow() -> usize {
    30
}

fn default_adjustment_range() -> f64 {
    0.5
}

fn default_vol_low_threshold() -> f64 {
    25.0
}

fn default_vol_high_threshold() -> f64 {
    75.0
}

fn default_rsi_period() -> usize {
    14
}

fn default_rsi_oversold() -> f64 {
    30.0
}

fn default_rsi_overbought() -> f64 {
    70.0
}

fn default_rsi_trending_oversold() -> f64 {
    25.0
}

fn default_rsi_trending_overbought() -> f64 {
    75.0
}

fn default_rsi_ranging_oversold() -> f64 {
    35.0
}

fn default_rsi_ranging_overbought() -> f64 {
    65.0
}

fn default_bb_min_std() -> f64 {
    1.5
}

fn default_bb_max_std() -> f64 {
    3.0
}

fn default_trend_ma_period() -> usize {
    50
}

fn default_signal_threshold() -> f64 {
    0.5
}

fn default_sma_weight() -> f64 {
    0.4
}

fn default_rsi_weight() -> f64 {
    0.3
}

fn default_bb_weight() -> f64 {
    0.3
}

fn default_position_percent() -> f64 {
    10.0
}

fn default_stop_loss_atr_multiplier() -> f64 {
    2.0
}

// --- correlation ---

fn default_rolling_window() -> usize {
    30
}

fn default_low_correlation_threshold() -> f64 {
    0.3
}

fn default_high_correlation_threshold() -> f64 {
    0.7
}

// --- risk ---

fn default_max_portfolio_drawdown() -> f64 {
    0.15
}

fn default_drawdown_warning_threshold() -> f64 {
    0.10
}

fn default_max_daily_drawdown() -> f64 {
    0.05
}

fn default_max_weekly_drawdown() -> f64 {
    0.10
}

fn default_max_total_position_ratio() -> f64 {
    0.60
}

fn default_position_warning_ratio() -> f64 {
    0.50
}

fn default_max_single_strategy_ratio() -> f64 {
    0.25
}

fn default_max_position_count() -> usize {
    10
}

fn default_max_high_correlation_pairs() -> usize {
    2
}

fn default_correlation_change_threshold() -> f64 {
    0.30
}

fn default_var_confidence_level() -> f64 {
    0.95
}

fn default_max_var() -> f64 {
    0.05
}

fn default_max_cvar() -> f64 {
    0.08
}

fn default_de_risk_ratio() -> f64 {
    0.30
}

fn default_de_risk_cooldown_ms() -> i64 {
    1_800_000
}

fn default_check_interval_ms() -> u64 {
    5_000
}

// --- monitoring ---

fn default_status_update_interval_ms() -> u64 {
    10_000
}

fn default_report_interval_ms() -> u64 {
    60_000
}

// =============================================================================
// Regime detection
// =============================================================================

/// Parameters for the five-regime market classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    #[serde(default = "default_adx_period")]
    pub adx_period: usize,

    #[serde(default = "default_bb_period")]
    pub bb_period: usize,

    #[serde(default = "default_bb_std")]
    pub bb_std: f64,

    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// Fast EMA period for the MA-spread trend gauge.
    #[serde(default = "default_fast_ma_period")]
    pub fast_ma_period: usize,

    /// Slow SMA period for the MA-spread trend gauge.
    #[serde(default = "default_slow_ma_period")]
    pub slow_ma_period: usize,

    /// Closes fed into the Hurst estimator.
    #[serde(default = "default_hurst_period")]
    pub hurst_period: usize,

    /// Lookback for the BB-width and normalized-ATR percentile buffers.
    #[serde(default = "default_vol_lookback")]
    pub vol_lookback: usize,

    /// ADX at or above this reads as a directional trend.
    #[serde(default = "default_adx_trend_threshold")]
    pub adx_trend_threshold: f64,

    /// Volatility index at or above this is HighVolatility.
    #[serde(default = "default_high_vol_percentile")]
    pub high_vol_percentile: f64,

    /// Volatility index at or above this is Extreme.
    #[serde(default = "default_extreme_vol_percentile")]
    pub extreme_vol_percentile: f64,

    /// Minimum |MA spread| (percent) for a trending classification.
    #[serde(default = "default_ma_spread_threshold")]
    pub ma_spread_threshold: f64,

    /// Consecutive matching candidates required before a regime switch is
    /// confirmed (entry into Extreme bypasses this).
    #[serde(default = "default_min_regime_duration")]
    pub min_regime_duration: u32,

    #[serde(default = "default_momentum_period")]
    pub momentum_period: usize,

    /// Retained regime snapshots.
    #[serde(default = "default_regime_history_limit")]
    pub history_limit: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            adx_period: default_adx_period(),
            bb_period: default_bb_period(),
            bb_std: default_bb_std(),
            atr_period: default_atr_period(),
            fast_ma_period: default_fast_ma_period(),
            slow_ma_period: default_slow_ma_period(),
            hurst_period: default_hurst_period(),
            vol_lookback: default_vol_lookback(),
            adx_trend_threshold: default_adx_trend_threshold(),
            high_vol_percentile: default_high_vol_percentile(),
            extreme_vol_percentile: default_extreme_vol_percentile(),
            ma_spread_threshold: default_ma_spread_threshold(),
            min_regime_duration: default_min_regime_duration(),
            momentum_period: default_momentum_period(),
            history_limit: default_regime_history_limit(),
        }
    }
}

impl RegimeConfig {
    /// Bars of history needed before classification starts.
    pub fn required_history(&self) -> usize {
        let warmup = self
            .adx_period
            .max(self.bb_period)
            .max(self.atr_period)
            .max(self.slow_ma_period)
            + 10;
        warmup.max(self.hurst_period)
    }
}

// =============================================================================
// Adaptive signal engine
// =============================================================================

/// Parameters for adaptive thresholds and signal fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Adapt SMA periods to the volatility index.
    #[serde(default = "default_true")]
    pub adapt_sma_periods: bool,

    /// Adapt RSI bands to the regime.
    #[serde(default = "default_true")]
    pub adapt_rsi_thresholds: bool,

    /// Adapt Bollinger sigma to the ATR percentile.
    #[serde(default = "default_true")]
    pub adapt_bb_std: bool,

    #[serde(default = "default_sma_base_fast")]
    pub sma_base_fast: usize,

    #[serde(default = "default_sma_base_slow")]
    pub sma_base_slow: usize,

    /// Fractional stretch applied to SMA periods across the volatility range.
    #[serde(default = "default_adjustment_range")]
    pub adjustment_range: f64,

    /// Volatility index at or below this maps to factor 0.
    #[serde(default = "default_vol_low_threshold")]
    pub vol_low_threshold: f64,

    /// Volatility index at or above this maps to factor 1.
    #[serde(default = "default_vol_high_threshold")]
    pub vol_high_threshold: f64,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_rsi_oversold")]
    pub rsi_base_oversold: f64,

    #[serde(default = "default_rsi_overbought")]
    pub rsi_base_overbought: f64,

    #[serde(default = "default_rsi_trending_oversold")]
    pub rsi_trending_oversold: f64,

    #[serde(default = "default_rsi_trending_overbought")]
    pub rsi_trending_overbought: f64,

    #[serde(default = "default_rsi_ranging_oversold")]
    pub rsi_ranging_oversold: f64,

    #[serde(default = "default_rsi_ranging_overbought")]
    pub rsi_ranging_overbought: f64,

    #[serde(default = "default_bb_period")]
    pub bb_period: usize,

    #[serde(default = "default_bb_min_std")]
    pub bb_min_std: f64,

    #[serde(default = "default_bb_max_std")]
    pub bb_max_std: f64,

    /// Gate fused signals behind a slow-SMA trend filter.
    #[serde(default = "default_true")]
    pub use_trend_filter: bool,

    #[serde(default = "default_trend_ma_period")]
    pub trend_ma_period: usize,

    /// |raw score| at or above this produces a Buy/Sell decision.
    #[serde(default = "default_signal_threshold")]
    pub signal_threshold: f64,

    #[serde(default = "default_sma_weight")]
    pub sma_weight: f64,

    #[serde(default = "default_rsi_weight")]
    pub rsi_weight: f64,

    #[serde(default = "default_bb_weight")]
    pub bb_weight: f64,

    /// Stand down entirely while the regime is Extreme.
    #[serde(default = "default_true")]
    pub disable_in_extreme: bool,

    /// Equity percentage committed per entry.
    #[serde(default = "default_position_percent")]
    pub position_percent: f64,

    /// ATR multiplier for the initial and trailing stop distance.
    #[serde(default = "default_stop_loss_atr_multiplier")]
    pub stop_loss_atr_multiplier: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            adapt_sma_periods: true,
            adapt_rsi_thresholds: true,
            adapt_bb_std: true,
            sma_base_fast: default_sma_base_fast(),
            sma_base_slow: default_sma_base_slow(),
            adjustment_range: default_adjustment_range(),
            vol_low_threshold: default_vol_low_threshold(),
            vol_high_threshold: default_vol_high_threshold(),
            rsi_period: default_rsi_period(),
            rsi_base_oversold: default_rsi_oversold(),
            rsi_base_overbought: default_rsi_overbought(),
            rsi_trending_oversold: default_rsi_trending_oversold(),
            rsi_trending_overbought: default_rsi_trending_overbought(),
            rsi_ranging_oversold: default_rsi_ranging_oversold(),
            rsi_ranging_overbought: default_rsi_ranging_overbought(),
            bb_period: default_bb_period(),
            bb_min_std: default_bb_min_std(),
            bb_max_std: default_bb_max_std(),
            use_trend_filter: true,
            trend_ma_period: default_trend_ma_period(),
            signal_threshold: default_signal_threshold(),
            sma_weight: default_sma_weight(),
            rsi_weight: default_rsi_weight(),
            bb_weight: default_bb_weight(),
            disable_in_extreme: true,
            position_percent: default_position_percent(),
            stop_loss_atr_multiplier: default_stop_loss_atr_multiplier(),
        }
    }
}

// =============================================================================
// Correlation
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Daily returns retained per strategy.
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,

    /// |rho| at or below this counts as a diversifying pair.
    #[serde(default = "default_low_correlation_threshold")]
    pub low_correlation_threshold: f64,

    /// |rho| at or above this counts as a concentrated pair.
    #[serde(default = "default_high_correlation_threshold")]
    pub high_correlation_warning: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            rolling_window: default_rolling_window(),
            low_correlation_threshold: default_low_correlation_threshold(),
            high_correlation_warning: default_high_correlation_threshold(),
        }
    }
}

// =============================================================================
// Risk
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_portfolio_drawdown")]
    pub max_portfolio_drawdown: f64,

    #[serde(default = "default_drawdown_warning_threshold")]
    pub drawdown_warning_threshold: f64,

    #[serde(default = "default_max_daily_drawdown")]
    pub max_daily_drawdown: f64,

    #[serde(default = "default_max_weekly_drawdown")]
    pub max_weekly_drawdown: f64,

    #[serde(default = "default_max_total_position_ratio")]
    pub max_total_position_ratio: f64,

    #[serde(default = "default_position_warning_ratio")]
    pub position_warning_ratio: f64,

    #[serde(default = "default_max_single_strategy_ratio")]
    pub max_single_strategy_ratio: f64,

    #[serde(default = "default_max_position_count")]
    pub max_position_count: usize,

    #[serde(default = "default_high_correlation_threshold")]
    pub high_correlation_threshold: f64,

    #[serde(default = "default_max_high_correlation_pairs")]
    pub max_high_correlation_pairs: usize,

    #[serde(default = "default_correlation_change_threshold")]
    pub correlation_change_threshold: f64,

    #[serde(default = "default_var_confidence_level")]
    pub var_confidence_level: f64,

    /// VaR / equity ceiling.
    #[serde(default = "default_max_var")]
    pub max_var: f64,

    /// CVaR / equity ceiling.
    #[serde(default = "default_max_cvar")]
    pub max_cvar: f64,

    /// Execute ReduceAll / ReduceExposure automatically.
    #[serde(default = "default_true")]
    pub enable_auto_de_risk: bool,

    /// Fraction of each position shed by ReduceAll.
    #[serde(default = "default_de_risk_ratio")]
    pub de_risk_ratio: f64,

    /// Minimum spacing between automatic de-risk executions.
    #[serde(default = "default_de_risk_cooldown_ms")]
    pub de_risk_cooldown_ms: i64,

    /// Periodic risk-check cadence.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_portfolio_drawdown: default_max_portfolio_drawdown(),
            drawdown_warning_threshold: default_drawdown_warning_threshold(),
            max_daily_drawdown: default_max_daily_drawdown(),
            max_weekly_drawdown: default_max_weekly_drawdown(),
            max_total_position_ratio: default_max_total_position_ratio(),
            position_warning_ratio: default_position_warning_ratio(),
            max_single_strategy_ratio: default_max_single_strategy_ratio(),
            max_position_count: default_max_position_count(),
            high_correlation_threshold: default_high_correlation_threshold(),
            max_high_correlation_pairs: default_max_high_correlation_pairs(),
            correlation_change_threshold: default_correlation_change_threshold(),
            var_confidence_level: default_var_confidence_level(),
            max_var: default_max_var(),
            max_cvar: default_max_cvar(),
            enable_auto_de_risk: true,
            de_risk_ratio: default_de_risk_ratio(),
            de_risk_cooldown_ms: default_de_risk_cooldown_ms(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

// =============================================================================
// Monitoring
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_status_update_interval_ms")]
    pub status_update_interval_ms: u64,

    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            status_update_interval_ms: default_status_update_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

// =============================================================================
// Top-level portfolio configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    #[serde(default = "default_total_capital")]
    pub total_capital: f64,

    #[serde(default)]
    pub allocation_method: AllocationMethod,

    #[serde(default = "default_true")]
    pub auto_rebalance: bool,

    #[serde(default = "default_rebalance_period_ms")]
    pub rebalance_period_ms: i64,

    /// Candle history retained per strategy envelope.
    #[serde(default = "default_max_candle_history")]
    pub max_candle_history: usize,

    #[serde(default)]
    pub regime: RegimeConfig,

    #[serde(default)]
    pub signal: SignalConfig,

    #[serde(default)]
    pub correlation: CorrelationConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            total_capital: default_total_capital(),
            allocation_method: AllocationMethod::default(),
            auto_rebalance: true,
            rebalance_period_ms: default_rebalance_period_ms(),
            max_candle_history: default_max_candle_history(),
            regime: RegimeConfig::default(),
            signal: SignalConfig::default(),
            correlation: CorrelationConfig::default(),
            risk: RiskConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl PortfolioConfig {
    /// Validate cross-field consistency. Fatal at construction: a portfolio
    /// never starts on a config that fails here.
    pub fn validate(&self) -> CoreResult<()> {
        if self.total_capital <= 0.0 || !self.total_capital.is_finite() {
            return Err(CoreError::InvalidConfig(
                "total_capital must be positive and finite".into(),
            ));
        }
        if self.max_candle_history == 0 {
            return Err(CoreError::InvalidConfig(
                "max_candle_history must be at least 1".into(),
            ));
        }

        let s = &self.signal;
        if s.sma_base_fast >= s.sma_base_slow {
            return Err(CoreError::InvalidConfig(format!(
                "sma_base_fast ({}) must be below sma_base_slow ({})",
                s.sma_base_fast, s.sma_base_slow
            )));
        }
        if s.bb_min_std > s.bb_max_std || s.bb_min_std <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "bb_min_std must be positive and no greater than bb_max_std".into(),
            ));
        }
        for (name, oversold, overbought) in [
            ("base", s.rsi_base_oversold, s.rsi_base_overbought),
            ("trending", s.rsi_trending_oversold, s.rsi_trending_overbought),
            ("ranging", s.rsi_ranging_oversold, s.rsi_ranging_overbought),
        ] {
            if !(0.0 < oversold && oversold < 50.0 && 50.0 < overbought && overbought < 100.0) {
                return Err(CoreError::InvalidConfig(format!(
                    "{name} RSI bands must satisfy 0 < oversold < 50 < overbought < 100"
                )));
            }
        }
        if !(0.0..=1.0).contains(&s.signal_threshold) {
            return Err(CoreError::InvalidConfig(
                "signal_threshold must be in [0, 1]".into(),
            ));
        }
        if s.sma_weight < 0.0 || s.rsi_weight < 0.0 || s.bb_weight < 0.0 {
            return Err(CoreError::InvalidConfig(
                "fusion weights must be non-negative".into(),
            ));
        }
        if s.sma_weight + s.rsi_weight + s.bb_weight <= 0.0 {
            return Err(CoreError::InvalidConfig(
                "fusion weights must not all be zero".into(),
            ));
        }

        let r = &self.risk;
        for (name, v) in [
            ("max_portfolio_drawdown", r.max_portfolio_drawdown),
            ("drawdown_warning_threshold", r.drawdown_warning_threshold),
            ("max_daily_drawdown", r.max_daily_drawdown),
            ("max_weekly_drawdown", r.max_weekly_drawdown),
            ("max_total_position_ratio", r.max_total_position_ratio),
            ("position_warning_ratio", r.position_warning_ratio),
            ("max_single_strategy_ratio", r.max_single_strategy_ratio),
            ("de_risk_ratio", r.de_risk_ratio),
            ("max_var", r.max_var),
            ("max_cvar", r.max_cvar),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(CoreError::InvalidConfig(format!(
                    "{name} must be a fraction in [0, 1], got {v}"
                )));
            }
        }
        if !(0.5..1.0).contains(&r.var_confidence_level) {
            return Err(CoreError::InvalidConfig(
                "var_confidence_level must be in [0.5, 1)".into(),
            ));
        }
        if r.de_risk_cooldown_ms < 0 {
            return Err(CoreError::InvalidConfig(
                "de_risk_cooldown_ms must be non-negative".into(),
            ));
        }

        if self.regime.min_regime_duration == 0 {
            return Err(CoreError::InvalidConfig(
                "min_regime_duration must be at least 1".into(),
            ));
        }
        if self.correlation.rolling_window < 2 {
            return Err(CoreError::InvalidConfig(
                "correlation rolling_window must be at least 2".into(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PortfolioConfig::default();
        cfg.validate().expect("defaults must validate");
        assert!((cfg.total_capital - 100_000.0).abs() < f64::EPSILON);
        assert_eq!(cfg.allocation_method, AllocationMethod::RiskParity);
        assert!(cfg.auto_rebalance);
        assert_eq!(cfg.rebalance_period_ms, 86_400_000);
        assert_eq!(cfg.max_candle_history, 200);
    }

    #[test]
    fn default_risk_thresholds() {
        let r = RiskConfig::default();
        assert!((r.max_portfolio_drawdown - 0.15).abs() < f64::EPSILON);
        assert!((r.drawdown_warning_threshold - 0.10).abs() < f64::EPSILON);
        assert!((r.max_daily_drawdown - 0.05).abs() < f64::EPSILON);
        assert!((r.max_weekly_drawdown - 0.10).abs() < f64::EPSILON);
        assert!((r.max_total_position_ratio - 0.60).abs() < f64::EPSILON);
        assert!((r.max_single_strategy_ratio - 0.25).abs() < f64::EPSILON);
        assert_eq!(r.max_position_count, 10);
        assert_eq!(r.de_risk_cooldown_ms, 1_800_000);
        assert_eq!(r.check_interval_ms, 5_000);
        assert!(r.enable_auto_de_risk);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: PortfolioConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.regime.min_regime_duration, 3);
        assert_eq!(cfg.signal.sma_base_fast, 10);
        assert_eq!(cfg.correlation.rolling_window, 30);
        assert_eq!(cfg.monitoring.report_interval_ms, 60_000);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "total_capital": 50000, "risk": { "max_var": 0.03 } }"#;
        let cfg: PortfolioConfig = serde_json::from_str(json).unwrap();
        assert!((cfg.total_capital - 50_000.0).abs() < f64::EPSILON);
        assert!((cfg.risk.max_var - 0.03).abs() < f64::EPSILON);
        // Untouched siblings keep their defaults.
        assert!((cfg.risk.max_cvar - 0.08).abs() < f64::EPSILON);
        assert_eq!(cfg.signal.rsi_period, 14);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = PortfolioConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: PortfolioConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg2.allocation_method, cfg.allocation_method);
        assert_eq!(cfg2.max_candle_history, cfg.max_candle_history);
        assert_eq!(cfg2.risk.check_interval_ms, cfg.risk.check_interval_ms);
    }

    #[test]
    fn validate_rejects_bad_capital() {
        let mut cfg = PortfolioConfig::default();
        cfg.total_capital = 0.0;
        assert!(cfg.validate().is_err());
        cfg.total_capital = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_sma_bases() {
        let mut cfg = PortfolioConfig::default();
        cfg.signal.sma_base_fast = 40;
        cfg.signal.sma_base_slow = 30;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_rsi_bands() {
        let mut cfg = PortfolioConfig::default();
        cfg.signal.rsi_base_oversold = 60.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_fraction() {
        let mut cfg = PortfolioConfig::default();
        cfg.risk.de_risk_ratio = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_regime_duration() {
        let mut cfg = PortfolioConfig::default();
        cfg.regime.min_regime_duration = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn regime_required_history() {
        let cfg = RegimeConfig::default();
        // slow_ma 50 + 10 = 60 < hurst 100.
        assert_eq!(cfg.required_history(), 100);

        let mut cfg2 = cfg.clone();
        cfg2.hurst_period = 30;
        assert_eq!(cfg2.required_history(), 60);
    }
}
