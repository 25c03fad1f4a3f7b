// =============================================================================
// Technical Indicators
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the engine
// consumes. Series-producing functions return a `Vec` (empty on
// insufficient data); scalar functions return `Option` so callers must
// handle insufficient-data and numeric-edge-case scenarios. NaN never
// escapes this module.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod hurst;
pub mod keltner;
pub mod macd;
pub mod percentile;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod volume;

pub use adx::{calculate_adx, AdxResult};
pub use atr::{calculate_atr, calculate_atr_normalized};
pub use bollinger::{calculate_bollinger, BollingerBands};
pub use cci::calculate_cci;
pub use ema::calculate_ema;
pub use hurst::hurst_exponent;
pub use keltner::{calculate_keltner, KeltnerChannels};
pub use macd::{calculate_macd, Macd};
pub use percentile::percentile_rank;
pub use rsi::calculate_rsi;
pub use sma::{calculate_sma, detect_crossover, Crossover};
pub use stochastic::{calculate_stochastic, Stochastic};
pub use volume::{calculate_mfi, calculate_obv};
