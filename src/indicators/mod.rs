// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the fourteen technical indicators
// that feed the signal aggregator. Every scoring function returns an
// `IndicatorResult` (or, for ATR, an `AtrReading`) and never panics on
// insufficient data — it degrades to a neutral reading instead.

pub mod atr;
pub mod awesome_oscillator;
pub mod bollinger;
pub mod catalog;
pub mod cci;
pub mod cmf;
pub mod dom;
pub mod ema;
pub mod kdj;
pub mod macd;
pub mod obv;
pub mod result;
pub mod rsi;
pub mod stoch_rsi;
pub mod stochastic;
pub mod williams_r;

pub use result::{IndicatorResult, IndicatorSignal};
