//! Technical indicator implementations.
//!
//! All indicators are pure functions over `&[f64]` (or OHLC column slices)
//! returning a freshly allocated vector the same length as the input. Warm-up
//! entries, and any output for malformed input (empty slice, period longer
//! than the data), are `f64::NAN`. Every output at index `i` depends only on
//! inputs at indices `<= i`.

pub mod atr;
pub mod bollinger;
pub mod rsi;
pub mod sma;

pub use atr::atr;
pub use bollinger::{bollinger, BollingerBands};
pub use rsi::rsi;
pub use sma::sma;
