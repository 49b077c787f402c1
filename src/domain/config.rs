//! Strategy configuration.
//!
//! `StrategyConfig` is the single typed record the engine runs from. It is
//! also the persisted flat key/value format: every field serializes under a
//! stable name, missing keys fall back to the documented defaults and unknown
//! keys are ignored, so stored strategies stay loadable across versions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::QuantlabError;
use crate::domain::frame::DEFAULT_ATR_PERIOD;
use crate::ports::config_port::ConfigPort;

/// Comparison direction for the buy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = ">")]
    Above,
    #[serde(rename = "<")]
    Below,
}

/// Comparison direction for the sell rule, or no strategy sell at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellOperator {
    #[serde(rename = "<")]
    Below,
    #[serde(rename = ">")]
    Above,
    #[serde(rename = "off")]
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BollingerEntry {
    #[serde(rename = "break_upper")]
    BreakUpper,
    #[serde(rename = "break_lower")]
    BreakLower,
    #[serde(rename = "above_mid")]
    AboveMid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BollingerExit {
    #[serde(rename = "below_upper")]
    BelowUpper,
    #[serde(rename = "below_lower")]
    BelowLower,
    #[serde(rename = "below_mid")]
    BelowMid,
    #[serde(rename = "off")]
    Off,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Above => ">",
            CompareOp::Below => "<",
        }
    }
}

impl SellOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            SellOperator::Below => "<",
            SellOperator::Above => ">",
            SellOperator::Off => "off",
        }
    }
}

impl BollingerEntry {
    pub fn as_str(self) -> &'static str {
        match self {
            BollingerEntry::BreakUpper => "break_upper",
            BollingerEntry::BreakLower => "break_lower",
            BollingerEntry::AboveMid => "above_mid",
        }
    }
}

impl BollingerExit {
    pub fn as_str(self) -> &'static str {
        match self {
            BollingerExit::BelowUpper => "below_upper",
            BollingerExit::BelowLower => "below_lower",
            BollingerExit::BelowMid => "below_mid",
            BollingerExit::Off => "off",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SellOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BollingerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for BollingerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareOp {
    type Err = QuantlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(CompareOp::Above),
            "<" => Ok(CompareOp::Below),
            other => Err(invalid_token("buy_operator", other, "\">\" or \"<\"")),
        }
    }
}

impl FromStr for SellOperator {
    type Err = QuantlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "<" => Ok(SellOperator::Below),
            ">" => Ok(SellOperator::Above),
            "off" => Ok(SellOperator::Off),
            other => Err(invalid_token(
                "sell_operator",
                other,
                "\"<\", \">\" or \"off\"",
            )),
        }
    }
}

impl FromStr for BollingerEntry {
    type Err = QuantlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "break_upper" => Ok(BollingerEntry::BreakUpper),
            "break_lower" => Ok(BollingerEntry::BreakLower),
            "above_mid" => Ok(BollingerEntry::AboveMid),
            other => Err(invalid_token(
                "bb_entry_type",
                other,
                "\"break_upper\", \"break_lower\" or \"above_mid\"",
            )),
        }
    }
}

impl FromStr for BollingerExit {
    type Err = QuantlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "below_upper" => Ok(BollingerExit::BelowUpper),
            "below_lower" => Ok(BollingerExit::BelowLower),
            "below_mid" => Ok(BollingerExit::BelowMid),
            "off" => Ok(BollingerExit::Off),
            other => Err(invalid_token(
                "bb_exit_type",
                other,
                "\"below_upper\", \"below_lower\", \"below_mid\" or \"off\"",
            )),
        }
    }
}

fn invalid_token(field: &str, got: &str, expected: &str) -> QuantlabError {
    QuantlabError::StrategyInvalid {
        field: field.to_string(),
        reason: format!("unknown value \"{}\", expected {}", got, expected),
    }
}

/// The full strategy parameter set. Field names are the persisted keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub signal_ticker: String,
    pub trade_ticker: String,
    pub market_ticker: String,

    pub buy_operator: CompareOp,
    pub sell_operator: SellOperator,
    pub ma_buy: usize,
    pub ma_sell: usize,
    pub offset_cl_buy: usize,
    pub offset_ma_buy: usize,
    pub offset_cl_sell: usize,
    pub offset_ma_sell: usize,

    pub use_trend_in_buy: bool,
    pub use_trend_in_sell: bool,
    pub ma_compare_short: usize,
    pub ma_compare_long: usize,
    pub offset_compare_short: usize,
    pub offset_compare_long: usize,

    pub use_bollinger: bool,
    pub bb_period: usize,
    pub bb_std: f64,
    pub bb_entry_type: BollingerEntry,
    pub bb_exit_type: BollingerExit,

    pub use_rsi_filter: bool,
    pub rsi_period: usize,
    pub rsi_max: f64,

    pub use_market_filter: bool,
    pub market_ma_period: usize,

    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub use_atr_stop: bool,
    pub atr_multiplier: f64,
    pub min_hold_days: usize,

    pub fee_bps: f64,
    pub slip_bps: f64,
    pub initial_cash: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            signal_ticker: "SOXL".to_string(),
            trade_ticker: "SOXL".to_string(),
            market_ticker: "SPY".to_string(),
            buy_operator: CompareOp::Above,
            sell_operator: SellOperator::Below,
            ma_buy: 50,
            ma_sell: 10,
            offset_cl_buy: 1,
            offset_ma_buy: 1,
            offset_cl_sell: 1,
            offset_ma_sell: 1,
            use_trend_in_buy: true,
            use_trend_in_sell: false,
            ma_compare_short: 20,
            ma_compare_long: 50,
            offset_compare_short: 1,
            offset_compare_long: 1,
            use_bollinger: false,
            bb_period: 20,
            bb_std: 2.0,
            bb_entry_type: BollingerEntry::BreakUpper,
            bb_exit_type: BollingerExit::BelowMid,
            use_rsi_filter: false,
            rsi_period: 14,
            rsi_max: 70.0,
            use_market_filter: false,
            market_ma_period: 200,
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
            use_atr_stop: false,
            atr_multiplier: 2.0,
            min_hold_days: 0,
            fee_bps: 25.0,
            slip_bps: 1.0,
            initial_cash: 5_000_000.0,
        }
    }
}

impl StrategyConfig {
    /// Reads the `[strategy]` section of an INI config, falling back to the
    /// defaults for any absent key. The result is validated before return.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, QuantlabError> {
        let d = StrategyConfig::default();
        let section = "strategy";

        let get_str = |key: &str, fallback: &str| -> String {
            config
                .get_string(section, key)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        let get_usize = |key: &str, fallback: usize| -> Result<usize, QuantlabError> {
            let raw = config.get_int(section, key, fallback as i64);
            usize::try_from(raw).map_err(|_| QuantlabError::StrategyInvalid {
                field: key.to_string(),
                reason: format!("{} must be non-negative", key),
            })
        };

        let cfg = StrategyConfig {
            signal_ticker: get_str("signal_ticker", &d.signal_ticker),
            trade_ticker: get_str("trade_ticker", &d.trade_ticker),
            market_ticker: get_str("market_ticker", &d.market_ticker),
            buy_operator: get_str("buy_operator", d.buy_operator.as_str()).parse()?,
            sell_operator: get_str("sell_operator", d.sell_operator.as_str()).parse()?,
            ma_buy: get_usize("ma_buy", d.ma_buy)?,
            ma_sell: get_usize("ma_sell", d.ma_sell)?,
            offset_cl_buy: get_usize("offset_cl_buy", d.offset_cl_buy)?,
            offset_ma_buy: get_usize("offset_ma_buy", d.offset_ma_buy)?,
            offset_cl_sell: get_usize("offset_cl_sell", d.offset_cl_sell)?,
            offset_ma_sell: get_usize("offset_ma_sell", d.offset_ma_sell)?,
            use_trend_in_buy: config.get_bool(section, "use_trend_in_buy", d.use_trend_in_buy),
            use_trend_in_sell: config.get_bool(section, "use_trend_in_sell", d.use_trend_in_sell),
            ma_compare_short: get_usize("ma_compare_short", d.ma_compare_short)?,
            ma_compare_long: get_usize("ma_compare_long", d.ma_compare_long)?,
            offset_compare_short: get_usize("offset_compare_short", d.offset_compare_short)?,
            offset_compare_long: get_usize("offset_compare_long", d.offset_compare_long)?,
            use_bollinger: config.get_bool(section, "use_bollinger", d.use_bollinger),
            bb_period: get_usize("bb_period", d.bb_period)?,
            bb_std: config.get_double(section, "bb_std", d.bb_std),
            bb_entry_type: get_str("bb_entry_type", d.bb_entry_type.as_str()).parse()?,
            bb_exit_type: get_str("bb_exit_type", d.bb_exit_type.as_str()).parse()?,
            use_rsi_filter: config.get_bool(section, "use_rsi_filter", d.use_rsi_filter),
            rsi_period: get_usize("rsi_period", d.rsi_period)?,
            rsi_max: config.get_double(section, "rsi_max", d.rsi_max),
            use_market_filter: config.get_bool(section, "use_market_filter", d.use_market_filter),
            market_ma_period: get_usize("market_ma_period", d.market_ma_period)?,
            stop_loss_pct: config.get_double(section, "stop_loss_pct", d.stop_loss_pct),
            take_profit_pct: config.get_double(section, "take_profit_pct", d.take_profit_pct),
            use_atr_stop: config.get_bool(section, "use_atr_stop", d.use_atr_stop),
            atr_multiplier: config.get_double(section, "atr_multiplier", d.atr_multiplier),
            min_hold_days: get_usize("min_hold_days", d.min_hold_days)?,
            fee_bps: config.get_double(section, "fee_bps", d.fee_bps),
            slip_bps: config.get_double(section, "slip_bps", d.slip_bps),
            initial_cash: config.get_double(section, "initial_cash", d.initial_cash),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), QuantlabError> {
        fn fail(field: &str, reason: impl Into<String>) -> Result<(), QuantlabError> {
            Err(QuantlabError::StrategyInvalid {
                field: field.to_string(),
                reason: reason.into(),
            })
        }

        if self.signal_ticker.trim().is_empty() {
            return fail("signal_ticker", "signal_ticker must not be empty");
        }
        if self.trade_ticker.trim().is_empty() {
            return fail("trade_ticker", "trade_ticker must not be empty");
        }
        if self.use_market_filter && self.market_ticker.trim().is_empty() {
            return fail("market_ticker", "market_ticker must not be empty");
        }
        if self.ma_buy < 1 {
            return fail("ma_buy", "ma_buy must be at least 1");
        }
        if self.ma_sell < 1 {
            return fail("ma_sell", "ma_sell must be at least 1");
        }
        if self.ma_compare_short < 1 {
            return fail("ma_compare_short", "ma_compare_short must be at least 1");
        }
        if self.ma_compare_long < 1 {
            return fail("ma_compare_long", "ma_compare_long must be at least 1");
        }
        if self.bb_period < 2 {
            return fail("bb_period", "bb_period must be at least 2");
        }
        if !self.bb_std.is_finite() || self.bb_std <= 0.0 {
            return fail("bb_std", "bb_std must be positive");
        }
        if self.rsi_period < 2 {
            return fail("rsi_period", "rsi_period must be at least 2");
        }
        if !self.rsi_max.is_finite() || self.rsi_max <= 0.0 || self.rsi_max > 100.0 {
            return fail("rsi_max", "rsi_max must be in (0, 100]");
        }
        if self.market_ma_period < 1 {
            return fail("market_ma_period", "market_ma_period must be at least 1");
        }
        if !self.stop_loss_pct.is_finite() || self.stop_loss_pct < 0.0 {
            return fail("stop_loss_pct", "stop_loss_pct must be non-negative");
        }
        if !self.take_profit_pct.is_finite() || self.take_profit_pct < 0.0 {
            return fail("take_profit_pct", "take_profit_pct must be non-negative");
        }
        if !self.atr_multiplier.is_finite() || self.atr_multiplier <= 0.0 {
            return fail("atr_multiplier", "atr_multiplier must be positive");
        }
        if !self.fee_bps.is_finite() || self.fee_bps < 0.0 {
            return fail("fee_bps", "fee_bps must be non-negative");
        }
        if !self.slip_bps.is_finite() || self.slip_bps < 0.0 {
            return fail("slip_bps", "slip_bps must be non-negative");
        }
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return fail("initial_cash", "initial_cash must be positive");
        }
        Ok(())
    }

    /// Moving-average windows this config reads from the signal closes.
    pub fn ma_windows(&self) -> BTreeSet<usize> {
        let mut windows = BTreeSet::new();
        if !self.use_bollinger {
            windows.insert(self.ma_buy);
            if self.sell_operator != SellOperator::Off {
                windows.insert(self.ma_sell);
            }
        }
        if self.use_trend_in_buy || self.use_trend_in_sell {
            windows.insert(self.ma_compare_short);
            windows.insert(self.ma_compare_long);
        }
        windows
    }

    /// First bar index at which every indicator this config uses can be
    /// defined: the longest window plus its lookback offset.
    pub fn warmup_bars(&self) -> usize {
        let mut warmup = 0usize;

        if self.use_bollinger {
            let mut offset = self.offset_cl_buy;
            if self.bb_exit_type != BollingerExit::Off {
                offset = offset.max(self.offset_cl_sell);
            }
            warmup = warmup.max(self.bb_period + offset);
        } else {
            warmup = warmup.max(self.ma_buy + self.offset_ma_buy.max(self.offset_cl_buy));
            if self.sell_operator != SellOperator::Off {
                warmup = warmup.max(self.ma_sell + self.offset_ma_sell.max(self.offset_cl_sell));
            }
        }
        if self.use_trend_in_buy || self.use_trend_in_sell {
            warmup = warmup.max(self.ma_compare_short + self.offset_compare_short);
            warmup = warmup.max(self.ma_compare_long + self.offset_compare_long);
        }
        if self.use_rsi_filter {
            warmup = warmup.max(self.rsi_period + 1);
        }
        if self.use_market_filter {
            warmup = warmup.max(self.market_ma_period);
        }
        if self.use_atr_stop {
            warmup = warmup.max(DEFAULT_ATR_PERIOD);
        }
        warmup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = StrategyConfig::default();
        assert_eq!(cfg.signal_ticker, "SOXL");
        assert_eq!(cfg.market_ticker, "SPY");
        assert_eq!(cfg.buy_operator, CompareOp::Above);
        assert_eq!(cfg.sell_operator, SellOperator::Below);
        assert_eq!(cfg.ma_buy, 50);
        assert_eq!(cfg.ma_sell, 10);
        assert!(cfg.use_trend_in_buy);
        assert!(!cfg.use_bollinger);
        assert_eq!(cfg.bb_period, 20);
        assert_eq!(cfg.rsi_max, 70.0);
        assert_eq!(cfg.market_ma_period, 200);
        assert_eq!(cfg.fee_bps, 25.0);
        assert_eq!(cfg.slip_bps, 1.0);
        assert_eq!(cfg.initial_cash, 5_000_000.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_record_deserializes_to_defaults() {
        let cfg: StrategyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, StrategyConfig::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let cfg: StrategyConfig =
            serde_json::from_str(r#"{"ma_buy": 60, "some_future_knob": true}"#).unwrap();
        assert_eq!(cfg.ma_buy, 60);
        assert_eq!(cfg.ma_sell, 10);
    }

    #[test]
    fn operator_tokens_round_trip() {
        let cfg = StrategyConfig {
            buy_operator: CompareOp::Below,
            sell_operator: SellOperator::Off,
            bb_entry_type: BollingerEntry::AboveMid,
            bb_exit_type: BollingerExit::Off,
            ..StrategyConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains(r#""buy_operator":"<""#));
        assert!(json.contains(r#""sell_operator":"off""#));
        assert!(json.contains(r#""bb_entry_type":"above_mid""#));

        let back: StrategyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn operator_parse_rejects_garbage() {
        assert!("swap".parse::<CompareOp>().is_err());
        assert!("OFF".parse::<SellOperator>().is_ok());
        assert!("maybe".parse::<SellOperator>().is_err());
        assert!("break_upper".parse::<BollingerEntry>().is_ok());
        assert!("upper".parse::<BollingerEntry>().is_err());
        assert!("below_mid".parse::<BollingerExit>().is_ok());
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut cfg = StrategyConfig {
            ma_buy: 0,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(QuantlabError::StrategyInvalid { field, .. }) if field == "ma_buy"
        ));

        cfg = StrategyConfig {
            bb_period: 1,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(QuantlabError::StrategyInvalid { field, .. }) if field == "bb_period"
        ));

        cfg = StrategyConfig {
            rsi_max: 120.0,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(QuantlabError::StrategyInvalid { field, .. }) if field == "rsi_max"
        ));

        cfg = StrategyConfig {
            initial_cash: 0.0,
            ..StrategyConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(QuantlabError::StrategyInvalid { field, .. }) if field == "initial_cash"
        ));

        cfg = StrategyConfig {
            fee_bps: -1.0,
            ..StrategyConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ma_windows_for_ma_mode() {
        let cfg = StrategyConfig::default();
        let windows = cfg.ma_windows();
        // ma_buy 50, ma_sell 10, trend 20/50
        assert!(windows.contains(&50));
        assert!(windows.contains(&10));
        assert!(windows.contains(&20));
        assert_eq!(windows.len(), 3);
    }

    #[test]
    fn ma_windows_sell_off_drops_sell_window() {
        let cfg = StrategyConfig {
            sell_operator: SellOperator::Off,
            use_trend_in_buy: false,
            ..StrategyConfig::default()
        };
        let windows = cfg.ma_windows();
        assert_eq!(windows.iter().copied().collect::<Vec<_>>(), vec![50]);
    }

    #[test]
    fn ma_windows_bollinger_mode_skips_trade_mas() {
        let cfg = StrategyConfig {
            use_bollinger: true,
            use_trend_in_buy: false,
            ..StrategyConfig::default()
        };
        assert!(cfg.ma_windows().is_empty());
    }

    #[test]
    fn warmup_covers_longest_window_plus_offset() {
        let cfg = StrategyConfig::default();
        // ma_buy 50 + offset 1 dominates
        assert_eq!(cfg.warmup_bars(), 51);

        let cfg = StrategyConfig {
            use_market_filter: true,
            ..StrategyConfig::default()
        };
        assert_eq!(cfg.warmup_bars(), 200);

        let cfg = StrategyConfig {
            use_bollinger: true,
            use_trend_in_buy: false,
            ..StrategyConfig::default()
        };
        assert_eq!(cfg.warmup_bars(), 21);
    }
}
