//! Signal evaluation.
//!
//! One evaluation core ([`SignalEvaluator::evaluate`]) decides buy/sell for a
//! single bar index; the simulator calls it per day and the traced path
//! ([`SignalEvaluator::explain`]) formats the same `Evaluation` into
//! human-readable condition strings, so the two can never disagree.
//!
//! Comparison semantics follow IEEE NaN ordering: any condition over an
//! undefined (NaN) or out-of-range operand is false, which turns warm-up and
//! short-history days into HOLDs. The RSI and market gates only ever veto on
//! a defined value.

use crate::domain::config::{BollingerEntry, BollingerExit, CompareOp, SellOperator, StrategyConfig};
use crate::domain::frame::{AlignedFrame, MaTable};
use crate::domain::indicator::{bollinger, rsi, BollingerBands};

/// Everything decided for one bar: the final booleans plus the operand values
/// they were derived from (NaN where out of range).
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub buy: bool,
    pub sell: bool,
    pub buy_lhs: f64,
    pub buy_rhs: f64,
    pub sell_lhs: f64,
    pub sell_rhs: f64,
    /// (short MA, long MA) when the trend filter is in play.
    pub trend: Option<(f64, f64)>,
    /// Prior-bar RSI when the RSI gate is enabled.
    pub rsi_prev: Option<f64>,
    /// (market close, market MA) when the market gate is enabled.
    pub market: Option<(f64, f64)>,
    pub rsi_vetoed: bool,
    pub market_vetoed: bool,
}

/// The traced form of an [`Evaluation`], for the end-of-data check and the
/// per-trade condition log.
#[derive(Debug, Clone)]
pub struct SignalTrace {
    pub buy: bool,
    pub sell: bool,
    pub buy_detail: String,
    pub sell_detail: String,
    pub notes: Vec<String>,
}

pub struct SignalEvaluator<'a> {
    frame: &'a AlignedFrame,
    cfg: &'a StrategyConfig,
    ma_buy: Option<&'a [f64]>,
    ma_sell: Option<&'a [f64]>,
    trend_short: Option<&'a [f64]>,
    trend_long: Option<&'a [f64]>,
    rsi: Option<Vec<f64>>,
    bands: Option<BollingerBands>,
}

impl<'a> SignalEvaluator<'a> {
    /// Binds a config to an aligned frame and its MA table.
    ///
    /// Returns `None` when the frame lacks something the config requires (a
    /// missing MA window, or the market gate without a market column):
    /// insufficient data, not an error.
    pub fn new(
        frame: &'a AlignedFrame,
        table: &'a MaTable,
        cfg: &'a StrategyConfig,
    ) -> Option<Self> {
        let (ma_buy, ma_sell) = if cfg.use_bollinger {
            (None, None)
        } else {
            let buy = table.get(cfg.ma_buy)?;
            let sell = if cfg.sell_operator == SellOperator::Off {
                None
            } else {
                Some(table.get(cfg.ma_sell)?)
            };
            (Some(buy), sell)
        };

        let (trend_short, trend_long) = if cfg.use_trend_in_buy || cfg.use_trend_in_sell {
            (
                Some(table.get(cfg.ma_compare_short)?),
                Some(table.get(cfg.ma_compare_long)?),
            )
        } else {
            (None, None)
        };

        if cfg.use_market_filter && frame.mkt_ma.is_none() {
            return None;
        }

        let rsi = cfg
            .use_rsi_filter
            .then(|| rsi(&frame.sig_close, cfg.rsi_period));
        let bands = cfg
            .use_bollinger
            .then(|| bollinger(&frame.sig_close, cfg.bb_period, cfg.bb_std));

        Some(Self {
            frame,
            cfg,
            ma_buy,
            ma_sell,
            trend_short,
            trend_long,
            rsi,
            bands,
        })
    }

    /// Decides buy/sell for bar `i`.
    pub fn evaluate(&self, i: usize) -> Evaluation {
        let cfg = self.cfg;
        let closes = &self.frame.sig_close;

        let trend = match (self.trend_short, self.trend_long) {
            (Some(short), Some(long)) => Some((
                at(short, i, cfg.offset_compare_short),
                at(long, i, cfg.offset_compare_long),
            )),
            _ => None,
        };
        let trend_ok = trend.map(|(s, l)| s >= l);

        let (mut buy, buy_lhs, buy_rhs, sell, sell_lhs, sell_rhs) = if let Some(bands) =
            &self.bands
        {
            let cl_b = at(closes, i, cfg.offset_cl_buy);
            let cl_s = at(closes, i, cfg.offset_cl_sell);
            let band_b = |band: &[f64]| at(band, i, cfg.offset_cl_buy);
            let band_s = |band: &[f64]| at(band, i, cfg.offset_cl_sell);

            let (buy, rhs_b) = match cfg.bb_entry_type {
                BollingerEntry::BreakUpper => (cl_b > band_b(&bands.upper), band_b(&bands.upper)),
                BollingerEntry::BreakLower => (cl_b < band_b(&bands.lower), band_b(&bands.lower)),
                BollingerEntry::AboveMid => (cl_b > band_b(&bands.mid), band_b(&bands.mid)),
            };
            let (sell, rhs_s) = match cfg.bb_exit_type {
                BollingerExit::BelowUpper => (cl_s < band_s(&bands.upper), band_s(&bands.upper)),
                BollingerExit::BelowLower => (cl_s < band_s(&bands.lower), band_s(&bands.lower)),
                BollingerExit::BelowMid => (cl_s < band_s(&bands.mid), band_s(&bands.mid)),
                BollingerExit::Off => (false, f64::NAN),
            };
            (buy, cl_b, rhs_b, sell, cl_s, rhs_s)
        } else {
            let cl_b = at(closes, i, cfg.offset_cl_buy);
            let ma_b = self
                .ma_buy
                .map(|ma| at(ma, i, cfg.offset_ma_buy))
                .unwrap_or(f64::NAN);
            let mut buy = match cfg.buy_operator {
                CompareOp::Above => cl_b > ma_b,
                CompareOp::Below => cl_b < ma_b,
            };
            if cfg.use_trend_in_buy {
                buy = buy && trend_ok == Some(true);
            }

            let cl_s = at(closes, i, cfg.offset_cl_sell);
            let (mut sell, ma_s) = match (cfg.sell_operator, self.ma_sell) {
                (SellOperator::Off, _) | (_, None) => (false, f64::NAN),
                (op, Some(ma)) => {
                    let ma_s = at(ma, i, cfg.offset_ma_sell);
                    let raw = match op {
                        SellOperator::Below => cl_s < ma_s,
                        SellOperator::Above => cl_s > ma_s,
                        SellOperator::Off => false,
                    };
                    (raw, ma_s)
                }
            };
            if cfg.use_trend_in_sell {
                sell = sell && trend_ok == Some(false);
            }
            (buy, cl_b, ma_b, sell, cl_s, ma_s)
        };

        let rsi_prev = self
            .rsi
            .as_ref()
            .map(|arr| at(arr, i, 1))
            .filter(|v| v.is_finite());
        let rsi_vetoed = matches!(rsi_prev, Some(v) if v > cfg.rsi_max);

        let market = match (&self.frame.mkt_close, &self.frame.mkt_ma) {
            (Some(close), Some(ma)) if cfg.use_market_filter => Some((close[i], ma[i])),
            _ => None,
        };
        let market_vetoed = matches!(market, Some((close, ma)) if close < ma);

        if rsi_vetoed || market_vetoed {
            buy = false;
        }

        Evaluation {
            buy,
            sell,
            buy_lhs,
            buy_rhs,
            sell_lhs,
            sell_rhs,
            trend,
            rsi_prev,
            market,
            rsi_vetoed,
            market_vetoed,
        }
    }

    /// The traced path: same decision as [`evaluate`](Self::evaluate), plus
    /// condition strings for display and the trade log.
    pub fn explain(&self, i: usize) -> SignalTrace {
        let cfg = self.cfg;
        let eval = self.evaluate(i);

        let buy_detail = if cfg.use_bollinger {
            let band = cfg.bb_entry_type.as_str();
            let op = match cfg.bb_entry_type {
                BollingerEntry::BreakLower => "<",
                _ => ">",
            };
            format!(
                "close[{}] {:.2} {} {} {:.2}",
                cfg.offset_cl_buy, eval.buy_lhs, op, band, eval.buy_rhs
            )
        } else {
            format!(
                "close[{}] {:.2} {} ma{}[{}] {:.2}",
                cfg.offset_cl_buy,
                eval.buy_lhs,
                cfg.buy_operator,
                cfg.ma_buy,
                cfg.offset_ma_buy,
                eval.buy_rhs
            )
        };

        let sell_detail = if cfg.use_bollinger {
            match cfg.bb_exit_type {
                BollingerExit::Off => "sell off".to_string(),
                exit => format!(
                    "close[{}] {:.2} < {} {:.2}",
                    cfg.offset_cl_sell,
                    eval.sell_lhs,
                    exit.as_str(),
                    eval.sell_rhs
                ),
            }
        } else if cfg.sell_operator == SellOperator::Off {
            "sell off".to_string()
        } else {
            format!(
                "close[{}] {:.2} {} ma{}[{}] {:.2}",
                cfg.offset_cl_sell,
                eval.sell_lhs,
                cfg.sell_operator,
                cfg.ma_sell,
                cfg.offset_ma_sell,
                eval.sell_rhs
            )
        };

        let mut notes = Vec::new();
        if let Some((short, long)) = eval.trend {
            notes.push(format!(
                "trend ma{} {:.2} {} ma{} {:.2}",
                cfg.ma_compare_short,
                short,
                if short >= long { ">=" } else { "<" },
                cfg.ma_compare_long,
                long
            ));
        }
        if let Some(v) = eval.rsi_prev {
            notes.push(format!(
                "rsi[1] {:.1} vs max {:.1}{}",
                v,
                cfg.rsi_max,
                if eval.rsi_vetoed { " (buy vetoed)" } else { "" }
            ));
        }
        if let Some((close, ma)) = eval.market {
            notes.push(format!(
                "market close {:.2} vs ma{} {:.2}{}",
                close,
                cfg.market_ma_period,
                ma,
                if eval.market_vetoed {
                    " (buy vetoed)"
                } else {
                    ""
                }
            ));
        }

        SignalTrace {
            buy: eval.buy,
            sell: eval.sell,
            buy_detail,
            sell_detail,
            notes,
        }
    }

    /// MA arrays the buy/sell rules read, for chart diagnostics. Empty in
    /// Bollinger mode.
    pub fn ma_buy_array(&self) -> Option<&[f64]> {
        self.ma_buy
    }

    pub fn ma_sell_array(&self) -> Option<&[f64]> {
        self.ma_sell
    }

    pub fn bands(&self) -> Option<&BollingerBands> {
        self.bands.as_ref()
    }
}

/// Reads `arr[i - offset]`, NaN when the lookback runs off the front.
fn at(arr: &[f64], i: usize, offset: usize) -> f64 {
    match i.checked_sub(offset) {
        Some(j) if j < arr.len() => arr[j],
        _ => f64::NAN,
    }
}
