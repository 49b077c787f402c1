//! Day-by-day position simulation.
//!
//! Two states, FLAT and LONG, one position at a time, long only. Entries use
//! all available cash at the close, exits liquidate everything. Per day the
//! transitions are checked in a fixed priority order: protective stop, then
//! take-profit, then strategy sell, then strategy buy, and an exit blocks a
//! same-day re-entry.

use chrono::NaiveDate;
use std::fmt;

use crate::domain::config::StrategyConfig;
use crate::domain::frame::{AlignedFrame, MaTable};
use crate::domain::signal::SignalEvaluator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeReason {
    StrategyBuy,
    StrategySell,
    StopLoss,
    TakeProfit,
    AtrStop,
}

impl TradeReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeReason::StrategyBuy => "strategy buy",
            TradeReason::StrategySell => "strategy sell",
            TradeReason::StopLoss => "stop loss",
            TradeReason::TakeProfit => "take profit",
            TradeReason::AtrStop => "atr stop",
        }
    }
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged fill. HOLD days are not logged, they only extend the equity
/// curve.
#[derive(Debug, Clone)]
pub struct TradeLogEntry {
    pub date: NaiveDate,
    pub close: f64,
    pub side: TradeSide,
    /// Cost-adjusted execution price.
    pub fill: f64,
    /// Equity at that day's close, after the fill.
    pub equity: f64,
    pub reason: TradeReason,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Indicator overlays aligned with the simulated span, for charting/export.
#[derive(Debug, Clone, Default)]
pub struct ChartData {
    pub ma_buy: Option<Vec<f64>>,
    pub ma_sell: Option<Vec<f64>>,
    pub bb_upper: Option<Vec<f64>>,
    pub bb_lower: Option<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub trades: Vec<TradeLogEntry>,
    pub equity: Vec<EquityPoint>,
    pub chart: ChartData,
    pub initial_cash: f64,
    /// Index of the first simulated bar in the source frame.
    pub warmup: usize,
}

impl SimulationResult {
    /// True when the last logged fill is a BUY, i.e. the position is still
    /// open at the end of the data.
    pub fn position_open(&self) -> bool {
        matches!(
            self.trades.last(),
            Some(entry) if entry.side == TradeSide::Buy
        )
    }
}

struct SimulationState {
    cash: f64,
    position: f64,
    entry_price: f64,
    entry_atr: Option<f64>,
    hold_days: usize,
}

fn buy_fill(price: f64, cfg: &StrategyConfig) -> f64 {
    price * (1.0 + (cfg.fee_bps + cfg.slip_bps) / 10_000.0)
}

fn sell_fill(price: f64, cfg: &StrategyConfig) -> f64 {
    price * (1.0 - (cfg.fee_bps + cfg.slip_bps) / 10_000.0)
}

/// Runs one simulation over the frame.
///
/// Returns `None` for insufficient data: an evaluator requirement the frame
/// cannot meet, or a warm-up span that leaves no bars to simulate. An empty
/// trade log with a full equity curve is still a valid result.
pub fn simulate(
    frame: &AlignedFrame,
    table: &MaTable,
    cfg: &StrategyConfig,
) -> Option<SimulationResult> {
    let evaluator = SignalEvaluator::new(frame, table, cfg)?;
    let n = frame.len();
    let warmup = cfg.warmup_bars();
    if warmup >= n {
        return None;
    }

    let mut state = SimulationState {
        cash: cfg.initial_cash,
        position: 0.0,
        entry_price: 0.0,
        entry_atr: None,
        hold_days: 0,
    };
    let mut trades = Vec::new();
    let mut equity = Vec::with_capacity(n - warmup);

    for i in warmup..n {
        let eval = evaluator.evaluate(i);
        let date = frame.dates[i];
        let close = frame.trd_close[i];
        let open = frame.trd_open[i];
        let high = frame.trd_high[i];
        let low = frame.trd_low[i];

        let mut just_bought = false;
        let mut sold_today = false;
        let mut logged: Option<(TradeSide, f64, TradeReason, String)> = None;

        if state.position > 0.0 {
            // Protective exits first. The ATR stop, when computable from the
            // entry day, supersedes the percentage stop.
            let mut stop_price = None;
            let mut stop_reason = TradeReason::StopLoss;
            if cfg.use_atr_stop {
                if let Some(atr) = state.entry_atr {
                    stop_price = Some(state.entry_price - atr * cfg.atr_multiplier);
                    stop_reason = TradeReason::AtrStop;
                }
            }
            if stop_price.is_none() && cfg.stop_loss_pct > 0.0 {
                stop_price = Some(state.entry_price * (1.0 - cfg.stop_loss_pct / 100.0));
            }

            if let Some(stop) = stop_price {
                if low <= stop {
                    // A stop never fills better than the worse of open/stop.
                    let exec = if open < stop { open } else { stop };
                    let fill = sell_fill(exec, cfg);
                    state.cash = state.position * fill;
                    state.position = 0.0;
                    state.entry_price = 0.0;
                    state.entry_atr = None;
                    sold_today = true;
                    let detail = format!("stop {:.2} hit (low {:.2})", stop, low);
                    logged = Some((TradeSide::Sell, fill, stop_reason, detail));
                }
            }

            if !sold_today && cfg.take_profit_pct > 0.0 {
                let target = state.entry_price * (1.0 + cfg.take_profit_pct / 100.0);
                if high >= target {
                    let exec = if open > target { open } else { target };
                    let fill = sell_fill(exec, cfg);
                    state.cash = state.position * fill;
                    state.position = 0.0;
                    state.entry_price = 0.0;
                    state.entry_atr = None;
                    sold_today = true;
                    let detail = format!("target {:.2} hit (high {:.2})", target, high);
                    logged = Some((TradeSide::Sell, fill, TradeReason::TakeProfit, detail));
                }
            }

            if !sold_today && eval.sell && state.hold_days >= cfg.min_hold_days {
                let fill = sell_fill(close, cfg);
                state.cash = state.position * fill;
                state.position = 0.0;
                state.entry_price = 0.0;
                state.entry_atr = None;
                sold_today = true;
                let detail = evaluator.explain(i).sell_detail;
                logged = Some((TradeSide::Sell, fill, TradeReason::StrategySell, detail));
            }
        }

        if state.position == 0.0 && !sold_today && eval.buy {
            let fill = buy_fill(close, cfg);
            state.position = state.cash / fill;
            state.cash = 0.0;
            state.entry_price = fill;
            state.entry_atr = Some(frame.atr[i]).filter(|v| v.is_finite());
            just_bought = true;
            let detail = evaluator.explain(i).buy_detail;
            logged = Some((TradeSide::Buy, fill, TradeReason::StrategyBuy, detail));
        }

        state.hold_days = if state.position > 0.0 && !just_bought {
            state.hold_days + 1
        } else {
            0
        };

        let total = state.cash + state.position * close;
        equity.push(EquityPoint {
            date,
            equity: total,
        });

        if let Some((side, fill, reason, condition)) = logged {
            trades.push(TradeLogEntry {
                date,
                close,
                side,
                fill,
                equity: total,
                reason,
                condition,
            });
        }
    }

    let slice_from = |arr: &[f64]| arr[warmup..].to_vec();
    let chart = ChartData {
        ma_buy: evaluator.ma_buy_array().map(slice_from),
        ma_sell: evaluator.ma_sell_array().map(slice_from),
        bb_upper: evaluator.bands().map(|b| slice_from(&b.upper)),
        bb_lower: evaluator.bands().map(|b| slice_from(&b.lower)),
    };

    Some(SimulationResult {
        trades,
        equity,
        chart,
        initial_cash: cfg.initial_cash,
        warmup,
    })
}
