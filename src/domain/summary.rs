//! Performance metrics over a simulation result.

use crate::domain::simulator::{ChartData, EquityPoint, SimulationResult, TradeLogEntry, TradeSide};

/// Profit factor reported when there are no losing trades. Large enough to
/// rank such strategies first while staying finite and sortable.
pub const NO_LOSS_PROFIT_FACTOR: f64 = 999.0;

#[derive(Debug, Clone)]
pub struct PerformanceSummary {
    pub return_pct: f64,
    /// Always <= 0.
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    /// Number of SELL fills.
    pub trade_count: usize,
    /// The last logged fill was a BUY: still holding at the end of the data.
    pub position_open: bool,
    pub trades: Vec<TradeLogEntry>,
    pub equity: Vec<EquityPoint>,
    pub chart: ChartData,
}

/// Buy-and-hold benchmark over the same window, for comparison display.
#[derive(Debug, Clone, Copy)]
pub struct BuyHoldSummary {
    pub return_pct: f64,
    pub max_drawdown_pct: f64,
}

/// Reduces a simulation to its summary metrics.
///
/// `None` when no signal ever fired (empty trade log) so callers can tell a
/// flat strategy from a silent one. A log with a BUY and no SELL still
/// summarizes, with `trade_count` 0.
pub fn summarize(result: SimulationResult) -> Option<PerformanceSummary> {
    if result.trades.is_empty() {
        return None;
    }

    let final_equity = result.equity.last().map(|p| p.equity)?;
    let return_pct = (final_equity - result.initial_cash) / result.initial_cash * 100.0;

    let equity_values: Vec<f64> = result.equity.iter().map(|p| p.equity).collect();
    let max_drawdown_pct = max_drawdown(&equity_values);

    // Pair each BUY with the next SELL to realize per-trade returns.
    let mut wins = 0usize;
    let mut sells = 0usize;
    let mut gross_profit = 0.0;
    let mut gross_loss = 0.0;
    let mut pending_entry: Option<f64> = None;
    for trade in &result.trades {
        match trade.side {
            TradeSide::Buy => pending_entry = Some(trade.fill),
            TradeSide::Sell => {
                sells += 1;
                if let Some(entry) = pending_entry.take() {
                    let pnl = (trade.fill - entry) / entry;
                    if pnl > 0.0 {
                        wins += 1;
                        gross_profit += pnl;
                    } else {
                        gross_loss += pnl.abs();
                    }
                }
            }
        }
    }

    let win_rate_pct = if sells > 0 {
        wins as f64 / sells as f64 * 100.0
    } else {
        0.0
    };
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        NO_LOSS_PROFIT_FACTOR
    };

    let position_open = result.position_open();
    Some(PerformanceSummary {
        return_pct,
        max_drawdown_pct,
        win_rate_pct,
        profit_factor,
        trade_count: sells,
        position_open,
        trades: result.trades,
        equity: result.equity,
        chart: result.chart,
    })
}

/// Minimum of `(v - running_max) / running_max * 100` over the series.
/// 0 for an empty or non-positive-max series.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min((v - peak) / peak * 100.0);
        }
    }
    worst
}

/// Buy-and-hold metrics over a close column: buy the first close, ride to the
/// last. `None` for an empty window.
pub fn buy_and_hold(closes: &[f64]) -> Option<BuyHoldSummary> {
    let first = *closes.first()?;
    let last = *closes.last()?;
    if first <= 0.0 {
        return None;
    }
    Some(BuyHoldSummary {
        return_pct: (last - first) / first * 100.0,
        max_drawdown_pct: max_drawdown(closes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::simulator::TradeReason;
    use chrono::NaiveDate;

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64)
    }

    fn trade(i: usize, side: TradeSide, fill: f64) -> TradeLogEntry {
        TradeLogEntry {
            date: date(i),
            close: fill,
            side,
            fill,
            equity: 0.0,
            reason: match side {
                TradeSide::Buy => TradeReason::StrategyBuy,
                TradeSide::Sell => TradeReason::StrategySell,
            },
            condition: String::new(),
        }
    }

    fn result_with(trades: Vec<TradeLogEntry>, equity: Vec<f64>) -> SimulationResult {
        SimulationResult {
            trades,
            equity: equity
                .into_iter()
                .enumerate()
                .map(|(i, equity)| EquityPoint {
                    date: date(i),
                    equity,
                })
                .collect(),
            chart: ChartData::default(),
            initial_cash: 1000.0,
            warmup: 0,
        }
    }

    #[test]
    fn empty_trade_log_is_no_result() {
        let result = result_with(vec![], vec![1000.0, 1000.0]);
        assert!(summarize(result).is_none());
    }

    #[test]
    fn return_and_trade_count() {
        let trades = vec![
            trade(0, TradeSide::Buy, 100.0),
            trade(1, TradeSide::Sell, 110.0),
            trade(2, TradeSide::Buy, 110.0),
            trade(3, TradeSide::Sell, 99.0),
        ];
        let summary = summarize(result_with(trades, vec![1000.0, 1100.0, 1100.0, 990.0])).unwrap();

        assert!((summary.return_pct - (-1.0)).abs() < 1e-9);
        assert_eq!(summary.trade_count, 2);
        assert!((summary.win_rate_pct - 50.0).abs() < 1e-9);
        assert!(!summary.position_open);
        // gross profit 0.10, gross loss 0.10
        assert!((summary.profit_factor - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_losses_yields_sentinel_profit_factor() {
        let trades = vec![
            trade(0, TradeSide::Buy, 100.0),
            trade(1, TradeSide::Sell, 120.0),
        ];
        let summary = summarize(result_with(trades, vec![1000.0, 1200.0])).unwrap();
        assert_eq!(summary.profit_factor, NO_LOSS_PROFIT_FACTOR);
        assert!((summary.win_rate_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn open_position_summarizes_with_zero_sells() {
        let trades = vec![trade(0, TradeSide::Buy, 100.0)];
        let summary = summarize(result_with(trades, vec![1000.0, 1050.0])).unwrap();
        assert_eq!(summary.trade_count, 0);
        assert_eq!(summary.win_rate_pct, 0.0);
        assert_eq!(summary.profit_factor, NO_LOSS_PROFIT_FACTOR);
        assert!(summary.position_open);
        assert!((summary.return_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        // Peak 200, trough 100: -50%.
        let values = [100.0, 200.0, 150.0, 100.0, 180.0];
        assert!((max_drawdown(&values) - (-50.0)).abs() < 1e-9);
    }

    #[test]
    fn drawdown_of_rising_series_is_zero() {
        let values = [100.0, 110.0, 120.0];
        assert_eq!(max_drawdown(&values), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn buy_and_hold_benchmark() {
        let closes = [100.0, 150.0, 90.0];
        let bh = buy_and_hold(&closes).unwrap();
        assert!((bh.return_pct - (-10.0)).abs() < 1e-9);
        assert!((bh.max_drawdown_pct - (-40.0)).abs() < 1e-9);
        assert!(buy_and_hold(&[]).is_none());
    }
}
