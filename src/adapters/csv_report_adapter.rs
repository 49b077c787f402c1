//! CSV report adapter.
//!
//! Exports a backtest's trade log or a search's passing rows as plain CSV,
//! one file per call.

use crate::domain::error::QuantlabError;
use crate::domain::search::SearchResult;
use crate::domain::summary::PerformanceSummary;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

fn report_err(e: csv::Error) -> QuantlabError {
    QuantlabError::Report {
        reason: e.to_string(),
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_backtest(
        &self,
        summary: &PerformanceSummary,
        output_path: &str,
    ) -> Result<(), QuantlabError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(report_err)?;
        wtr.write_record(["date", "close", "side", "fill", "equity", "reason", "condition"])
            .map_err(report_err)?;
        for trade in &summary.trades {
            wtr.write_record([
                trade.date.format("%Y-%m-%d").to_string(),
                format!("{:.4}", trade.close),
                trade.side.as_str().to_string(),
                format!("{:.4}", trade.fill),
                format!("{:.2}", trade.equity),
                trade.reason.as_str().to_string(),
                trade.condition.clone(),
            ])
            .map_err(report_err)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_search(
        &self,
        rows: &[SearchResult],
        output_path: &str,
    ) -> Result<(), QuantlabError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(report_err)?;
        wtr.write_record([
            "trial",
            "full_return_pct",
            "full_mdd_pct",
            "full_win_rate_pct",
            "full_profit_factor",
            "full_trades",
            "train_return_pct",
            "test_return_pct",
            "test_mdd_pct",
            "ma_buy",
            "ma_sell",
            "buy_operator",
            "sell_operator",
            "offset_cl_buy",
            "offset_cl_sell",
            "offset_ma_buy",
            "offset_ma_sell",
            "use_trend_in_buy",
            "use_trend_in_sell",
            "ma_compare_short",
            "ma_compare_long",
            "stop_loss_pct",
            "take_profit_pct",
            "use_atr_stop",
            "atr_multiplier",
        ])
        .map_err(report_err)?;

        for row in rows {
            let cfg = &row.config;
            wtr.write_record([
                row.trial.to_string(),
                format!("{:.2}", row.full.return_pct),
                format!("{:.2}", row.full.max_drawdown_pct),
                format!("{:.2}", row.full.win_rate_pct),
                format!("{:.2}", row.full.profit_factor),
                row.full.trade_count.to_string(),
                format!("{:.2}", row.train.return_pct),
                format!("{:.2}", row.test.return_pct),
                format!("{:.2}", row.test.max_drawdown_pct),
                cfg.ma_buy.to_string(),
                cfg.ma_sell.to_string(),
                cfg.buy_operator.to_string(),
                cfg.sell_operator.to_string(),
                cfg.offset_cl_buy.to_string(),
                cfg.offset_cl_sell.to_string(),
                cfg.offset_ma_buy.to_string(),
                cfg.offset_ma_sell.to_string(),
                cfg.use_trend_in_buy.to_string(),
                cfg.use_trend_in_sell.to_string(),
                cfg.ma_compare_short.to_string(),
                cfg.ma_compare_long.to_string(),
                format!("{:.2}", cfg.stop_loss_pct),
                format!("{:.2}", cfg.take_profit_pct),
                cfg.use_atr_stop.to_string(),
                format!("{:.2}", cfg.atr_multiplier),
            ])
            .map_err(report_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
