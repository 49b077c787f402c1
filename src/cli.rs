//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_store_adapter::JsonStoreAdapter;
use crate::domain::config::StrategyConfig;
use crate::domain::error::QuantlabError;
use crate::domain::frame::{align, AlignedFrame, MaTable};
use crate::domain::search::{
    run_search, SearchConstraints, SearchParams, SearchResult, SearchSpace, SortMetric,
};
use crate::domain::signal::SignalEvaluator;
use crate::domain::simulator::simulate;
use crate::domain::summary::{buy_and_hold, summarize, PerformanceSummary};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::strategy_store::StrategyStore;

#[derive(Parser, Debug)]
#[command(name = "quantlab", about = "Rule-based strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest and print the performance summary
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Named strategy from the store instead of the [strategy] section
        #[arg(short, long)]
        strategy: Option<String>,
        /// Write the trade log as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate the strategy on the most recent bar
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<String>,
    },
    /// Random parameter search with a train/test split
    Search {
        #[arg(short, long)]
        config: PathBuf,
        /// Override [search] trials
        #[arg(short, long)]
        trials: Option<usize>,
        /// Metric to rank by: return, train_return, test_return, win_rate, profit_factor, mdd
        #[arg(long)]
        sort_by: Option<String>,
        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Write every passing row as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List saved strategies
    Strategies {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Save the config's [strategy] section under a name
    SaveStrategy {
        #[arg(short, long)]
        config: PathBuf,
        name: String,
    },
    /// Remove a saved strategy
    DeleteStrategy {
        #[arg(short, long)]
        config: PathBuf,
        name: String,
    },
    /// Validate the config without touching price data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            strategy,
            output,
        } => finish(run_backtest(&config, strategy.as_deref(), output.as_deref())),
        Command::Signal { config, strategy } => finish(run_signal(&config, strategy.as_deref())),
        Command::Search {
            config,
            trials,
            sort_by,
            top,
            output,
        } => finish(run_search_cmd(
            &config,
            trials,
            sort_by.as_deref(),
            top,
            output.as_deref(),
        )),
        Command::Strategies { config } => finish(run_strategies(&config)),
        Command::SaveStrategy { config, name } => finish(run_save_strategy(&config, &name)),
        Command::DeleteStrategy { config, name } => finish(run_delete_strategy(&config, &name)),
        Command::Validate { config, strategy } => finish(run_validate(&config, strategy.as_deref())),
    }
}

fn finish(result: Result<(), QuantlabError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// The `[data]` section: where prices and saved strategies live, and the
/// date window to load.
struct DataSettings {
    csv_dir: PathBuf,
    store_path: PathBuf,
    start: NaiveDate,
    end: NaiveDate,
}

fn missing(key: &str) -> QuantlabError {
    QuantlabError::ConfigMissing {
        section: "data".into(),
        key: key.into(),
    }
}

fn data_settings(adapter: &dyn ConfigPort) -> Result<DataSettings, QuantlabError> {
    let csv_dir = adapter
        .get_string("data", "csv_dir")
        .ok_or_else(|| missing("csv_dir"))?;
    let store_path = adapter
        .get_string("data", "store_path")
        .unwrap_or_else(|| "strategies.json".to_string());

    let parse_date = |key: &str| -> Result<NaiveDate, QuantlabError> {
        let raw = adapter
            .get_string("data", key)
            .ok_or_else(|| missing(key))?;
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
            QuantlabError::ConfigInvalid {
                section: "data".into(),
                key: key.into(),
                reason: "invalid date format (expected YYYY-MM-DD)".into(),
            }
        })
    };
    let start = parse_date("start_date")?;
    let end = parse_date("end_date")?;
    if end < start {
        return Err(QuantlabError::ConfigInvalid {
            section: "data".into(),
            key: "end_date".into(),
            reason: "end_date is before start_date".into(),
        });
    }

    Ok(DataSettings {
        csv_dir: PathBuf::from(csv_dir),
        store_path: PathBuf::from(store_path),
        start,
        end,
    })
}

fn load_config(path: &std::path::Path) -> Result<FileConfigAdapter, QuantlabError> {
    FileConfigAdapter::from_file(path)
}

/// Named strategy from the store when `name` is given, otherwise the
/// config's own `[strategy]` section.
fn resolve_strategy(
    adapter: &dyn ConfigPort,
    settings: &DataSettings,
    name: Option<&str>,
) -> Result<StrategyConfig, QuantlabError> {
    match name {
        Some(name) => {
            eprintln!("Loading strategy \"{}\" from store", name);
            JsonStoreAdapter::new(settings.store_path.clone()).load(name)
        }
        None => StrategyConfig::from_config(adapter),
    }
}

/// Fetches signal, trade and (when the market gate is on) market data, and
/// aligns them into the frame the engine runs on.
fn prepare_frame(
    cfg: &StrategyConfig,
    settings: &DataSettings,
) -> Result<(AlignedFrame, MaTable), QuantlabError> {
    let data = CsvAdapter::new(settings.csv_dir.clone());

    let signal = data.fetch_daily(&cfg.signal_ticker, settings.start, settings.end)?;
    let trade = if cfg.trade_ticker == cfg.signal_ticker {
        signal.clone()
    } else {
        data.fetch_daily(&cfg.trade_ticker, settings.start, settings.end)?
    };
    let market = if cfg.use_market_filter {
        Some(data.fetch_daily(&cfg.market_ticker, settings.start, settings.end)?)
    } else {
        None
    };

    align(
        &signal,
        &trade,
        market.as_ref(),
        &cfg.ma_windows(),
        cfg.market_ma_period,
    )
    .ok_or_else(|| QuantlabError::Data {
        reason: format!(
            "no overlapping dates between {} and {}",
            cfg.signal_ticker, cfg.trade_ticker
        ),
    })
}

fn print_summary(summary: &PerformanceSummary, bench: Option<&[f64]>) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Return:          {:.2}%", summary.return_pct);
    eprintln!("Max Drawdown:    {:.2}%", summary.max_drawdown_pct);
    eprintln!("Win Rate:        {:.1}%", summary.win_rate_pct);
    eprintln!("Profit Factor:   {:.2}", summary.profit_factor);
    eprintln!("Closed Trades:   {}", summary.trade_count);
    eprintln!(
        "Position:        {}",
        if summary.position_open {
            "still holding"
        } else {
            "flat"
        }
    );

    if let Some(bh) = bench.and_then(buy_and_hold) {
        eprintln!("\n=== Buy & Hold ===");
        eprintln!("Return:          {:.2}%", bh.return_pct);
        eprintln!("Max Drawdown:    {:.2}%", bh.max_drawdown_pct);
    }

    eprintln!("\n=== Trades ===");
    for trade in &summary.trades {
        eprintln!(
            "  {} {:>4} @ {:>10.4}  equity {:>14.2}  {} ({})",
            trade.date,
            trade.side.as_str(),
            trade.fill,
            trade.equity,
            trade.reason,
            trade.condition,
        );
    }
}

fn run_backtest(
    config_path: &std::path::Path,
    strategy_name: Option<&str>,
    output_path: Option<&std::path::Path>,
) -> Result<(), QuantlabError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let settings = data_settings(&adapter)?;
    let cfg = resolve_strategy(&adapter, &settings, strategy_name)?;

    eprintln!(
        "Backtesting {} (signal {}) from {} to {}",
        cfg.trade_ticker, cfg.signal_ticker, settings.start, settings.end
    );
    let (frame, table) = prepare_frame(&cfg, &settings)?;
    eprintln!("  {} aligned bars", frame.len());

    let warmup = cfg.warmup_bars();
    let result = simulate(&frame, &table, &cfg).ok_or_else(|| QuantlabError::Data {
        reason: format!(
            "not enough history: {} bars aligned, {} needed for warm-up",
            frame.len(),
            warmup + 1
        ),
    })?;

    let Some(summary) = summarize(result) else {
        eprintln!("No signals fired in the window; nothing to report.");
        return Ok(());
    };

    print_summary(&summary, Some(&frame.trd_close[warmup..]));

    if let Some(path) = output_path {
        let path = path.display().to_string();
        CsvReportAdapter.write_backtest(&summary, &path)?;
        eprintln!("\nTrade log written to: {}", path);
    }
    Ok(())
}

fn run_signal(
    config_path: &std::path::Path,
    strategy_name: Option<&str>,
) -> Result<(), QuantlabError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let settings = data_settings(&adapter)?;
    let cfg = resolve_strategy(&adapter, &settings, strategy_name)?;

    let (frame, table) = prepare_frame(&cfg, &settings)?;
    let last = frame.len() - 1;
    if last < cfg.warmup_bars() {
        return Err(QuantlabError::Data {
            reason: format!(
                "not enough history: {} bars aligned, {} needed for warm-up",
                frame.len(),
                cfg.warmup_bars() + 1
            ),
        });
    }
    let evaluator =
        SignalEvaluator::new(&frame, &table, &cfg).ok_or_else(|| QuantlabError::Data {
            reason: "frame is missing a column the strategy requires".into(),
        })?;

    let trace = evaluator.explain(last);
    let verdict = if trace.buy {
        "BUY"
    } else if trace.sell {
        "SELL"
    } else {
        "HOLD"
    };
    println!("{} {} {}", frame.dates[last], cfg.signal_ticker, verdict);
    println!("  buy:  {}", trace.buy_detail);
    println!("  sell: {}", trace.sell_detail);
    for note in &trace.notes {
        println!("  note: {}", note);
    }
    Ok(())
}

fn run_search_cmd(
    config_path: &std::path::Path,
    trials_override: Option<usize>,
    sort_override: Option<&str>,
    top: usize,
    output_path: Option<&std::path::Path>,
) -> Result<(), QuantlabError> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    let settings = data_settings(&adapter)?;
    let base = StrategyConfig::from_config(&adapter)?;

    let space = search_space(&adapter)?;
    let mut params = search_params(&adapter);
    if let Some(trials) = trials_override {
        params.trials = trials;
    }
    let constraints = search_constraints(&adapter);
    let metric: SortMetric = sort_override
        .map(str::to_string)
        .or_else(|| adapter.get_string("search", "sort_by"))
        .unwrap_or_else(|| "return".to_string())
        .parse()?;

    let (frame, _) = prepare_frame(&base, &settings)?;
    eprintln!(
        "Searching: {} trials over {} bars (split {:.0}/{:.0}, seed {})",
        params.trials,
        frame.len(),
        params.split_ratio * 100.0,
        (1.0 - params.split_ratio) * 100.0,
        params.master_seed,
    );

    let results = run_search(&frame, &base, &space, &params, &constraints);
    eprintln!("  {} of {} trials passed", results.len(), params.trials);
    if results.is_empty() {
        return Ok(());
    }

    println!(
        "{:>5} {:>8} {:>8} {:>7} {:>7} {:>6} {:>8} {:>8}  params",
        "trial", "ret%", "mdd%", "win%", "pf", "trades", "train%", "test%"
    );
    for row in results.top_n(metric, top) {
        println!("{}", format_search_row(&row));
    }

    if let Some(path) = output_path {
        let path = path.display().to_string();
        CsvReportAdapter.write_search(&results.sorted_by(metric), &path)?;
        eprintln!("\nSearch results written to: {}", path);
    }
    Ok(())
}

fn format_search_row(row: &SearchResult) -> String {
    let cfg = &row.config;
    format!(
        "{:>5} {:>8.2} {:>8.2} {:>7.1} {:>7.2} {:>6} {:>8.2} {:>8.2}  \
         ma {}{}/{}{} stop {:.1} tp {:.1}{}",
        row.trial,
        row.full.return_pct,
        row.full.max_drawdown_pct,
        row.full.win_rate_pct,
        row.full.profit_factor,
        row.full.trade_count,
        row.train.return_pct,
        row.test.return_pct,
        cfg.buy_operator,
        cfg.ma_buy,
        cfg.sell_operator,
        cfg.ma_sell,
        cfg.stop_loss_pct,
        cfg.take_profit_pct,
        if cfg.use_atr_stop {
            format!(" atr x{:.1}", cfg.atr_multiplier)
        } else {
            String::new()
        },
    )
}

fn run_strategies(config_path: &std::path::Path) -> Result<(), QuantlabError> {
    let adapter = load_config(config_path)?;
    let settings = data_settings(&adapter)?;
    let store = JsonStoreAdapter::new(settings.store_path.clone());

    let names = store.list()?;
    if names.is_empty() {
        eprintln!("No saved strategies in {}", settings.store_path.display());
        return Ok(());
    }
    for name in &names {
        let cfg = store.load(name)?;
        println!(
            "{}: {} (signal {}) {}{} / {}{}",
            name,
            cfg.trade_ticker,
            cfg.signal_ticker,
            cfg.buy_operator,
            cfg.ma_buy,
            cfg.sell_operator,
            cfg.ma_sell,
        );
    }
    Ok(())
}

fn run_save_strategy(config_path: &std::path::Path, name: &str) -> Result<(), QuantlabError> {
    let adapter = load_config(config_path)?;
    let settings = data_settings(&adapter)?;
    let cfg = StrategyConfig::from_config(&adapter)?;

    JsonStoreAdapter::new(settings.store_path.clone()).save(name, &cfg)?;
    eprintln!(
        "Saved strategy \"{}\" to {}",
        name,
        settings.store_path.display()
    );
    Ok(())
}

fn run_delete_strategy(config_path: &std::path::Path, name: &str) -> Result<(), QuantlabError> {
    let adapter = load_config(config_path)?;
    let settings = data_settings(&adapter)?;

    JsonStoreAdapter::new(settings.store_path.clone()).delete(name)?;
    eprintln!("Deleted strategy \"{}\"", name);
    Ok(())
}

fn run_validate(
    config_path: &std::path::Path,
    strategy_name: Option<&str>,
) -> Result<(), QuantlabError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = load_config(config_path)?;
    let settings = data_settings(&adapter)?;
    let cfg = resolve_strategy(&adapter, &settings, strategy_name)?;

    // from_config/load already validated; also make sure the search section
    // parses when present.
    let _ = search_space(&adapter)?;

    eprintln!(
        "Strategy: {} (signal {}), buy {}{}, sell {}{}",
        cfg.trade_ticker,
        cfg.signal_ticker,
        cfg.buy_operator,
        cfg.ma_buy,
        cfg.sell_operator,
        cfg.ma_sell,
    );
    eprintln!("Warm-up: {} bars", cfg.warmup_bars());
    eprintln!("Configuration is valid.");
    Ok(())
}

/// Parses a comma-separated candidate list from the `[search]` section. A
/// missing key means "not searched" and yields an empty list.
fn parse_list<T>(adapter: &dyn ConfigPort, key: &str) -> Result<Vec<T>, QuantlabError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = adapter.get_string("search", key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|e| QuantlabError::ConfigInvalid {
                section: "search".into(),
                key: key.into(),
                reason: format!("bad entry \"{}\": {}", s, e),
            })
        })
        .collect()
}

fn search_space(adapter: &dyn ConfigPort) -> Result<SearchSpace, QuantlabError> {
    Ok(SearchSpace {
        ma_buy: parse_list(adapter, "ma_buy")?,
        ma_sell: parse_list(adapter, "ma_sell")?,
        offset_cl_buy: parse_list(adapter, "offset_cl_buy")?,
        offset_cl_sell: parse_list(adapter, "offset_cl_sell")?,
        offset_ma_buy: parse_list(adapter, "offset_ma_buy")?,
        offset_ma_sell: parse_list(adapter, "offset_ma_sell")?,
        buy_operator: parse_list(adapter, "buy_operator")?,
        sell_operator: parse_list(adapter, "sell_operator")?,
        use_trend_in_buy: parse_list(adapter, "use_trend_in_buy")?,
        use_trend_in_sell: parse_list(adapter, "use_trend_in_sell")?,
        ma_compare_short: parse_list(adapter, "ma_compare_short")?,
        ma_compare_long: parse_list(adapter, "ma_compare_long")?,
        offset_compare_short: parse_list(adapter, "offset_compare_short")?,
        offset_compare_long: parse_list(adapter, "offset_compare_long")?,
        stop_loss_pct: parse_list(adapter, "stop_loss_pct")?,
        take_profit_pct: parse_list(adapter, "take_profit_pct")?,
        use_atr_stop: parse_list(adapter, "use_atr_stop")?,
        atr_multiplier: parse_list(adapter, "atr_multiplier")?,
    })
}

fn search_params(adapter: &dyn ConfigPort) -> SearchParams {
    let d = SearchParams::default();
    SearchParams {
        trials: adapter.get_int("search", "trials", d.trials as i64).max(0) as usize,
        split_ratio: adapter.get_double("search", "split_ratio", d.split_ratio),
        master_seed: adapter.get_int("search", "master_seed", d.master_seed as i64) as u64,
    }
}

fn search_constraints(adapter: &dyn ConfigPort) -> SearchConstraints {
    let d = SearchConstraints::default();
    SearchConstraints {
        min_trades: adapter
            .get_int("search", "min_trades", d.min_trades as i64)
            .max(0) as usize,
        min_win_rate: adapter.get_double("search", "min_win_rate", d.min_win_rate),
        max_drawdown: adapter.get_double("search", "max_drawdown", d.max_drawdown),
        min_train_return: adapter.get_double("search", "min_train_return", d.min_train_return),
        min_test_return: adapter.get_double("search", "min_test_return", d.min_test_return),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{CompareOp, SellOperator};

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn parse_list_splits_and_trims() {
        let a = adapter("[search]\nma_buy = 5, 10 , 20\n");
        let list: Vec<usize> = parse_list(&a, "ma_buy").unwrap();
        assert_eq!(list, vec![5, 10, 20]);
    }

    #[test]
    fn parse_list_missing_key_is_empty() {
        let a = adapter("[search]\n");
        let list: Vec<usize> = parse_list(&a, "ma_buy").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn parse_list_bad_entry_is_config_invalid() {
        let a = adapter("[search]\nma_buy = 5, lots\n");
        let result: Result<Vec<usize>, _> = parse_list(&a, "ma_buy");
        assert!(matches!(
            result,
            Err(QuantlabError::ConfigInvalid { key, .. }) if key == "ma_buy"
        ));
    }

    #[test]
    fn search_space_reads_operator_lists() {
        let a = adapter(
            "[search]\n\
             ma_buy = 20, 60\n\
             buy_operator = >, <\n\
             sell_operator = off, <\n\
             stop_loss_pct = 5.0, 10.0\n\
             use_atr_stop = true, false\n",
        );
        let space = search_space(&a).unwrap();
        assert_eq!(space.ma_buy, vec![20, 60]);
        assert_eq!(space.buy_operator, vec![CompareOp::Above, CompareOp::Below]);
        assert_eq!(
            space.sell_operator,
            vec![SellOperator::Off, SellOperator::Below]
        );
        assert_eq!(space.stop_loss_pct, vec![5.0, 10.0]);
        assert_eq!(space.use_atr_stop, vec![true, false]);
        assert!(space.ma_sell.is_empty());
    }

    #[test]
    fn search_params_and_constraints_fall_back_to_defaults() {
        let a = adapter("[search]\ntrials = 200\nmin_trades = 3\n");
        let params = search_params(&a);
        assert_eq!(params.trials, 200);
        assert_eq!(params.split_ratio, 0.7);
        assert_eq!(params.master_seed, 42);

        let constraints = search_constraints(&a);
        assert_eq!(constraints.min_trades, 3);
        assert_eq!(constraints.min_train_return, -999.0);
    }

    #[test]
    fn data_settings_requires_dir_and_dates() {
        let a = adapter("[data]\ncsv_dir = /prices\nstart_date = 2020-01-01\nend_date = 2024-01-01\n");
        let settings = data_settings(&a).unwrap();
        assert_eq!(settings.csv_dir, PathBuf::from("/prices"));
        assert_eq!(settings.store_path, PathBuf::from("strategies.json"));
        assert_eq!(
            settings.start,
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
        );

        let a = adapter("[data]\nstart_date = 2020-01-01\nend_date = 2024-01-01\n");
        assert!(matches!(
            data_settings(&a),
            Err(QuantlabError::ConfigMissing { key, .. }) if key == "csv_dir"
        ));

        let a = adapter("[data]\ncsv_dir = /prices\nstart_date = Jan 1\nend_date = 2024-01-01\n");
        assert!(matches!(
            data_settings(&a),
            Err(QuantlabError::ConfigInvalid { key, .. }) if key == "start_date"
        ));

        let a = adapter("[data]\ncsv_dir = /p\nstart_date = 2024-01-01\nend_date = 2020-01-01\n");
        assert!(matches!(
            data_settings(&a),
            Err(QuantlabError::ConfigInvalid { key, .. }) if key == "end_date"
        ));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["quantlab", "backtest", "-c", "quantlab.ini"]).unwrap();
        assert!(matches!(cli.command, Command::Backtest { .. }));

        let cli = Cli::try_parse_from([
            "quantlab",
            "search",
            "-c",
            "quantlab.ini",
            "--trials",
            "500",
            "--sort-by",
            "test_return",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                trials, sort_by, top, ..
            } => {
                assert_eq!(trials, Some(500));
                assert_eq!(sort_by.as_deref(), Some("test_return"));
                assert_eq!(top, 10);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli =
            Cli::try_parse_from(["quantlab", "save-strategy", "-c", "quantlab.ini", "dip"]).unwrap();
        assert!(matches!(cli.command, Command::SaveStrategy { name, .. } if name == "dip"));
    }
}
