//! Random parameter search with a chronological train/test split.
//!
//! Monte-Carlo sampling, not a grid: each trial draws one value per parameter
//! uniformly from its candidate list, runs the simulator over the full range
//! and over the train/test slices, and keeps the trial only if every
//! constraint passes. Trials are independent and run in parallel; each one
//! seeds its own RNG from `master_seed + trial`, so results are identical for
//! a given seed regardless of thread count, and are collected in trial order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::domain::config::{CompareOp, SellOperator, StrategyConfig};
use crate::domain::error::QuantlabError;
use crate::domain::frame::{AlignedFrame, MaTable};
use crate::domain::simulator::simulate;
use crate::domain::summary::{summarize, PerformanceSummary};

/// Candidate value lists, one per searchable parameter. An empty list keeps
/// the base config's value for that parameter.
#[derive(Debug, Clone, Default)]
pub struct SearchSpace {
    pub ma_buy: Vec<usize>,
    pub ma_sell: Vec<usize>,
    pub offset_cl_buy: Vec<usize>,
    pub offset_cl_sell: Vec<usize>,
    pub offset_ma_buy: Vec<usize>,
    pub offset_ma_sell: Vec<usize>,
    pub buy_operator: Vec<CompareOp>,
    pub sell_operator: Vec<SellOperator>,
    pub use_trend_in_buy: Vec<bool>,
    pub use_trend_in_sell: Vec<bool>,
    pub ma_compare_short: Vec<usize>,
    pub ma_compare_long: Vec<usize>,
    pub offset_compare_short: Vec<usize>,
    pub offset_compare_long: Vec<usize>,
    pub stop_loss_pct: Vec<f64>,
    pub take_profit_pct: Vec<f64>,
    pub use_atr_stop: Vec<bool>,
    pub atr_multiplier: Vec<f64>,
}

impl SearchSpace {
    /// Every MA window any trial could request, plus the base config's own
    /// windows and a stock assortment. Built into the tables once, before
    /// trials start.
    pub fn ma_window_pool(&self, base: &StrategyConfig) -> BTreeSet<usize> {
        let mut pool: BTreeSet<usize> = [5, 10, 20, 60, 120].into_iter().collect();
        for list in [
            &self.ma_buy,
            &self.ma_sell,
            &self.ma_compare_short,
            &self.ma_compare_long,
        ] {
            pool.extend(list.iter().copied().filter(|&w| w > 0));
        }
        pool.insert(base.ma_buy);
        pool.insert(base.ma_sell);
        pool.insert(base.ma_compare_short);
        pool.insert(base.ma_compare_long);
        pool
    }

    /// Draws one config, starting from `base` and overriding each parameter
    /// that has candidates.
    pub fn sample(&self, base: &StrategyConfig, rng: &mut StdRng) -> StrategyConfig {
        fn pick<T: Copy>(list: &[T], fallback: T, rng: &mut StdRng) -> T {
            list.choose(rng).copied().unwrap_or(fallback)
        }

        StrategyConfig {
            ma_buy: pick(&self.ma_buy, base.ma_buy, rng),
            ma_sell: pick(&self.ma_sell, base.ma_sell, rng),
            offset_cl_buy: pick(&self.offset_cl_buy, base.offset_cl_buy, rng),
            offset_cl_sell: pick(&self.offset_cl_sell, base.offset_cl_sell, rng),
            offset_ma_buy: pick(&self.offset_ma_buy, base.offset_ma_buy, rng),
            offset_ma_sell: pick(&self.offset_ma_sell, base.offset_ma_sell, rng),
            buy_operator: pick(&self.buy_operator, base.buy_operator, rng),
            sell_operator: pick(&self.sell_operator, base.sell_operator, rng),
            use_trend_in_buy: pick(&self.use_trend_in_buy, base.use_trend_in_buy, rng),
            use_trend_in_sell: pick(&self.use_trend_in_sell, base.use_trend_in_sell, rng),
            ma_compare_short: pick(&self.ma_compare_short, base.ma_compare_short, rng),
            ma_compare_long: pick(&self.ma_compare_long, base.ma_compare_long, rng),
            offset_compare_short: pick(&self.offset_compare_short, base.offset_compare_short, rng),
            offset_compare_long: pick(&self.offset_compare_long, base.offset_compare_long, rng),
            stop_loss_pct: pick(&self.stop_loss_pct, base.stop_loss_pct, rng),
            take_profit_pct: pick(&self.take_profit_pct, base.take_profit_pct, rng),
            use_atr_stop: pick(&self.use_atr_stop, base.use_atr_stop, rng),
            atr_multiplier: pick(&self.atr_multiplier, base.atr_multiplier, rng),
            ..base.clone()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub trials: usize,
    /// Fraction of the frame used as the chronological train prefix.
    pub split_ratio: f64,
    pub master_seed: u64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            trials: 50,
            split_ratio: 0.7,
            master_seed: 42,
        }
    }
}

/// Threshold set a trial must clear to be retained. Zeroed thresholds are
/// inactive.
#[derive(Debug, Clone, Copy)]
pub struct SearchConstraints {
    pub min_trades: usize,
    pub min_win_rate: f64,
    /// Magnitude ceiling on the full-range drawdown, 0 = off.
    pub max_drawdown: f64,
    pub min_train_return: f64,
    pub min_test_return: f64,
}

impl Default for SearchConstraints {
    fn default() -> Self {
        Self {
            min_trades: 0,
            min_win_rate: 0.0,
            max_drawdown: 0.0,
            min_train_return: -999.0,
            min_test_return: -999.0,
        }
    }
}

/// Slim metric row extracted from a summary; search trials keep these instead
/// of full trade logs.
#[derive(Debug, Clone, Copy)]
pub struct MetricsRow {
    pub return_pct: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub trade_count: usize,
}

impl From<&PerformanceSummary> for MetricsRow {
    fn from(summary: &PerformanceSummary) -> Self {
        Self {
            return_pct: summary.return_pct,
            max_drawdown_pct: summary.max_drawdown_pct,
            win_rate_pct: summary.win_rate_pct,
            profit_factor: summary.profit_factor,
            trade_count: summary.trade_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub trial: usize,
    pub config: StrategyConfig,
    pub full: MetricsRow,
    pub train: MetricsRow,
    pub test: MetricsRow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMetric {
    FullReturn,
    TrainReturn,
    TestReturn,
    WinRate,
    ProfitFactor,
    Drawdown,
}

impl FromStr for SortMetric {
    type Err = QuantlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full_return" | "return" => Ok(SortMetric::FullReturn),
            "train_return" => Ok(SortMetric::TrainReturn),
            "test_return" => Ok(SortMetric::TestReturn),
            "win_rate" => Ok(SortMetric::WinRate),
            "profit_factor" => Ok(SortMetric::ProfitFactor),
            "mdd" | "drawdown" => Ok(SortMetric::Drawdown),
            other => Err(QuantlabError::StrategyInvalid {
                field: "sort_by".to_string(),
                reason: format!(
                    "unknown metric \"{}\", expected one of return, train_return, \
                     test_return, win_rate, profit_factor, mdd",
                    other
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub rows: Vec<SearchResult>,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows sorted best-first by the given metric (for drawdown, closest to
    /// zero first).
    pub fn sorted_by(&self, metric: SortMetric) -> Vec<SearchResult> {
        let key = |row: &SearchResult| -> f64 {
            match metric {
                SortMetric::FullReturn => row.full.return_pct,
                SortMetric::TrainReturn => row.train.return_pct,
                SortMetric::TestReturn => row.test.return_pct,
                SortMetric::WinRate => row.full.win_rate_pct,
                SortMetric::ProfitFactor => row.full.profit_factor,
                SortMetric::Drawdown => row.full.max_drawdown_pct,
            }
        };
        let mut sorted = self.rows.clone();
        sorted.sort_by(|a, b| key(b).partial_cmp(&key(a)).unwrap_or(Ordering::Equal));
        sorted
    }

    pub fn top_n(&self, metric: SortMetric, n: usize) -> Vec<SearchResult> {
        let mut sorted = self.sorted_by(metric);
        sorted.truncate(n);
        sorted
    }
}

/// Runs the search over a prepared frame.
///
/// Train/test slices and all three MA tables are built once up front. Trials
/// that fail a constraint or cannot simulate at all (warm-up longer than a
/// slice, insufficient data) are dropped silently.
pub fn run_search(
    frame: &AlignedFrame,
    base: &StrategyConfig,
    space: &SearchSpace,
    params: &SearchParams,
    constraints: &SearchConstraints,
) -> SearchResults {
    let n = frame.len();
    let pool = space.ma_window_pool(base);

    let table_full = MaTable::build(&frame.sig_close, pool.iter().copied());
    let split = ((n as f64) * params.split_ratio) as usize;
    let split = split.min(n);
    let train = frame.slice(0..split);
    let test = frame.slice(split..n);
    let table_train = MaTable::build(&train.sig_close, pool.iter().copied());
    let table_test = MaTable::build(&test.sig_close, pool.iter().copied());

    let rows: Vec<SearchResult> = (0..params.trials)
        .into_par_iter()
        .filter_map(|trial| {
            let mut rng = StdRng::seed_from_u64(params.master_seed.wrapping_add(trial as u64));
            let cfg = space.sample(base, &mut rng);
            if cfg.validate().is_err() {
                return None;
            }

            let full = summarize(simulate(frame, &table_full, &cfg)?)?;
            if full.trade_count < constraints.min_trades {
                return None;
            }
            if full.win_rate_pct < constraints.min_win_rate {
                return None;
            }
            if constraints.max_drawdown > 0.0
                && full.max_drawdown_pct < -constraints.max_drawdown.abs()
            {
                return None;
            }

            let train_summary = summarize(simulate(&train, &table_train, &cfg)?)?;
            if train_summary.return_pct < constraints.min_train_return {
                return None;
            }

            let test_summary = summarize(simulate(&test, &table_test, &cfg)?)?;
            if test_summary.return_pct < constraints.min_test_return {
                return None;
            }

            Some(SearchResult {
                trial,
                config: cfg,
                full: MetricsRow::from(&full),
                train: MetricsRow::from(&train_summary),
                test: MetricsRow::from(&test_summary),
            })
        })
        .collect();

    SearchResults { rows }
}
