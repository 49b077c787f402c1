//! Series alignment and the shared moving-average table.
//!
//! The aligner inner-joins the signal, trade and optional market series on
//! date, producing the column-oriented [`AlignedFrame`] the simulator indexes
//! into. Moving averages over the signal closes are built once into a
//! [`MaTable`] and shared by every simulation over the same frame; the search
//! driver runs hundreds of trials against one frame/table pair.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;

use super::indicator::{atr, sma};
use super::series::PriceSeries;

/// ATR window used for the frame's derived volatility column.
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// One row per date present in every required input series. Never mutated
/// after construction.
#[derive(Debug, Clone)]
pub struct AlignedFrame {
    pub dates: Vec<NaiveDate>,
    pub sig_open: Vec<f64>,
    pub sig_high: Vec<f64>,
    pub sig_low: Vec<f64>,
    pub sig_close: Vec<f64>,
    pub trd_open: Vec<f64>,
    pub trd_high: Vec<f64>,
    pub trd_low: Vec<f64>,
    pub trd_close: Vec<f64>,
    pub mkt_close: Option<Vec<f64>>,
    pub mkt_ma: Option<Vec<f64>>,
    /// ATR of the trade OHLC, period [`DEFAULT_ATR_PERIOD`].
    pub atr: Vec<f64>,
}

impl AlignedFrame {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Copies a contiguous sub-range of every column.
    ///
    /// ATR and market columns are causal, so a suffix slice keeps correct
    /// historical values; moving averages must be rebuilt per slice via
    /// [`MaTable::build`].
    pub fn slice(&self, range: Range<usize>) -> AlignedFrame {
        AlignedFrame {
            dates: self.dates[range.clone()].to_vec(),
            sig_open: self.sig_open[range.clone()].to_vec(),
            sig_high: self.sig_high[range.clone()].to_vec(),
            sig_low: self.sig_low[range.clone()].to_vec(),
            sig_close: self.sig_close[range.clone()].to_vec(),
            trd_open: self.trd_open[range.clone()].to_vec(),
            trd_high: self.trd_high[range.clone()].to_vec(),
            trd_low: self.trd_low[range.clone()].to_vec(),
            trd_close: self.trd_close[range.clone()].to_vec(),
            mkt_close: self.mkt_close.as_ref().map(|c| c[range.clone()].to_vec()),
            mkt_ma: self.mkt_ma.as_ref().map(|c| c[range.clone()].to_vec()),
            atr: self.atr[range].to_vec(),
        }
    }
}

/// Memoized moving averages over the signal closes, keyed by window length.
///
/// Built once, read-only afterwards (no writers while simulations run).
#[derive(Debug, Clone, Default)]
pub struct MaTable {
    map: HashMap<usize, Vec<f64>>,
}

impl MaTable {
    pub fn build(closes: &[f64], windows: impl IntoIterator<Item = usize>) -> Self {
        let mut map = HashMap::new();
        for window in windows {
            if window == 0 {
                continue;
            }
            map.entry(window).or_insert_with(|| sma(closes, window));
        }
        Self { map }
    }

    pub fn get(&self, window: usize) -> Option<&[f64]> {
        self.map.get(&window).map(|v| v.as_slice())
    }

    pub fn windows(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys().copied()
    }
}

/// Inner-joins the input series on date and precomputes the indicator columns.
///
/// Returns `None` when a required series is empty or the join has no rows:
/// "insufficient data", not an error. Rows with a non-finite field are
/// dropped.
pub fn align(
    signal: &PriceSeries,
    trade: &PriceSeries,
    market: Option<&PriceSeries>,
    ma_windows: &BTreeSet<usize>,
    market_ma_period: usize,
) -> Option<(AlignedFrame, MaTable)> {
    if signal.is_empty() || trade.is_empty() {
        return None;
    }
    if let Some(mkt) = market {
        if mkt.is_empty() {
            return None;
        }
    }

    let trade_index: HashMap<NaiveDate, usize> = trade
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| (p.date, i))
        .collect();
    let market_index: Option<HashMap<NaiveDate, usize>> = market.map(|mkt| {
        mkt.points()
            .iter()
            .enumerate()
            .map(|(i, p)| (p.date, i))
            .collect()
    });

    let mut frame = AlignedFrame {
        dates: Vec::new(),
        sig_open: Vec::new(),
        sig_high: Vec::new(),
        sig_low: Vec::new(),
        sig_close: Vec::new(),
        trd_open: Vec::new(),
        trd_high: Vec::new(),
        trd_low: Vec::new(),
        trd_close: Vec::new(),
        mkt_close: market.map(|_| Vec::new()),
        mkt_ma: None,
        atr: Vec::new(),
    };

    for sig in signal.points() {
        let Some(&ti) = trade_index.get(&sig.date) else {
            continue;
        };
        let trd = &trade.points()[ti];

        let mkt_close = match &market_index {
            Some(index) => match index.get(&sig.date) {
                Some(&mi) => Some(market.unwrap().points()[mi].close),
                None => continue,
            },
            None => None,
        };

        frame.dates.push(sig.date);
        frame.sig_open.push(sig.open);
        frame.sig_high.push(sig.high);
        frame.sig_low.push(sig.low);
        frame.sig_close.push(sig.close);
        frame.trd_open.push(trd.open);
        frame.trd_high.push(trd.high);
        frame.trd_low.push(trd.low);
        frame.trd_close.push(trd.close);
        if let (Some(col), Some(c)) = (frame.mkt_close.as_mut(), mkt_close) {
            col.push(c);
        }
    }

    if frame.is_empty() {
        return None;
    }

    frame.atr = atr(
        &frame.trd_high,
        &frame.trd_low,
        &frame.trd_close,
        DEFAULT_ATR_PERIOD,
    );
    frame.mkt_ma = frame
        .mkt_close
        .as_ref()
        .map(|closes| sma(closes, market_ma_period));

    let table = MaTable::build(&frame.sig_close, ma_windows.iter().copied());
    Some((frame, table))
}
