//! Daily price bar representation and the validated series contract.
//!
//! A `PriceSeries` is the unit the data layer hands to the engine: date-sorted,
//! unique dates, every field finite. Validation happens once at construction so
//! the aligner and simulator never have to re-check rows.

use chrono::NaiveDate;

use super::error::QuantlabError;

#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PricePoint {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Validates and wraps a date-sorted run of daily bars.
    ///
    /// Rejects out-of-order or duplicate dates and non-finite fields; an empty
    /// vector is allowed and stands for "no data in range".
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, QuantlabError> {
        let ticker = ticker.into();
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(QuantlabError::BadSeries {
                    ticker,
                    reason: format!(
                        "dates not strictly ascending at {} -> {}",
                        pair[0].date, pair[1].date
                    ),
                });
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(QuantlabError::BadSeries {
                ticker,
                reason: format!("non-finite field on {}", bad.date),
            });
        }
        Ok(Self { ticker, points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
