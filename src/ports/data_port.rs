//! Data access port trait.

use crate::domain::error::QuantlabError;
use crate::domain::series::PriceSeries;
use chrono::NaiveDate;

/// Daily price retrieval contract.
///
/// Implementations return either a validated, date-sorted series or an
/// explicit error, never rows with silently defaulted fields. An empty
/// window is `NoData`, not an empty series.
pub trait DataPort {
    fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, QuantlabError>;

    fn list_tickers(&self) -> Result<Vec<String>, QuantlabError>;
}
