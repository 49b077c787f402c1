//! Result export port trait.

use crate::domain::error::QuantlabError;
use crate::domain::search::SearchResult;
use crate::domain::summary::PerformanceSummary;

/// Port for exporting backtest and search results.
pub trait ReportPort {
    /// Writes a backtest's trade log and equity curve.
    fn write_backtest(
        &self,
        summary: &PerformanceSummary,
        output_path: &str,
    ) -> Result<(), QuantlabError>;

    /// Writes search result rows, one line per passing trial.
    fn write_search(&self, rows: &[SearchResult], output_path: &str)
        -> Result<(), QuantlabError>;
}
