//! CSV file data adapter.
//!
//! One file per ticker (`<dir>/<TICKER>.csv`) with a header row and columns
//! `date,open,high,low,close`; extra columns are ignored. Dates are
//! `YYYY-MM-DD`.

use crate::domain::error::QuantlabError;
use crate::domain::series::{PricePoint, PriceSeries};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, QuantlabError> {
    record
        .get(index)
        .ok_or_else(|| QuantlabError::Data {
            reason: format!("missing {} column", name),
        })?
        .trim()
        .parse()
        .map_err(|e| QuantlabError::Data {
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, QuantlabError> {
        let path = self.csv_path(ticker);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuantlabError::NoData {
                    ticker: ticker.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut points = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| QuantlabError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = record.get(0).ok_or_else(|| QuantlabError::Data {
                reason: "missing date column".into(),
            })?;
            let date =
                NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                    QuantlabError::Data {
                        reason: format!("invalid date \"{}\": {}", date_str, e),
                    }
                })?;

            if date < start || date > end {
                continue;
            }

            points.push(PricePoint {
                date,
                open: parse_field(&record, 1, "open")?,
                high: parse_field(&record, 2, "high")?,
                low: parse_field(&record, 3, "low")?,
                close: parse_field(&record, 4, "close")?,
            });
        }

        if points.is_empty() {
            return Err(QuantlabError::NoData {
                ticker: ticker.to_string(),
            });
        }

        points.sort_by_key(|p| p.date);
        PriceSeries::new(ticker, points)
    }

    fn list_tickers(&self) -> Result<Vec<String>, QuantlabError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut tickers = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".csv") {
                tickers.push(stem.to_string());
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}
