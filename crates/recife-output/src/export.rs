//! Export of `fact_daily_market` rows.
//!
//! Rows are exported with their calendar date and ticker in place of the
//! surrogate keys, as CSV, compact JSON or pretty-printed JSON.

use chrono::{DateTime, NaiveDate, Utc};
use recife_data::{FactRow, StockDimensionRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during reporting and export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized output was not UTF-8.
    #[error("Encoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Polars error while aggregating.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Warehouse error.
    #[error("Data error: {0}")]
    Data(#[from] recife_data::DataError),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Fact row referencing a stock key missing from the stock dimension.
    #[error("Fact row {date_key} references unknown stock key {stock_key}")]
    UnknownStockKey {
        /// Date key of the offending row
        date_key: i64,
        /// Unresolved stock key
        stock_key: i64,
    },

    /// Fact row whose date key is not a calendar date.
    #[error("Fact row has invalid date key {0}")]
    InvalidDateKey(i64),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One fact row keyed by date and ticker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactExport {
    /// Trading date.
    pub date: NaiveDate,
    /// Ticker symbol.
    pub ticker: String,
    /// Opening price.
    pub open_price: Option<f64>,
    /// Session high.
    pub high_price: Option<f64>,
    /// Session low.
    pub low_price: Option<f64>,
    /// Closing price.
    pub close_price: f64,
    /// Adjusted close.
    pub adjusted_close: Option<f64>,
    /// Traded volume.
    pub volume: Option<i64>,
    /// Suspicious open-to-close move.
    pub is_suspicious: bool,
    /// 1-day return.
    pub daily_return: Option<f64>,
    /// 5-day return.
    pub weekly_return: Option<f64>,
    /// 21-day return.
    pub monthly_return: Option<f64>,
    /// 252-day return.
    pub yearly_return: Option<f64>,
    /// Year-to-date return.
    pub ytd_return: Option<f64>,
    /// 7-observation volatility.
    pub volatility_7d: Option<f64>,
    /// 30-observation volatility.
    pub volatility_30d: Option<f64>,
    /// 90-observation volatility.
    pub volatility_90d: Option<f64>,
    /// Annualized volatility.
    pub annualized_volatility: Option<f64>,
    /// Cross-sectional volatility percentile.
    pub volatility_percentile: Option<f64>,
    /// SELIC rate.
    pub selic_rate: Option<f64>,
    /// CDI rate.
    pub cdi_rate: Option<f64>,
    /// USD/BRL rate.
    pub usd_brl: Option<f64>,
    /// USD/BRL PTAX rate.
    pub usd_brl_ptax: Option<f64>,
    /// Monthly IPCA.
    pub ipca_monthly: Option<f64>,
    /// 12-month IPCA.
    pub inflation_rate: Option<f64>,
    /// Monthly IGP-M.
    pub igpm_monthly: Option<f64>,
    /// Real interest rate.
    pub real_interest_rate: Option<f64>,
    /// CDI minus SELIC.
    pub cdi_selic_spread: Option<f64>,
    /// USD/BRL minus PTAX.
    pub usd_ptax_spread: Option<f64>,
    /// Rate regime label.
    pub rate_regime: Option<String>,
    /// Audit timestamp.
    pub created_at: DateTime<Utc>,
}

impl FactExport {
    /// Build an export row from a fact row and its ticker.
    ///
    /// Returns `None` when the date key does not decode to a date.
    pub fn from_fact(row: &FactRow, ticker: &str) -> Option<Self> {
        Some(Self {
            date: row.date()?,
            ticker: ticker.to_string(),
            open_price: row.open_price,
            high_price: row.high_price,
            low_price: row.low_price,
            close_price: row.close_price,
            adjusted_close: row.adjusted_close,
            volume: row.volume,
            is_suspicious: row.is_suspicious,
            daily_return: row.daily_return,
            weekly_return: row.weekly_return,
            monthly_return: row.monthly_return,
            yearly_return: row.yearly_return,
            ytd_return: row.ytd_return,
            volatility_7d: row.volatility_7d,
            volatility_30d: row.volatility_30d,
            volatility_90d: row.volatility_90d,
            annualized_volatility: row.annualized_volatility,
            volatility_percentile: row.volatility_percentile,
            selic_rate: row.selic_rate,
            cdi_rate: row.cdi_rate,
            usd_brl: row.usd_brl,
            usd_brl_ptax: row.usd_brl_ptax,
            ipca_monthly: row.ipca_monthly,
            inflation_rate: row.inflation_rate,
            igpm_monthly: row.igpm_monthly,
            real_interest_rate: row.real_interest_rate,
            cdi_selic_spread: row.cdi_selic_spread,
            usd_ptax_spread: row.usd_ptax_spread,
            rate_regime: row.rate_regime.map(|r| r.label().to_string()),
            created_at: row.created_at,
        })
    }
}

/// Join fact rows to their tickers.
///
/// # Errors
///
/// Fails on the first row whose stock key is not in `stocks` or whose date
/// key does not decode.
pub fn fact_exports(
    rows: &[FactRow],
    stocks: &[StockDimensionRow],
) -> Result<Vec<FactExport>, ExportError> {
    let tickers: HashMap<i64, &str> = stocks
        .iter()
        .map(|s| (s.stock_key, s.ticker.as_str()))
        .collect();

    rows.iter()
        .map(|row| {
            let ticker = tickers
                .get(&row.stock_key)
                .ok_or(ExportError::UnknownStockKey {
                    date_key: row.date_key,
                    stock_key: row.stock_key,
                })?;
            FactExport::from_fact(row, ticker).ok_or(ExportError::InvalidDateKey(row.date_key))
        })
        .collect()
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn to_csv<'a, T: Serialize + 'a>(
    records: impl IntoIterator<Item = &'a T>,
) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

impl Exporter for FactExport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => to_csv([self]),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for Vec<FactExport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => to_csv(self),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}
