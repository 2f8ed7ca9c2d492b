//! Record types shared by the landing store, the transformation stages and
//! the fact store.

use crate::error::{DataError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observation frequency of an indicator series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One observation per business day.
    Daily,
    /// One observation per month.
    Monthly,
    /// One observation per quarter.
    Quarterly,
}

impl Frequency {
    /// Convert to database string representation.
    pub const fn to_db_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Self::Daily),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            _ => Err(DataError::Parse(format!("Invalid frequency: {}", s))),
        }
    }

    /// Whether values of this frequency are carried forward to daily grain.
    pub const fn is_forward_filled(&self) -> bool {
        !matches!(self, Self::Daily)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

/// Raw daily price row as stored in the landing table.
///
/// Ticker and date are optional because the landing store accepts whatever
/// the extractors deliver; the cleaning stage rejects rows missing either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRecord {
    /// Ticker symbol (e.g. `PETR4.SA`)
    pub ticker: Option<String>,
    /// Trading date
    pub date: Option<NaiveDate>,
    /// Opening price
    pub open: Option<f64>,
    /// Session high
    pub high: Option<f64>,
    /// Session low
    pub low: Option<f64>,
    /// Closing price
    pub close: Option<f64>,
    /// Traded volume
    pub volume: Option<i64>,
    /// Close adjusted for splits and dividends
    pub adjusted_close: Option<f64>,
    /// When the row was written to the landing store
    pub loaded_at: DateTime<Utc>,
}

impl RawPriceRecord {
    /// Create a row carrying only a close price.
    pub fn new(ticker: impl Into<String>, date: NaiveDate, close: f64) -> Self {
        Self {
            ticker: Some(ticker.into()),
            date: Some(date),
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: None,
            adjusted_close: Some(close),
            loaded_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Set open, high and low prices.
    pub const fn with_ohlc(mut self, open: f64, high: f64, low: f64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self
    }

    /// Set the traded volume.
    pub const fn with_volume(mut self, volume: i64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Set the landing timestamp.
    pub const fn with_loaded_at(mut self, loaded_at: DateTime<Utc>) -> Self {
        self.loaded_at = loaded_at;
        self
    }
}

/// Raw indicator observation as stored in the landing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIndicatorRecord {
    /// SGS series code (e.g. `432` for SELIC)
    pub series_code: Option<String>,
    /// Observation date
    pub date: Option<NaiveDate>,
    /// Observed value
    pub value: Option<f64>,
    /// Unit label
    pub unit: Option<String>,
    /// Observation frequency
    pub frequency: Frequency,
    /// When the row was written to the landing store
    pub loaded_at: DateTime<Utc>,
}

impl RawIndicatorRecord {
    /// Create an observation.
    pub fn new(
        series_code: impl Into<String>,
        date: NaiveDate,
        value: f64,
        frequency: Frequency,
    ) -> Self {
        Self {
            series_code: Some(series_code.into()),
            date: Some(date),
            value: Some(value),
            unit: None,
            frequency,
            loaded_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Descriptive attributes of a tracked stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockProfile {
    /// Ticker symbol
    pub ticker: String,
    /// Company name
    pub company_name: String,
    /// Sector label
    pub sector: String,
    /// Market capitalization bucket (`Large Cap`, `Mid Cap`, ...)
    pub market_cap_category: String,
}

/// Row of the stock dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDimensionRow {
    /// Surrogate key
    pub stock_key: i64,
    /// Ticker symbol (natural key)
    pub ticker: String,
    /// Company name
    pub company_name: String,
    /// Sector label
    pub sector: String,
    /// Market capitalization bucket
    pub market_cap_category: String,
}

/// Row of the date dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateDimensionRow {
    /// Surrogate key in `YYYYMMDD` form
    pub date_key: i64,
    /// Calendar date
    pub date: NaiveDate,
    /// Calendar year
    pub year: i32,
    /// Quarter (1-4)
    pub quarter: u32,
    /// Month (1-12)
    pub month: u32,
    /// Day of month
    pub day: u32,
    /// ISO day of week (1 = Monday)
    pub day_of_week: u32,
    /// English day name
    pub day_name: String,
    /// English month name
    pub month_name: String,
    /// ISO week number
    pub week_of_year: u32,
    /// Saturday or Sunday
    pub is_weekend: bool,
    /// Listed market holiday
    pub is_holiday: bool,
    /// Holiday name when `is_holiday`
    pub holiday_name: Option<String>,
    /// Neither weekend nor holiday
    pub is_trading_day: bool,
    /// Last calendar day of the month
    pub is_month_end: bool,
}

/// Interest-rate regime bucket derived from the SELIC rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateRegime {
    /// Below 7%
    Low,
    /// 7% up to 10%
    Moderate,
    /// 10% up to 13%
    High,
    /// 13% and above
    VeryHigh,
}

impl RateRegime {
    /// Human-readable label, also the stored representation.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }

    /// Parse a stored label.
    pub fn from_label(s: &str) -> Result<Self> {
        match s {
            "Low" => Ok(Self::Low),
            "Moderate" => Ok(Self::Moderate),
            "High" => Ok(Self::High),
            "Very High" => Ok(Self::VeryHigh),
            _ => Err(DataError::Parse(format!("Invalid rate regime: {}", s))),
        }
    }
}

impl fmt::Display for RateRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of `fact_daily_market`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    /// Date dimension key (`YYYYMMDD`)
    pub date_key: i64,
    /// Stock dimension key
    pub stock_key: i64,

    // Prices
    /// Opening price
    pub open_price: Option<f64>,
    /// Session high
    pub high_price: Option<f64>,
    /// Session low
    pub low_price: Option<f64>,
    /// Closing price
    pub close_price: f64,
    /// Adjusted close
    pub adjusted_close: Option<f64>,
    /// Traded volume
    pub volume: Option<i64>,
    /// Close moved more than the suspicious threshold from open
    pub is_suspicious: bool,

    // Returns
    /// 1-day return
    pub daily_return: Option<f64>,
    /// 5-trading-day return
    pub weekly_return: Option<f64>,
    /// 21-trading-day return
    pub monthly_return: Option<f64>,
    /// 252-trading-day return
    pub yearly_return: Option<f64>,
    /// Return since the first close of the calendar year
    pub ytd_return: Option<f64>,

    // Volatility
    /// 7-observation volatility
    pub volatility_7d: Option<f64>,
    /// 30-observation volatility
    pub volatility_30d: Option<f64>,
    /// 90-observation volatility
    pub volatility_90d: Option<f64>,
    /// `volatility_30d * sqrt(252)`
    pub annualized_volatility: Option<f64>,
    /// Cross-sectional percentile of `volatility_30d`
    pub volatility_percentile: Option<f64>,

    // Indicators
    /// SELIC rate
    pub selic_rate: Option<f64>,
    /// CDI rate
    pub cdi_rate: Option<f64>,
    /// USD/BRL exchange rate
    pub usd_brl: Option<f64>,
    /// USD/BRL PTAX rate
    pub usd_brl_ptax: Option<f64>,
    /// Monthly IPCA
    pub ipca_monthly: Option<f64>,
    /// 12-month accumulated IPCA
    pub inflation_rate: Option<f64>,
    /// Monthly IGP-M
    pub igpm_monthly: Option<f64>,
    /// `selic_rate - inflation_rate`
    pub real_interest_rate: Option<f64>,
    /// `cdi_rate - selic_rate`
    pub cdi_selic_spread: Option<f64>,
    /// `usd_brl - usd_brl_ptax`
    pub usd_ptax_spread: Option<f64>,
    /// SELIC regime bucket
    pub rate_regime: Option<RateRegime>,

    /// Audit timestamp, the only column allowed to differ between runs
    pub created_at: DateTime<Utc>,
}

impl FactRow {
    /// Compare every column except `created_at`.
    pub fn same_values(&self, other: &Self) -> bool {
        let mut other = other.clone();
        other.created_at = self.created_at;
        *self == other
    }

    /// Calendar date encoded in `date_key`.
    pub fn date(&self) -> Option<NaiveDate> {
        date_from_key(self.date_key)
    }
}

/// Encode a date as a `YYYYMMDD` key.
pub fn date_key(date: NaiveDate) -> i64 {
    use chrono::Datelike;
    i64::from(date.year()) * 10_000 + i64::from(date.month()) * 100 + i64::from(date.day())
}

/// Decode a `YYYYMMDD` key.
pub fn date_from_key(key: i64) -> Option<NaiveDate> {
    let year = i32::try_from(key / 10_000).ok()?;
    let month = u32::try_from((key / 100) % 100).ok()?;
    let day = u32::try_from(key % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_conversion() {
        assert_eq!(Frequency::Daily.to_db_str(), "daily");
        assert_eq!(Frequency::from_db_str("monthly").unwrap(), Frequency::Monthly);
        assert_eq!(
            Frequency::from_db_str("quarterly").unwrap(),
            Frequency::Quarterly
        );
        assert!(Frequency::from_db_str("weekly").is_err());
        assert!(!Frequency::Daily.is_forward_filled());
        assert!(Frequency::Quarterly.is_forward_filled());
    }

    #[test]
    fn test_date_key_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date_key(date), 20240229);
        assert_eq!(date_from_key(20240229), Some(date));
        assert_eq!(date_from_key(20230229), None);
    }

    #[test]
    fn test_rate_regime_labels() {
        assert_eq!(RateRegime::VeryHigh.label(), "Very High");
        assert_eq!(RateRegime::from_label("Moderate").unwrap(), RateRegime::Moderate);
        assert!(RateRegime::from_label("Extreme").is_err());
    }

    #[test]
    fn test_raw_price_builder() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let row = RawPriceRecord::new("PETR4.SA", date, 37.5)
            .with_ohlc(37.0, 38.0, 36.5)
            .with_volume(1_000);
        assert_eq!(row.ticker.as_deref(), Some("PETR4.SA"));
        assert_eq!(row.high, Some(38.0));
        assert_eq!(row.volume, Some(1_000));
        assert_eq!(row.adjusted_close, Some(37.5));
    }
}
