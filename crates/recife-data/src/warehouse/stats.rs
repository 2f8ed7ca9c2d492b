//! Warehouse statistics and landing-layer quality counters.

use super::{Warehouse, parse_date_column};
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;

/// Warehouse statistics.
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseStats {
    /// Rows in `raw_stocks`
    pub raw_price_rows: usize,
    /// Rows in `raw_indicators`
    pub raw_indicator_rows: usize,
    /// Distinct tickers landed
    pub landed_tickers: usize,
    /// Rows in `dim_date`
    pub date_dimension_rows: usize,
    /// Trading days in `dim_date`
    pub trading_days: usize,
    /// Rows in `dim_stock`
    pub stock_dimension_rows: usize,
    /// Rows in `fact_daily_market`
    pub fact_rows: usize,
    /// Latest fact date
    pub watermark: Option<NaiveDate>,
}

/// Quality counters over `raw_stocks`.
#[derive(Debug, Clone, Serialize)]
pub struct RawPriceQuality {
    /// Total rows
    pub total_rows: usize,
    /// Distinct tickers
    pub unique_tickers: usize,
    /// Earliest landed date
    pub earliest_date: Option<NaiveDate>,
    /// Latest landed date
    pub latest_date: Option<NaiveDate>,
    /// Rows without ticker or date
    pub missing_keys: usize,
    /// Rows without close
    pub null_prices: usize,
    /// Rows with close <= 0
    pub invalid_prices: usize,
    /// Rows with high < low
    pub invalid_ranges: usize,
}

impl RawPriceQuality {
    /// Whether the landing table passes every check.
    pub const fn passed(&self) -> bool {
        self.missing_keys == 0
            && self.null_prices == 0
            && self.invalid_prices == 0
            && self.invalid_ranges == 0
    }
}

/// Quality counters over `raw_indicators`.
#[derive(Debug, Clone, Serialize)]
pub struct RawIndicatorQuality {
    /// Total rows
    pub total_rows: usize,
    /// Distinct series codes
    pub unique_indicators: usize,
    /// Earliest landed date
    pub earliest_date: Option<NaiveDate>,
    /// Latest landed date
    pub latest_date: Option<NaiveDate>,
    /// Rows without series code or date
    pub missing_keys: usize,
    /// Rows without value
    pub null_values: usize,
}

impl RawIndicatorQuality {
    /// Whether the landing table passes every check.
    pub const fn passed(&self) -> bool {
        self.missing_keys == 0 && self.null_values == 0
    }
}

fn optional_date(value: Option<String>) -> Result<Option<NaiveDate>> {
    Ok(value.map(|s| parse_date_column(0, &s)).transpose()?)
}

impl Warehouse {
    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get warehouse statistics.
    pub fn get_stats(&self) -> Result<WarehouseStats> {
        Ok(WarehouseStats {
            raw_price_rows: self.count("SELECT COUNT(*) FROM raw_stocks")?,
            raw_indicator_rows: self.count("SELECT COUNT(*) FROM raw_indicators")?,
            landed_tickers: self.count("SELECT COUNT(DISTINCT ticker) FROM raw_stocks")?,
            date_dimension_rows: self.count("SELECT COUNT(*) FROM dim_date")?,
            trading_days: self.count("SELECT COUNT(*) FROM dim_date WHERE is_trading_day = 1")?,
            stock_dimension_rows: self.count("SELECT COUNT(*) FROM dim_stock")?,
            fact_rows: self.fact_count()?,
            watermark: self.fact_watermark()?,
        })
    }

    /// Quality counters over the raw price landing table.
    pub fn raw_price_quality(&self) -> Result<RawPriceQuality> {
        let (total, tickers, earliest, latest, missing, nulls, invalid, ranges) =
            self.conn.query_row(
                "SELECT
                    COUNT(*),
                    COUNT(DISTINCT ticker),
                    MIN(date),
                    MAX(date),
                    COUNT(CASE WHEN ticker IS NULL OR date IS NULL THEN 1 END),
                    COUNT(CASE WHEN close IS NULL THEN 1 END),
                    COUNT(CASE WHEN close <= 0 THEN 1 END),
                    COUNT(CASE WHEN high < low THEN 1 END)
                 FROM raw_stocks",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                    ))
                },
            )?;

        Ok(RawPriceQuality {
            total_rows: total as usize,
            unique_tickers: tickers as usize,
            earliest_date: optional_date(earliest)?,
            latest_date: optional_date(latest)?,
            missing_keys: missing as usize,
            null_prices: nulls as usize,
            invalid_prices: invalid as usize,
            invalid_ranges: ranges as usize,
        })
    }

    /// Quality counters over the raw indicator landing table.
    pub fn raw_indicator_quality(&self) -> Result<RawIndicatorQuality> {
        let (total, indicators, earliest, latest, missing, nulls) = self.conn.query_row(
            "SELECT
                COUNT(*),
                COUNT(DISTINCT indicator_code),
                MIN(date),
                MAX(date),
                COUNT(CASE WHEN indicator_code IS NULL OR date IS NULL THEN 1 END),
                COUNT(CASE WHEN value IS NULL THEN 1 END)
             FROM raw_indicators",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )?;

        Ok(RawIndicatorQuality {
            total_rows: total as usize,
            unique_indicators: indicators as usize,
            earliest_date: optional_date(earliest)?,
            latest_date: optional_date(latest)?,
            missing_keys: missing as usize,
            null_values: nulls as usize,
        })
    }
}
