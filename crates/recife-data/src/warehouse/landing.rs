//! Append-only landing tables.

use super::{Warehouse, parse_timestamp_column};
use crate::error::Result;
use crate::records::{Frequency, RawIndicatorRecord, RawPriceRecord};
use chrono::NaiveDate;
use rusqlite::params;
use rusqlite::types::Type;
use serde::Serialize;

/// Landing rows removed by [`Warehouse::purge_malformed_landing_rows`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeOutcome {
    /// Price rows without a ticker or date
    pub prices: usize,
    /// Indicator rows without a series code or date
    pub indicators: usize,
}

impl PurgeOutcome {
    /// Rows removed from both tables.
    pub const fn total(&self) -> usize {
        self.prices + self.indicators
    }
}

/// Landing dates that fail to parse are surfaced as missing so the cleaning
/// stage rejects the row as malformed.
fn lenient_date(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

impl Warehouse {
    /// Append raw price rows, ignoring rows whose `(ticker, date)` already exists.
    ///
    /// Returns the number of rows actually inserted.
    pub fn insert_raw_prices(&self, rows: &[RawPriceRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO raw_stocks
                 (ticker, date, open, high, low, close, volume, adjusted_close, loaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;

            for row in rows {
                inserted += stmt.execute(params![
                    row.ticker,
                    row.date.map(|d| d.to_string()),
                    row.open,
                    row.high,
                    row.low,
                    row.close,
                    row.volume,
                    row.adjusted_close,
                    row.loaded_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            received = rows.len(),
            inserted,
            skipped = rows.len() - inserted,
            "landed raw price rows"
        );
        Ok(inserted)
    }

    /// Append raw indicator rows, ignoring rows whose `(series_code, date)` already exists.
    ///
    /// Returns the number of rows actually inserted.
    pub fn insert_raw_indicators(&self, rows: &[RawIndicatorRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO raw_indicators
                 (indicator_code, date, value, unit, frequency, loaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for row in rows {
                inserted += stmt.execute(params![
                    row.series_code,
                    row.date.map(|d| d.to_string()),
                    row.value,
                    row.unit,
                    row.frequency.to_db_str(),
                    row.loaded_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        tracing::info!(
            received = rows.len(),
            inserted,
            skipped = rows.len() - inserted,
            "landed raw indicator rows"
        );
        Ok(inserted)
    }

    /// Delete landing rows missing a business key.
    ///
    /// Such rows never match the uniqueness constraint and make every run
    /// fail in the cleaning stage until they are removed. Both tables are
    /// purged in one transaction.
    pub fn purge_malformed_landing_rows(&self) -> Result<PurgeOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let prices = tx.execute(
            "DELETE FROM raw_stocks
             WHERE ticker IS NULL OR TRIM(ticker) = '' OR date IS NULL",
            [],
        )?;
        let indicators = tx.execute(
            "DELETE FROM raw_indicators
             WHERE indicator_code IS NULL OR TRIM(indicator_code) = '' OR date IS NULL",
            [],
        )?;
        tx.commit()?;

        let outcome = PurgeOutcome { prices, indicators };
        if outcome.total() > 0 {
            tracing::warn!(prices, indicators, "purged malformed landing rows");
        } else {
            tracing::info!("no malformed landing rows");
        }
        Ok(outcome)
    }

    /// Read every landed price row, ordered by ticker and date.
    pub fn load_raw_prices(&self) -> Result<Vec<RawPriceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT ticker, date, open, high, low, close, volume, adjusted_close, loaded_at
             FROM raw_stocks
             ORDER BY ticker ASC, date ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(RawPriceRecord {
                ticker: row.get(0)?,
                date: lenient_date(row.get(1)?),
                open: row.get(2)?,
                high: row.get(3)?,
                low: row.get(4)?,
                close: row.get(5)?,
                volume: row.get(6)?,
                adjusted_close: row.get(7)?,
                loaded_at: parse_timestamp_column(8, &row.get::<_, String>(8)?)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Read every landed indicator row, ordered by series code and date.
    pub fn load_raw_indicators(&self) -> Result<Vec<RawIndicatorRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT indicator_code, date, value, unit, frequency, loaded_at
             FROM raw_indicators
             ORDER BY indicator_code ASC, date ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(RawIndicatorRecord {
                series_code: row.get(0)?,
                date: lenient_date(row.get(1)?),
                value: row.get(2)?,
                unit: row.get(3)?,
                frequency: Frequency::from_db_str(&row.get::<_, String>(4)?).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
                })?,
                loaded_at: parse_timestamp_column(5, &row.get::<_, String>(5)?)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }
}
