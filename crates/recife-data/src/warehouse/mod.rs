//! SQLite warehouse holding the landing tables, the star schema and the run
//! lock.

mod dimensions;
mod facts;
mod landing;
mod lock;
mod stats;

pub use facts::FactWriteMode;
pub use landing::PurgeOutcome;
pub use lock::{PIPELINE_LOCK, RunLock};
pub use stats::{RawIndicatorQuality, RawPriceQuality, WarehouseStats};

use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use std::path::Path;

/// SQLite-backed warehouse.
#[derive(Debug)]
pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    /// Open (or create) a warehouse file.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let warehouse = Self { conn };
        warehouse.initialize_schema()?;
        Ok(warehouse)
    }

    /// Create an in-memory warehouse (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let warehouse = Self { conn };
        warehouse.initialize_schema()?;
        Ok(warehouse)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        // Landing tables: nullable keys so malformed rows survive until cleaning rejects them
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS raw_stocks (
                ticker TEXT,
                date TEXT,
                open REAL,
                high REAL,
                low REAL,
                close REAL,
                volume INTEGER,
                adjusted_close REAL,
                loaded_at TEXT NOT NULL,
                UNIQUE (ticker, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS raw_indicators (
                indicator_code TEXT,
                date TEXT,
                value REAL,
                unit TEXT,
                frequency TEXT NOT NULL,
                loaded_at TEXT NOT NULL,
                UNIQUE (indicator_code, date)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS dim_date (
                date_key INTEGER PRIMARY KEY,
                date TEXT NOT NULL UNIQUE,
                year INTEGER NOT NULL,
                quarter INTEGER NOT NULL,
                month INTEGER NOT NULL,
                day INTEGER NOT NULL,
                day_of_week INTEGER NOT NULL,
                day_name TEXT NOT NULL,
                month_name TEXT NOT NULL,
                week_of_year INTEGER NOT NULL,
                is_weekend INTEGER NOT NULL,
                is_holiday INTEGER NOT NULL,
                holiday_name TEXT,
                is_trading_day INTEGER NOT NULL,
                is_month_end INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS dim_stock (
                stock_key INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL UNIQUE,
                company_name TEXT NOT NULL,
                sector TEXT NOT NULL,
                market_cap_category TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS fact_daily_market (
                date_key INTEGER NOT NULL REFERENCES dim_date (date_key),
                stock_key INTEGER NOT NULL REFERENCES dim_stock (stock_key),

                open_price REAL,
                high_price REAL,
                low_price REAL,
                close_price REAL NOT NULL,
                adjusted_close REAL,
                volume INTEGER,
                is_suspicious INTEGER NOT NULL,

                daily_return REAL,
                weekly_return REAL,
                monthly_return REAL,
                yearly_return REAL,
                ytd_return REAL,

                volatility_7d REAL,
                volatility_30d REAL,
                volatility_90d REAL,
                annualized_volatility REAL,
                volatility_percentile REAL,

                selic_rate REAL,
                cdi_rate REAL,
                usd_brl REAL,
                usd_brl_ptax REAL,
                ipca_monthly REAL,
                inflation_rate REAL,
                igpm_monthly REAL,
                real_interest_rate REAL,
                cdi_selic_spread REAL,
                usd_ptax_spread REAL,
                rate_regime TEXT,

                created_at TEXT NOT NULL,
                PRIMARY KEY (date_key, stock_key)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fact_stock_date ON fact_daily_market(stock_key, date_key)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS run_lock (
                lock_name TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                acquired_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }
}

/// Parse a stored `YYYY-MM-DD` column.
fn parse_date_column(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a stored RFC 3339 timestamp column.
fn parse_timestamp_column(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
