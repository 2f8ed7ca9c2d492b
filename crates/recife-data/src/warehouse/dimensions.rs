//! Date and stock dimensions.

use super::{Warehouse, parse_date_column};
use crate::error::Result;
use crate::records::{DateDimensionRow, StockDimensionRow, StockProfile};
use chrono::NaiveDate;
use rusqlite::params;

impl Warehouse {
    /// Insert the date-dimension rows whose date is not stored yet.
    ///
    /// Stored rows are immutable: a row for an existing date is skipped even
    /// when its attributes differ. Returns the number of rows inserted, so a
    /// wider calendar extends the dimension and an unchanged one inserts `0`.
    pub fn ensure_date_dimension(&self, rows: &[DateDimensionRow]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO dim_date (
                    date_key, date, year, quarter, month, day, day_of_week, day_name,
                    month_name, week_of_year, is_weekend, is_holiday, holiday_name,
                    is_trading_day, is_month_end
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            )?;

            for row in rows {
                inserted += stmt.execute(params![
                    row.date_key,
                    row.date.to_string(),
                    row.year,
                    row.quarter,
                    row.month,
                    row.day,
                    row.day_of_week,
                    row.day_name,
                    row.month_name,
                    row.week_of_year,
                    row.is_weekend,
                    row.is_holiday,
                    row.holiday_name,
                    row.is_trading_day,
                    row.is_month_end,
                ])?;
            }
        }
        tx.commit()?;

        if inserted > 0 {
            tracing::info!(inserted, requested = rows.len(), "extended date dimension");
        } else {
            tracing::debug!(requested = rows.len(), "date dimension up to date");
        }
        Ok(inserted)
    }

    /// First and last stored dimension dates, `None` when empty.
    pub fn date_dimension_bounds(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let (first, last): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM dim_date",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        match (first, last) {
            (Some(f), Some(l)) => Ok(Some((parse_date_column(0, &f)?, parse_date_column(1, &l)?))),
            _ => Ok(None),
        }
    }

    /// Read the date dimension ordered by date.
    pub fn load_date_dimension(&self) -> Result<Vec<DateDimensionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT date_key, date, year, quarter, month, day, day_of_week, day_name,
                    month_name, week_of_year, is_weekend, is_holiday, holiday_name,
                    is_trading_day, is_month_end
             FROM dim_date
             ORDER BY date_key ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(DateDimensionRow {
                date_key: row.get(0)?,
                date: parse_date_column(1, &row.get::<_, String>(1)?)?,
                year: row.get(2)?,
                quarter: row.get(3)?,
                month: row.get(4)?,
                day: row.get(5)?,
                day_of_week: row.get(6)?,
                day_name: row.get(7)?,
                month_name: row.get(8)?,
                week_of_year: row.get(9)?,
                is_weekend: row.get(10)?,
                is_holiday: row.get(11)?,
                holiday_name: row.get(12)?,
                is_trading_day: row.get(13)?,
                is_month_end: row.get(14)?,
            })
        })?;

        let mut dimension = Vec::new();
        for row in rows {
            dimension.push(row?);
        }

        Ok(dimension)
    }

    /// Insert or refresh stock profiles.
    ///
    /// Surrogate keys are assigned on first insert and never change.
    pub fn sync_stock_dimension(&self, profiles: &[StockProfile]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dim_stock (ticker, company_name, sector, market_cap_category)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (ticker) DO UPDATE SET
                    company_name = excluded.company_name,
                    sector = excluded.sector,
                    market_cap_category = excluded.market_cap_category",
            )?;

            for profile in profiles {
                stmt.execute(params![
                    profile.ticker,
                    profile.company_name,
                    profile.sector,
                    profile.market_cap_category,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(profiles = profiles.len(), "synced stock dimension");
        Ok(())
    }

    /// Read the stock dimension ordered by surrogate key.
    pub fn load_stock_dimension(&self) -> Result<Vec<StockDimensionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT stock_key, ticker, company_name, sector, market_cap_category
             FROM dim_stock
             ORDER BY stock_key ASC",
        )?;

        let stocks = stmt
            .query_map([], |row| {
                Ok(StockDimensionRow {
                    stock_key: row.get(0)?,
                    ticker: row.get(1)?,
                    company_name: row.get(2)?,
                    sector: row.get(3)?,
                    market_cap_category: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_row(date: NaiveDate, trading: bool) -> DateDimensionRow {
        DateDimensionRow {
            date_key: crate::records::date_key(date),
            date,
            year: 2024,
            quarter: 1,
            month: 1,
            day: 1,
            day_of_week: 1,
            day_name: "Monday".to_string(),
            month_name: "January".to_string(),
            week_of_year: 1,
            is_weekend: false,
            is_holiday: !trading,
            holiday_name: (!trading).then(|| "Test Holiday".to_string()),
            is_trading_day: trading,
            is_month_end: false,
        }
    }

    fn profile(ticker: &str, sector: &str) -> StockProfile {
        StockProfile {
            ticker: ticker.to_string(),
            company_name: format!("{} S.A.", ticker),
            sector: sector.to_string(),
            market_cap_category: "Large Cap".to_string(),
        }
    }

    #[test]
    fn test_date_dimension_extends_but_never_rewrites() {
        let warehouse = Warehouse::in_memory().unwrap();
        let jan = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        assert_eq!(warehouse.date_dimension_bounds().unwrap(), None);

        let first = vec![date_row(jan(1), false), date_row(jan(2), true)];
        assert_eq!(warehouse.ensure_date_dimension(&first).unwrap(), 2);
        assert_eq!(warehouse.ensure_date_dimension(&first).unwrap(), 0);

        // Jan 1 now claims to trade; the stored row wins
        let wider = vec![date_row(jan(1), true), date_row(jan(2), true), date_row(jan(3), true)];
        assert_eq!(warehouse.ensure_date_dimension(&wider).unwrap(), 1);

        let loaded = warehouse.load_date_dimension().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(&loaded[..2], &first[..]);
        assert_eq!(
            warehouse.date_dimension_bounds().unwrap(),
            Some((jan(1), jan(3)))
        );
    }

    #[test]
    fn test_stock_keys_are_stable() {
        let warehouse = Warehouse::in_memory().unwrap();
        warehouse
            .sync_stock_dimension(&[profile("PETR4.SA", "Energy"), profile("VALE3.SA", "Materials")])
            .unwrap();
        let before = warehouse.load_stock_dimension().unwrap();

        warehouse
            .sync_stock_dimension(&[profile("VALE3.SA", "Mining"), profile("ITUB4.SA", "Financials")])
            .unwrap();
        let after = warehouse.load_stock_dimension().unwrap();

        assert_eq!(after.len(), 3);
        assert_eq!(after[0].stock_key, before[0].stock_key);
        assert_eq!(after[1].stock_key, before[1].stock_key);
        assert_eq!(after[1].sector, "Mining");
        assert_eq!(after[2].ticker, "ITUB4.SA");
    }
}
