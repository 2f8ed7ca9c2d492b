//! Fact store: `fact_daily_market`.

use super::{Warehouse, parse_date_column, parse_timestamp_column};
use crate::error::{DataError, Result};
use crate::records::{FactRow, RateRegime};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

/// How a batch of fact rows is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactWriteMode {
    /// Insert new keys and overwrite business columns of existing keys.
    /// `created_at` of existing keys is kept.
    Upsert,
    /// Delete every fact row, then insert the batch.
    ReplaceAll,
}

const FACT_COLUMNS: &str = "date_key, stock_key,
    open_price, high_price, low_price, close_price, adjusted_close, volume, is_suspicious,
    daily_return, weekly_return, monthly_return, yearly_return, ytd_return,
    volatility_7d, volatility_30d, volatility_90d, annualized_volatility, volatility_percentile,
    selic_rate, cdi_rate, usd_brl, usd_brl_ptax, ipca_monthly, inflation_rate, igpm_monthly,
    real_interest_rate, cdi_selic_spread, usd_ptax_spread, rate_regime,
    created_at";

const UPSERT_FACT_SQL: &str = "INSERT INTO fact_daily_market (
    date_key, stock_key,
    open_price, high_price, low_price, close_price, adjusted_close, volume, is_suspicious,
    daily_return, weekly_return, monthly_return, yearly_return, ytd_return,
    volatility_7d, volatility_30d, volatility_90d, annualized_volatility, volatility_percentile,
    selic_rate, cdi_rate, usd_brl, usd_brl_ptax, ipca_monthly, inflation_rate, igpm_monthly,
    real_interest_rate, cdi_selic_spread, usd_ptax_spread, rate_regime,
    created_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
          ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31)
ON CONFLICT (date_key, stock_key) DO UPDATE SET
    open_price = excluded.open_price,
    high_price = excluded.high_price,
    low_price = excluded.low_price,
    close_price = excluded.close_price,
    adjusted_close = excluded.adjusted_close,
    volume = excluded.volume,
    is_suspicious = excluded.is_suspicious,
    daily_return = excluded.daily_return,
    weekly_return = excluded.weekly_return,
    monthly_return = excluded.monthly_return,
    yearly_return = excluded.yearly_return,
    ytd_return = excluded.ytd_return,
    volatility_7d = excluded.volatility_7d,
    volatility_30d = excluded.volatility_30d,
    volatility_90d = excluded.volatility_90d,
    annualized_volatility = excluded.annualized_volatility,
    volatility_percentile = excluded.volatility_percentile,
    selic_rate = excluded.selic_rate,
    cdi_rate = excluded.cdi_rate,
    usd_brl = excluded.usd_brl,
    usd_brl_ptax = excluded.usd_brl_ptax,
    ipca_monthly = excluded.ipca_monthly,
    inflation_rate = excluded.inflation_rate,
    igpm_monthly = excluded.igpm_monthly,
    real_interest_rate = excluded.real_interest_rate,
    cdi_selic_spread = excluded.cdi_selic_spread,
    usd_ptax_spread = excluded.usd_ptax_spread,
    rate_regime = excluded.rate_regime";

fn fact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FactRow> {
    let rate_regime = row
        .get::<_, Option<String>>(29)?
        .map(|label| {
            RateRegime::from_label(&label)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(29, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(FactRow {
        date_key: row.get(0)?,
        stock_key: row.get(1)?,
        open_price: row.get(2)?,
        high_price: row.get(3)?,
        low_price: row.get(4)?,
        close_price: row.get(5)?,
        adjusted_close: row.get(6)?,
        volume: row.get(7)?,
        is_suspicious: row.get(8)?,
        daily_return: row.get(9)?,
        weekly_return: row.get(10)?,
        monthly_return: row.get(11)?,
        yearly_return: row.get(12)?,
        ytd_return: row.get(13)?,
        volatility_7d: row.get(14)?,
        volatility_30d: row.get(15)?,
        volatility_90d: row.get(16)?,
        annualized_volatility: row.get(17)?,
        volatility_percentile: row.get(18)?,
        selic_rate: row.get(19)?,
        cdi_rate: row.get(20)?,
        usd_brl: row.get(21)?,
        usd_brl_ptax: row.get(22)?,
        ipca_monthly: row.get(23)?,
        inflation_rate: row.get(24)?,
        igpm_monthly: row.get(25)?,
        real_interest_rate: row.get(26)?,
        cdi_selic_spread: row.get(27)?,
        usd_ptax_spread: row.get(28)?,
        rate_regime,
        created_at: parse_timestamp_column(30, &row.get::<_, String>(30)?)?,
    })
}

impl Warehouse {
    /// Latest date present in the fact store, resolved through the date dimension.
    ///
    /// `None` when the fact store is empty.
    pub fn fact_watermark(&self) -> Result<Option<NaiveDate>> {
        let max_date: Option<String> = self
            .conn
            .query_row(
                "SELECT MAX(d.date)
                 FROM fact_daily_market f
                 JOIN dim_date d ON f.date_key = d.date_key",
                [],
                |row| row.get(0),
            )
            .optional()?
            .flatten();

        max_date
            .map(|s| parse_date_column(0, &s).map_err(DataError::from))
            .transpose()
    }

    /// Write a batch of fact rows in a single transaction.
    ///
    /// Either every row is written or, on any error, the fact store is left
    /// exactly as it was before the call.
    pub fn write_facts(&self, rows: &[FactRow], mode: FactWriteMode) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;

        if mode == FactWriteMode::ReplaceAll {
            let removed = tx.execute("DELETE FROM fact_daily_market", [])?;
            tracing::info!(removed, "cleared fact store for full refresh");
        }

        {
            let mut stmt = tx.prepare(UPSERT_FACT_SQL)?;
            for row in rows {
                stmt.execute(params![
                    row.date_key,
                    row.stock_key,
                    row.open_price,
                    row.high_price,
                    row.low_price,
                    row.close_price,
                    row.adjusted_close,
                    row.volume,
                    row.is_suspicious,
                    row.daily_return,
                    row.weekly_return,
                    row.monthly_return,
                    row.yearly_return,
                    row.ytd_return,
                    row.volatility_7d,
                    row.volatility_30d,
                    row.volatility_90d,
                    row.annualized_volatility,
                    row.volatility_percentile,
                    row.selic_rate,
                    row.cdi_rate,
                    row.usd_brl,
                    row.usd_brl_ptax,
                    row.ipca_monthly,
                    row.inflation_rate,
                    row.igpm_monthly,
                    row.real_interest_rate,
                    row.cdi_selic_spread,
                    row.usd_ptax_spread,
                    row.rate_regime.map(|r| r.label()),
                    row.created_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(rows.len())
    }

    /// Read fact rows ordered by date and stock, optionally for a single ticker.
    pub fn load_facts(&self, ticker: Option<&str>) -> Result<Vec<FactRow>> {
        let sql = format!(
            "SELECT {}
             FROM fact_daily_market
             WHERE ?1 IS NULL
                OR stock_key IN (SELECT stock_key FROM dim_stock WHERE ticker = ?1)
             ORDER BY date_key ASC, stock_key ASC",
            FACT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let facts = stmt
            .query_map(params![ticker], fact_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(facts)
    }

    /// Number of rows in the fact store.
    pub fn fact_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM fact_daily_market", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
