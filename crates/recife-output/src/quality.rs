//! Data-quality report across the warehouse layers.
//!
//! The landing-layer counters come straight from SQL; the fact-layer checks
//! are aggregated with polars over the loaded fact rows.

use crate::export::ExportError;
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use recife_data::{FactRow, RawIndicatorQuality, RawPriceQuality, Warehouse, date_from_key};
use serde::Serialize;

/// Absolute daily return above which a fact row counts as extreme.
pub const EXTREME_RETURN_THRESHOLD: f64 = 1.0;

/// Quality counters over `fact_daily_market`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactQuality {
    /// Total rows
    pub total_rows: usize,
    /// Distinct stocks
    pub unique_stocks: usize,
    /// Earliest fact date
    pub earliest_date: Option<NaiveDate>,
    /// Latest fact date
    pub latest_date: Option<NaiveDate>,
    /// Rows with close `<= 0`
    pub invalid_prices: usize,
    /// Rows with `|daily_return| > 1`
    pub extreme_returns: usize,
    /// Rows flagged suspicious during cleaning
    pub suspicious_rows: usize,
    /// Rows without a SELIC observation
    pub missing_selic: usize,
}

impl FactQuality {
    /// Whether the fact table passes its blocking checks.
    ///
    /// Extreme returns, suspicious rows and indicator gaps are informational.
    pub const fn passed(&self) -> bool {
        self.invalid_prices == 0
    }
}

fn fact_frame(rows: &[FactRow]) -> PolarsResult<DataFrame> {
    let date_keys: Vec<i64> = rows.iter().map(|r| r.date_key).collect();
    let stock_keys: Vec<i64> = rows.iter().map(|r| r.stock_key).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.close_price).collect();
    let daily_returns: Vec<Option<f64>> = rows.iter().map(|r| r.daily_return).collect();
    let suspicious: Vec<bool> = rows.iter().map(|r| r.is_suspicious).collect();
    let selic: Vec<Option<f64>> = rows.iter().map(|r| r.selic_rate).collect();

    DataFrame::new(vec![
        Series::new("date_key".into(), date_keys).into(),
        Series::new("stock_key".into(), stock_keys).into(),
        Series::new("close_price".into(), closes).into(),
        Series::new("daily_return".into(), daily_returns).into(),
        Series::new("is_suspicious".into(), suspicious).into(),
        Series::new("selic_rate".into(), selic).into(),
    ])
}

fn count_at(df: &DataFrame, name: &str) -> PolarsResult<usize> {
    let column = df.column(name)?.cast(&DataType::UInt64)?;
    Ok(column.u64()?.get(0).unwrap_or(0) as usize)
}

fn date_at(df: &DataFrame, name: &str) -> PolarsResult<Option<NaiveDate>> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.get(0).and_then(date_from_key))
}

/// Compute fact-layer quality counters.
pub fn fact_quality(rows: &[FactRow]) -> Result<FactQuality, ExportError> {
    let stats = fact_frame(rows)?
        .lazy()
        .select([
            len().alias("total_rows"),
            col("stock_key").n_unique().alias("unique_stocks"),
            col("date_key").min().alias("earliest"),
            col("date_key").max().alias("latest"),
            col("close_price")
                .lt_eq(lit(0.0))
                .cast(DataType::UInt64)
                .sum()
                .alias("invalid_prices"),
            col("daily_return")
                .gt(lit(EXTREME_RETURN_THRESHOLD))
                .or(col("daily_return").lt(lit(-EXTREME_RETURN_THRESHOLD)))
                .cast(DataType::UInt64)
                .sum()
                .alias("extreme_returns"),
            col("is_suspicious")
                .cast(DataType::UInt64)
                .sum()
                .alias("suspicious_rows"),
            col("selic_rate").null_count().alias("missing_selic"),
        ])
        .collect()?;

    Ok(FactQuality {
        total_rows: count_at(&stats, "total_rows")?,
        unique_stocks: count_at(&stats, "unique_stocks")?,
        earliest_date: date_at(&stats, "earliest")?,
        latest_date: date_at(&stats, "latest")?,
        invalid_prices: count_at(&stats, "invalid_prices")?,
        extreme_returns: count_at(&stats, "extreme_returns")?,
        suspicious_rows: count_at(&stats, "suspicious_rows")?,
        missing_selic: count_at(&stats, "missing_selic")?,
    })
}

/// Quality report over the landing and fact layers.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    /// When the report was generated
    pub generated_at: DateTime<Utc>,
    /// `raw_stocks` counters
    pub raw_prices: RawPriceQuality,
    /// `raw_indicators` counters
    pub raw_indicators: RawIndicatorQuality,
    /// `fact_daily_market` counters
    pub facts: FactQuality,
}

fn status(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!("{} to {}", s, e),
        _ => "empty".to_string(),
    }
}

impl QualityReport {
    /// Run every check against the warehouse.
    pub fn collect(warehouse: &Warehouse) -> Result<Self, ExportError> {
        let facts = warehouse.load_facts(None)?;
        Ok(Self {
            generated_at: Utc::now(),
            raw_prices: warehouse.raw_price_quality()?,
            raw_indicators: warehouse.raw_indicator_quality()?,
            facts: fact_quality(&facts)?,
        })
    }

    /// Whether every layer passes.
    pub const fn passed(&self) -> bool {
        self.raw_prices.passed() && self.raw_indicators.passed() && self.facts.passed()
    }

    /// Render as an ASCII table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nData Validation Report\n");
        output.push_str(&format!(
            "Generated: {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        output.push_str(&"=".repeat(60));
        output.push('\n');

        let p = &self.raw_prices;
        output.push_str("\nraw_stocks:\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!("  {:<24}{}\n", "total_rows", p.total_rows));
        output.push_str(&format!("  {:<24}{}\n", "unique_tickers", p.unique_tickers));
        output.push_str(&format!(
            "  {:<24}{}\n",
            "date_range",
            date_range(p.earliest_date, p.latest_date)
        ));
        output.push_str(&format!("  {:<24}{}\n", "missing_keys", p.missing_keys));
        output.push_str(&format!("  {:<24}{}\n", "null_prices", p.null_prices));
        output.push_str(&format!("  {:<24}{}\n", "invalid_prices", p.invalid_prices));
        output.push_str(&format!("  {:<24}{}\n", "invalid_ranges", p.invalid_ranges));
        output.push_str(&format!("  {:<24}{}\n", "status", status(p.passed())));

        let i = &self.raw_indicators;
        output.push_str("\nraw_indicators:\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!("  {:<24}{}\n", "total_rows", i.total_rows));
        output.push_str(&format!("  {:<24}{}\n", "unique_indicators", i.unique_indicators));
        output.push_str(&format!(
            "  {:<24}{}\n",
            "date_range",
            date_range(i.earliest_date, i.latest_date)
        ));
        output.push_str(&format!("  {:<24}{}\n", "missing_keys", i.missing_keys));
        output.push_str(&format!("  {:<24}{}\n", "null_values", i.null_values));
        output.push_str(&format!("  {:<24}{}\n", "status", status(i.passed())));

        let f = &self.facts;
        output.push_str("\nfact_daily_market:\n");
        output.push_str(&"-".repeat(60));
        output.push('\n');
        output.push_str(&format!("  {:<24}{}\n", "total_rows", f.total_rows));
        output.push_str(&format!("  {:<24}{}\n", "unique_stocks", f.unique_stocks));
        output.push_str(&format!(
            "  {:<24}{}\n",
            "date_range",
            date_range(f.earliest_date, f.latest_date)
        ));
        output.push_str(&format!("  {:<24}{}\n", "invalid_prices", f.invalid_prices));
        output.push_str(&format!("  {:<24}{}\n", "extreme_returns", f.extreme_returns));
        output.push_str(&format!("  {:<24}{}\n", "suspicious_rows", f.suspicious_rows));
        output.push_str(&format!("  {:<24}{}\n", "missing_selic", f.missing_selic));
        output.push_str(&format!("  {:<24}{}\n", "status", status(f.passed())));

        output.push('\n');
        output.push_str(&"=".repeat(60));
        output.push('\n');
        if self.passed() {
            output.push_str("ALL VALIDATIONS PASSED\n");
        } else {
            output.push_str("SOME VALIDATIONS FAILED\n");
        }

        output
    }

    /// Render as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Data Validation Report\n\n");
        output.push_str(&format!(
            "**Generated:** {}\n\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));

        output.push_str("| Table | Rows | Date Range | Issues | Status |\n");
        output.push_str("|-------|------|------------|--------|--------|\n");

        let p = &self.raw_prices;
        output.push_str(&format!(
            "| raw_stocks | {} | {} | {} | {} |\n",
            p.total_rows,
            date_range(p.earliest_date, p.latest_date),
            p.missing_keys + p.null_prices + p.invalid_prices + p.invalid_ranges,
            status(p.passed())
        ));
        let i = &self.raw_indicators;
        output.push_str(&format!(
            "| raw_indicators | {} | {} | {} | {} |\n",
            i.total_rows,
            date_range(i.earliest_date, i.latest_date),
            i.missing_keys + i.null_values,
            status(i.passed())
        ));
        let f = &self.facts;
        output.push_str(&format!(
            "| fact_daily_market | {} | {} | {} | {} |\n",
            f.total_rows,
            date_range(f.earliest_date, f.latest_date),
            f.invalid_prices,
            status(f.passed())
        ));

        if f.extreme_returns > 0 || f.suspicious_rows > 0 {
            output.push_str(&format!(
                "\n{} extreme return(s) and {} suspicious row(s) in the fact table.\n",
                f.extreme_returns, f.suspicious_rows
            ));
        }

        output
    }
}
