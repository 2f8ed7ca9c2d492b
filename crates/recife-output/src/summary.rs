//! Sector snapshot of the latest fact date.

use crate::export::ExportError;
use chrono::NaiveDate;
use polars::prelude::*;
use recife_data::{FactRow, StockDimensionRow, date_from_key};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Aggregates for one sector on one date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectorSnapshot {
    /// Sector label
    pub sector: String,
    /// Stocks with a fact row on the date
    pub stocks: usize,
    /// Mean daily return
    pub mean_daily_return: Option<f64>,
    /// Mean year-to-date return
    pub mean_ytd_return: Option<f64>,
    /// Mean annualized volatility
    pub mean_annualized_volatility: Option<f64>,
}

impl fmt::Display for SectorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} stock(s), ytd {}",
            self.sector,
            self.stocks,
            pct(self.mean_ytd_return)
        )
    }
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

/// Market snapshot by sector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketSummary {
    /// Snapshot date
    pub date: NaiveDate,
    /// One entry per sector, sorted by sector name
    pub sectors: Vec<SectorSnapshot>,
}

/// Summarize the latest fact date by sector.
///
/// Returns `None` when there are no fact rows.
pub fn latest_sector_summary(
    facts: &[FactRow],
    stocks: &[StockDimensionRow],
) -> Result<Option<MarketSummary>, ExportError> {
    let Some(latest_key) = facts.iter().map(|r| r.date_key).max() else {
        return Ok(None);
    };
    let Some(date) = date_from_key(latest_key) else {
        return Ok(None);
    };

    let sectors: HashMap<i64, &str> = stocks
        .iter()
        .map(|s| (s.stock_key, s.sector.as_str()))
        .collect();
    let latest: Vec<&FactRow> = facts.iter().filter(|r| r.date_key == latest_key).collect();

    let sector_col: Vec<String> = latest
        .iter()
        .map(|r| sectors.get(&r.stock_key).unwrap_or(&"Unknown").to_string())
        .collect();
    let stock_col: Vec<i64> = latest.iter().map(|r| r.stock_key).collect();
    let daily_col: Vec<Option<f64>> = latest.iter().map(|r| r.daily_return).collect();
    let ytd_col: Vec<Option<f64>> = latest.iter().map(|r| r.ytd_return).collect();
    let vol_col: Vec<Option<f64>> = latest.iter().map(|r| r.annualized_volatility).collect();

    let df = DataFrame::new(vec![
        Series::new("sector".into(), sector_col).into(),
        Series::new("stock_key".into(), stock_col).into(),
        Series::new("daily_return".into(), daily_col).into(),
        Series::new("ytd_return".into(), ytd_col).into(),
        Series::new("annualized_volatility".into(), vol_col).into(),
    ])?;

    let grouped = df
        .lazy()
        .group_by([col("sector")])
        .agg([
            col("stock_key").n_unique().alias("stocks"),
            col("daily_return").mean().alias("mean_daily_return"),
            col("ytd_return").mean().alias("mean_ytd_return"),
            col("annualized_volatility")
                .mean()
                .alias("mean_annualized_volatility"),
        ])
        .sort(["sector"], SortMultipleOptions::default())
        .collect()?;

    let names = grouped.column("sector")?.str()?;
    let counts = grouped.column("stocks")?.cast(&DataType::UInt64)?;
    let counts = counts.u64()?;
    let daily = grouped.column("mean_daily_return")?.f64()?;
    let ytd = grouped.column("mean_ytd_return")?.f64()?;
    let vol = grouped.column("mean_annualized_volatility")?.f64()?;

    let mut snapshots = Vec::with_capacity(grouped.height());
    for i in 0..grouped.height() {
        snapshots.push(SectorSnapshot {
            sector: names.get(i).unwrap_or_default().to_string(),
            stocks: counts.get(i).unwrap_or(0) as usize,
            mean_daily_return: daily.get(i),
            mean_ytd_return: ytd.get(i),
            mean_annualized_volatility: vol.get(i),
        });
    }

    Ok(Some(MarketSummary {
        date,
        sectors: snapshots,
    }))
}

impl MarketSummary {
    /// Render as an ASCII table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nSector Snapshot: {}\n", self.date));
        output.push_str(&"-".repeat(72));
        output.push('\n');
        output.push_str(&format!(
            "{:<28} {:>8} {:>10} {:>10} {:>12}\n",
            "Sector", "Stocks", "Daily", "YTD", "Ann. Vol"
        ));
        output.push_str(&"-".repeat(72));
        output.push('\n');

        for s in &self.sectors {
            output.push_str(&format!(
                "{:<28} {:>8} {:>10} {:>10} {:>12}\n",
                s.sector,
                s.stocks,
                pct(s.mean_daily_return),
                pct(s.mean_ytd_return),
                pct(s.mean_annualized_volatility)
            ));
        }

        output
    }

    /// Render as Markdown.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Sector Snapshot: {}\n\n", self.date));
        output.push_str("| Sector | Stocks | Daily | YTD | Ann. Vol |\n");
        output.push_str("|--------|--------|-------|-----|----------|\n");
        for s in &self.sectors {
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                s.sector,
                s.stocks,
                pct(s.mean_daily_return),
                pct(s.mean_ytd_return),
                pct(s.mean_annualized_volatility)
            ));
        }

        output
    }
}
