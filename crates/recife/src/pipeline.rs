//! Pipeline runner.
//!
//! A run acquires the warehouse run lock before reading the watermark and
//! releases it after the fact write committed or the run failed. The fact
//! write is a single transaction, so a failed run leaves the fact store as
//! it was.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use chrono::{NaiveDate, Utc};
use recife_data::{DateDimensionRow, FactWriteMode, Warehouse};
use recife_transform::{
    CleaningReport, Dimensions, FactInputs, IndicatorCleaningReport, LoadState, TransformError,
    assemble_facts, clean_indicators, clean_prices, compute_returns, compute_volatility,
    generate_date_dimension, normalize_indicators, trading_day_prices,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How a run treats rows already in the fact store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    /// Assemble only dates after the watermark and upsert them
    #[default]
    Incremental,
    /// Assemble the whole history and replace the fact store
    FullRefresh,
}

impl RunMode {
    const fn write_mode(self) -> FactWriteMode {
        match self {
            Self::Incremental => FactWriteMode::Upsert,
            Self::FullRefresh => FactWriteMode::ReplaceAll,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::FullRefresh => write!(f, "full refresh"),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Requested mode
    pub mode: RunMode,
    /// Load state the run resolved to
    pub state: LoadState,
    /// Reference date
    pub as_of: NaiveDate,
    /// Date-dimension rows generated by this run
    pub date_rows_generated: usize,
    /// Price cleaning counters
    pub prices: CleaningReport,
    /// Indicator cleaning counters
    pub indicators: IndicatorCleaningReport,
    /// Return records computed
    pub return_rows: usize,
    /// Volatility records computed
    pub volatility_rows: usize,
    /// Calendar days of normalized indicators
    pub indicator_days: usize,
    /// Cleaned prices on non-trading days
    pub non_trading_skipped: usize,
    /// Cleaned prices at or before the watermark
    pub before_watermark_skipped: usize,
    /// Fact rows written
    pub facts_written: usize,
    /// Watermark after the run
    pub watermark: Option<NaiveDate>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run ({}, {}) as of {}", self.mode, self.state, self.as_of)?;
        writeln!(
            f,
            "  prices:     {} in, {} kept, {} excluded, {} suspicious",
            self.prices.input_rows,
            self.prices.kept,
            self.prices.excluded(),
            self.prices.suspicious
        )?;
        writeln!(
            f,
            "  indicators: {} in, {} kept, {} days normalized",
            self.indicators.input_rows, self.indicators.kept, self.indicator_days
        )?;
        writeln!(
            f,
            "  facts:      {} written, {} non-trading, {} before watermark",
            self.facts_written, self.non_trading_skipped, self.before_watermark_skipped
        )?;
        match self.watermark {
            Some(w) => write!(f, "  watermark:  {}", w),
            None => write!(f, "  watermark:  none"),
        }
    }
}

/// Stored dates whose trading flag or holiday differs from `generated`.
fn calendar_drift(generated: &[DateDimensionRow], stored: &[DateDimensionRow]) -> usize {
    let stored: HashMap<i64, &DateDimensionRow> = stored.iter().map(|d| (d.date_key, d)).collect();
    generated
        .iter()
        .filter(|g| {
            stored.get(&g.date_key).is_some_and(|s| {
                s.is_trading_day != g.is_trading_day || s.holiday_name != g.holiday_name
            })
        })
        .count()
}

/// Pipeline bound to a warehouse and a configuration.
#[derive(Debug)]
pub struct Pipeline<'a> {
    warehouse: &'a Warehouse,
    config: &'a PipelineConfig,
    owner: String,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline. The run lock is recorded under this process id.
    pub fn new(warehouse: &'a Warehouse, config: &'a PipelineConfig) -> Self {
        Self {
            warehouse,
            config,
            owner: format!("recife-{}", std::process::id()),
        }
    }

    /// Override the owner recorded in the run lock.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Run every stage for reference date `as_of`.
    ///
    /// # Errors
    ///
    /// Fails before taking the lock when `as_of` lies outside
    /// `[start_date, calendar.end]`. Fails with a concurrency error when
    /// another run holds the lock, and with the first stage error otherwise. On failure the fact store is
    /// unchanged.
    pub fn run(&self, mode: RunMode, as_of: NaiveDate) -> Result<RunSummary> {
        if as_of < self.config.start_date {
            return Err(TransformError::InvalidDateRange {
                start: self.config.start_date,
                end: as_of,
            }
            .into());
        }
        if as_of > self.config.calendar.end {
            return Err(PipelineError::InvalidConfig(format!(
                "as_of {} is after calendar end {}; extend calendar.end",
                as_of, self.config.calendar.end
            )));
        }

        let lock = self.warehouse.acquire_run_lock(&self.owner)?;
        tracing::info!(owner = lock.owner(), %mode, %as_of, "run started");

        let outcome = self.run_locked(mode, as_of);
        let released = lock.release();

        match &outcome {
            Ok(summary) => tracing::info!(
                facts = summary.facts_written,
                watermark = ?summary.watermark,
                "run finished"
            ),
            Err(PipelineError::Transform(e @ TransformError::MalformedInput { .. })) => {
                tracing::error!(
                    error = %e,
                    "run failed; remove keyless landing rows with `recife purge-malformed`"
                );
            }
            Err(e) => tracing::error!(error = %e, "run failed"),
        }

        let summary = outcome?;
        released?;
        Ok(summary)
    }

    fn run_locked(&self, mode: RunMode, as_of: NaiveDate) -> Result<RunSummary> {
        let warehouse = self.warehouse;
        let config = self.config;

        // Dimensions
        let calendar = &config.calendar;
        let generated =
            generate_date_dimension(calendar.start, calendar.end, &calendar.extra_holidays)?;
        let date_rows_generated = warehouse.ensure_date_dimension(&generated)?;
        let dates = warehouse.load_date_dimension()?;
        let drifted = calendar_drift(&generated, &dates);
        if drifted > 0 {
            tracing::warn!(
                drifted,
                "stored date dimension disagrees with the configured calendar; stored rows are kept"
            );
        }
        warehouse.sync_stock_dimension(&config.stock_universe().profiles())?;

        // Load state
        let state = match mode {
            RunMode::FullRefresh => LoadState::Initial,
            RunMode::Incremental => LoadState::from_watermark(warehouse.fact_watermark()?),
        };
        tracing::info!(%state, "resolved load state");

        // Stages
        let cleaning = config.cleaning_config(as_of);
        let (prices, price_report) = clean_prices(&warehouse.load_raw_prices()?, &cleaning)?;
        let (indicators, indicator_report) =
            clean_indicators(&warehouse.load_raw_indicators()?, config.start_date, as_of)?;

        let returns = compute_returns(&trading_day_prices(&prices, &dates));
        let volatility = compute_volatility(&returns);
        let daily = normalize_indicators(&indicators, config.start_date, as_of);

        let stocks = warehouse.load_stock_dimension()?;
        let assembled = assemble_facts(
            FactInputs {
                prices: &prices,
                returns: &returns,
                volatility: &volatility,
                indicators: &daily,
            },
            Dimensions {
                dates: &dates,
                stocks: &stocks,
            },
            state,
            Utc::now(),
        )?;

        // Single transaction
        let facts_written = warehouse.write_facts(&assembled.rows, mode.write_mode())?;

        Ok(RunSummary {
            mode,
            state,
            as_of,
            date_rows_generated,
            prices: price_report,
            indicators: indicator_report,
            return_rows: returns.len(),
            volatility_rows: volatility.len(),
            indicator_days: daily.len(),
            non_trading_skipped: assembled.non_trading_skipped,
            before_watermark_skipped: assembled.before_watermark_skipped,
            facts_written,
            watermark: warehouse.fact_watermark()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_write_modes() {
        assert_eq!(RunMode::Incremental.write_mode(), FactWriteMode::Upsert);
        assert_eq!(RunMode::FullRefresh.write_mode(), FactWriteMode::ReplaceAll);
        assert_eq!(RunMode::default(), RunMode::Incremental);
    }

    #[test]
    fn test_as_of_before_start_rejected() {
        let warehouse = Warehouse::in_memory().unwrap();
        let config = PipelineConfig::default();
        let err = Pipeline::new(&warehouse, &config)
            .run(RunMode::Incremental, date(2015, 1, 2))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Transform(TransformError::InvalidDateRange { .. })
        ));
        assert!(warehouse.run_lock_holder().unwrap().is_none());
    }

    #[test]
    fn test_calendar_drift() {
        let jan = |d| date(2024, 1, d);
        let stored = generate_date_dimension(jan(1), jan(31), &[]).unwrap();
        assert_eq!(calendar_drift(&stored, &stored), 0);

        let closure = recife_transform::Holiday {
            date: jan(25),
            name: "Aniversário de São Paulo".to_string(),
        };
        let configured = generate_date_dimension(jan(1), date(2024, 2, 29), &[closure]).unwrap();
        assert_eq!(calendar_drift(&configured, &stored), 1);
    }

    #[test]
    fn test_as_of_after_calendar_end_rejected() {
        let warehouse = Warehouse::in_memory().unwrap();
        let mut config = PipelineConfig {
            start_date: date(2024, 1, 1),
            ..PipelineConfig::default()
        };
        config.calendar.start = date(2024, 1, 1);
        config.calendar.end = date(2024, 6, 30);

        let err = Pipeline::new(&warehouse, &config)
            .run(RunMode::Incremental, date(2024, 7, 1))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref m) if m.contains("calendar end")));
        assert!(warehouse.run_lock_holder().unwrap().is_none());
    }

    #[test]
    fn test_empty_landing_run() {
        let warehouse = Warehouse::in_memory().unwrap();
        let config = PipelineConfig {
            start_date: date(2024, 1, 1),
            ..PipelineConfig::default()
        };
        let summary = Pipeline::new(&warehouse, &config)
            .run(RunMode::Incremental, date(2024, 1, 31))
            .unwrap();

        assert_eq!(summary.state, LoadState::Initial);
        assert_eq!(summary.facts_written, 0);
        assert_eq!(summary.watermark, None);
        assert!(summary.date_rows_generated > 7_000);
        assert_eq!(warehouse.load_stock_dimension().unwrap().len(), 20);
        assert!(warehouse.run_lock_holder().unwrap().is_none());
    }
}
