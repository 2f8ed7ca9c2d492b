//! Pipeline configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file
//! at all) yields the stock setup: twenty Ibovespa tickers from 2016-03-01,
//! a 2010-2030 calendar and the warehouse in the platform data directory.

use crate::error::{PipelineError, Result};
use crate::universe::{Constituent, StockUniverse};
use chrono::NaiveDate;
use recife_transform::clean::{DEFAULT_OUTLIER_PRICE_CEILING, DEFAULT_SUSPICIOUS_MOVE_THRESHOLD};
use recife_transform::{CleaningConfig, Holiday};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Get the default data directory.
///
/// Uses platform-specific data directories:
/// - Linux: `~/.local/share/recife/`
/// - macOS: `~/Library/Application Support/recife/`
/// - Windows: `%APPDATA%\recife\`
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recife")
}

/// Get the default warehouse path.
pub fn default_database_path() -> PathBuf {
    default_data_dir().join("recife.db")
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

/// Span and extra holidays of the date dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// First generated date
    pub start: NaiveDate,
    /// Last generated date
    pub end: NaiveDate,
    /// Moveable holidays and one-off closures
    pub extra_holidays: Vec<Holiday>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            start: ymd(2010, 1, 1),
            end: ymd(2030, 12, 31),
            extra_holidays: Vec::new(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite warehouse file
    pub database_path: PathBuf,
    /// Earliest landing date considered by cleaning
    pub start_date: NaiveDate,
    /// Closes above this are excluded
    pub outlier_price_ceiling: f64,
    /// Open-to-close move above this flags a row suspicious
    pub suspicious_move_threshold: f64,
    /// Date dimension settings
    pub calendar: CalendarConfig,
    /// Tracked listings
    pub universe: Vec<Constituent>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            start_date: ymd(2016, 3, 1),
            outlier_price_ceiling: DEFAULT_OUTLIER_PRICE_CEILING,
            suspicious_move_threshold: DEFAULT_SUSPICIOUS_MOVE_THRESHOLD,
            calendar: CalendarConfig::default(),
            universe: StockUniverse::ibovespa_constituents(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.calendar.start > self.calendar.end {
            return Err(PipelineError::InvalidConfig(format!(
                "calendar start {} is after calendar end {}",
                self.calendar.start, self.calendar.end
            )));
        }
        if self.start_date < self.calendar.start || self.start_date > self.calendar.end {
            return Err(PipelineError::InvalidConfig(format!(
                "start_date {} is outside the calendar span",
                self.start_date
            )));
        }
        if self.outlier_price_ceiling.is_nan() || self.outlier_price_ceiling <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "outlier_price_ceiling must be positive".to_string(),
            ));
        }
        if self.suspicious_move_threshold.is_nan() || self.suspicious_move_threshold <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "suspicious_move_threshold must be positive".to_string(),
            ));
        }
        if self.universe.is_empty() {
            return Err(PipelineError::InvalidConfig("universe is empty".to_string()));
        }
        Ok(())
    }

    /// Cleaning parameters for a run with reference date `as_of`.
    pub const fn cleaning_config(&self, as_of: NaiveDate) -> CleaningConfig {
        CleaningConfig {
            start_date: self.start_date,
            as_of,
            outlier_price_ceiling: self.outlier_price_ceiling,
            suspicious_move_threshold: self.suspicious_move_threshold,
        }
    }

    /// The configured universe.
    pub fn stock_universe(&self) -> StockUniverse {
        StockUniverse::new(self.universe.clone())
    }
}
