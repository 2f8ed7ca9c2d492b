//! CSV landing ingestion with progress reporting.

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use recife_data::ingest::{read_indicators_from_path, read_prices_from_path};
use recife_data::{DataError, Warehouse};
use std::path::Path;
use std::time::Duration;

/// Rows inserted per transaction.
const BATCH_SIZE: usize = 1_000;

/// Rows read from a file and how many of them were new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LandingOutcome {
    pub(crate) read: usize,
    pub(crate) inserted: usize,
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("█▓░"));
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message);
    pb
}

fn land_in_batches<T>(
    rows: &[T],
    message: &'static str,
    pb: Option<&ProgressBar>,
    mut insert: impl FnMut(&[T]) -> Result<usize, DataError>,
) -> Result<LandingOutcome, DataError> {
    let mut inserted = 0;
    for chunk in rows.chunks(BATCH_SIZE) {
        inserted += insert(chunk)?;
        if let Some(pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }
    if let Some(pb) = pb {
        pb.finish_with_message(format!("{} ({} new)", message, inserted));
    }
    Ok(LandingOutcome {
        read: rows.len(),
        inserted,
    })
}

/// Land a price CSV into `raw_stocks`.
pub(crate) fn load_prices(
    warehouse: &Warehouse,
    path: &Path,
    show_progress: bool,
) -> Result<LandingOutcome, DataError> {
    let rows = read_prices_from_path(path, Utc::now())?;
    let pb = show_progress.then(|| progress_bar(rows.len(), "Landing prices..."));
    let outcome = land_in_batches(&rows, "Prices landed", pb.as_ref(), |chunk| {
        warehouse.insert_raw_prices(chunk)
    })?;
    tracing::info!(path = %path.display(), read = outcome.read, inserted = outcome.inserted, "landed prices");
    Ok(outcome)
}

/// Land an indicator CSV into `raw_indicators`.
pub(crate) fn load_indicators(
    warehouse: &Warehouse,
    path: &Path,
    show_progress: bool,
) -> Result<LandingOutcome, DataError> {
    let rows = read_indicators_from_path(path, Utc::now())?;
    let pb = show_progress.then(|| progress_bar(rows.len(), "Landing indicators..."));
    let outcome = land_in_batches(&rows, "Indicators landed", pb.as_ref(), |chunk| {
        warehouse.insert_raw_indicators(chunk)
    })?;
    tracing::info!(path = %path.display(), read = outcome.read, inserted = outcome.inserted, "landed indicators");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_prices_is_idempotent() {
        let path = write_temp(
            "prices.csv",
            "ticker,date,open,high,low,close,volume,adjusted_close\n\
             PETR4.SA,2024-03-04,37.0,37.9,36.8,37.5,1000,37.5\n\
             PETR4.SA,2024-03-05,37.5,38.1,37.2,37.9,1200,37.9\n",
        );
        let warehouse = Warehouse::in_memory().unwrap();

        let first = load_prices(&warehouse, &path, false).unwrap();
        assert_eq!(first, LandingOutcome { read: 2, inserted: 2 });

        let second = load_prices(&warehouse, &path, false).unwrap();
        assert_eq!(second, LandingOutcome { read: 2, inserted: 0 });

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_indicators() {
        let path = write_temp(
            "indicators.csv",
            "series_code,date,value\n432,2024-03-04,11.25\n12,2024-02-01,4.5\n",
        );
        let warehouse = Warehouse::in_memory().unwrap();

        let outcome = load_indicators(&warehouse, &path, false).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(warehouse.load_raw_indicators().unwrap().len(), 2);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_batches_cover_every_row() {
        let rows: Vec<usize> = (0..2_500).collect();
        let mut calls = 0;
        let outcome = land_in_batches(&rows, "done", None, |chunk| {
            calls += 1;
            Ok(chunk.len())
        })
        .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(outcome.inserted, 2_500);
    }
}
