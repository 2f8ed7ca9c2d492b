//! Warehouse location and opening.

use recife::PipelineConfig;
use recife_data::{DataError, Warehouse};
use std::path::{Path, PathBuf};

/// Resolve the warehouse path: the `--database` flag wins over the config.
pub(crate) fn resolve_database_path(flag: Option<&Path>, config: &PipelineConfig) -> PathBuf {
    flag.map_or_else(|| config.database_path.clone(), Path::to_path_buf)
}

/// Open the warehouse, creating the directory if needed.
pub(crate) fn open_warehouse(path: &Path) -> Result<Warehouse, DataError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    tracing::debug!(path = %path.display(), "opening warehouse");
    Warehouse::open(path)
}

/// Print warehouse location and table counts.
pub(crate) fn print_warehouse_info(path: &Path, warehouse: &Warehouse) -> Result<(), DataError> {
    let stats = warehouse.get_stats()?;

    println!("Warehouse: {}", path.display());
    println!("  raw_stocks:          {:>10} rows", stats.raw_price_rows);
    println!("  raw_indicators:      {:>10} rows", stats.raw_indicator_rows);
    println!("  landed tickers:      {:>10}", stats.landed_tickers);
    println!(
        "  dim_date:            {:>10} rows ({} trading days)",
        stats.date_dimension_rows, stats.trading_days
    );
    println!("  dim_stock:           {:>10} rows", stats.stock_dimension_rows);
    println!("  fact_daily_market:   {:>10} rows", stats.fact_rows);
    match stats.watermark {
        Some(w) => println!("  watermark:           {:>10}", w.to_string()),
        None => println!("  watermark:           {:>10}", "none"),
    }
    if let Some((owner, since)) = warehouse.run_lock_holder()? {
        println!("  run lock:            held by {} since {}", owner, since);
    }

    Ok(())
}
