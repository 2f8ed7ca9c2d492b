//! Recife CLI binary.
//!
//! Provides the command-line interface for the Recife warehouse pipeline.

mod integration;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use integration::landing::{load_indicators, load_prices};
use integration::warehouse_manager::{open_warehouse, print_warehouse_info, resolve_database_path};
use recife::{B3Sector, Pipeline, PipelineConfig, RunMode};
use recife_output::{ExportFormat, Exporter, QualityReport, fact_exports, latest_sector_summary};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recife")]
#[command(about = "Recife: B3 prices and BCB indicators warehouse pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Warehouse database file, overrides the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform landed data into the fact table
    Run {
        /// Rebuild the whole fact table instead of appending after the watermark
        #[arg(long)]
        full_refresh: bool,

        /// Reference date (YYYY-MM-DD), defaults to today (UTC)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Land a price CSV into raw_stocks
    LoadPrices {
        /// CSV file with ticker,date,open,high,low,close,volume,adjusted_close
        path: PathBuf,
    },

    /// Land an indicator CSV into raw_indicators
    LoadIndicators {
        /// CSV file with series_code,date,value[,unit,frequency]
        path: PathBuf,
    },

    /// Run data-quality checks on the landing and fact tables
    Validate {
        /// Output format (text, markdown or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Export fact rows
    Export {
        /// Output file
        path: PathBuf,

        /// Output format (csv, json or pretty-json)
        #[arg(long, default_value = "csv")]
        format: String,

        /// Only export this ticker
        #[arg(long)]
        ticker: Option<String>,
    },

    /// Show warehouse statistics, the watermark and the latest sector snapshot
    Info,

    /// Clear a run lock left behind by a crashed run
    Unlock,

    /// Delete landing rows missing a ticker, series code or date
    PurgeMalformed,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "recife=info,recife_data=info,recife_transform=info,recife_output=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = PipelineConfig::load(cli.config.as_deref())?;
    let db_path = resolve_database_path(cli.database.as_deref(), &config);

    match cli.command {
        Commands::Run {
            full_refresh,
            as_of,
        } => {
            let mode = if full_refresh {
                RunMode::FullRefresh
            } else {
                RunMode::Incremental
            };
            let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
            run_pipeline(&db_path, &config, mode, as_of)?;
        }
        Commands::LoadPrices { path } => {
            let warehouse = open_warehouse(&db_path)?;
            let outcome = load_prices(&warehouse, &path, std::io::stderr().is_terminal())?;
            println!(
                "Landed {} of {} price rows from {}",
                outcome.inserted,
                outcome.read,
                path.display()
            );
        }
        Commands::LoadIndicators { path } => {
            let warehouse = open_warehouse(&db_path)?;
            let outcome = load_indicators(&warehouse, &path, std::io::stderr().is_terminal())?;
            println!(
                "Landed {} of {} indicator rows from {}",
                outcome.inserted,
                outcome.read,
                path.display()
            );
        }
        Commands::Validate { format } => {
            return validate(&db_path, &format);
        }
        Commands::Export {
            path,
            format,
            ticker,
        } => {
            export_facts(&db_path, &path, &format, ticker.as_deref())?;
        }
        Commands::Info => {
            show_info(&db_path, &config)?;
        }
        Commands::Unlock => {
            let warehouse = open_warehouse(&db_path)?;
            if warehouse.force_release_run_lock()? {
                println!("Run lock cleared");
            } else {
                println!("No run lock held");
            }
        }
        Commands::PurgeMalformed => {
            let warehouse = open_warehouse(&db_path)?;
            let outcome = warehouse.purge_malformed_landing_rows()?;
            println!(
                "Purged {} price and {} indicator rows",
                outcome.prices, outcome.indicators
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_pipeline(
    db_path: &Path,
    config: &PipelineConfig,
    mode: RunMode,
    as_of: NaiveDate,
) -> Result<(), Box<dyn std::error::Error>> {
    let warehouse = open_warehouse(db_path)?;
    let summary = Pipeline::new(&warehouse, config).run(mode, as_of)?;

    println!("{}", summary);
    Ok(())
}

fn validate(db_path: &Path, format: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let warehouse = open_warehouse(db_path)?;
    let report = QualityReport::collect(&warehouse)?;

    match format.to_lowercase().as_str() {
        "text" => print!("{}", report.to_ascii_table()),
        "markdown" | "md" => print!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        other => return Err(format!("Invalid validation format: {}", other).into()),
    }

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn export_facts(
    db_path: &Path,
    path: &Path,
    format: &str,
    ticker: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let format: ExportFormat = format.parse()?;
    let warehouse = open_warehouse(db_path)?;

    let facts = warehouse.load_facts(ticker)?;
    let stocks = warehouse.load_stock_dimension()?;
    let exports = fact_exports(&facts, &stocks)?;
    exports.export_to_file(path, format)?;

    println!("Exported {} fact rows to {}", exports.len(), path.display());
    Ok(())
}

fn show_info(db_path: &Path, config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let warehouse = open_warehouse(db_path)?;
    print_warehouse_info(db_path, &warehouse)?;

    let universe = config.stock_universe();
    println!("\nUniverse: {} tickers", universe.constituents().len());
    for sector in B3Sector::all() {
        let tickers = universe.tickers_in_sector(sector);
        if !tickers.is_empty() {
            println!("  {:24} {}", sector.name(), tickers.join(", "));
        }
    }

    let facts = warehouse.load_facts(None)?;
    let stocks = warehouse.load_stock_dimension()?;
    if let Some(summary) = latest_sector_summary(&facts, &stocks)? {
        print!("{}", summary.to_ascii_table());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::parse_from([
            "recife",
            "--database",
            "/tmp/w.db",
            "run",
            "--full-refresh",
            "--as-of",
            "2024-03-05",
        ]);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/w.db")));
        match cli.command {
            Commands::Run {
                full_refresh,
                as_of,
            } => {
                assert!(full_refresh);
                assert_eq!(as_of, NaiveDate::from_ymd_opt(2024, 3, 5));
            }
            _ => panic!("expected run"),
        }
    }

    #[rstest]
    #[case(&["recife", "info"])]
    #[case(&["recife", "unlock"])]
    #[case(&["recife", "purge-malformed"])]
    #[case(&["recife", "validate", "--format", "markdown"])]
    #[case(&["recife", "export", "out.csv", "--ticker", "PETR4.SA"])]
    #[case(&["recife", "load-prices", "prices.csv", "--config", "recife.toml"])]
    fn test_subcommands_parse(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn test_bad_as_of_rejected() {
        assert!(Cli::try_parse_from(["recife", "run", "--as-of", "05/03/2024"]).is_err());
    }
}
