#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/denio-barbosa/recife/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod quality;
pub mod summary;

pub use export::{ExportError, ExportFormat, Exporter, FactExport, fact_exports};
pub use quality::{EXTREME_RETURN_THRESHOLD, FactQuality, QualityReport, fact_quality};
pub use summary::{MarketSummary, SectorSnapshot, latest_sector_summary};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
