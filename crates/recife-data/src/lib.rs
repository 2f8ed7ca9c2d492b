#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/denio-barbosa/recife/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod ingest;
pub mod records;
pub mod series;
pub mod warehouse;

pub use error::{DataError, Result};
pub use records::{
    DateDimensionRow, FactRow, Frequency, RateRegime, RawIndicatorRecord, RawPriceRecord,
    StockDimensionRow, StockProfile, date_from_key, date_key,
};
pub use series::{IndicatorSeries, SeriesInfo, known_series, lookup_series};
pub use warehouse::{
    FactWriteMode, PIPELINE_LOCK, PurgeOutcome, RawIndicatorQuality, RawPriceQuality, RunLock,
    Warehouse, WarehouseStats,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
