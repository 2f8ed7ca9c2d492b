#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/denio-barbosa/recife/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod universe;

// Re-export main types from sub-crates
pub use recife_data as data;
pub use recife_output as output;
pub use recife_transform as transform;

pub use config::{CalendarConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunMode, RunSummary};
pub use universe::{B3Sector, Constituent, MarketCap, StockUniverse};

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
