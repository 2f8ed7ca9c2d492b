#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/denio-barbosa/recife/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod clean;
pub mod error;
pub mod fact;
pub mod indicators;
pub mod returns;
pub mod volatility;

pub use calendar::{Holiday, generate_date_dimension, national_holiday};
pub use clean::{
    CleanedIndicatorRecord, CleanedPriceRecord, CleaningConfig, CleaningReport,
    IndicatorCleaningReport, clean_indicators, clean_prices,
};
pub use error::{Result, TransformError};
pub use fact::{AssembledFacts, Dimensions, FactInputs, LoadState, assemble_facts};
pub use indicators::{IndicatorDaily, normalize_indicators, rate_regime};
pub use returns::{ReturnRecord, compute_returns, trading_day_prices};
pub use volatility::{VolatilityRecord, compute_volatility, percent_rank};

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
