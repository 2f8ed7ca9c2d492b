//! Sector and market-capitalization buckets for B3 listings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sector of a B3 listing, as used by the sector analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum B3Sector {
    /// Oil, gas and fuel distribution
    Energy,

    /// Mining, steel, pulp and paper
    Materials,

    /// Banks, insurers and the exchange itself
    Financials,

    /// Beverages and food
    ConsumerStaples,

    /// Retail, rental and apparel
    ConsumerDiscretionary,

    /// Capital goods and logistics
    Industrials,

    /// Telecom
    Communication,

    /// Hospitals, health plans and pharmacies
    HealthCare,

    /// Software
    Technology,

    /// Electric and water utilities
    Utilities,
}

impl B3Sector {
    /// Returns all sectors.
    pub fn all() -> Vec<Self> {
        vec![
            Self::Energy,
            Self::Materials,
            Self::Financials,
            Self::ConsumerStaples,
            Self::ConsumerDiscretionary,
            Self::Industrials,
            Self::Communication,
            Self::HealthCare,
            Self::Technology,
            Self::Utilities,
        ]
    }

    /// Label stored in the stock dimension.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Energy => "Energy",
            Self::Materials => "Materials",
            Self::Financials => "Financials",
            Self::ConsumerStaples => "Consumer Staples",
            Self::ConsumerDiscretionary => "Consumer Discretionary",
            Self::Industrials => "Industrials",
            Self::Communication => "Communication",
            Self::HealthCare => "Health Care",
            Self::Technology => "Technology",
            Self::Utilities => "Utilities",
        }
    }

    /// Parse a stored label.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for B3Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Market-capitalization bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MarketCap {
    /// Large cap
    #[default]
    Large,
    /// Mid cap
    Mid,
    /// Small cap
    Small,
}

impl MarketCap {
    /// Label stored in the stock dimension.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Large => "Large Cap",
            Self::Mid => "Mid Cap",
            Self::Small => "Small Cap",
        }
    }
}

impl fmt::Display for MarketCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_sectors() {
        assert_eq!(B3Sector::all().len(), 10);
    }

    #[test]
    fn test_name_round_trip() {
        for sector in B3Sector::all() {
            assert_eq!(B3Sector::from_name(sector.name()), Some(sector));
        }
        assert_eq!(B3Sector::from_name("Crypto"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", B3Sector::ConsumerStaples), "Consumer Staples");
        assert_eq!(format!("{}", MarketCap::Mid), "Mid Cap");
    }
}
