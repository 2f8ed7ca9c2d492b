//! Tracked B3 universe, defaulting to twenty Ibovespa names.

use crate::universe::sector::{B3Sector, MarketCap};
use recife_data::StockProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tracked listing with its descriptive attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constituent {
    /// Yahoo-style ticker (`PETR4.SA`).
    pub ticker: String,
    /// Company name.
    pub company_name: String,
    /// Sector.
    pub sector: B3Sector,
    /// Market-capitalization bucket.
    #[serde(default)]
    pub market_cap: MarketCap,
}

impl Constituent {
    /// Create a new large-cap constituent.
    pub fn new(ticker: impl Into<String>, company_name: impl Into<String>, sector: B3Sector) -> Self {
        Self {
            ticker: ticker.into(),
            company_name: company_name.into(),
            sector,
            market_cap: MarketCap::Large,
        }
    }

    /// Set the market-capitalization bucket.
    pub const fn with_market_cap(mut self, market_cap: MarketCap) -> Self {
        self.market_cap = market_cap;
        self
    }

    /// Stock-dimension profile.
    pub fn profile(&self) -> StockProfile {
        StockProfile {
            ticker: self.ticker.clone(),
            company_name: self.company_name.clone(),
            sector: self.sector.name().to_string(),
            market_cap_category: self.market_cap.label().to_string(),
        }
    }
}

/// Set of tracked listings.
#[derive(Debug, Clone)]
pub struct StockUniverse {
    constituents: Vec<Constituent>,
    ticker_to_sector: HashMap<String, B3Sector>,
}

impl StockUniverse {
    /// Build a universe from an explicit list.
    ///
    /// Later entries for a ticker already listed are ignored.
    pub fn new(constituents: Vec<Constituent>) -> Self {
        let mut ticker_to_sector = HashMap::new();
        let mut unique = Vec::with_capacity(constituents.len());
        for c in constituents {
            if ticker_to_sector.contains_key(&c.ticker) {
                tracing::warn!(ticker = %c.ticker, "duplicate ticker in universe ignored");
                continue;
            }
            ticker_to_sector.insert(c.ticker.clone(), c.sector);
            unique.push(c);
        }

        Self {
            constituents: unique,
            ticker_to_sector,
        }
    }

    /// The default Ibovespa universe.
    pub fn ibovespa() -> Self {
        Self::new(Self::ibovespa_constituents())
    }

    /// Get all constituents.
    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    /// Get the sector for a ticker.
    pub fn sector(&self, ticker: &str) -> Option<B3Sector> {
        self.ticker_to_sector.get(ticker).copied()
    }

    /// Get all tickers in a specific sector.
    pub fn tickers_in_sector(&self, sector: B3Sector) -> Vec<String> {
        self.constituents
            .iter()
            .filter(|c| c.sector == sector)
            .map(|c| c.ticker.clone())
            .collect()
    }

    /// Stock-dimension profiles for every constituent.
    pub fn profiles(&self) -> Vec<StockProfile> {
        self.constituents.iter().map(Constituent::profile).collect()
    }

    /// Twenty liquid Ibovespa names across sectors.
    pub fn ibovespa_constituents() -> Vec<Constituent> {
        use B3Sector::*;

        vec![
            Constituent::new("PETR4.SA", "Petrobras", Energy),
            Constituent::new("PRIO3.SA", "PetroRio", Energy),
            Constituent::new("CSAN3.SA", "Cosan", Energy),
            Constituent::new("VALE3.SA", "Vale", Materials),
            Constituent::new("SUZB3.SA", "Suzano", Materials),
            Constituent::new("GGBR4.SA", "Gerdau", Materials),
            Constituent::new("ITUB4.SA", "Itau Unibanco", Financials),
            Constituent::new("BBDC4.SA", "Bradesco", Financials),
            Constituent::new("BBAS3.SA", "Banco do Brasil", Financials),
            Constituent::new("B3SA3.SA", "B3", Financials),
            Constituent::new("ABEV3.SA", "Ambev", ConsumerStaples),
            Constituent::new("RENT3.SA", "Localiza", ConsumerDiscretionary),
            Constituent::new("MGLU3.SA", "Magazine Luiza", ConsumerDiscretionary)
                .with_market_cap(MarketCap::Mid),
            Constituent::new("LREN3.SA", "Lojas Renner", ConsumerDiscretionary)
                .with_market_cap(MarketCap::Mid),
            Constituent::new("WEGE3.SA", "WEG", Industrials),
            Constituent::new("RAIL3.SA", "Rumo", Industrials),
            Constituent::new("VIVT3.SA", "Telefonica Brasil", Communication),
            Constituent::new("RADL3.SA", "Raia Drogasil", HealthCare),
            Constituent::new("HAPV3.SA", "Hapvida", HealthCare),
            Constituent::new("TOTS3.SA", "Totvs", Technology).with_market_cap(MarketCap::Mid),
        ]
    }
}

impl Default for StockUniverse {
    fn default() -> Self {
        Self::ibovespa()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ibovespa_universe() {
        let universe = StockUniverse::ibovespa();
        assert_eq!(universe.constituents().len(), 20);
        assert_eq!(universe.sector("PETR4.SA"), Some(B3Sector::Energy));
        assert_eq!(universe.sector("AAPL"), None);
        assert_eq!(universe.tickers_in_sector(B3Sector::Financials).len(), 4);
    }

    #[test]
    fn test_duplicates_ignored() {
        let universe = StockUniverse::new(vec![
            Constituent::new("PETR4.SA", "Petrobras", B3Sector::Energy),
            Constituent::new("PETR4.SA", "Other", B3Sector::Materials),
        ]);
        assert_eq!(universe.constituents().len(), 1);
        assert_eq!(universe.sector("PETR4.SA"), Some(B3Sector::Energy));
    }

    #[test]
    fn test_profiles() {
        let profiles = StockUniverse::ibovespa().profiles();
        let totvs = profiles.iter().find(|p| p.ticker == "TOTS3.SA").unwrap();
        assert_eq!(totvs.sector, "Technology");
        assert_eq!(totvs.market_cap_category, "Mid Cap");
    }
}
