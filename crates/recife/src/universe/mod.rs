//! Stock universe feeding the stock dimension.

pub mod ibovespa;
pub mod sector;

pub use ibovespa::{Constituent, StockUniverse};
pub use sector::{B3Sector, MarketCap};
