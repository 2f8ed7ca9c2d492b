//! Fact assembler.
//!
//! Joins cleaned prices with returns, volatility and daily indicators into
//! `fact_daily_market` rows. Every cleaned date must exist in the date
//! dimension and every emitted ticker in the stock dimension; either gap is
//! a join-integrity failure. Non-trading days never produce a fact row.

use crate::clean::CleanedPriceRecord;
use crate::error::{Result, TransformError};
use crate::indicators::IndicatorDaily;
use crate::returns::ReturnRecord;
use crate::volatility::VolatilityRecord;
use chrono::{DateTime, NaiveDate, Utc};
use recife_data::{DateDimensionRow, FactRow, StockDimensionRow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Load state of the fact store for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    /// Empty store or forced refresh: the whole history is assembled
    Initial,
    /// Rows exist: only dates after the watermark are assembled
    Incremental {
        /// Latest date already in the fact store
        watermark: NaiveDate,
    },
}

impl LoadState {
    /// Resolve the state from the stored watermark.
    pub const fn from_watermark(watermark: Option<NaiveDate>) -> Self {
        match watermark {
            Some(watermark) => Self::Incremental { watermark },
            None => Self::Initial,
        }
    }

    /// Whether rows dated `date` are assembled in this state.
    pub fn includes(&self, date: NaiveDate) -> bool {
        match self {
            Self::Initial => true,
            Self::Incremental { watermark } => date > *watermark,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Incremental { watermark } => write!(f, "incremental after {}", watermark),
        }
    }
}

/// Stage outputs feeding the assembler.
#[derive(Debug, Clone, Copy)]
pub struct FactInputs<'a> {
    /// Cleaned prices
    pub prices: &'a [CleanedPriceRecord],
    /// Return records
    pub returns: &'a [ReturnRecord],
    /// Volatility records
    pub volatility: &'a [VolatilityRecord],
    /// Daily indicators
    pub indicators: &'a [IndicatorDaily],
}

/// Dimension lookups used by the assembler.
#[derive(Debug, Clone, Copy)]
pub struct Dimensions<'a> {
    /// Date dimension rows
    pub dates: &'a [DateDimensionRow],
    /// Stock dimension rows
    pub stocks: &'a [StockDimensionRow],
}

/// Assembled fact rows and what was left out.
#[derive(Debug, Clone, Default)]
pub struct AssembledFacts {
    /// Rows ordered by `(date_key, stock_key)`
    pub rows: Vec<FactRow>,
    /// Cleaned prices on weekends or holidays
    pub non_trading_skipped: usize,
    /// Cleaned prices at or before the watermark
    pub before_watermark_skipped: usize,
}

/// Assemble fact rows.
///
/// `created_at` is stamped on every row; it is the only column that is not a
/// pure function of the inputs.
pub fn assemble_facts(
    inputs: FactInputs<'_>,
    dims: Dimensions<'_>,
    state: LoadState,
    created_at: DateTime<Utc>,
) -> Result<AssembledFacts> {
    let dates: HashMap<NaiveDate, &DateDimensionRow> =
        dims.dates.iter().map(|d| (d.date, d)).collect();
    let stocks: HashMap<&str, i64> = dims
        .stocks
        .iter()
        .map(|s| (s.ticker.as_str(), s.stock_key))
        .collect();
    let returns: HashMap<(&str, NaiveDate), &ReturnRecord> = inputs
        .returns
        .iter()
        .map(|r| ((r.ticker.as_str(), r.date), r))
        .collect();
    let volatility: HashMap<(&str, NaiveDate), &VolatilityRecord> = inputs
        .volatility
        .iter()
        .map(|v| ((v.ticker.as_str(), v.date), v))
        .collect();
    let indicators: HashMap<NaiveDate, &IndicatorDaily> =
        inputs.indicators.iter().map(|i| (i.date, i)).collect();

    let mut assembled = AssembledFacts::default();

    for price in inputs.prices {
        let Some(day) = dates.get(&price.date) else {
            tracing::error!(ticker = %price.ticker, date = %price.date, "date missing from date dimension");
            return Err(TransformError::UnknownDate(price.date));
        };
        if !day.is_trading_day {
            assembled.non_trading_skipped += 1;
            continue;
        }
        if !state.includes(price.date) {
            assembled.before_watermark_skipped += 1;
            continue;
        }
        let Some(&stock_key) = stocks.get(price.ticker.as_str()) else {
            tracing::error!(ticker = %price.ticker, "ticker missing from stock dimension");
            return Err(TransformError::UnknownTicker(price.ticker.clone()));
        };

        let key = (price.ticker.as_str(), price.date);
        let ret = returns.get(&key);
        let vol = volatility.get(&key);
        let ind = indicators.get(&price.date);

        assembled.rows.push(FactRow {
            date_key: day.date_key,
            stock_key,
            open_price: price.open,
            high_price: price.high,
            low_price: price.low,
            close_price: price.close,
            adjusted_close: price.adjusted_close,
            volume: price.volume,
            is_suspicious: price.is_suspicious,
            daily_return: ret.and_then(|r| r.daily_return),
            weekly_return: ret.and_then(|r| r.weekly_return),
            monthly_return: ret.and_then(|r| r.monthly_return),
            yearly_return: ret.and_then(|r| r.yearly_return),
            ytd_return: ret.and_then(|r| r.ytd_return),
            volatility_7d: vol.and_then(|v| v.volatility_7d),
            volatility_30d: vol.and_then(|v| v.volatility_30d),
            volatility_90d: vol.and_then(|v| v.volatility_90d),
            annualized_volatility: vol.and_then(|v| v.annualized_volatility),
            volatility_percentile: vol.and_then(|v| v.volatility_percentile),
            selic_rate: ind.and_then(|i| i.selic_rate),
            cdi_rate: ind.and_then(|i| i.cdi_rate),
            usd_brl: ind.and_then(|i| i.usd_brl),
            usd_brl_ptax: ind.and_then(|i| i.usd_brl_ptax),
            ipca_monthly: ind.and_then(|i| i.ipca_monthly),
            inflation_rate: ind.and_then(|i| i.inflation_rate),
            igpm_monthly: ind.and_then(|i| i.igpm_monthly),
            real_interest_rate: ind.and_then(|i| i.real_interest_rate),
            cdi_selic_spread: ind.and_then(|i| i.cdi_selic_spread),
            usd_ptax_spread: ind.and_then(|i| i.usd_ptax_spread),
            rate_regime: ind.and_then(|i| i.rate_regime),
            created_at,
        });
    }

    assembled
        .rows
        .sort_by_key(|row| (row.date_key, row.stock_key));

    tracing::info!(
        state = %state,
        rows = assembled.rows.len(),
        non_trading = assembled.non_trading_skipped,
        before_watermark = assembled.before_watermark_skipped,
        "assembled fact rows"
    );

    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::generate_date_dimension;
    use recife_data::RateRegime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn price(ticker: &str, date: NaiveDate, close: f64) -> CleanedPriceRecord {
        CleanedPriceRecord {
            ticker: ticker.to_string(),
            date,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close,
            volume: Some(1_000),
            adjusted_close: Some(close),
            is_suspicious: false,
        }
    }

    fn stocks() -> Vec<StockDimensionRow> {
        vec![StockDimensionRow {
            stock_key: 1,
            ticker: "PETR4.SA".to_string(),
            company_name: "Petrobras".to_string(),
            sector: "Energy".to_string(),
            market_cap_category: "Large Cap".to_string(),
        }]
    }

    fn assemble(
        prices: &[CleanedPriceRecord],
        indicators: &[IndicatorDaily],
        stocks: &[StockDimensionRow],
        state: LoadState,
    ) -> Result<AssembledFacts> {
        let dates = generate_date_dimension(date(2024, 1, 1), date(2024, 12, 31), &[]).unwrap();
        assemble_facts(
            FactInputs {
                prices,
                returns: &[],
                volatility: &[],
                indicators,
            },
            Dimensions {
                dates: &dates,
                stocks,
            },
            state,
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    #[test]
    fn test_weekend_and_holiday_excluded() {
        let prices = vec![
            price("PETR4.SA", date(2024, 12, 24), 37.0),
            price("PETR4.SA", date(2024, 12, 25), 37.0),
            price("PETR4.SA", date(2024, 12, 28), 37.0),
            price("PETR4.SA", date(2024, 12, 30), 38.0),
        ];
        let facts = assemble(&prices, &[], &stocks(), LoadState::Initial).unwrap();

        let keys: Vec<i64> = facts.rows.iter().map(|r| r.date_key).collect();
        assert_eq!(keys, vec![20241224, 20241230]);
        assert_eq!(facts.non_trading_skipped, 2);
    }

    #[test]
    fn test_incremental_keeps_dates_after_watermark() {
        let prices = vec![
            price("PETR4.SA", date(2024, 3, 4), 37.0),
            price("PETR4.SA", date(2024, 3, 5), 37.5),
            price("PETR4.SA", date(2024, 3, 6), 38.0),
        ];
        let state = LoadState::from_watermark(Some(date(2024, 3, 5)));
        let facts = assemble(&prices, &[], &stocks(), state).unwrap();

        assert_eq!(facts.rows.len(), 1);
        assert_eq!(facts.rows[0].date_key, 20240306);
        assert_eq!(facts.before_watermark_skipped, 2);

        let state = LoadState::from_watermark(Some(date(2024, 3, 6)));
        assert!(assemble(&prices, &[], &stocks(), state).unwrap().rows.is_empty());
    }

    #[test]
    fn test_unknown_ticker_is_join_failure() {
        let prices = vec![price("XXXX3.SA", date(2024, 3, 4), 10.0)];
        let err = assemble(&prices, &[], &stocks(), LoadState::Initial).unwrap_err();
        assert!(err.is_join_integrity());
    }

    #[test]
    fn test_unknown_date_is_join_failure_even_on_weekends() {
        let prices = vec![price("PETR4.SA", date(2025, 1, 4), 10.0)];
        match assemble(&prices, &[], &stocks(), LoadState::Initial) {
            Err(TransformError::UnknownDate(d)) => assert_eq!(d, date(2025, 1, 4)),
            other => panic!("expected UnknownDate, got {:?}", other),
        }
    }

    #[test]
    fn test_indicators_left_joined() {
        let d = date(2024, 3, 4);
        let indicators = vec![IndicatorDaily {
            date: d,
            selic_rate: Some(11.25),
            cdi_rate: None,
            usd_brl: Some(4.95),
            usd_brl_ptax: None,
            ipca_monthly: None,
            inflation_rate: Some(4.5),
            igpm_monthly: None,
            real_interest_rate: Some(6.75),
            cdi_selic_spread: None,
            usd_ptax_spread: None,
            rate_regime: Some(RateRegime::High),
        }];
        let prices = vec![
            price("PETR4.SA", d, 37.0),
            price("PETR4.SA", date(2024, 3, 5), 37.5),
        ];
        let facts = assemble(&prices, &indicators, &stocks(), LoadState::Initial).unwrap();

        assert_eq!(facts.rows[0].selic_rate, Some(11.25));
        assert_eq!(facts.rows[0].rate_regime, Some(RateRegime::High));
        assert_eq!(facts.rows[1].selic_rate, None);
        assert_eq!(facts.rows[1].daily_return, None);
    }
}
