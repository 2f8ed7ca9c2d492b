//! Return calculator.
//!
//! Returns look back a fixed number of positions in each ticker's own
//! date-ordered sequence of trading-day closes, so a "weekly" return spans
//! five sessions regardless of gaps in the calendar. Callers narrow cleaned
//! prices to trading sessions with [`trading_day_prices`] first.

use crate::clean::CleanedPriceRecord;
use chrono::{Datelike, NaiveDate};
use recife_data::DateDimensionRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Lookback of the daily return.
pub const DAILY_LOOKBACK: usize = 1;
/// Lookback of the weekly return.
pub const WEEKLY_LOOKBACK: usize = 5;
/// Lookback of the monthly return.
pub const MONTHLY_LOOKBACK: usize = 21;
/// Lookback of the yearly return.
pub const YEARLY_LOOKBACK: usize = 252;

/// Multi-horizon returns for one ticker and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    /// Ticker symbol
    pub ticker: String,
    /// Trading date
    pub date: NaiveDate,
    /// Return over 1 position
    pub daily_return: Option<f64>,
    /// Return over 5 positions
    pub weekly_return: Option<f64>,
    /// Return over 21 positions
    pub monthly_return: Option<f64>,
    /// Return over 252 positions
    pub yearly_return: Option<f64>,
    /// Return since the first close of the calendar year
    pub ytd_return: Option<f64>,
}

/// Simple return `close / base - 1`, null when the base is unusable.
pub fn simple_return(close: f64, base: Option<f64>) -> Option<f64> {
    base.filter(|b| *b > 0.0 && b.is_finite())
        .map(|b| close / b - 1.0)
}

fn lookback(closes: &[f64], idx: usize, lag: usize) -> Option<f64> {
    let base = idx.checked_sub(lag).map(|i| closes[i]);
    simple_return(closes[idx], base)
}

/// Group records by ticker with each group ordered by date.
pub(crate) fn by_ticker<T>(
    records: &[T],
    ticker: impl Fn(&T) -> &str,
    date: impl Fn(&T) -> NaiveDate,
) -> BTreeMap<&str, Vec<&T>> {
    let mut groups: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
    for record in records {
        groups.entry(ticker(record)).or_default().push(record);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| date(*r));
    }
    groups
}

/// Keep the cleaned prices dated on a trading day of `dates`.
///
/// Weekend and holiday rows, and rows dated outside the dimension, never
/// enter a return sequence. The fact assembler still sees them and counts
/// or rejects them.
pub fn trading_day_prices(
    prices: &[CleanedPriceRecord],
    dates: &[DateDimensionRow],
) -> Vec<CleanedPriceRecord> {
    let sessions: HashSet<NaiveDate> = dates
        .iter()
        .filter(|d| d.is_trading_day)
        .map(|d| d.date)
        .collect();

    let kept: Vec<CleanedPriceRecord> = prices
        .iter()
        .filter(|p| sessions.contains(&p.date))
        .cloned()
        .collect();
    if kept.len() < prices.len() {
        tracing::debug!(
            dropped = prices.len() - kept.len(),
            "prices off the trading calendar left out of return sequences"
        );
    }
    kept
}

/// Compute returns for every cleaned price record.
///
/// Output is sorted by ticker, then date, one row per input record.
pub fn compute_returns(prices: &[CleanedPriceRecord]) -> Vec<ReturnRecord> {
    let mut out = Vec::with_capacity(prices.len());

    for (ticker, series) in by_ticker(prices, |p| p.ticker.as_str(), |p| p.date) {
        let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
        let mut year_base: Option<(i32, f64)> = None;

        for (idx, price) in series.iter().enumerate() {
            let year = price.date.year();
            let base = match year_base {
                Some((y, base)) if y == year => base,
                _ => {
                    year_base = Some((year, price.close));
                    price.close
                }
            };

            out.push(ReturnRecord {
                ticker: ticker.to_string(),
                date: price.date,
                daily_return: lookback(&closes, idx, DAILY_LOOKBACK),
                weekly_return: lookback(&closes, idx, WEEKLY_LOOKBACK),
                monthly_return: lookback(&closes, idx, MONTHLY_LOOKBACK),
                yearly_return: lookback(&closes, idx, YEARLY_LOOKBACK),
                ytd_return: simple_return(price.close, Some(base)),
            });
        }
    }

    tracing::debug!(rows = out.len(), "computed returns");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn price(ticker: &str, date: NaiveDate, close: f64) -> CleanedPriceRecord {
        CleanedPriceRecord {
            ticker: ticker.to_string(),
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            adjusted_close: Some(close),
            is_suspicious: false,
        }
    }

    fn series(ticker: &str, start: NaiveDate, closes: &[f64]) -> Vec<CleanedPriceRecord> {
        start
            .iter_days()
            .zip(closes)
            .map(|(d, c)| price(ticker, d, *c))
            .collect()
    }

    #[test]
    fn test_daily_returns() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let returns = compute_returns(&series("PETR4.SA", start, &[10.0, 10.5, 9.8]));

        assert_eq!(returns.len(), 3);
        assert_eq!(returns[0].daily_return, None);
        assert_relative_eq!(returns[1].daily_return.unwrap(), 0.05, epsilon = 1e-12);
        assert_relative_eq!(
            returns[2].daily_return.unwrap(),
            -0.066_666_666_666_666_7,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_lookbacks_are_positional() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let closes: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let returns = compute_returns(&series("X", start, &closes));

        assert_eq!(returns[4].weekly_return, None);
        assert_relative_eq!(returns[5].weekly_return.unwrap(), 15.0 / 10.0 - 1.0);
        assert_eq!(returns[20].monthly_return, None);
        assert_relative_eq!(returns[21].monthly_return.unwrap(), 31.0 / 10.0 - 1.0);
        assert!(returns.iter().all(|r| r.yearly_return.is_none()));
    }

    #[test]
    fn test_ytd_resets_each_year() {
        let rows = vec![
            price("X", NaiveDate::from_ymd_opt(2023, 12, 28).unwrap(), 8.0),
            price("X", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 10.0),
            price("X", NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 12.0),
        ];
        let returns = compute_returns(&rows);
        assert_eq!(returns[0].ytd_return, Some(0.0));
        assert_eq!(returns[1].ytd_return, Some(0.0));
        assert_relative_eq!(returns[2].ytd_return.unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(returns[1].daily_return.unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_tickers_do_not_mix() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut rows = series("B", d, &[20.0, 22.0]);
        rows.extend(series("A", d, &[10.0, 11.0]));
        let returns = compute_returns(&rows);

        assert_eq!(returns[0].ticker, "A");
        assert_eq!(returns[0].daily_return, None);
        assert_eq!(returns[2].ticker, "B");
        assert_eq!(returns[2].daily_return, None);
        assert_relative_eq!(returns[3].daily_return.unwrap(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_off_calendar_rows_skipped_by_lookback() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let session = |day, trading: bool| DateDimensionRow {
            date_key: recife_data::date_key(d(day)),
            date: d(day),
            year: 2024,
            quarter: 1,
            month: 1,
            day,
            day_of_week: d(day).weekday().number_from_monday(),
            day_name: String::new(),
            month_name: "January".to_string(),
            week_of_year: 1,
            is_weekend: !trading,
            is_holiday: false,
            holiday_name: None,
            is_trading_day: trading,
            is_month_end: false,
        };
        let dates = vec![session(5, true), session(6, false), session(7, false), session(8, true)];
        let rows = vec![
            price("X", d(5), 37.74),
            price("X", d(6), 37.80),
            price("X", d(8), 38.00),
            // Not in the dimension at all
            price("X", d(9), 38.20),
        ];

        let sessions = trading_day_prices(&rows, &dates);
        assert_eq!(sessions.len(), 2);

        let returns = compute_returns(&sessions);
        assert_eq!(returns[1].date, d(8));
        assert_relative_eq!(
            returns[1].daily_return.unwrap(),
            38.0 / 37.74 - 1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_simple_return_unusable_base() {
        assert_eq!(simple_return(10.0, None), None);
        assert_eq!(simple_return(10.0, Some(0.0)), None);
        assert_eq!(simple_return(10.0, Some(-2.0)), None);
        assert_eq!(simple_return(10.0, Some(f64::NAN)), None);
    }
}
