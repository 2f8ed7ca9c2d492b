//! Volatility calculator.
//!
//! Rolling sample standard deviation of daily returns over the trailing 7,
//! 30 and 90 observations of each ticker, annualized from the 30-observation
//! window, with a cross-sectional percentile per date.

use crate::returns::{ReturnRecord, by_ticker};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trading days per year used for annualization.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Short volatility window.
pub const SHORT_WINDOW: usize = 7;
/// Medium volatility window, the one annualized and ranked.
pub const MEDIUM_WINDOW: usize = 30;
/// Long volatility window.
pub const LONG_WINDOW: usize = 90;

/// Volatility metrics for one ticker and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityRecord {
    /// Ticker symbol
    pub ticker: String,
    /// Trading date
    pub date: NaiveDate,
    /// Std dev over the trailing 7 returns
    pub volatility_7d: Option<f64>,
    /// Std dev over the trailing 30 returns
    pub volatility_30d: Option<f64>,
    /// Std dev over the trailing 90 returns
    pub volatility_90d: Option<f64>,
    /// `volatility_30d * sqrt(252)`
    pub annualized_volatility: Option<f64>,
    /// Percentile of `volatility_30d` across tickers on this date
    pub volatility_percentile: Option<f64>,
}

/// Sample standard deviation (n - 1 denominator).
///
/// Returns `None` for fewer than two observations.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}

/// Annualize a daily volatility.
pub fn annualize(daily: f64) -> f64 {
    daily * TRADING_DAYS_PER_YEAR.sqrt()
}

fn trailing_std(values: &[f64], idx: usize, window: usize) -> Option<f64> {
    let start = (idx + 1).saturating_sub(window);
    sample_std(&values[start..=idx])
}

/// Percentile rank of each value, `(rank - 1) / (n - 1)`.
///
/// Ascending with nulls ranked first; tied values share the lowest rank.
/// A single value ranks 0.
pub fn percent_rank(values: &[Option<f64>]) -> Vec<f64> {
    let n = values.len();
    if n <= 1 {
        return vec![0.0; n];
    }

    // None < Some(_) in Option's ordering, which puts nulls first
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; n];
    let mut rank = 0;
    for (pos, &idx) in order.iter().enumerate() {
        if pos == 0 || values[idx] != values[order[pos - 1]] {
            rank = pos;
        }
        ranks[idx] = rank as f64 / (n - 1) as f64;
    }
    ranks
}

/// Compute volatility metrics from return records.
///
/// Only records with a daily return take part: they form each ticker's
/// return sequence and they are the only records that get an output row.
/// Output is sorted by ticker, then date.
pub fn compute_volatility(returns: &[ReturnRecord]) -> Vec<VolatilityRecord> {
    let usable: Vec<&ReturnRecord> = returns
        .iter()
        .filter(|r| r.daily_return.is_some())
        .collect();

    let mut out = Vec::with_capacity(usable.len());
    for (ticker, series) in by_ticker(&usable, |r| r.ticker.as_str(), |r| r.date) {
        let values: Vec<f64> = series.iter().filter_map(|r| r.daily_return).collect();

        for (idx, record) in series.iter().enumerate() {
            let vol_30 = trailing_std(&values, idx, MEDIUM_WINDOW);
            out.push(VolatilityRecord {
                ticker: ticker.to_string(),
                date: record.date,
                volatility_7d: trailing_std(&values, idx, SHORT_WINDOW),
                volatility_30d: vol_30,
                volatility_90d: trailing_std(&values, idx, LONG_WINDOW),
                annualized_volatility: vol_30.map(annualize),
                volatility_percentile: None,
            });
        }
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
    for (idx, record) in out.iter().enumerate() {
        by_date.entry(record.date).or_default().push(idx);
    }
    for indices in by_date.values() {
        let vols: Vec<Option<f64>> = indices.iter().map(|&i| out[i].volatility_30d).collect();
        for (&i, pct) in indices.iter().zip(percent_rank(&vols)) {
            out[i].volatility_percentile = Some(pct);
        }
    }

    tracing::debug!(rows = out.len(), "computed volatility");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ret(ticker: &str, date: NaiveDate, daily: Option<f64>) -> ReturnRecord {
        ReturnRecord {
            ticker: ticker.to_string(),
            date,
            daily_return: daily,
            weekly_return: None,
            monthly_return: None,
            yearly_return: None,
            ytd_return: None,
        }
    }

    fn series(ticker: &str, values: &[f64]) -> Vec<ReturnRecord> {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .iter_days()
            .zip(values)
            .map(|(d, v)| ret(ticker, d, Some(*v)))
            .collect()
    }

    #[test]
    fn test_sample_std() {
        assert_eq!(sample_std(&[]), None);
        assert_eq!(sample_std(&[0.01]), None);
        assert_relative_eq!(
            sample_std(&[1.0, 2.0, 3.0, 4.0]).unwrap(),
            1.290_994_448_735_805_6,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_annualization() {
        assert_relative_eq!(annualize(0.02), 0.317_490_157_327_750_9, epsilon = 1e-12);
        assert_relative_eq!(annualize(0.02), 0.3175, epsilon = 1e-4);
    }

    #[test]
    fn test_windows_without_min_periods() {
        let values: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let vols = compute_volatility(&series("X", &values));

        assert_eq!(vols.len(), 10);
        assert_eq!(vols[0].volatility_7d, None);
        assert_eq!(vols[0].volatility_30d, None);
        assert!(vols[1].volatility_7d.is_some());
        assert!(vols[1].volatility_90d.is_some());

        let expected_7 = sample_std(&values[3..10]).unwrap();
        assert_relative_eq!(vols[9].volatility_7d.unwrap(), expected_7, epsilon = 1e-12);
        let expected_30 = sample_std(&values).unwrap();
        assert_relative_eq!(vols[9].volatility_30d.unwrap(), expected_30, epsilon = 1e-12);
        assert_relative_eq!(
            vols[9].annualized_volatility.unwrap(),
            expected_30 * 252f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_null_returns_skipped() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let rows = vec![
            ret("X", d, None),
            ret("X", d + chrono::Days::new(1), Some(0.01)),
            ret("X", d + chrono::Days::new(2), Some(0.03)),
        ];
        let vols = compute_volatility(&rows);
        assert_eq!(vols.len(), 2);
        assert_eq!(vols[0].date, d + chrono::Days::new(1));
        assert_relative_eq!(
            vols[1].volatility_7d.unwrap(),
            sample_std(&[0.01, 0.03]).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_percent_rank() {
        assert_eq!(percent_rank(&[Some(0.3)]), vec![0.0]);
        assert_eq!(
            percent_rank(&[Some(0.3), Some(0.1), Some(0.2)]),
            vec![1.0, 0.0, 0.5]
        );
        assert_eq!(
            percent_rank(&[Some(0.2), None, Some(0.2), Some(0.5)]),
            vec![1.0 / 3.0, 0.0, 1.0 / 3.0, 1.0]
        );
    }

    #[test]
    fn test_percentile_is_monotone_in_volatility() {
        let mut rows = series("CALM", &[0.001, -0.001, 0.001, -0.001]);
        rows.extend(series("MID", &[0.01, -0.01, 0.01, -0.01]));
        rows.extend(series("WILD", &[0.05, -0.05, 0.05, -0.05]));
        let vols = compute_volatility(&rows);

        let last = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let mut on_last: Vec<&VolatilityRecord> = vols.iter().filter(|v| v.date == last).collect();
        on_last.sort_by(|a, b| a.volatility_30d.partial_cmp(&b.volatility_30d).unwrap());

        let pcts: Vec<f64> = on_last.iter().map(|v| v.volatility_percentile.unwrap()).collect();
        assert!(pcts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(on_last[0].ticker, "CALM");
        assert_eq!(pcts, vec![0.0, 0.5, 1.0]);
    }
}
