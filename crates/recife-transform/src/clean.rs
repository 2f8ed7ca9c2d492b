//! Cleaning stage.
//!
//! Turns landing rows into validated records. Rows missing a ticker (or
//! series code) or a date are malformed and abort the stage after every one
//! of them has been logged. Everything else is either kept, possibly with
//! fields nulled or clamped, or excluded and counted in the report.

use crate::error::{Result, TransformError};
use chrono::{DateTime, NaiveDate, Utc};
use recife_data::{Frequency, RawIndicatorRecord, RawPriceRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Default ceiling above which a close is treated as an outlier.
pub const DEFAULT_OUTLIER_PRICE_CEILING: f64 = 100_000.0;

/// Default relative open-to-close move flagged as suspicious.
pub const DEFAULT_SUSPICIOUS_MOVE_THRESHOLD: f64 = 0.5;

/// Parameters of the cleaning stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// First date kept
    pub start_date: NaiveDate,
    /// Reference date, last date kept
    pub as_of: NaiveDate,
    /// Closes above this are excluded
    pub outlier_price_ceiling: f64,
    /// `|close - open| / open` above this sets `is_suspicious`
    pub suspicious_move_threshold: f64,
}

impl CleaningConfig {
    /// Config with default thresholds for the window `[start_date, as_of]`.
    pub const fn new(start_date: NaiveDate, as_of: NaiveDate) -> Self {
        Self {
            start_date,
            as_of,
            outlier_price_ceiling: DEFAULT_OUTLIER_PRICE_CEILING,
            suspicious_move_threshold: DEFAULT_SUSPICIOUS_MOVE_THRESHOLD,
        }
    }

    fn in_window(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.as_of
    }
}

/// Validated price record.
///
/// `close` is finite and positive, `high >= low` whenever both are present
/// and volume is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedPriceRecord {
    /// Ticker symbol
    pub ticker: String,
    /// Trading date
    pub date: NaiveDate,
    /// Opening price, null when non-positive or not finite
    pub open: Option<f64>,
    /// Session high, null when non-positive or not finite
    pub high: Option<f64>,
    /// Session low, null when non-positive or not finite
    pub low: Option<f64>,
    /// Closing price
    pub close: f64,
    /// Traded volume
    pub volume: Option<i64>,
    /// Adjusted close, null when non-positive
    pub adjusted_close: Option<f64>,
    /// Open-to-close move above the suspicious threshold
    pub is_suspicious: bool,
}

/// Validated indicator observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedIndicatorRecord {
    /// SGS series code
    pub series_code: String,
    /// Observation date
    pub date: NaiveDate,
    /// Observed value
    pub value: f64,
    /// Observation frequency
    pub frequency: Frequency,
}

/// Outcome counts of a price cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Landing rows examined
    pub input_rows: usize,
    /// Cleaned records emitted
    pub kept: usize,
    /// Older copies of a key replaced by a later load
    pub duplicates_superseded: usize,
    /// Outside `[start_date, as_of]`
    pub out_of_range: usize,
    /// No close price, or a NaN close
    pub null_close: usize,
    /// Close `<= 0`, negative infinity included
    pub non_positive_close: usize,
    /// Close above the outlier ceiling, positive infinity included
    pub outlier_close: usize,
    /// `high < low`
    pub inverted_range: usize,
    /// Negative volume set to zero
    pub volume_clamped: usize,
    /// Kept rows flagged as suspicious
    pub suspicious: usize,
}

impl CleaningReport {
    /// Rows excluded for any reason other than supersession.
    pub const fn excluded(&self) -> usize {
        self.out_of_range
            + self.null_close
            + self.non_positive_close
            + self.outlier_close
            + self.inverted_range
    }
}

/// Outcome counts of an indicator cleaning pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorCleaningReport {
    /// Landing rows examined
    pub input_rows: usize,
    /// Cleaned records emitted
    pub kept: usize,
    /// Older copies of a key replaced by a later load
    pub duplicates_superseded: usize,
    /// Outside `[start_date, as_of]`
    pub out_of_range: usize,
    /// No value
    pub null_value: usize,
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Keep the row with the latest `loaded_at` per key; later input wins ties.
fn latest_per_key<'a, T, K>(
    rows: &'a [T],
    key: impl Fn(&T) -> K,
    loaded_at: impl Fn(&T) -> DateTime<Utc>,
) -> (Vec<&'a T>, usize)
where
    K: Hash + Eq,
{
    let mut best: HashMap<K, &'a T> = HashMap::with_capacity(rows.len());
    let mut superseded = 0;
    for row in rows {
        let k = key(row);
        match best.get(&k) {
            Some(&existing) => {
                superseded += 1;
                if loaded_at(row) >= loaded_at(existing) {
                    best.insert(k, row);
                }
            }
            None => {
                best.insert(k, row);
            }
        }
    }
    (best.into_values().collect(), superseded)
}

/// Clean raw price rows.
///
/// Output is sorted by ticker, then date.
pub fn clean_prices(
    rows: &[RawPriceRecord],
    config: &CleaningConfig,
) -> Result<(Vec<CleanedPriceRecord>, CleaningReport)> {
    let mut malformed = 0;
    for (idx, row) in rows.iter().enumerate() {
        if row.ticker.is_none() || row.date.is_none() {
            malformed += 1;
            tracing::error!(
                row = idx,
                ticker = ?row.ticker,
                date = ?row.date,
                "raw price row missing ticker or date"
            );
        }
    }
    if malformed > 0 {
        return Err(TransformError::MalformedInput {
            kind: "price",
            rows: malformed,
        });
    }

    let mut report = CleaningReport {
        input_rows: rows.len(),
        ..Default::default()
    };

    let (latest, superseded) =
        latest_per_key(rows, |r| (r.ticker.clone(), r.date), |r| r.loaded_at);
    report.duplicates_superseded = superseded;

    let mut cleaned = Vec::with_capacity(latest.len());
    for row in latest {
        let (Some(ticker), Some(date)) = (row.ticker.as_ref(), row.date) else {
            continue;
        };

        if !config.in_window(date) {
            report.out_of_range += 1;
            continue;
        }

        let close = match row.close {
            None => {
                report.null_close += 1;
                continue;
            }
            Some(c) if c.is_nan() => {
                report.null_close += 1;
                continue;
            }
            Some(c) if c <= 0.0 => {
                report.non_positive_close += 1;
                continue;
            }
            Some(c) if c > config.outlier_price_ceiling || c.is_infinite() => {
                report.outlier_close += 1;
                continue;
            }
            Some(c) => c,
        };

        let open = positive(row.open);
        let high = positive(row.high);
        let low = positive(row.low);
        if let (Some(h), Some(l)) = (high, low)
            && h < l
        {
            report.inverted_range += 1;
            continue;
        }

        let volume = row.volume.map(|v| {
            if v < 0 {
                report.volume_clamped += 1;
                0
            } else {
                v
            }
        });

        let is_suspicious =
            open.is_some_and(|o| ((close - o) / o).abs() > config.suspicious_move_threshold);
        if is_suspicious {
            report.suspicious += 1;
        }

        cleaned.push(CleanedPriceRecord {
            ticker: ticker.clone(),
            date,
            open,
            high,
            low,
            close,
            volume,
            adjusted_close: positive(row.adjusted_close),
            is_suspicious,
        });
    }

    cleaned.sort_by(|a, b| a.ticker.cmp(&b.ticker).then(a.date.cmp(&b.date)));
    report.kept = cleaned.len();

    tracing::info!(
        input = report.input_rows,
        kept = report.kept,
        excluded = report.excluded(),
        superseded = report.duplicates_superseded,
        clamped = report.volume_clamped,
        suspicious = report.suspicious,
        "cleaned raw prices"
    );

    Ok((cleaned, report))
}

/// Clean raw indicator rows.
///
/// Output is sorted by series code, then date.
pub fn clean_indicators(
    rows: &[RawIndicatorRecord],
    start_date: NaiveDate,
    as_of: NaiveDate,
) -> Result<(Vec<CleanedIndicatorRecord>, IndicatorCleaningReport)> {
    let mut malformed = 0;
    for (idx, row) in rows.iter().enumerate() {
        if row.series_code.is_none() || row.date.is_none() {
            malformed += 1;
            tracing::error!(
                row = idx,
                series_code = ?row.series_code,
                date = ?row.date,
                "raw indicator row missing series code or date"
            );
        }
    }
    if malformed > 0 {
        return Err(TransformError::MalformedInput {
            kind: "indicator",
            rows: malformed,
        });
    }

    let mut report = IndicatorCleaningReport {
        input_rows: rows.len(),
        ..Default::default()
    };

    let (latest, superseded) =
        latest_per_key(rows, |r| (r.series_code.clone(), r.date), |r| r.loaded_at);
    report.duplicates_superseded = superseded;

    let mut cleaned = Vec::with_capacity(latest.len());
    for row in latest {
        let (Some(code), Some(date)) = (row.series_code.as_ref(), row.date) else {
            continue;
        };
        if date < start_date || date > as_of {
            report.out_of_range += 1;
            continue;
        }
        let Some(value) = row.value.filter(|v| v.is_finite()) else {
            report.null_value += 1;
            continue;
        };
        cleaned.push(CleanedIndicatorRecord {
            series_code: code.clone(),
            date,
            value,
            frequency: row.frequency,
        });
    }

    cleaned.sort_by(|a, b| a.series_code.cmp(&b.series_code).then(a.date.cmp(&b.date)));
    report.kept = cleaned.len();

    tracing::info!(
        input = report.input_rows,
        kept = report.kept,
        out_of_range = report.out_of_range,
        null_value = report.null_value,
        superseded = report.duplicates_superseded,
        "cleaned raw indicators"
    );

    Ok((cleaned, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> CleaningConfig {
        CleaningConfig::new(date(2024, 1, 1), date(2024, 12, 31))
    }

    #[test]
    fn test_invalid_rows_excluded() {
        let d = date(2024, 1, 2);
        let mut no_close = RawPriceRecord::new("A", d, 1.0);
        no_close.close = None;

        let rows = vec![
            RawPriceRecord::new("OK", d, 10.0).with_ohlc(9.5, 10.5, 9.0),
            no_close,
            RawPriceRecord::new("NEG", d, -1.0),
            RawPriceRecord::new("ZERO", d, 0.0),
            RawPriceRecord::new("HUGE", d, 250_000.0),
            RawPriceRecord::new("INV", d, 10.0).with_ohlc(10.0, 9.0, 11.0),
            RawPriceRecord::new("OLD", date(2023, 12, 29), 10.0),
            RawPriceRecord::new("LATE", date(2025, 1, 2), 10.0),
        ];

        let (cleaned, report) = clean_prices(&rows, &config()).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].ticker, "OK");
        assert_eq!(report.null_close, 1);
        assert_eq!(report.non_positive_close, 2);
        assert_eq!(report.outlier_close, 1);
        assert_eq!(report.inverted_range, 1);
        assert_eq!(report.out_of_range, 2);
        assert_eq!(report.excluded(), 7);
        assert_eq!(report.kept, 1);
    }

    #[test]
    fn test_non_finite_prices_rejected() {
        let d = date(2024, 1, 2);
        let rows = vec![
            RawPriceRecord::new("NAN", d, f64::NAN),
            RawPriceRecord::new("PINF", d, f64::INFINITY),
            RawPriceRecord::new("NINF", d, f64::NEG_INFINITY),
            RawPriceRecord::new("OK", d, 10.0).with_ohlc(f64::NAN, f64::INFINITY, 9.0),
        ];

        let (cleaned, report) = clean_prices(&rows, &config()).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].ticker, "OK");
        assert_eq!(cleaned[0].open, None);
        assert_eq!(cleaned[0].high, None);
        assert_eq!(cleaned[0].low, Some(9.0));
        assert!(!cleaned[0].is_suspicious);
        assert_eq!(report.null_close, 1);
        assert_eq!(report.non_positive_close, 1);
        assert_eq!(report.outlier_close, 1);
        assert!(cleaned.iter().all(|r| r.close.is_finite() && r.close > 0.0));
    }

    #[test]
    fn test_non_positive_fields_nulled_and_volume_clamped() {
        let d = date(2024, 3, 4);
        let mut row = RawPriceRecord::new("X", d, 10.0)
            .with_ohlc(0.0, -5.0, 9.0)
            .with_volume(-100);
        row.adjusted_close = Some(-1.0);

        let (cleaned, report) = clean_prices(&[row], &config()).unwrap();
        let rec = &cleaned[0];
        assert_eq!(rec.open, None);
        assert_eq!(rec.high, None);
        assert_eq!(rec.low, Some(9.0));
        assert_eq!(rec.adjusted_close, None);
        assert_eq!(rec.volume, Some(0));
        assert!(!rec.is_suspicious);
        assert_eq!(report.volume_clamped, 1);
    }

    #[test]
    fn test_suspicious_flag() {
        let d = date(2024, 3, 4);
        let rows = vec![
            RawPriceRecord::new("JUMP", d, 16.0).with_ohlc(10.0, 16.0, 10.0),
            RawPriceRecord::new("EDGE", d, 15.0).with_ohlc(10.0, 15.0, 10.0),
        ];
        let (cleaned, report) = clean_prices(&rows, &config()).unwrap();
        let flags: Vec<(&str, bool)> = cleaned
            .iter()
            .map(|r| (r.ticker.as_str(), r.is_suspicious))
            .collect();
        assert_eq!(flags, vec![("EDGE", false), ("JUMP", true)]);
        assert_eq!(report.suspicious, 1);
    }

    #[test]
    fn test_latest_load_wins() {
        let d = date(2024, 3, 4);
        let early = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let late = DateTime::<Utc>::from_timestamp(2_000, 0).unwrap();
        let rows = vec![
            RawPriceRecord::new("X", d, 11.0).with_loaded_at(late),
            RawPriceRecord::new("X", d, 10.0).with_loaded_at(early),
        ];
        let (cleaned, report) = clean_prices(&rows, &config()).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].close, 11.0);
        assert_eq!(report.duplicates_superseded, 1);
    }

    #[test]
    fn test_missing_key_is_fatal() {
        let mut row = RawPriceRecord::new("X", date(2024, 3, 4), 10.0);
        row.ticker = None;
        let mut other = RawPriceRecord::new("Y", date(2024, 3, 4), 10.0);
        other.date = None;

        match clean_prices(&[row, other], &config()) {
            Err(TransformError::MalformedInput { rows, .. }) => assert_eq!(rows, 2),
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_clean_indicators() {
        let mut missing = RawIndicatorRecord::new("1", date(2024, 2, 1), 5.0, Frequency::Daily);
        missing.value = None;
        let rows = vec![
            RawIndicatorRecord::new("432", date(2024, 2, 1), 11.25, Frequency::Daily),
            RawIndicatorRecord::new("432", date(2023, 2, 1), 13.75, Frequency::Daily),
            missing,
        ];
        let (cleaned, report) =
            clean_indicators(&rows, date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].value, 11.25);
        assert_eq!(report.out_of_range, 1);
        assert_eq!(report.null_value, 1);

        let mut bad = RawIndicatorRecord::new("432", date(2024, 2, 1), 1.0, Frequency::Daily);
        bad.series_code = None;
        assert!(clean_indicators(&[bad], date(2024, 1, 1), date(2024, 12, 31)).is_err());
    }
}
