//! CSV ingestion into landing records.
//!
//! Price files carry the header
//! `ticker,date,open,high,low,close,volume,adjusted_close`; indicator files
//! carry `series_code,date,value,unit,frequency`. Empty cells become missing
//! values. When an indicator row has no frequency, the series catalog
//! supplies it.

use crate::error::{DataError, Result};
use crate::records::{Frequency, RawIndicatorRecord, RawPriceRecord};
use crate::series::lookup_series;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PriceCsvRow {
    ticker: Option<String>,
    date: Option<String>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<i64>,
    adjusted_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IndicatorCsvRow {
    series_code: Option<String>,
    date: Option<String>,
    value: Option<f64>,
    unit: Option<String>,
    frequency: Option<Frequency>,
}

fn parse_csv_date(line: usize, value: Option<String>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| DataError::Parse(format!("line {}: invalid date '{}': {}", line, s, e)))
        })
        .transpose()
}

/// Read raw price rows from CSV.
pub fn read_prices<R: Read>(reader: R, loaded_at: DateTime<Utc>) -> Result<Vec<RawPriceRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (idx, row) in rdr.deserialize::<PriceCsvRow>().enumerate() {
        let row = row?;
        // Header is line 1
        let line = idx + 2;
        records.push(RawPriceRecord {
            ticker: row.ticker.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            date: parse_csv_date(line, row.date)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            adjusted_close: row.adjusted_close,
            loaded_at,
        });
    }

    Ok(records)
}

/// Read raw indicator rows from CSV.
pub fn read_indicators<R: Read>(
    reader: R,
    loaded_at: DateTime<Utc>,
) -> Result<Vec<RawIndicatorRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (idx, row) in rdr.deserialize::<IndicatorCsvRow>().enumerate() {
        let row = row?;
        let line = idx + 2;
        let series_code = row
            .series_code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let catalog = series_code.as_deref().and_then(lookup_series);
        let frequency = match (row.frequency, &catalog) {
            (Some(frequency), _) => frequency,
            (None, Some(info)) => info.frequency,
            (None, None) => {
                return Err(DataError::Parse(format!(
                    "line {}: no frequency for unknown series {:?}",
                    line, series_code
                )));
            }
        };
        let unit = row
            .unit
            .or_else(|| catalog.as_ref().map(|info| info.unit.to_string()));

        records.push(RawIndicatorRecord {
            series_code,
            date: parse_csv_date(line, row.date)?,
            value: row.value,
            unit,
            frequency,
            loaded_at,
        });
    }

    Ok(records)
}

/// Read raw price rows from a CSV file.
pub fn read_prices_from_path<P: AsRef<Path>>(
    path: P,
    loaded_at: DateTime<Utc>,
) -> Result<Vec<RawPriceRecord>> {
    read_prices(File::open(path)?, loaded_at)
}

/// Read raw indicator rows from a CSV file.
pub fn read_indicators_from_path<P: AsRef<Path>>(
    path: P,
    loaded_at: DateTime<Utc>,
) -> Result<Vec<RawIndicatorRecord>> {
    read_indicators(File::open(path)?, loaded_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_prices() {
        let data = "ticker,date,open,high,low,close,volume,adjusted_close
PETR4.SA,2024-01-02,37.0,38.0,36.5,37.5,1000,37.5
,2024-01-02,1.0,1.0,1.0,1.0,1,1.0
VALE3.SA,2024-01-02,,,,70.1,,
";
        let rows = read_prices(data.as_bytes(), DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].ticker.as_deref(), Some("PETR4.SA"));
        assert_eq!(rows[0].volume, Some(1000));
        assert!(rows[1].ticker.is_none());
        assert_eq!(rows[2].close, Some(70.1));
        assert_eq!(rows[2].open, None);
        assert_eq!(rows[2].volume, None);
    }

    #[test]
    fn test_read_prices_rejects_bad_date() {
        let data = "ticker,date,open,high,low,close,volume,adjusted_close
PETR4.SA,02/01/2024,37.0,38.0,36.5,37.5,1000,37.5
";
        let err = read_prices(data.as_bytes(), DateTime::<Utc>::UNIX_EPOCH).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_read_indicators_uses_catalog_frequency() {
        let data = "series_code,date,value,unit,frequency
432,2024-01-02,11.75,,
433,2024-01-01,0.42,% monthly,monthly
";
        let rows = read_indicators(data.as_bytes(), DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].frequency, Frequency::Daily);
        assert_eq!(rows[0].unit.as_deref(), Some("% per year"));
        assert_eq!(rows[1].frequency, Frequency::Monthly);
    }

    #[test]
    fn test_read_indicators_unknown_series_needs_frequency() {
        let data = "series_code,date,value,unit,frequency
99999,2024-01-02,1.0,,
";
        assert!(read_indicators(data.as_bytes(), DateTime::<Utc>::UNIX_EPOCH).is_err());

        let data = "series_code,date,value,unit,frequency
99999,2024-01-02,1.0,,quarterly
";
        let rows = read_indicators(data.as_bytes(), DateTime::<Utc>::UNIX_EPOCH).unwrap();
        assert_eq!(rows[0].frequency, Frequency::Quarterly);
    }
}
