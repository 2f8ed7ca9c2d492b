//! Indicator normalizer.
//!
//! Pivots long-format indicator observations into one row per calendar day.
//! Daily-tagged observations appear only on their own date. Monthly and
//! quarterly observations are carried forward through a last-known-value
//! state advanced by a date cursor, and are never carried backwards.

use crate::clean::CleanedIndicatorRecord;
use chrono::NaiveDate;
use recife_data::{IndicatorSeries, RateRegime, known_series};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Indicator values for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDaily {
    /// Calendar date
    pub date: NaiveDate,
    /// SELIC rate
    pub selic_rate: Option<f64>,
    /// CDI rate
    pub cdi_rate: Option<f64>,
    /// USD/BRL exchange rate
    pub usd_brl: Option<f64>,
    /// USD/BRL PTAX rate
    pub usd_brl_ptax: Option<f64>,
    /// Monthly IPCA
    pub ipca_monthly: Option<f64>,
    /// 12-month IPCA
    pub inflation_rate: Option<f64>,
    /// Monthly IGP-M
    pub igpm_monthly: Option<f64>,
    /// `selic_rate - inflation_rate`
    pub real_interest_rate: Option<f64>,
    /// `cdi_rate - selic_rate`
    pub cdi_selic_spread: Option<f64>,
    /// `usd_brl - usd_brl_ptax`
    pub usd_ptax_spread: Option<f64>,
    /// SELIC regime bucket
    pub rate_regime: Option<RateRegime>,
}

impl IndicatorDaily {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            selic_rate: None,
            cdi_rate: None,
            usd_brl: None,
            usd_brl_ptax: None,
            ipca_monthly: None,
            inflation_rate: None,
            igpm_monthly: None,
            real_interest_rate: None,
            cdi_selic_spread: None,
            usd_ptax_spread: None,
            rate_regime: None,
        }
    }

    fn slot(&mut self, series: IndicatorSeries) -> &mut Option<f64> {
        match series {
            IndicatorSeries::Selic => &mut self.selic_rate,
            IndicatorSeries::Cdi => &mut self.cdi_rate,
            IndicatorSeries::UsdBrl => &mut self.usd_brl,
            IndicatorSeries::UsdBrlPtax => &mut self.usd_brl_ptax,
            IndicatorSeries::IpcaMonthly => &mut self.ipca_monthly,
            IndicatorSeries::Ipca12m => &mut self.inflation_rate,
            IndicatorSeries::IgpmMonthly => &mut self.igpm_monthly,
        }
    }

    fn derive(&mut self) {
        self.real_interest_rate = difference(self.selic_rate, self.inflation_rate);
        self.cdi_selic_spread = difference(self.cdi_rate, self.selic_rate);
        self.usd_ptax_spread = difference(self.usd_brl, self.usd_brl_ptax);
        self.rate_regime = rate_regime(self.selic_rate);
    }
}

fn difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

/// Bucket a SELIC rate into its regime; each boundary belongs to the higher
/// bucket.
pub fn rate_regime(selic_rate: Option<f64>) -> Option<RateRegime> {
    let rate = selic_rate?;
    let regime = if rate < 7.0 {
        RateRegime::Low
    } else if rate < 10.0 {
        RateRegime::Moderate
    } else if rate < 13.0 {
        RateRegime::High
    } else {
        RateRegime::VeryHigh
    };
    Some(regime)
}

/// Normalize indicator observations to daily grain.
///
/// Emits one row per calendar day from the later of the first observation
/// and `start_date`, through `as_of`. Observations of unknown series codes
/// are skipped with a warning. Returns an empty vector when nothing is
/// observed on or before `as_of`.
pub fn normalize_indicators(
    records: &[CleanedIndicatorRecord],
    start_date: NaiveDate,
    as_of: NaiveDate,
) -> Vec<IndicatorDaily> {
    let catalog: HashMap<&str, IndicatorSeries> =
        known_series().iter().map(|info| (info.code, info.series)).collect();
    let mut unknown: BTreeSet<&str> = BTreeSet::new();
    let mut exact: HashMap<(NaiveDate, IndicatorSeries), f64> = HashMap::new();
    let mut carried: Vec<(NaiveDate, IndicatorSeries, f64)> = Vec::new();

    for record in records.iter().filter(|r| r.date <= as_of) {
        let Some(&series) = catalog.get(record.series_code.as_str()) else {
            unknown.insert(record.series_code.as_str());
            continue;
        };
        if record.frequency.is_forward_filled() {
            carried.push((record.date, series, record.value));
        } else {
            exact.insert((record.date, series), record.value);
        }
    }
    for code in &unknown {
        tracing::warn!(series_code = code, "skipping unknown indicator series");
    }

    let first_observed = exact
        .keys()
        .map(|(d, _)| *d)
        .chain(carried.iter().map(|(d, _, _)| *d))
        .min();
    let Some(first_observed) = first_observed else {
        return Vec::new();
    };
    let first = first_observed.max(start_date);
    if first > as_of {
        return Vec::new();
    }

    carried.sort_by_key(|(d, s, _)| (*d, *s));
    let mut last_known: BTreeMap<IndicatorSeries, f64> = BTreeMap::new();
    let mut cursor = 0;

    let mut out = Vec::new();
    for date in first.iter_days().take_while(|d| *d <= as_of) {
        while let Some(&(obs_date, series, value)) = carried.get(cursor)
            && obs_date <= date
        {
            last_known.insert(series, value);
            cursor += 1;
        }

        let mut row = IndicatorDaily::empty(date);
        for (&series, &value) in &last_known {
            *row.slot(series) = Some(value);
        }
        for &series in catalog.values() {
            if let Some(&value) = exact.get(&(date, series)) {
                *row.slot(series) = Some(value);
            }
        }
        row.derive();
        out.push(row);
    }

    tracing::info!(
        days = out.len(),
        first = %first,
        skipped_series = unknown.len(),
        "normalized indicators"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use recife_data::Frequency;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(
        code: &str,
        date: NaiveDate,
        value: f64,
        frequency: Frequency,
    ) -> CleanedIndicatorRecord {
        CleanedIndicatorRecord {
            series_code: code.to_string(),
            date,
            value,
            frequency,
        }
    }

    fn on(rows: &[IndicatorDaily], d: NaiveDate) -> &IndicatorDaily {
        rows.iter().find(|r| r.date == d).unwrap()
    }

    #[test]
    fn test_monthly_forward_fill() {
        let records = vec![
            obs("12", date(2024, 1, 15), 5.0, Frequency::Monthly),
            obs("12", date(2024, 2, 15), 5.2, Frequency::Monthly),
        ];
        let rows = normalize_indicators(&records, date(2024, 1, 1), date(2024, 3, 1));

        assert_eq!(rows.first().unwrap().date, date(2024, 1, 15));
        assert_eq!(rows.last().unwrap().date, date(2024, 3, 1));
        assert_eq!(on(&rows, date(2024, 1, 15)).inflation_rate, Some(5.0));
        assert_eq!(on(&rows, date(2024, 2, 14)).inflation_rate, Some(5.0));
        assert_eq!(on(&rows, date(2024, 2, 15)).inflation_rate, Some(5.2));
        assert_eq!(on(&rows, date(2024, 3, 1)).inflation_rate, Some(5.2));
    }

    #[test]
    fn test_no_backfill_before_first_observation() {
        let records = vec![
            obs("432", date(2024, 1, 2), 11.75, Frequency::Daily),
            obs("433", date(2024, 1, 10), 0.42, Frequency::Monthly),
        ];
        let rows = normalize_indicators(&records, date(2024, 1, 1), date(2024, 1, 12));

        assert_eq!(rows.first().unwrap().date, date(2024, 1, 2));
        assert_eq!(on(&rows, date(2024, 1, 9)).ipca_monthly, None);
        assert_eq!(on(&rows, date(2024, 1, 10)).ipca_monthly, Some(0.42));
    }

    #[test]
    fn test_daily_series_not_filled() {
        let records = vec![
            obs("432", date(2024, 1, 5), 11.75, Frequency::Daily),
            obs("432", date(2024, 1, 8), 11.65, Frequency::Daily),
        ];
        let rows = normalize_indicators(&records, date(2024, 1, 1), date(2024, 1, 8));

        assert_eq!(rows.len(), 4);
        assert_eq!(on(&rows, date(2024, 1, 5)).selic_rate, Some(11.75));
        assert_eq!(on(&rows, date(2024, 1, 6)).selic_rate, None);
        assert_eq!(on(&rows, date(2024, 1, 6)).rate_regime, None);
        assert_eq!(on(&rows, date(2024, 1, 8)).rate_regime, Some(RateRegime::High));
    }

    #[test]
    fn test_derived_fields() {
        let d = date(2024, 2, 1);
        let records = vec![
            obs("432", d, 11.25, Frequency::Daily),
            obs("24369", d, 11.15, Frequency::Daily),
            obs("1", d, 4.95, Frequency::Daily),
            obs("7832", d, 4.93, Frequency::Daily),
            obs("12", date(2024, 1, 15), 4.5, Frequency::Monthly),
        ];
        let rows = normalize_indicators(&records, date(2024, 1, 1), d);
        let row = on(&rows, d);

        assert_relative_eq!(row.real_interest_rate.unwrap(), 6.75, epsilon = 1e-12);
        assert_relative_eq!(row.cdi_selic_spread.unwrap(), -0.1, epsilon = 1e-9);
        assert_relative_eq!(row.usd_ptax_spread.unwrap(), 0.02, epsilon = 1e-9);
        assert_eq!(on(&rows, date(2024, 1, 20)).real_interest_rate, None);
    }

    #[test]
    fn test_start_date_bounds_output() {
        let records = vec![obs("12", date(2024, 1, 15), 5.0, Frequency::Monthly)];
        let rows = normalize_indicators(&records, date(2024, 2, 1), date(2024, 2, 3));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, date(2024, 2, 1));
        assert_eq!(rows[0].inflation_rate, Some(5.0));
    }

    #[test]
    fn test_unknown_series_skipped() {
        let records = vec![obs("99999", date(2024, 1, 2), 1.0, Frequency::Daily)];
        assert!(normalize_indicators(&records, date(2024, 1, 1), date(2024, 1, 5)).is_empty());
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(2.0), Some(RateRegime::Low))]
    #[case(Some(6.99), Some(RateRegime::Low))]
    #[case(Some(7.0), Some(RateRegime::Moderate))]
    #[case(Some(9.99), Some(RateRegime::Moderate))]
    #[case(Some(10.0), Some(RateRegime::High))]
    #[case(Some(12.99), Some(RateRegime::High))]
    #[case(Some(13.0), Some(RateRegime::VeryHigh))]
    #[case(Some(14.25), Some(RateRegime::VeryHigh))]
    fn test_rate_regime_boundaries(
        #[case] selic: Option<f64>,
        #[case] expected: Option<RateRegime>,
    ) {
        assert_eq!(rate_regime(selic), expected);
    }
}
