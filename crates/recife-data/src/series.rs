//! Indicator series catalog
//!
//! Central registry of the Banco Central do Brasil SGS series the warehouse
//! knows how to pivot. Allows lookup by series code.

use crate::records::Frequency;

/// Indicator series tracked by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorSeries {
    /// SELIC base rate
    Selic,
    /// CDI interbank rate
    Cdi,
    /// USD/BRL commercial exchange rate
    UsdBrl,
    /// USD/BRL PTAX rate
    UsdBrlPtax,
    /// IPCA monthly inflation
    IpcaMonthly,
    /// IPCA accumulated over 12 months
    Ipca12m,
    /// IGP-M monthly
    IgpmMonthly,
}

/// Series metadata
#[derive(Debug, Clone)]
pub struct SeriesInfo {
    /// Series
    pub series: IndicatorSeries,
    /// SGS code
    pub code: &'static str,
    /// Short name
    pub name: &'static str,
    /// Expected publication frequency
    pub frequency: Frequency,
    /// Unit label
    pub unit: &'static str,
    /// Column name in the fact table
    pub column: &'static str,
}

/// Get all known series
pub fn known_series() -> Vec<SeriesInfo> {
    vec![
        SeriesInfo {
            series: IndicatorSeries::Selic,
            code: "432",
            name: "SELIC",
            frequency: Frequency::Daily,
            unit: "% per year",
            column: "selic_rate",
        },
        SeriesInfo {
            series: IndicatorSeries::IpcaMonthly,
            code: "433",
            name: "IPCA",
            frequency: Frequency::Monthly,
            unit: "% monthly",
            column: "ipca_monthly",
        },
        SeriesInfo {
            series: IndicatorSeries::UsdBrl,
            code: "1",
            name: "USD_BRL",
            frequency: Frequency::Daily,
            unit: "BRL/USD",
            column: "usd_brl",
        },
        SeriesInfo {
            series: IndicatorSeries::Ipca12m,
            code: "12",
            name: "IPCA_12M",
            frequency: Frequency::Monthly,
            unit: "% 12 months",
            column: "inflation_rate",
        },
        SeriesInfo {
            series: IndicatorSeries::Cdi,
            code: "24369",
            name: "CDI_Daily",
            frequency: Frequency::Daily,
            unit: "% per day",
            column: "cdi_rate",
        },
        SeriesInfo {
            series: IndicatorSeries::IgpmMonthly,
            code: "189",
            name: "IGP_M",
            frequency: Frequency::Monthly,
            unit: "% monthly",
            column: "igpm_monthly",
        },
        SeriesInfo {
            series: IndicatorSeries::UsdBrlPtax,
            code: "7832",
            name: "USD_BRL_PTAX",
            frequency: Frequency::Daily,
            unit: "BRL/USD",
            column: "usd_brl_ptax",
        },
    ]
}

/// Find a series by SGS code
pub fn lookup_series(code: &str) -> Option<SeriesInfo> {
    known_series().into_iter().find(|s| s.code == code)
}
