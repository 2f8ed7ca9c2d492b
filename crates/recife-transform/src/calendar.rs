//! Date dimension generation for the B3 trading calendar.
//!
//! Trading days are weekdays that are not market holidays. The fixed-date
//! national holidays are built in; moveable ones (Carnival, Good Friday,
//! Corpus Christi) and one-off closures are supplied as extra holidays.

use crate::error::{Result, TransformError};
use chrono::{Datelike, NaiveDate, Weekday};
use recife_data::{DateDimensionRow, date_key};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named market holiday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// Holiday date
    pub date: NaiveDate,
    /// Holiday name
    pub name: String,
}

impl Holiday {
    /// Create a holiday.
    pub fn new(date: NaiveDate, name: impl Into<String>) -> Self {
        Self {
            date,
            name: name.into(),
        }
    }
}

/// Fixed-date Brazilian national holiday falling on `date`, if any.
pub fn national_holiday(date: NaiveDate) -> Option<&'static str> {
    match (date.month(), date.day()) {
        (1, 1) => Some("Confraternização Universal"),
        (4, 21) => Some("Tiradentes"),
        (5, 1) => Some("Dia do Trabalho"),
        (9, 7) => Some("Independência do Brasil"),
        (10, 12) => Some("Nossa Senhora Aparecida"),
        (11, 2) => Some("Finados"),
        (11, 15) => Some("Proclamação da República"),
        (11, 20) if date.year() >= 2024 => Some("Dia Nacional de Zumbi e da Consciência Negra"),
        (12, 25) => Some("Natal"),
        _ => None,
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}

const fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

const fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

/// Build one date dimension row.
pub fn date_dimension_row(date: NaiveDate, holiday: Option<&str>) -> DateDimensionRow {
    let weekend = is_weekend(date);
    DateDimensionRow {
        date_key: date_key(date),
        date,
        year: date.year(),
        quarter: (date.month() - 1) / 3 + 1,
        month: date.month(),
        day: date.day(),
        day_of_week: date.weekday().number_from_monday(),
        day_name: day_name(date.weekday()).to_string(),
        month_name: month_name(date.month()).to_string(),
        week_of_year: date.iso_week().week(),
        is_weekend: weekend,
        is_holiday: holiday.is_some(),
        holiday_name: holiday.map(str::to_string),
        is_trading_day: !weekend && holiday.is_none(),
        is_month_end: is_month_end(date),
    }
}

/// Generate the date dimension for every calendar day in `[start, end]`.
///
/// Extra holidays override the built-in name when they share a date.
pub fn generate_date_dimension(
    start: NaiveDate,
    end: NaiveDate,
    extra_holidays: &[Holiday],
) -> Result<Vec<DateDimensionRow>> {
    if start > end {
        return Err(TransformError::InvalidDateRange { start, end });
    }

    let extra: HashMap<NaiveDate, &str> = extra_holidays
        .iter()
        .map(|h| (h.date, h.name.as_str()))
        .collect();

    let rows: Vec<DateDimensionRow> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|d| {
            let holiday = extra.get(&d).copied().or_else(|| national_holiday(d));
            date_dimension_row(d, holiday)
        })
        .collect();

    tracing::debug!(
        rows = rows.len(),
        trading_days = rows.iter().filter(|r| r.is_trading_day).count(),
        "generated date dimension"
    );
    Ok(rows)
}
