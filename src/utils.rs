use crate::error::{Result, SalesPerformanceError};
use chrono::{Datelike, Days, Month, NaiveDate};
use serde_json::Value;
use std::str::FromStr;

pub const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Reads a numeric cell. Numbers pass through, strings are trimmed and may
/// carry thousands separators ("1,250.50"). Anything else yields `None`.
pub fn parse_number(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Same as [`parse_number`] but degrades to zero.
pub fn number_or_zero(cell: &Value) -> f64 {
    parse_number(cell).unwrap_or(0.0)
}

/// True when the cell holds something that is neither blank nor a number.
pub fn is_malformed_number(cell: &Value) -> bool {
    match cell {
        Value::Null => false,
        Value::String(s) if s.trim().is_empty() => false,
        other => parse_number(other).is_none(),
    }
}

/// Renders a cell as trimmed text. Integral numbers drop their fraction so
/// numeric employee ids ("1001") survive a round trip through a spreadsheet.
pub fn cell_to_string(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub fn cell_at(row: &[Value], index: usize) -> &Value {
    row.get(index).unwrap_or(&Value::Null)
}

/// Accepts the abbreviations `Jan`..`Dec` as well as full month names,
/// case-insensitively. Returns the 1-based month number.
pub fn parse_month_name(name: &str) -> Result<u32> {
    Month::from_str(name.trim())
        .map(|m| m.number_from_month())
        .map_err(|_| {
            SalesPerformanceError::InvalidPeriod(format!(
                "Unknown month name '{}'. Expected one of {}",
                name,
                MONTH_ABBREVIATIONS.join(", ")
            ))
        })
}

pub fn month_abbreviation(month: u32) -> &'static str {
    MONTH_ABBREVIATIONS
        .get(month.wrapping_sub(1) as usize)
        .copied()
        .unwrap_or("???")
}

pub fn parse_year(year: &str) -> Result<i32> {
    let trimmed = year.trim();
    if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(SalesPerformanceError::InvalidPeriod(format!(
            "Invalid year '{}'. Expected a 4-digit year",
            year
        )));
    }
    trimmed
        .parse::<i32>()
        .map_err(|_| SalesPerformanceError::InvalidPeriod(format!("Invalid year '{}'", year)))
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month)
        .map(|d| d.day())
        .unwrap_or(31)
}

/// `(current - prior) / prior * 100`, or zero when there is no positive base.
pub fn percent_change(current: f64, prior: f64) -> f64 {
    if prior > 0.0 {
        (current - prior) / prior * 100.0
    } else {
        0.0
    }
}

pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
