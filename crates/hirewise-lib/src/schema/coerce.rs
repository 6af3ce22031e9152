//! Cell coercion into typed record values
//!
//! Malformed input never fails: counts fall back to 0, money and dates to
//! null, text to the "Unknown" sentinel at the call site.

use crate::models::Cell;
use chrono::{Days, NaiveDate, NaiveDateTime};

/// Excel's day zero in the 1900 date system (accounts for the 1900 leap-year bug)
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Largest serial Excel can represent (9999-12-31)
const EXCEL_MAX_SERIAL: f64 = 2_958_465.0;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%b-%Y", "%d %b %Y"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Non-negative count; anything unusable becomes 0
pub fn count(cell: &Cell) -> f64 {
    match number(cell) {
        Some(n) if n > 0.0 => n,
        _ => 0.0,
    }
}

/// Monetary amount; null when unparseable
pub fn money(cell: &Cell) -> Option<f64> {
    number(cell)
}

/// Finite number from a numeric cell or numeric text
pub fn number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

pub fn date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => parse_date_text(s.trim()),
        Cell::Empty => None,
    }
}

/// Trimmed text; None when blank
pub fn text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        Cell::Number(n) => Some(n.to_string()),
        Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
    }
}

pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > EXCEL_MAX_SERIAL {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    NaiveDate::from_ymd_opt(y, m, d)?.checked_add_days(Days::new(serial.floor() as u64))
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_count_coercion() {
        assert_eq!(count(&Cell::Number(4.0)), 4.0);
        assert_eq!(count(&Cell::text(" 12 ")), 12.0);
        assert_eq!(count(&Cell::text("1,200")), 1200.0);
        assert_eq!(count(&Cell::text("n/a")), 0.0);
        assert_eq!(count(&Cell::Number(-3.0)), 0.0);
        assert_eq!(count(&Cell::Number(f64::NAN)), 0.0);
        assert_eq!(count(&Cell::Empty), 0.0);
        assert_eq!(count(&Cell::Date(ymd(2024, 1, 1))), 0.0);
    }

    #[test]
    fn test_money_stays_null_when_unparseable() {
        assert_eq!(money(&Cell::text("90,000")), Some(90_000.0));
        assert_eq!(money(&Cell::text("TBD")), None);
        assert_eq!(money(&Cell::Empty), None);
    }

    #[test]
    fn test_date_formats() {
        assert_eq!(date(&Cell::text("2024-03-15")), Some(ymd(2024, 3, 15)));
        assert_eq!(date(&Cell::text("2024/03/15")), Some(ymd(2024, 3, 15)));
        assert_eq!(date(&Cell::text("03/15/2024")), Some(ymd(2024, 3, 15)));
        assert_eq!(date(&Cell::text("15/03/2024")), Some(ymd(2024, 3, 15)));
        assert_eq!(date(&Cell::text("15-Mar-2024")), Some(ymd(2024, 3, 15)));
        assert_eq!(date(&Cell::text("2024-03-15 10:30:00")), Some(ymd(2024, 3, 15)));
        assert_eq!(date(&Cell::text("soon")), None);
    }

    #[test]
    fn test_excel_serial_dates() {
        assert_eq!(excel_serial_to_date(45366.0), Some(ymd(2024, 3, 15)));
        assert_eq!(excel_serial_to_date(45366.75), Some(ymd(2024, 3, 15)));
        assert_eq!(excel_serial_to_date(0.0), None);
        assert_eq!(excel_serial_to_date(f64::INFINITY), None);
    }

    #[test]
    fn test_text_trimming() {
        assert_eq!(text(&Cell::text("  Alice ")), Some("Alice".to_string()));
        assert_eq!(text(&Cell::text("   ")), None);
        assert_eq!(text(&Cell::Number(1042.0)), Some("1042".to_string()));
    }
}
