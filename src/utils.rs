use crate::schema::Period;
use chrono::{Datelike, NaiveDate};

pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let year = if date.month() == 12 {
        date.year() + 1
    } else {
        date.year()
    };

    let month = if date.month() == 12 {
        1
    } else {
        date.month() + 1
    };

    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
}

/// Every period from `start` to `end` inclusive. Empty when `end < start`.
pub fn periods_in_range(start: Period, end: Period) -> Vec<Period> {
    let mut periods = Vec::new();

    let mut current = start;
    while current <= end {
        periods.push(current);
        current = current.next();
    }

    periods
}

/// Lowercases, trims and collapses internal whitespace so headers and
/// specialty markers compare without regard to case or spacing.
pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Two-digit years follow the POSIX `strptime` window: 69..=99 are 19xx,
/// 00..=68 are 20xx. Four-digit years pass through.
pub fn expand_two_digit_year(year: i32) -> i32 {
    match year {
        0..=68 => 2000 + year,
        69..=99 => 1900 + year,
        _ => year,
    }
}

pub fn percent_of(part: u64, whole: u64) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 * 100.0 / whole as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_month_start() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        assert_eq!(
            next_month_start(date),
            NaiveDate::from_ymd_opt(2023, 2, 1).unwrap()
        );

        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(
            next_month_start(date),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_periods_in_range_spans_year_boundary() {
        let start = Period::new(2023, 11).unwrap();
        let end = Period::new(2024, 2).unwrap();
        let periods = periods_in_range(start, end);

        assert_eq!(periods.len(), 4);
        assert_eq!(periods[0], start);
        assert_eq!(periods[2], Period::new(2024, 1).unwrap());
        assert_eq!(periods[3], end);
    }

    #[test]
    fn test_periods_in_range_inverted_is_empty() {
        let start = Period::new(2024, 5).unwrap();
        let end = Period::new(2024, 4).unwrap();
        assert!(periods_in_range(start, end).is_empty());
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Grand   Total "), "grand total");
        assert_eq!(normalize_header("TỔNG CỘNG"), "tổng cộng");
    }

    #[test]
    fn test_expand_two_digit_year() {
        assert_eq!(expand_two_digit_year(24), 2024);
        assert_eq!(expand_two_digit_year(68), 2068);
        assert_eq!(expand_two_digit_year(69), 1969);
        assert_eq!(expand_two_digit_year(2019), 2019);
    }

    #[test]
    fn test_percent_of_zero_whole() {
        assert_eq!(percent_of(5, 0), None);
        assert_eq!(percent_of(1, 4), Some(25.0));
    }
}
