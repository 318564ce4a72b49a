//! Sheet-label period parsing.
//!
//! Sheet names in the monthly layout carry the month they describe in a
//! handful of free-text shapes (`Jan-24`, `March 2024`, `T03_2024`,
//! `thang3-24`, `03/2024`, `2024-03`). The first format that matches wins.

use crate::schema::Period;
use crate::utils::expand_two_digit_year;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelFormat {
    /// `jan-24`, `january 2024`, `sep_23`
    MonthName,
    /// After a `t`/`thang` prefix: `03-24`, `3_2024`
    PrefixedMonthNumber,
    /// `03/2024`, `3-2024`
    MonthYear,
    /// `2024/03`, `2024-3`
    YearMonth,
}

static PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:sheet|data|tháng|thang|t)[\s_\-]*").expect("valid prefix regex"));

static FORMATS: Lazy<Vec<(LabelFormat, Regex)>> = Lazy::new(|| {
    [
        (
            LabelFormat::MonthName,
            r"^(?P<month>[a-z]+)\.?[\s_\-]*(?P<year>\d{4}|\d{2})$",
        ),
        (
            LabelFormat::PrefixedMonthNumber,
            r"^(?P<month>\d{1,2})[\s_\-/](?P<year>\d{4}|\d{2})$",
        ),
        (
            LabelFormat::MonthYear,
            r"^(?P<month>\d{1,2})[/\-](?P<year>\d{4})$",
        ),
        (
            LabelFormat::YearMonth,
            r"^(?P<year>\d{4})[/\-](?P<month>\d{1,2})$",
        ),
    ]
    .into_iter()
    .map(|(format, pattern)| (format, Regex::new(pattern).expect("valid label regex")))
    .collect()
});

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Maps a sheet label to the month it names, or `None` when no supported
/// format matches. Callers skip unrecognized sheets.
pub fn parse_sheet_label(label: &str) -> Option<Period> {
    let lowered = label.trim().to_lowercase();

    // No month name begins with a prefix token, so stripping is safe for
    // every format.
    let (cleaned, prefixed) = match PREFIX.find(&lowered) {
        Some(m) => (&lowered[m.end()..], true),
        None => (lowered.as_str(), false),
    };

    for (format, regex) in FORMATS.iter() {
        if *format == LabelFormat::PrefixedMonthNumber && !prefixed {
            continue;
        }

        let Some(caps) = regex.captures(cleaned) else {
            continue;
        };

        let month = match format {
            LabelFormat::MonthName => month_from_name(&caps["month"]),
            _ => caps["month"].parse::<u32>().ok(),
        };
        let Some(month) = month else {
            continue;
        };

        let year_text = &caps["year"];
        let Ok(year) = year_text.parse::<i32>() else {
            continue;
        };
        let year = if year_text.len() == 2 {
            expand_two_digit_year(year)
        } else {
            year
        };

        if let Some(period) = Period::new(year, month) {
            return Some(period);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(year: i32, month: u32) -> Option<Period> {
        Period::new(year, month)
    }

    #[test]
    fn test_month_name_formats() {
        assert_eq!(parse_sheet_label("Jan-24"), p(2024, 1));
        assert_eq!(parse_sheet_label("Feb 24"), p(2024, 2));
        assert_eq!(parse_sheet_label("March-2023"), p(2023, 3));
        assert_eq!(parse_sheet_label("  December 2022 "), p(2022, 12));
        assert_eq!(parse_sheet_label("Sept_23"), p(2023, 9));
    }

    #[test]
    fn test_prefixed_month_number_formats() {
        assert_eq!(parse_sheet_label("T01-24"), p(2024, 1));
        assert_eq!(parse_sheet_label("T11_2023"), p(2023, 11));
        assert_eq!(parse_sheet_label("thang3_2024"), p(2024, 3));
        assert_eq!(parse_sheet_label("Thang 12-23"), p(2023, 12));
        assert_eq!(parse_sheet_label("Tháng 5-2024"), p(2024, 5));
    }

    #[test]
    fn test_numeric_formats() {
        assert_eq!(parse_sheet_label("03/2024"), p(2024, 3));
        assert_eq!(parse_sheet_label("3-2024"), p(2024, 3));
        assert_eq!(parse_sheet_label("2024/07"), p(2024, 7));
        assert_eq!(parse_sheet_label("2024-7"), p(2024, 7));
        assert_eq!(parse_sheet_label("Sheet 2024-08"), p(2024, 8));
    }

    #[test]
    fn test_every_match_is_first_of_month() {
        for label in ["Jan-24", "T02_2024", "03/2024", "2024-04", "may 2024"] {
            let period = parse_sheet_label(label).unwrap();
            assert_eq!(chrono::Datelike::day(&period.first_day()), 1, "{}", label);
        }
    }

    #[test]
    fn test_two_digit_year_window() {
        assert_eq!(parse_sheet_label("Jan-68"), p(2068, 1));
        assert_eq!(parse_sheet_label("Jan-69"), p(1969, 1));
    }

    #[test]
    fn test_unrecognized_labels() {
        assert_eq!(parse_sheet_label("foo123"), None);
        assert_eq!(parse_sheet_label("Sheet1"), None);
        assert_eq!(parse_sheet_label("Total"), None);
        assert_eq!(parse_sheet_label("13/2024"), None);
        assert_eq!(parse_sheet_label("2024-00"), None);
        assert_eq!(parse_sheet_label(""), None);
        // unprefixed numeric labels need a four-digit year
        assert_eq!(parse_sheet_label("03-24"), None);
    }
}
