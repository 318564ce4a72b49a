use crate::error::{RegistrationError, Result};
use crate::schema::{Period, RegistrationRow};
use crate::table::CanonicalTable;
use crate::utils::periods_in_range;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An inclusive, ordered pair of periods. Construction rejects `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: Period,
    end: Period,
}

impl DateRange {
    pub fn new(start: Period, end: Period) -> Result<Self> {
        if end < start {
            return Err(RegistrationError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Accepts any calendar dates; both are truncated to their month first.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(Period::from_date(start), Period::from_date(end))
    }

    pub fn start(&self) -> Period {
        self.start
    }

    pub fn end(&self) -> Period {
        self.end
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }

    /// The three months of a quarter (1..=4).
    pub fn quarter(year: i32, quarter: u32) -> Option<Self> {
        let start = Period::quarter_start(year, quarter)?;
        let end = start.next().next();
        Some(Self { start, end })
    }

    /// Months in both ranges, or `None` when they do not overlap.
    pub fn intersect(&self, other: DateRange) -> Option<Self> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(Self { start, end })
    }

    /// Every month from start to end, whether or not the data has it.
    pub fn scaffold(&self) -> Vec<Period> {
        periods_in_range(self.start, self.end)
    }
}

/// Rows of the canonical table that fall in a range, plus the full month
/// scaffold for that range. Always an owned copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredView {
    range: DateRange,
    rows: Vec<RegistrationRow>,
    scaffold: Vec<Period>,
}

impl FilteredView {
    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn rows(&self) -> &[RegistrationRow] {
        &self.rows
    }

    pub fn scaffold(&self) -> &[Period] {
        &self.scaffold
    }

    /// True when no data falls in the range. This is a normal state, not an
    /// error.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn specialties(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.specialty.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

pub fn filter(table: &CanonicalTable, range: DateRange) -> FilteredView {
    FilteredView {
        range,
        rows: table
            .rows_between(range.start(), range.end())
            .cloned()
            .collect(),
        scaffold: range.scaffold(),
    }
}

/// Validates the bounds and filters in one step.
pub fn filter_periods(table: &CanonicalTable, start: Period, end: Period) -> Result<FilteredView> {
    Ok(filter(table, DateRange::new(start, end)?))
}
