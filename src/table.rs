use crate::schema::{Channel, Period, RegistrationRow, RowKey};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// The deduplicated (period, specialty) table built from one workbook.
///
/// There is no mutable access once built; views derive filtered copies.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    rows: BTreeMap<RowKey, RegistrationRow>,
    all_period_totals: BTreeMap<String, u64>,
    channels: Vec<Channel>,
}

impl CanonicalTable {
    pub(crate) fn from_rows(rows: BTreeMap<RowKey, RegistrationRow>, channels: Vec<Channel>) -> Self {
        let mut all_period_totals: BTreeMap<String, u64> = BTreeMap::new();
        for row in rows.values() {
            *all_period_totals.entry(row.specialty.clone()).or_insert(0) += row.grand_total;
        }

        let mut channels = channels;
        channels.sort();
        channels.dedup();

        Self {
            rows,
            all_period_totals,
            channels,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in canonical order: period ascending, then specialty ascending.
    pub fn iter(&self) -> impl Iterator<Item = &RegistrationRow> {
        self.rows.values()
    }

    pub fn get(&self, period: Period, specialty: &str) -> Option<&RegistrationRow> {
        self.rows.get(&RowKey {
            period,
            specialty: specialty.to_string(),
        })
    }

    /// Rows with `start <= period <= end`, in canonical order.
    pub fn rows_between(&self, start: Period, end: Period) -> impl Iterator<Item = &RegistrationRow> {
        let lower = Bound::Included(RowKey {
            period: start,
            specialty: String::new(),
        });
        let upper = Bound::Excluded(RowKey {
            period: end.next(),
            specialty: String::new(),
        });
        // An inverted range would make BTreeMap::range panic.
        let bounds = if start <= end {
            Some((lower, upper))
        } else {
            None
        };
        bounds
            .into_iter()
            .flat_map(move |b| self.rows.range(b).map(|(_, row)| row))
    }

    pub fn periods(&self) -> Vec<Period> {
        self.rows
            .keys()
            .map(|k| k.period)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn specialties(&self) -> Vec<String> {
        self.all_period_totals.keys().cloned().collect()
    }

    pub fn period_bounds(&self) -> Option<(Period, Period)> {
        let first = self.rows.keys().next()?.period;
        let last = self.rows.keys().next_back()?.period;
        Some((first, last))
    }

    /// Sum of grand totals across every period for a specialty.
    pub fn all_period_total(&self, specialty: &str) -> u64 {
        self.all_period_totals.get(specialty).copied().unwrap_or(0)
    }

    pub fn all_period_totals(&self) -> &BTreeMap<String, u64> {
        &self.all_period_totals
    }

    /// Channels that had a column in at least one contributing sheet.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ChannelCounts;

    fn row(year: i32, month: u32, specialty: &str, pkh: u64) -> RegistrationRow {
        RegistrationRow::new(
            Period::new(year, month).unwrap(),
            specialty,
            ChannelCounts::new().with(Channel::Pkh, pkh),
        )
    }

    fn table(rows: Vec<RegistrationRow>) -> CanonicalTable {
        let map = rows.into_iter().map(|r| (r.key(), r)).collect();
        CanonicalTable::from_rows(map, vec![Channel::Pkh, Channel::Pkh])
    }

    #[test]
    fn test_canonical_order_and_totals() {
        let t = table(vec![
            row(2024, 2, "Nhi", 3),
            row(2024, 1, "Tim mạch", 4),
            row(2024, 1, "Nhi", 5),
        ]);

        let order: Vec<(Period, &str)> = t.iter().map(|r| (r.period, r.specialty.as_str())).collect();
        assert_eq!(
            order,
            vec![
                (Period::new(2024, 1).unwrap(), "Nhi"),
                (Period::new(2024, 1).unwrap(), "Tim mạch"),
                (Period::new(2024, 2).unwrap(), "Nhi"),
            ]
        );
        assert_eq!(t.all_period_total("Nhi"), 8);
        assert_eq!(t.all_period_total("Tim mạch"), 4);
        assert_eq!(t.all_period_total("Khác"), 0);
        assert_eq!(t.channels(), &[Channel::Pkh]);
    }

    #[test]
    fn test_rows_between_is_inclusive() {
        let t = table(vec![
            row(2023, 12, "Nhi", 1),
            row(2024, 1, "Nhi", 2),
            row(2024, 2, "Nhi", 3),
            row(2024, 3, "Nhi", 4),
        ]);

        let jan = Period::new(2024, 1).unwrap();
        let feb = Period::new(2024, 2).unwrap();
        let values: Vec<u64> = t.rows_between(jan, feb).map(|r| r.grand_total).collect();
        assert_eq!(values, vec![2, 3]);

        assert_eq!(t.rows_between(feb, jan).count(), 0);
        assert_eq!(
            t.period_bounds(),
            Some((Period::new(2023, 12).unwrap(), Period::new(2024, 3).unwrap()))
        );
    }
}
