//! Pure reductions over a [`FilteredView`].
//!
//! Nothing here touches the canonical table; every function takes a view and
//! returns a fresh value. Absent channels and channels recorded as zero read
//! the same.

use crate::filter::FilteredView;
use crate::schema::{Channel, ChannelCounts, Period};
use crate::utils::percent_of;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodTotal {
    pub period: Period,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialtyTotal {
    pub specialty: String,
    pub total: u64,
}

/// Change from the first scaffold period to the last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodDelta {
    pub first: PeriodTotal,
    pub last: PeriodTotal,
    pub absolute: i64,
    /// `None` when the first period's total is zero.
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share<T> {
    pub name: T,
    pub total: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterTotals {
    pub year: i32,
    pub quarter: u32,
    pub channels: BTreeMap<Channel, u64>,
    pub total: u64,
}

impl QuarterTotals {
    pub fn label(&self) -> String {
        format!("Q{} {}", self.quarter, self.year)
    }
}

pub fn grand_sum(view: &FilteredView) -> u64 {
    view.rows().iter().map(|r| r.grand_total).sum()
}

/// Grand total per scaffold period; months without rows read as zero.
pub fn by_period(view: &FilteredView) -> Vec<PeriodTotal> {
    let mut totals: BTreeMap<Period, u64> = BTreeMap::new();
    for row in view.rows() {
        *totals.entry(row.period).or_insert(0) += row.grand_total;
    }

    view.scaffold()
        .iter()
        .map(|period| PeriodTotal {
            period: *period,
            total: totals.get(period).copied().unwrap_or(0),
        })
        .collect()
}

/// Sum of each channel over the view. All four channels are always keys.
pub fn by_channel(view: &FilteredView) -> BTreeMap<Channel, u64> {
    let mut totals: BTreeMap<Channel, u64> = Channel::ALL.iter().map(|c| (*c, 0)).collect();
    for row in view.rows() {
        for channel in Channel::ALL {
            *totals.entry(channel).or_insert(0) += row.count(channel);
        }
    }
    totals
}

/// Per-channel series on the scaffold.
pub fn channel_series(view: &FilteredView) -> BTreeMap<Channel, Vec<PeriodTotal>> {
    let mut per_period: BTreeMap<(Channel, Period), u64> = BTreeMap::new();
    for row in view.rows() {
        for channel in Channel::ALL {
            *per_period.entry((channel, row.period)).or_insert(0) += row.count(channel);
        }
    }

    Channel::ALL
        .iter()
        .map(|channel| {
            let series = view
                .scaffold()
                .iter()
                .map(|period| PeriodTotal {
                    period: *period,
                    total: per_period.get(&(*channel, *period)).copied().unwrap_or(0),
                })
                .collect();
            (*channel, series)
        })
        .collect()
}

/// Grand total per specialty within the view's range.
pub fn by_specialty(view: &FilteredView) -> BTreeMap<String, u64> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for row in view.rows() {
        *totals.entry(row.specialty.clone()).or_insert(0) += row.grand_total;
    }
    totals
}

/// One specialty's grand total per scaffold period.
pub fn specialty_series(view: &FilteredView, specialty: &str) -> Vec<PeriodTotal> {
    let mut totals: BTreeMap<Period, u64> = BTreeMap::new();
    for row in view.rows().iter().filter(|r| r.specialty == specialty) {
        *totals.entry(row.period).or_insert(0) += row.grand_total;
    }

    view.scaffold()
        .iter()
        .map(|period| PeriodTotal {
            period: *period,
            total: totals.get(period).copied().unwrap_or(0),
        })
        .collect()
}

/// Channel totals per specialty within the view's range.
pub fn specialty_channels(view: &FilteredView) -> BTreeMap<String, ChannelCounts> {
    let mut totals: BTreeMap<String, ChannelCounts> = BTreeMap::new();
    for row in view.rows() {
        totals
            .entry(row.specialty.clone())
            .or_default()
            .add(&row.channels);
    }
    totals
}

fn rank_order(a: &SpecialtyTotal, b: &SpecialtyTotal) -> Ordering {
    b.total
        .cmp(&a.total)
        .then_with(|| a.specialty.cmp(&b.specialty))
}

/// All specialties by range total, descending; ties by name ascending.
pub fn rank_specialties(view: &FilteredView) -> Vec<SpecialtyTotal> {
    let mut ranked: Vec<SpecialtyTotal> = by_specialty(view)
        .into_iter()
        .map(|(specialty, total)| SpecialtyTotal { specialty, total })
        .collect();
    ranked.sort_by(rank_order);
    ranked
}

pub fn top_n(view: &FilteredView, n: usize) -> Vec<SpecialtyTotal> {
    let mut ranked = rank_specialties(view);
    ranked.truncate(n);
    ranked
}

pub fn period_delta(view: &FilteredView) -> Option<PeriodDelta> {
    let series = by_period(view);
    let first = *series.first()?;
    let last = *series.last()?;

    Some(PeriodDelta {
        first,
        last,
        absolute: last.total as i64 - first.total as i64,
        percent: if first.total == 0 {
            None
        } else {
            Some((last.total as f64 - first.total as f64) / first.total as f64 * 100.0)
        },
    })
}

/// The largest channel and its share of the view. Ties go to the channel
/// declared first. `None` when the view sums to zero.
pub fn top_channel_share(view: &FilteredView) -> Option<Share<Channel>> {
    let whole = grand_sum(view);
    let totals = by_channel(view);

    let mut best: Option<(Channel, u64)> = None;
    for channel in Channel::ALL {
        let total = totals.get(&channel).copied().unwrap_or(0);
        if best.map_or(true, |(_, t)| total > t) {
            best = Some((channel, total));
        }
    }

    let (name, total) = best?;
    let percent = percent_of(total, whole)?;
    Some(Share {
        name,
        total,
        percent,
    })
}

/// The top specialty and its share of the view. `None` when the view sums
/// to zero.
pub fn top_specialty_share(view: &FilteredView) -> Option<Share<String>> {
    let whole = grand_sum(view);
    let top = rank_specialties(view).into_iter().next()?;
    let percent = percent_of(top.total, whole)?;
    Some(Share {
        name: top.specialty,
        total: top.total,
        percent,
    })
}

/// Quarter read-model derived from the monthly rows.
pub fn by_quarter(view: &FilteredView) -> Vec<QuarterTotals> {
    let mut quarters: BTreeMap<(i32, u32), QuarterTotals> = BTreeMap::new();
    for row in view.rows() {
        let (year, quarter) = (row.period.year(), row.period.quarter());
        let entry = quarters
            .entry((year, quarter))
            .or_insert_with(|| QuarterTotals {
                year,
                quarter,
                channels: Channel::ALL.iter().map(|c| (*c, 0)).collect(),
                total: 0,
            });
        for channel in Channel::ALL {
            *entry.channels.entry(channel).or_insert(0) += row.count(channel);
        }
        entry.total += row.grand_total;
    }
    quarters.into_values().collect()
}
