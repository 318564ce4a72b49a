//! Presentation-ready views.
//!
//! Each view is a pure function of the canonical table, a validated range and
//! a view-specific selector. The results carry every number a page shows, so
//! no arithmetic is left to the presentation layer.

use crate::aggregate::{
    by_channel, by_period, channel_series, grand_sum, period_delta, rank_specialties,
    specialty_channels, specialty_series, top_channel_share, top_n, top_specialty_share,
    PeriodDelta, PeriodTotal, Share, SpecialtyTotal,
};
use crate::error::Result;
use crate::filter::{filter, DateRange, FilteredView};
use crate::schema::{Channel, Period};
use crate::table::CanonicalTable;
use crate::utils::percent_of;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: Period,
    pub total: u64,
    pub channels: BTreeMap<Channel, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewView {
    pub range: DateRange,
    pub is_empty: bool,
    pub total: u64,
    pub delta: Option<PeriodDelta>,
    pub top_channel: Option<Share<Channel>>,
    pub top_specialty: Option<Share<String>>,
    pub trend: Vec<TrendPoint>,
    pub top_specialties: Vec<SpecialtyTotal>,
}

pub fn overview(table: &CanonicalTable, range: DateRange, top: usize) -> OverviewView {
    let view = filter(table, range);
    let series = channel_series(&view);

    let trend = by_period(&view)
        .into_iter()
        .enumerate()
        .map(|(idx, point)| TrendPoint {
            period: point.period,
            total: point.total,
            channels: series
                .iter()
                .map(|(channel, points)| (*channel, points.get(idx).map_or(0, |p| p.total)))
                .collect(),
        })
        .collect();

    OverviewView {
        range,
        is_empty: view.is_empty(),
        total: grand_sum(&view),
        delta: period_delta(&view),
        top_channel: top_channel_share(&view),
        top_specialty: top_specialty_share(&view),
        trend,
        top_specialties: top_n(&view, top),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelScope {
    WholeRange,
    Period(Period),
    Quarter { year: i32, quarter: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection {
    pub scope: ChannelScope,
    /// `None` selects every channel the table has a column for.
    pub channels: Option<Vec<Channel>>,
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            scope: ChannelScope::WholeRange,
            channels: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDistributionView {
    pub range: DateRange,
    pub scope: ChannelScope,
    pub channels: Vec<Channel>,
    /// Selected channels with a non-zero total, as shares of the selection.
    pub distribution: Vec<Share<Channel>>,
    pub trend: BTreeMap<Channel, Vec<PeriodTotal>>,
}

/// Returns `None` when the selection names no channel, or when the scoped
/// month or quarter lies entirely outside `range`. A quarter that only
/// overlaps `range` is cut to the overlap.
pub fn channel_distribution(
    table: &CanonicalTable,
    range: DateRange,
    selection: &ChannelSelection,
) -> Option<ChannelDistributionView> {
    let channels: Vec<Channel> = match &selection.channels {
        Some(chosen) => Channel::ALL
            .into_iter()
            .filter(|c| chosen.contains(c))
            .collect(),
        None => table.channels().to_vec(),
    };
    if channels.is_empty() {
        return None;
    }

    let scope_range = match selection.scope {
        ChannelScope::WholeRange => range,
        ChannelScope::Period(period) => range.intersect(DateRange::new(period, period).ok()?)?,
        ChannelScope::Quarter { year, quarter } => {
            range.intersect(DateRange::quarter(year, quarter)?)?
        }
    };

    let view = filter(table, range);
    let scoped = filter(table, scope_range);

    let totals = by_channel(&scoped);
    let selected_sum: u64 = channels.iter().map(|c| totals[c]).sum();
    let distribution = channels
        .iter()
        .filter(|c| totals[*c] > 0)
        .filter_map(|c| {
            Some(Share {
                name: *c,
                total: totals[c],
                percent: percent_of(totals[c], selected_sum)?,
            })
        })
        .collect();

    let trend = channel_series(&view)
        .into_iter()
        .filter(|(c, _)| channels.contains(c))
        .collect();

    Some(ChannelDistributionView {
        range,
        scope: selection.scope,
        channels,
        distribution,
        trend,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialtySeries {
    pub specialty: String,
    pub total: u64,
    pub points: Vec<PeriodTotal>,
    pub channels: BTreeMap<Channel, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialtyComparisonView {
    pub range: DateRange,
    pub specialties: Vec<SpecialtySeries>,
}

/// The `k` specialties with the highest totals in the range.
pub fn default_comparison(table: &CanonicalTable, range: DateRange, k: usize) -> Vec<String> {
    top_n(&filter(table, range), k)
        .into_iter()
        .map(|t| t.specialty)
        .collect()
}

/// Compares the named specialties over the range. Names the table does not
/// know are ignored; `None` when nothing is left to compare.
pub fn specialty_comparison(
    table: &CanonicalTable,
    range: DateRange,
    specialties: &[String],
) -> Option<SpecialtyComparisonView> {
    let view = filter(table, range);
    let known = table.all_period_totals();
    let totals: BTreeMap<String, u64> = rank_specialties(&view)
        .into_iter()
        .map(|t| (t.specialty, t.total))
        .collect();
    let channel_totals = specialty_channels(&view);

    let mut seen = Vec::new();
    let series: Vec<SpecialtySeries> = specialties
        .iter()
        .filter(|name| known.contains_key(name.as_str()))
        .filter(|name| {
            if seen.contains(name) {
                false
            } else {
                seen.push(*name);
                true
            }
        })
        .map(|name| SpecialtySeries {
            specialty: name.clone(),
            total: totals.get(name).copied().unwrap_or(0),
            points: specialty_series(&view, name),
            channels: Channel::ALL
                .into_iter()
                .map(|c| {
                    let value = channel_totals.get(name).map_or(0, |counts| counts.get(c));
                    (c, value)
                })
                .collect(),
        })
        .collect();

    if series.is_empty() {
        return None;
    }

    Some(SpecialtyComparisonView {
        range,
        specialties: series,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetailMode {
    Full,
    Period(Period),
    Quarter { year: i32, quarter: u32 },
    Channel(Channel),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub period: Period,
    pub specialty: String,
    pub channels: BTreeMap<Channel, u64>,
    pub grand_total: u64,
    pub all_period_total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub range: DateRange,
    pub mode: DetailMode,
    pub channels: Vec<Channel>,
    pub rows: Vec<DetailRow>,
}

pub fn detail(table: &CanonicalTable, range: DateRange, mode: DetailMode) -> DetailView {
    let view: FilteredView = filter(table, range);

    let channels = match mode {
        DetailMode::Channel(channel) => vec![channel],
        _ => Channel::ALL.to_vec(),
    };

    let rows = view
        .rows()
        .iter()
        .filter(|row| match mode {
            DetailMode::Period(period) => row.period == period,
            DetailMode::Quarter { year, quarter } => {
                row.period.year() == year && row.period.quarter() == quarter
            }
            _ => true,
        })
        .map(|row| DetailRow {
            period: row.period,
            specialty: row.specialty.clone(),
            channels: channels.iter().map(|c| (*c, row.count(*c))).collect(),
            grand_total: row.grand_total,
            all_period_total: table.all_period_total(&row.specialty),
        })
        .collect();

    DetailView {
        range,
        mode,
        channels,
        rows,
    }
}

impl DetailView {
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec!["Month".to_string(), "Chuyên khoa".to_string()];
        headers.extend(self.channels.iter().map(|c| c.label().to_string()));
        if !matches!(self.mode, DetailMode::Channel(_)) {
            headers.push("Grand Total".to_string());
            headers.push("Total (all months)".to_string());
        }
        headers
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.headers())?;

        let with_totals = !matches!(self.mode, DetailMode::Channel(_));
        for row in &self.rows {
            let mut record = vec![row.period.key(), row.specialty.clone()];
            record.extend(
                self.channels
                    .iter()
                    .map(|c| row.channels.get(c).copied().unwrap_or(0).to_string()),
            );
            if with_totals {
                record.push(row.grand_total.to_string());
                record.push(row.all_period_total.to_string());
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
