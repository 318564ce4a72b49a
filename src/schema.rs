use crate::error::{RegistrationError, Result};
use crate::utils::{next_month_start, normalize_header};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A calendar month, always stored as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Period)
    }

    /// Truncates any calendar date to the month it falls in.
    pub fn from_date(date: NaiveDate) -> Self {
        Period(date - chrono::Days::new(u64::from(date.day0())))
    }

    /// First month of the given quarter (1..=4).
    pub fn quarter_start(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        Self::new(year, (quarter - 1) * 3 + 1)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn quarter(&self) -> u32 {
        self.0.month0() / 3 + 1
    }

    pub fn next(&self) -> Period {
        Period(next_month_start(self.0))
    }

    /// Machine form used for serialization and CSV export: `YYYY-MM`.
    pub fn key(&self) -> String {
        self.0.format("%Y-%m").to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%b %Y"))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format("%Y-%m"))
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
            .map(Period)
            .map_err(|_| serde::de::Error::custom(format!("expected YYYY-MM, got '{}'", raw)))
    }
}

/// Registration source. Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Walk-in desk.
    #[serde(rename = "Bàn Khám")]
    BanKham,
    /// Appointment and referral desk.
    #[serde(rename = "PKH")]
    Pkh,
    /// Call center.
    #[serde(rename = "Tổng đài")]
    TongDai,
    /// Mobile app.
    #[serde(rename = "UMC Care")]
    UmcCare,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::BanKham,
        Channel::Pkh,
        Channel::TongDai,
        Channel::UmcCare,
    ];

    /// Standard column header for this channel.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::BanKham => "Bàn Khám",
            Channel::Pkh => "PKH",
            Channel::TongDai => "Tổng đài",
            Channel::UmcCare => "UMC Care",
        }
    }

    /// Matches a header against the standard channel names only.
    pub fn from_header(header: &str) -> Option<Channel> {
        let wanted = normalize_header(header);
        Channel::ALL
            .into_iter()
            .find(|channel| normalize_header(channel.label()) == wanted)
    }

    pub fn parse(name: &str) -> Result<Channel> {
        Channel::from_header(name).ok_or_else(|| RegistrationError::UnknownChannel(name.to_string()))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-channel counts for one row. A channel missing from the map was not a
/// column of the source sheet; reads treat it as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelCounts(BTreeMap<Channel, u64>);

impl ChannelCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: Channel) -> u64 {
        self.0.get(&channel).copied().unwrap_or(0)
    }

    pub fn is_present(&self, channel: Channel) -> bool {
        self.0.contains_key(&channel)
    }

    pub fn set(&mut self, channel: Channel, value: u64) {
        self.0.insert(channel, value);
    }

    pub fn with(mut self, channel: Channel, value: u64) -> Self {
        self.set(channel, value);
        self
    }

    /// Adds another row's counts into this one. Presence is the union.
    pub fn add(&mut self, other: &ChannelCounts) {
        for (channel, value) in &other.0 {
            *self.0.entry(*channel).or_insert(0) += value;
        }
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn present(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.keys().copied()
    }
}

/// Unique key of the canonical table. Field order gives the canonical
/// iteration order: period first, then specialty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    pub period: Period,
    pub specialty: String,
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.period, self.specialty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRow {
    pub period: Period,
    pub specialty: String,
    pub channels: ChannelCounts,
    /// Sum of the channel counts present in this row.
    pub grand_total: u64,
}

impl RegistrationRow {
    pub fn new(period: Period, specialty: impl Into<String>, channels: ChannelCounts) -> Self {
        let grand_total = channels.total();
        Self {
            period,
            specialty: specialty.into(),
            channels,
            grand_total,
        }
    }

    pub fn key(&self) -> RowKey {
        RowKey {
            period: self.period,
            specialty: self.specialty.clone(),
        }
    }

    pub fn count(&self, channel: Channel) -> u64 {
        self.channels.get(channel)
    }

    /// Sums another row for the same key into this one.
    pub fn merge(&mut self, other: &RegistrationRow) {
        self.channels.add(&other.channels);
        self.grand_total += other.grand_total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_truncates_to_first_day() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let period = Period::from_date(date);
        assert_eq!(period.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(period, Period::new(2024, 2).unwrap());
    }

    #[test]
    fn test_period_quarter() {
        assert_eq!(Period::new(2024, 1).unwrap().quarter(), 1);
        assert_eq!(Period::new(2024, 6).unwrap().quarter(), 2);
        assert_eq!(Period::new(2024, 12).unwrap().quarter(), 4);
        assert_eq!(
            Period::quarter_start(2024, 3),
            Some(Period::new(2024, 7).unwrap())
        );
        assert_eq!(Period::quarter_start(2024, 5), None);
    }

    #[test]
    fn test_period_serialization() {
        let period = Period::new(2023, 11).unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2023-11\"");

        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
        assert_eq!(period.to_string(), "Nov 2023");
    }

    #[test]
    fn test_channel_from_header() {
        assert_eq!(Channel::from_header("  bàn   khám "), Some(Channel::BanKham));
        assert_eq!(Channel::from_header("PKH"), Some(Channel::Pkh));
        assert_eq!(Channel::from_header("umc care"), Some(Channel::UmcCare));
        assert_eq!(Channel::from_header("Grand Total"), None);
        assert!(Channel::parse("Fax").is_err());
    }

    #[test]
    fn test_absent_channel_reads_as_zero() {
        let counts = ChannelCounts::new().with(Channel::Pkh, 0);
        assert_eq!(counts.get(Channel::Pkh), 0);
        assert_eq!(counts.get(Channel::TongDai), 0);
        assert!(counts.is_present(Channel::Pkh));
        assert!(!counts.is_present(Channel::TongDai));
    }

    #[test]
    fn test_row_merge_sums_counts() {
        let period = Period::new(2024, 1).unwrap();
        let mut first = RegistrationRow::new(
            period,
            "Cardiology",
            ChannelCounts::new().with(Channel::BanKham, 10),
        );
        let second = RegistrationRow::new(
            period,
            "Cardiology",
            ChannelCounts::new()
                .with(Channel::BanKham, 2)
                .with(Channel::UmcCare, 4),
        );

        first.merge(&second);
        assert_eq!(first.count(Channel::BanKham), 12);
        assert_eq!(first.count(Channel::UmcCare), 4);
        assert_eq!(first.grand_total, 16);
        assert_eq!(first.grand_total, first.channels.total());
    }
}
