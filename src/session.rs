use crate::builder::{build_table, BuildReport, BuildWarning};
use crate::config::IngestionConfig;
use crate::error::{RegistrationError, Result};
use crate::filter::{filter, DateRange, FilteredView};
use crate::schema::Period;
use crate::sheet::RawSheet;
use crate::table::CanonicalTable;
use crate::views::{
    channel_distribution, default_comparison, detail, overview, specialty_comparison,
    ChannelDistributionView, ChannelSelection, DetailMode, DetailView, OverviewView,
    SpecialtyComparisonView,
};
use chrono::NaiveDate;
use log::warn;

/// Everything one user works with after an upload: the table built from the
/// file, the warnings raised while building it, and the selected range.
///
/// The table never changes; a new upload means a new `Session`.
#[derive(Debug, Clone)]
pub struct Session {
    table: CanonicalTable,
    warnings: Vec<BuildWarning>,
    config: IngestionConfig,
    range: DateRange,
}

impl Session {
    pub fn from_report(report: BuildReport, config: IngestionConfig) -> Result<Self> {
        let (start, end) = report
            .table
            .period_bounds()
            .ok_or(RegistrationError::NoValidSheets)?;

        Ok(Self {
            table: report.table,
            warnings: report.warnings,
            config,
            range: DateRange::new(start, end)?,
        })
    }

    pub fn from_sheets(sheets: &[RawSheet], config: IngestionConfig) -> Result<Self> {
        config.validate()?;
        let report = build_table(sheets, &config)?;
        Self::from_report(report, config)
    }

    pub fn table(&self) -> &CanonicalTable {
        &self.table
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Earliest and latest months in the data, for bounding a date picker.
    pub fn bounds(&self) -> (Period, Period) {
        self.table
            .period_bounds()
            .unwrap_or((self.range.start(), self.range.end()))
    }

    /// Replaces the selected range. An inverted range is rejected and the
    /// previous selection stays in effect.
    pub fn select_range(&mut self, start: Period, end: Period) -> Result<DateRange> {
        match DateRange::new(start, end) {
            Ok(range) => {
                self.range = range;
                Ok(range)
            }
            Err(e) => {
                warn!("{}; keeping {} to {}", e, self.range.start(), self.range.end());
                Err(e)
            }
        }
    }

    /// Same as [`Session::select_range`] for picker dates; both are truncated
    /// to their month.
    pub fn select_dates(&mut self, start: NaiveDate, end: NaiveDate) -> Result<DateRange> {
        self.select_range(Period::from_date(start), Period::from_date(end))
    }

    pub fn view(&self) -> FilteredView {
        filter(&self.table, self.range)
    }

    pub fn overview(&self) -> OverviewView {
        overview(&self.table, self.range, self.config.top_n)
    }

    pub fn channel_distribution(
        &self,
        selection: &ChannelSelection,
    ) -> Option<ChannelDistributionView> {
        channel_distribution(&self.table, self.range, selection)
    }

    pub fn default_comparison(&self) -> Vec<String> {
        default_comparison(&self.table, self.range, self.config.comparison_defaults)
    }

    pub fn specialty_comparison(&self, specialties: &[String]) -> Option<SpecialtyComparisonView> {
        specialty_comparison(&self.table, self.range, specialties)
    }

    pub fn detail(&self, mode: DetailMode) -> DetailView {
        detail(&self.table, self.range, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let sheets = vec![
            RawSheet::from_grid(
                "Jan-24",
                &["Chuyên khoa", "PKH"],
                vec![vec!["Nhi".into(), 4.0.into()]],
            ),
            RawSheet::from_grid(
                "Mar-24",
                &["Chuyên khoa", "PKH"],
                vec![vec!["Nhi".into(), 6.0.into()]],
            ),
        ];
        Session::from_sheets(&sheets, IngestionConfig::default()).unwrap()
    }

    fn p(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    #[test]
    fn test_default_range_is_full_data() {
        let s = session();
        assert_eq!(s.range().start(), p(2024, 1));
        assert_eq!(s.range().end(), p(2024, 3));
        assert_eq!(s.view().scaffold().len(), 3);
        assert_eq!(s.bounds(), (p(2024, 1), p(2024, 3)));
    }

    #[test]
    fn test_inverted_selection_keeps_previous_view() {
        let mut s = session();
        s.select_range(p(2024, 3), p(2024, 3)).unwrap();
        let before = s.view();

        let err = s.select_range(p(2024, 3), p(2024, 1)).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidRange { .. }));
        assert_eq!(s.view(), before);
        assert_eq!(s.range().start(), p(2024, 3));
    }

    #[test]
    fn test_select_dates_truncates() {
        let mut s = session();
        let range = s
            .select_dates(
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            )
            .unwrap();
        assert_eq!(range.start(), p(2024, 1));
        assert_eq!(range.end(), p(2024, 2));
        assert_eq!(s.overview().total, 4);
    }

    #[test]
    fn test_invalid_config_rejected_before_build() {
        let config = IngestionConfig {
            top_n: 0,
            ..IngestionConfig::default()
        };
        assert!(Session::from_sheets(&[], config).is_err());
    }
}
