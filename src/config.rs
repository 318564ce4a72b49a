use crate::error::{RegistrationError, Result};
use crate::schema::Channel;
use crate::utils::normalize_header;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Ingestion and view settings. Every field has a default matching the
/// UMC Care export, so `IngestionConfig::default()` reads those workbooks
/// as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Accepted headers for the specialty column, tried in order.
    pub specialty_columns: Vec<String>,

    /// Specialty values that mark summary rows rather than departments.
    pub exclusion_terms: Vec<String>,

    /// Fallback headers per channel, used only when a sheet lacks the
    /// channel's standard name.
    pub channel_aliases: BTreeMap<Channel, Vec<String>>,

    /// Year assumed for legacy quarter sheets whose label has none.
    pub legacy_year: Option<i32>,

    /// Ranking size for the overview.
    pub top_n: usize,

    /// How many specialties the comparison view pre-selects.
    pub comparison_defaults: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        let mut channel_aliases = BTreeMap::new();
        channel_aliases.insert(
            Channel::BanKham,
            vec!["Ban Kham".to_string(), "Walk-in".to_string()],
        );
        channel_aliases.insert(
            Channel::Pkh,
            vec!["Phòng khám hẹn".to_string(), "Referral".to_string()],
        );
        channel_aliases.insert(
            Channel::TongDai,
            vec!["Tong dai".to_string(), "Call center".to_string()],
        );
        channel_aliases.insert(
            Channel::UmcCare,
            vec![
                "UMCCare".to_string(),
                "UMC_Care".to_string(),
                "App".to_string(),
            ],
        );

        Self {
            specialty_columns: vec![
                "Chuyên khoa".to_string(),
                "Chuyen khoa".to_string(),
                "Specialty".to_string(),
            ],
            exclusion_terms: vec![
                "grand total".to_string(),
                "tổng cộng".to_string(),
                "total".to_string(),
            ],
            channel_aliases,
            legacy_year: None,
            top_n: 10,
            comparison_defaults: 5,
        }
    }
}

impl IngestionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: IngestionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.specialty_columns.iter().all(|c| c.trim().is_empty()) {
            return Err(RegistrationError::InvalidConfig(
                "at least one specialty column name is required".to_string(),
            ));
        }

        if self.top_n == 0 {
            return Err(RegistrationError::InvalidConfig(
                "top_n must be at least 1".to_string(),
            ));
        }

        if let Some(year) = self.legacy_year {
            if !(1900..=2999).contains(&year) {
                return Err(RegistrationError::InvalidConfig(format!(
                    "legacy_year {} is outside 1900..=2999",
                    year
                )));
            }
        }

        Ok(())
    }

    pub fn is_excluded_specialty(&self, name: &str) -> bool {
        let wanted = normalize_header(name);
        self.exclusion_terms
            .iter()
            .any(|term| normalize_header(term) == wanted)
    }

    pub fn is_specialty_header(&self, header: &str) -> bool {
        let wanted = normalize_header(header);
        self.specialty_columns
            .iter()
            .any(|name| normalize_header(name) == wanted)
    }

    pub fn is_channel_alias(&self, channel: Channel, header: &str) -> bool {
        let wanted = normalize_header(header);
        self.channel_aliases
            .get(&channel)
            .map(|aliases| aliases.iter().any(|a| normalize_header(a) == wanted))
            .unwrap_or(false)
    }
}
