#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data source configuration types and the canonical normalized
//! measurement format.
//!
//! Every air-quality provider (OpenAQ, WAQI, CSV exports, mock data)
//! produces [`NormalizedMeasurement`] records that carry the shared
//! taxonomy from [`air_map_pollution_models`].

use air_map_pollution_models::{
    AlertSeverity, AlertType, AqiCategory, DataQuality, PolicyStatus, Priority,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The type of data provider. Stored verbatim in the `source_type` column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    /// `OpenAQ` v2 REST API
    Openaq,
    /// World Air Quality Index project
    Waqi,
    /// Copernicus Data Space (Sentinel-5P catalogue)
    Copernicus,
    /// Monitoring spreadsheet exported to CSV
    CsvImport,
    /// Generated demonstration data
    Mock,
}

/// Configuration for an air-quality data source, parsed from the
/// embedded TOML definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Unique identifier for this source.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What kind of data provider this is.
    pub source_type: SourceType,
    /// Base URL of the provider's API.
    pub api_url: Option<String>,
    /// Geographic coverage description (e.g., "Nairobi, KE").
    pub coverage_area: String,
    /// Environment variable holding the API credential, if one is needed.
    pub credential_env: Option<String>,
}

/// Concentrations reported for one location at one time, in µg/m³.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutantLevels {
    /// Fine particulate matter
    pub pm25: Option<f64>,
    /// Coarse particulate matter
    pub pm10: Option<f64>,
    /// Nitrogen dioxide
    pub no2: Option<f64>,
    /// Sulphur dioxide
    pub so2: Option<f64>,
    /// Ozone
    pub o3: Option<f64>,
}

impl PollutantLevels {
    /// Number of pollutants with a value.
    #[must_use]
    pub fn reported_count(&self) -> usize {
        [self.pm25, self.pm10, self.no2, self.so2, self.o3]
            .iter()
            .filter(|v| v.is_some())
            .count()
    }
}

/// An air-quality reading normalized to the canonical schema.
///
/// All data sources produce this type after parsing their provider-specific
/// formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMeasurement {
    /// Upstream location/station identifier, used for deduplication.
    pub location_id: Option<String>,
    /// Human-readable station name.
    pub location_name: Option<String>,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Pollutant concentrations.
    pub levels: PollutantLevels,
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
    /// Where the reading came from.
    pub source_type: SourceType,
    /// AQI category, either reported by the source or derived from PM2.5.
    pub aqi_category: AqiCategory,
}

impl NormalizedMeasurement {
    /// Quality flag (1..=3) stored with the reading.
    #[must_use]
    pub const fn quality_flag(&self) -> u8 {
        self.aqi_category.quality_flag()
    }

    /// Data-quality grade from the number of pollutants reported.
    #[must_use]
    pub fn data_quality(&self) -> DataQuality {
        DataQuality::from_parameter_count(self.levels.reported_count())
    }
}

/// A policy intervention zone read from an interventions spreadsheet or
/// generated as mock data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionZone {
    /// Zone name (e.g., "Nairobi CBD").
    pub zone_name: Option<String>,
    /// Longitude of the zone centre.
    pub longitude: f64,
    /// Latitude of the zone centre.
    pub latitude: f64,
    /// 0-100 priority score.
    pub priority_score: f64,
    /// Free-text dominant source label (`"unknown"` when absent).
    pub dominant_source: String,
    /// Policy type label (`"general"` when absent).
    pub policy_type: String,
    /// Expected PM2.5 reduction in percent.
    pub expected_impact: f64,
    /// Current status of the intervention.
    pub status: PolicyStatus,
    /// Recommendation description.
    pub description: String,
}

impl InterventionZone {
    /// Priority level derived from the score.
    #[must_use]
    pub fn priority(&self) -> Priority {
        Priority::from_score(self.priority_score)
    }

    /// Zone name, or `"Zone {grid_id}"` when the import had none.
    #[must_use]
    pub fn display_name(&self, grid_id: i32) -> String {
        self.zone_name
            .clone()
            .unwrap_or_else(|| format!("Zone {grid_id}"))
    }

    /// The recommendation that accompanies this zone once it has been
    /// stored as grid cell `grid_id`.
    #[must_use]
    pub fn recommendation(&self, grid_id: i32) -> RecommendationDraft {
        RecommendationDraft {
            grid_id: Some(grid_id),
            policy_type: self.policy_type.clone(),
            title: self.display_name(grid_id),
            description: self.description.clone(),
            priority: self.priority(),
            expected_impact: self.expected_impact,
            cost_estimate: None,
            implementation_days: None,
            status: self.status,
        }
    }
}

/// A policy recommendation ready to be stored, independent of how it was
/// produced (rule table, import, or mock data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationDraft {
    /// Owning grid cell, when known.
    pub grid_id: Option<i32>,
    /// Machine-readable policy type (e.g., `traffic_restriction`).
    pub policy_type: String,
    /// Short title.
    pub title: String,
    /// Longer description.
    pub description: String,
    /// Priority level.
    pub priority: Priority,
    /// Expected PM2.5 reduction in percent.
    pub expected_impact: f64,
    /// Estimated cost in USD.
    pub cost_estimate: Option<f64>,
    /// Days needed to implement.
    pub implementation_days: Option<i32>,
    /// Initial status.
    pub status: PolicyStatus,
}

/// An alert ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDraft {
    /// What raised the alert.
    pub alert_type: AlertType,
    /// Longitude of the alert location.
    pub longitude: f64,
    /// Latitude of the alert location.
    pub latitude: f64,
    /// Severity.
    pub severity: AlertSeverity,
    /// Human-readable message.
    pub message: String,
    /// PM2.5 level that raised the alert.
    pub pm25_level: Option<f64>,
    /// Zone or station name.
    pub zone_name: Option<String>,
}

impl AlertDraft {
    /// Builds a `pollution_spike` alert for a PM2.5 reading, or `None`
    /// when the reading does not cross the action threshold.
    #[must_use]
    pub fn pollution_spike(zone: &str, longitude: f64, latitude: f64, pm25: f64) -> Option<Self> {
        let severity = AlertSeverity::for_pm25(pm25)?;
        let message = match severity {
            AlertSeverity::Critical => {
                format!("Very unhealthy air quality in {zone} - Immediate intervention needed")
            }
            AlertSeverity::High => {
                format!("High PM2.5 levels detected in {zone} - Consider emission controls")
            }
            AlertSeverity::Medium | AlertSeverity::Low => {
                format!("Elevated pollution in {zone} - Sensitive groups should limit outdoor activity")
            }
        };

        Some(Self {
            alert_type: AlertType::PollutionSpike,
            longitude,
            latitude,
            severity,
            message,
            pm25_level: Some(pm25),
            zone_name: Some(zone.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trips_through_strings() {
        assert_eq!(SourceType::CsvImport.as_ref(), "csv_import");
        assert_eq!(
            "openaq".parse::<SourceType>().unwrap(),
            SourceType::Openaq
        );
    }

    #[test]
    fn pollution_spike_only_above_threshold() {
        assert!(AlertDraft::pollution_spike("Westlands", 36.8, -1.26, 32.1).is_none());

        let alert = AlertDraft::pollution_spike("Embakasi", 36.88, -1.31, 89.5).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.alert_type, AlertType::PollutionSpike);
        assert!(alert.message.contains("Embakasi"));

        let alert = AlertDraft::pollution_spike("CBD", 36.81, -1.28, 45.2).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Medium);
    }

    #[test]
    fn reported_count_ignores_missing_values() {
        let levels = PollutantLevels {
            pm25: Some(40.0),
            no2: Some(20.0),
            ..PollutantLevels::default()
        };
        assert_eq!(levels.reported_count(), 2);
    }

    #[test]
    fn intervention_recommendation_uses_fallback_name() {
        let zone = InterventionZone {
            zone_name: None,
            longitude: 36.85,
            latitude: -1.31,
            priority_score: 85.0,
            dominant_source: "industry".to_string(),
            policy_type: "industrial_monitoring".to_string(),
            expected_impact: 18.0,
            status: PolicyStatus::Approved,
            description: "Policy intervention for area - 15-20%".to_string(),
        };
        let rec = zone.recommendation(7);
        assert_eq!(rec.title, "Zone 7");
        assert_eq!(rec.grid_id, Some(7));
        assert_eq!(rec.priority, Priority::High);
        assert_eq!(rec.status, PolicyStatus::Approved);
    }

    #[test]
    fn measurement_quality_follows_category() {
        let measurement = NormalizedMeasurement {
            location_id: Some("42".to_string()),
            location_name: None,
            longitude: 36.8,
            latitude: -1.28,
            levels: PollutantLevels {
                pm25: Some(80.0),
                ..PollutantLevels::default()
            },
            recorded_at: Utc::now(),
            source_type: SourceType::Openaq,
            aqi_category: AqiCategory::from_pm25(Some(80.0)),
        };
        assert_eq!(measurement.quality_flag(), 3);
        assert_eq!(measurement.data_quality(), DataQuality::Low);
    }
}
