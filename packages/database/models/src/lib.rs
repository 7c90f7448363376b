#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database row types and query parameter definitions.
//!
//! These types represent data as stored in and retrieved from the `PostGIS`
//! database. They are distinct from the API response types in
//! `air_map_server_models` and the normalized ingestion types in
//! `air_map_source_models`.

use air_map_pollution_models::{
    AlertSeverity, AlertStatus, AlertType, AqiCategory, PolicyStatus, Priority,
};
use air_map_source_models::{NormalizedMeasurement, PollutantLevels, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether the point lies inside the box (edges inclusive).
    #[must_use]
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        (self.west..=self.east).contains(&longitude) && (self.south..=self.north).contains(&latitude)
    }
}

/// Parameters for querying measurements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeasurementQuery {
    /// Spatial bounding box filter.
    pub bbox: Option<BoundingBox>,
    /// Minimum `recorded_at`.
    pub from: Option<DateTime<Utc>>,
    /// Maximum `recorded_at`.
    pub to: Option<DateTime<Utc>>,
    /// Restrict to one source type.
    pub source_type: Option<SourceType>,
    /// Maximum number of results to return.
    pub limit: u32,
    /// Number of results to skip.
    pub offset: u32,
}

/// A measurement row as retrieved from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    /// Primary key.
    pub id: i64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Upstream location id.
    pub location_id: Option<String>,
    /// Station name.
    pub location_name: Option<String>,
    /// Pollutant concentrations.
    pub levels: PollutantLevels,
    /// Provider.
    pub source_type: SourceType,
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
    /// Quality flag (1..=3).
    pub quality_flag: i32,
}

impl MeasurementRow {
    /// AQI category from the stored PM2.5.
    #[must_use]
    pub fn aqi_category(&self) -> AqiCategory {
        AqiCategory::from_pm25(self.levels.pm25)
    }

    /// Converts back to the normalized form used by exports.
    #[must_use]
    pub fn to_normalized(&self) -> NormalizedMeasurement {
        NormalizedMeasurement {
            location_id: self.location_id.clone(),
            location_name: self.location_name.clone(),
            longitude: self.longitude,
            latitude: self.latitude,
            levels: self.levels,
            recorded_at: self.recorded_at,
            source_type: self.source_type,
            aqi_category: self.aqi_category(),
        }
    }
}

/// A PM2.5 reading used by hotspot detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pm25ReadingRow {
    /// Measurement primary key.
    pub id: i64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// PM2.5 in µg/m³.
    pub pm25: f64,
    /// Station name, if known.
    pub location_name: Option<String>,
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
}

/// A grid/zone row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRow {
    /// Primary key.
    pub grid_id: i32,
    /// Zone name.
    pub zone_name: Option<String>,
    /// Centroid longitude.
    pub longitude: f64,
    /// Centroid latitude.
    pub latitude: f64,
    /// Polygon as a GeoJSON geometry string (`ST_AsGeoJSON`).
    pub geometry_json: Option<String>,
    /// 0-100 priority score.
    pub priority_score: f64,
    /// Dominant source label.
    pub dominant_source: String,
    /// Population density, when known.
    pub population_density: Option<f64>,
    /// Last time the priority was recomputed.
    pub last_updated: DateTime<Utc>,
}

impl ZoneRow {
    /// Priority level derived from the score.
    #[must_use]
    pub fn priority(&self) -> Priority {
        Priority::from_score(self.priority_score)
    }
}

/// A new grid cell to insert. The polygon is the centre buffered by 0.01°.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewZone {
    /// Zone name.
    pub zone_name: Option<String>,
    /// Centre longitude.
    pub longitude: f64,
    /// Centre latitude.
    pub latitude: f64,
    /// 0-100 priority score.
    pub priority_score: f64,
    /// Dominant source label.
    pub dominant_source: String,
}

/// Parameters for listing recommendations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationQuery {
    /// Filter by priority.
    pub priority: Option<Priority>,
    /// Filter by status.
    pub status: Option<PolicyStatus>,
    /// Restrict to one grid cell.
    pub grid_id: Option<i32>,
    /// Maximum number of results.
    pub limit: u32,
}

/// A policy recommendation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRow {
    /// Primary key.
    pub id: i32,
    /// Owning grid cell.
    pub grid_id: Option<i32>,
    /// Owning zone name (joined from `policy_grid`).
    pub zone_name: Option<String>,
    /// Machine-readable policy type.
    pub policy_type: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Priority level.
    pub priority: Priority,
    /// Expected PM2.5 reduction in percent.
    pub expected_impact: f64,
    /// Estimated cost in USD.
    pub cost_estimate: Option<f64>,
    /// Days needed to implement.
    pub implementation_days: Option<i32>,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Reviewer notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Parameters for listing alerts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertQuery {
    /// Filter by severity.
    pub severity: Option<AlertSeverity>,
    /// Filter by status (`None` = any).
    pub status: Option<AlertStatus>,
    /// Maximum number of results.
    pub limit: u32,
}

/// An alert row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRow {
    /// Primary key.
    pub id: i32,
    /// What raised the alert.
    pub alert_type: AlertType,
    /// Longitude, when the alert has a location.
    pub longitude: Option<f64>,
    /// Latitude, when the alert has a location.
    pub latitude: Option<f64>,
    /// Severity.
    pub severity: AlertSeverity,
    /// Message.
    pub message: String,
    /// PM2.5 level that raised the alert.
    pub pm25_level: Option<f64>,
    /// Zone name.
    pub zone_name: Option<String>,
    /// When the alert fired.
    pub triggered_at: DateTime<Utc>,
    /// Whether the alert is still open.
    pub status: AlertStatus,
}

/// Aggregate PM2.5 statistics over a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySummaryRow {
    /// Number of readings with PM2.5.
    pub total_readings: i64,
    /// Mean PM2.5.
    pub avg_pm25: Option<f64>,
    /// Maximum PM2.5.
    pub max_pm25: Option<f64>,
    /// Minimum PM2.5.
    pub min_pm25: Option<f64>,
    /// Readings above the action threshold.
    pub readings_above_threshold: i64,
    /// Readings categorised Very Unhealthy or worse.
    pub very_unhealthy_readings: i64,
}

/// Count and average impact of recommendations in one status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCountRow {
    /// Status.
    pub status: PolicyStatus,
    /// Number of recommendations.
    pub count: i64,
    /// Mean expected impact.
    pub avg_impact: Option<f64>,
}

/// Count of active alerts with one severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCountRow {
    /// Severity.
    pub severity: AlertSeverity,
    /// Number of active alerts.
    pub count: i64,
}

/// PM2.5 statistics for one source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBreakdownRow {
    /// Source type label as stored.
    pub source_type: String,
    /// Number of readings.
    pub count: i64,
    /// Mean PM2.5.
    pub avg_pm25: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_contains_is_edge_inclusive() {
        let bbox = BoundingBox::new(36.70, -1.40, 37.12, -1.15);
        assert!(bbox.contains(36.8172, -1.2864));
        assert!(bbox.contains(36.70, -1.40));
        assert!(!bbox.contains(39.66, -4.05));
    }

    #[test]
    fn measurement_row_derives_category() {
        let row = MeasurementRow {
            id: 1,
            longitude: 36.8,
            latitude: -1.3,
            location_id: None,
            location_name: None,
            levels: PollutantLevels {
                pm25: Some(160.0),
                ..PollutantLevels::default()
            },
            source_type: SourceType::Mock,
            recorded_at: Utc::now(),
            quality_flag: 3,
        };
        assert_eq!(row.aqi_category(), AqiCategory::Hazardous);
        assert_eq!(row.to_normalized().aqi_category, AqiCategory::Hazardous);
    }
}
