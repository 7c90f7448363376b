#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the air-quality server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract. Map layers (zones, hotspots) are returned as `GeoJSON`
//! feature collections built here.

use air_map_analytics_models::{Hotspot, HotspotReport};
use air_map_database_models::{AlertRow, RecommendationRow, ZoneRow};
use air_map_pollution_models::{
    AlertSeverity, AlertStatus, AlertType, PolicyStatus, Priority,
};
use chrono::{DateTime, Utc};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// Query parameters for the measurements endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: Option<String>,
    /// Start of the time range (ISO 8601).
    pub from: Option<DateTime<Utc>>,
    /// End of the time range (ISO 8601).
    pub to: Option<DateTime<Utc>>,
    /// Restrict to one source type.
    pub source: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Query parameters for the hotspots endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotQueryParams {
    /// Bounding box as `west,south,east,north`.
    pub bbox: Option<String>,
    /// Look-back window in hours.
    pub hours: Option<i64>,
}

/// Body of `POST /api/air/analysis`. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Bounding box as `west,south,east,north`.
    pub bbox: Option<String>,
    /// Look-back window in hours.
    pub hours: Option<i64>,
}

/// Response to starting a background analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStarted {
    /// Identifier logged with the analysis result.
    pub analysis_id: String,
    /// Always `"started"`.
    pub status: String,
    /// When the analysis was queued.
    pub started_at: DateTime<Utc>,
}

/// Query parameters for the recommendations endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationQueryParams {
    /// Filter by priority.
    pub priority: Option<String>,
    /// Filter by status.
    pub status: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// Body of `PATCH /api/policy/recommendations/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    /// New status.
    pub status: String,
    /// Reviewer notes.
    pub notes: Option<String>,
}

/// Body of `POST /api/policy/simulate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    /// Recommendation to simulate.
    pub policy_id: i32,
}

/// Query parameters for the alerts endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertQueryParams {
    /// Filter by severity.
    pub severity: Option<String>,
    /// Maximum number of results.
    pub limit: Option<u32>,
}

/// A policy recommendation as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRecommendation {
    /// Recommendation id.
    pub id: i32,
    /// Grid cell.
    pub grid_id: Option<i32>,
    /// Zone name.
    pub zone_name: Option<String>,
    /// Machine-readable policy type.
    pub policy_type: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Priority.
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

impl From<RecommendationRow> for ApiRecommendation {
    fn from(row: RecommendationRow) -> Self {
        Self {
            id: row.id,
            grid_id: row.grid_id,
            zone_name: row.zone_name,
            policy_type: row.policy_type,
            title: row.title,
            description: row.description,
            priority: row.priority,
            expected_impact: row.expected_impact,
            cost_estimate: row.cost_estimate,
            implementation_days: row.implementation_days,
            status: row.status,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// An alert as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAlert {
    /// Alert id.
    pub id: i32,
    /// What raised the alert.
    pub alert_type: AlertType,
    /// Severity.
    pub severity: AlertSeverity,
    /// Message.
    pub message: String,
    /// PM2.5 that raised the alert.
    pub pm25_level: Option<f64>,
    /// Zone name.
    pub zone_name: Option<String>,
    /// Longitude.
    pub longitude: Option<f64>,
    /// Latitude.
    pub latitude: Option<f64>,
    /// When the alert fired.
    pub triggered_at: DateTime<Utc>,
    /// Whether the alert is open.
    pub status: AlertStatus,
}

impl From<AlertRow> for ApiAlert {
    fn from(row: AlertRow) -> Self {
        Self {
            id: row.id,
            alert_type: row.alert_type,
            severity: row.severity,
            message: row.message,
            pm25_level: row.pm25_level,
            zone_name: row.zone_name,
            longitude: row.longitude,
            latitude: row.latitude,
            triggered_at: row.triggered_at,
            status: row.status,
        }
    }
}

fn point(longitude: f64, latitude: f64) -> Geometry {
    Geometry::new(Value::Point(vec![longitude, latitude]))
}

fn feature(geometry: Geometry, id: i64, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: Some(geojson::feature::Id::Number(id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Parses a stored `ST_AsGeoJSON` string, falling back to the centroid
/// point when it is missing or malformed.
fn zone_geometry(zone: &ZoneRow) -> Geometry {
    if let Some(text) = zone.geometry_json.as_deref()
        && let Ok(GeoJson::Geometry(geometry)) = text.parse::<GeoJson>()
    {
        return geometry;
    }
    point(zone.longitude, zone.latitude)
}

/// Builds a polygon feature for a grid zone.
#[must_use]
pub fn zone_feature(zone: &ZoneRow) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("gridId".into(), json!(zone.grid_id));
    properties.insert("zoneName".into(), json!(zone.zone_name));
    properties.insert("priorityScore".into(), json!(zone.priority_score));
    properties.insert("priority".into(), json!(zone.priority()));
    properties.insert("dominantSource".into(), json!(zone.dominant_source));
    properties.insert("populationDensity".into(), json!(zone.population_density));
    properties.insert("centroid".into(), json!([zone.longitude, zone.latitude]));
    properties.insert("lastUpdated".into(), json!(zone.last_updated));

    feature(zone_geometry(zone), i64::from(zone.grid_id), properties)
}

/// Builds the zones layer.
#[must_use]
pub fn zone_collection(zones: &[ZoneRow]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: zones.iter().map(zone_feature).collect(),
        foreign_members: None,
    }
}

/// Builds a point feature for a hotspot.
#[must_use]
pub fn hotspot_feature(hotspot: &Hotspot) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("measurementId".into(), json!(hotspot.measurement_id));
    properties.insert("locationName".into(), json!(hotspot.location_name));
    properties.insert("pm25".into(), json!(hotspot.pm25));
    properties.insert("severity".into(), json!(hotspot.severity));
    properties.insert("severityScore".into(), json!(hotspot.severity_score));
    properties.insert("recordedAt".into(), json!(hotspot.recorded_at));

    feature(
        point(hotspot.longitude, hotspot.latitude),
        hotspot.measurement_id,
        properties,
    )
}

/// Builds the hotspots layer, carrying the detection statistics as a
/// `metadata` foreign member.
#[must_use]
pub fn hotspot_collection(report: &HotspotReport, window_hours: i64) -> FeatureCollection {
    let mut metadata = JsonObject::new();
    metadata.insert(
        "metadata".into(),
        json!({
            "windowHours": window_hours,
            "totalReadings": report.total_readings,
            "hotspotCount": report.hotspot_count,
            "thresholds": report.thresholds,
        }),
    );

    FeatureCollection {
        bbox: None,
        features: report.hotspots.iter().map(hotspot_feature).collect(),
        foreign_members: Some(metadata),
    }
}

#[cfg(test)]
mod tests {
    use air_map_analytics_models::HotspotThresholds;

    use super::*;

    fn zone(geometry_json: Option<&str>) -> ZoneRow {
        ZoneRow {
            grid_id: 2,
            zone_name: Some("Industrial Area".to_string()),
            longitude: 36.8581,
            latitude: -1.3128,
            geometry_json: geometry_json.map(str::to_string),
            priority_score: 89.73,
            dominant_source: "industry".to_string(),
            population_density: None,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn zone_uses_stored_polygon() {
        let polygon = r#"{"type":"Polygon","coordinates":[[[36.84,-1.32],[36.87,-1.32],[36.87,-1.30],[36.84,-1.32]]]}"#;
        let feature = zone_feature(&zone(Some(polygon)));
        assert!(matches!(
            feature.geometry.unwrap().value,
            Value::Polygon(_)
        ));
        let props = feature.properties.unwrap();
        assert_eq!(props["priority"], "high");
        assert_eq!(props["dominantSource"], "industry");
    }

    #[test]
    fn zone_falls_back_to_centroid() {
        let feature = zone_feature(&zone(Some("not json")));
        assert_eq!(
            feature.geometry.unwrap().value,
            Value::Point(vec![36.8581, -1.3128])
        );
        assert!(matches!(
            zone_feature(&zone(None)).geometry.unwrap().value,
            Value::Point(_)
        ));
    }

    #[test]
    fn hotspot_collection_carries_metadata() {
        let report = HotspotReport {
            total_readings: 12,
            thresholds: HotspotThresholds {
                mean: 40.0,
                std_dev: 10.0,
                high: 60.0,
                critical: 70.0,
            },
            hotspot_count: 1,
            hotspots: vec![Hotspot {
                measurement_id: 7,
                longitude: 36.88,
                latitude: -1.31,
                pm25: 89.5,
                location_name: Some("Embakasi".to_string()),
                severity: AlertSeverity::Critical,
                severity_score: 2.24,
                recorded_at: Utc::now(),
            }],
        };
        let collection = hotspot_collection(&report, 1);
        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["metadata"]["hotspotCount"], 1);
        assert_eq!(json["metadata"]["thresholds"]["critical"], 70.0);
        assert_eq!(json["features"][0]["properties"]["severity"], "critical");
        assert_eq!(json["features"][0]["id"], 7);
    }

    #[test]
    fn recommendation_serializes_camel_case() {
        let now = Utc::now();
        let api = ApiRecommendation::from(RecommendationRow {
            id: 1,
            grid_id: None,
            zone_name: None,
            policy_type: "waste_management".to_string(),
            title: "Enhanced Waste Collection".to_string(),
            description: String::new(),
            priority: Priority::High,
            expected_impact: 40.0,
            cost_estimate: Some(7_500.0),
            implementation_days: Some(60),
            status: PolicyStatus::InProgress,
            notes: None,
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["policyType"], "waste_management");
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["implementationDays"], 60);
    }
}
