//! Fixed Nairobi demonstration data.
//!
//! Five monitoring zones, three policy recommendations, and the alerts
//! those zones raise. Used to seed an empty database for dashboard
//! development.

use air_map_pollution_models::{AqiCategory, PolicyStatus, Priority};
use air_map_source_models::{
    AlertDraft, InterventionZone, NormalizedMeasurement, PollutantLevels, RecommendationDraft,
    SourceType,
};
use chrono::{DateTime, Utc};

use crate::parsing::round_to;

/// A demonstration monitoring zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockZone {
    /// Stable identifier used as the measurement location id.
    pub id: &'static str,
    /// Neighbourhood name.
    pub name: &'static str,
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
    /// PM2.5 reading in µg/m³.
    pub pm25: f64,
    /// Expected dominant source label.
    pub dominant_source: &'static str,
}

/// The five Nairobi monitoring zones.
pub const NAIROBI_ZONES: [MockZone; 5] = [
    MockZone {
        id: "nairobi_zone_1",
        name: "Nairobi CBD",
        longitude: 36.8172,
        latitude: -1.2864,
        pm25: 45.2,
        dominant_source: "traffic",
    },
    MockZone {
        id: "nairobi_zone_2",
        name: "Industrial Area",
        longitude: 36.8581,
        latitude: -1.3128,
        pm25: 67.3,
        dominant_source: "industry",
    },
    MockZone {
        id: "nairobi_zone_3",
        name: "Westlands",
        longitude: 36.8089,
        latitude: -1.2630,
        pm25: 32.1,
        dominant_source: "traffic",
    },
    MockZone {
        id: "nairobi_zone_4",
        name: "Embakasi",
        longitude: 36.8833,
        latitude: -1.3167,
        pm25: 89.5,
        dominant_source: "industry",
    },
    MockZone {
        id: "nairobi_zone_5",
        name: "Karen",
        longitude: 36.7083,
        latitude: -1.3197,
        pm25: 18.7,
        dominant_source: "background",
    },
];

/// One reading per mock zone, stamped `now`.
#[must_use]
pub fn mock_measurements(now: DateTime<Utc>) -> Vec<NormalizedMeasurement> {
    NAIROBI_ZONES
        .iter()
        .map(|zone| NormalizedMeasurement {
            location_id: Some(zone.id.to_string()),
            location_name: Some(zone.name.to_string()),
            longitude: zone.longitude,
            latitude: zone.latitude,
            levels: PollutantLevels {
                pm25: Some(zone.pm25),
                ..PollutantLevels::default()
            },
            recorded_at: now,
            source_type: SourceType::Mock,
            aqi_category: AqiCategory::from_pm25(Some(zone.pm25)),
        })
        .collect()
}

/// Grid cells for the mock zones. The priority score uses the same scale
/// as the database priority refresh (`pm25 / 75 * 100`, capped at 100).
#[must_use]
pub fn mock_grid_zones() -> Vec<InterventionZone> {
    NAIROBI_ZONES
        .iter()
        .map(|zone| InterventionZone {
            zone_name: Some(zone.name.to_string()),
            longitude: zone.longitude,
            latitude: zone.latitude,
            priority_score: round_to((zone.pm25 / 75.0 * 100.0).min(100.0), 2),
            dominant_source: zone.dominant_source.to_string(),
            policy_type: "general".to_string(),
            expected_impact: 20.0,
            status: PolicyStatus::Pending,
            description: format!("Monitoring zone {}", zone.name),
        })
        .collect()
}

/// The three demonstration policy recommendations.
#[must_use]
pub fn mock_recommendations() -> Vec<RecommendationDraft> {
    vec![
        RecommendationDraft {
            grid_id: None,
            policy_type: "traffic_restriction".to_string(),
            title: "Peak-Hour Vehicle Restrictions (CBD)".to_string(),
            description: "Implement odd-even license plate restrictions during peak hours"
                .to_string(),
            priority: Priority::High,
            expected_impact: 28.5,
            cost_estimate: Some(8_200.0),
            implementation_days: Some(30),
            status: PolicyStatus::Pending,
        },
        RecommendationDraft {
            grid_id: None,
            policy_type: "industrial_monitoring".to_string(),
            title: "Industrial Stack Monitoring (Embakasi)".to_string(),
            description: "Install continuous monitoring on top 5 industrial emitters".to_string(),
            priority: Priority::Medium,
            expected_impact: 18.2,
            cost_estimate: Some(15_000.0),
            implementation_days: Some(90),
            status: PolicyStatus::Approved,
        },
        RecommendationDraft {
            grid_id: None,
            policy_type: "waste_management".to_string(),
            title: "Waste Management Enhancement (Dandora)".to_string(),
            description: "Increase waste collection frequency and anti-burning enforcement"
                .to_string(),
            priority: Priority::High,
            expected_impact: 42.0,
            cost_estimate: Some(7_500.0),
            implementation_days: Some(60),
            status: PolicyStatus::InProgress,
        },
    ]
}

/// `pollution_spike` alerts for every mock zone above the action
/// threshold.
#[must_use]
pub fn mock_alerts() -> Vec<AlertDraft> {
    NAIROBI_ZONES
        .iter()
        .filter_map(|zone| {
            AlertDraft::pollution_spike(zone.name, zone.longitude, zone.latitude, zone.pm25)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use air_map_pollution_models::AlertSeverity;

    use super::*;

    #[test]
    fn five_zones_with_expected_categories() {
        let readings = mock_measurements(Utc::now());
        let categories: Vec<AqiCategory> = readings.iter().map(|m| m.aqi_category).collect();
        assert_eq!(
            categories,
            vec![
                AqiCategory::Unhealthy,
                AqiCategory::VeryUnhealthy,
                AqiCategory::UnhealthySensitive,
                AqiCategory::VeryUnhealthy,
                AqiCategory::Moderate,
            ]
        );
    }

    #[test]
    fn alerts_only_for_zones_above_threshold() {
        let alerts = mock_alerts();
        assert_eq!(alerts.len(), 3);
        let severities: Vec<AlertSeverity> = alerts.iter().map(|a| a.severity).collect();
        assert_eq!(
            severities,
            vec![
                AlertSeverity::Medium,
                AlertSeverity::High,
                AlertSeverity::Critical
            ]
        );
    }

    #[test]
    fn recommendations_cover_three_statuses() {
        let recs = mock_recommendations();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].status, PolicyStatus::Pending);
        assert_eq!(recs[1].status, PolicyStatus::Approved);
        assert_eq!(recs[2].status, PolicyStatus::InProgress);
    }

    #[test]
    fn grid_scores_are_capped() {
        let zones = mock_grid_zones();
        assert!((zones[3].priority_score - 100.0).abs() < f64::EPSILON);
        assert!((zones[0].priority_score - 60.27).abs() < 1e-9);
    }
}
