//! Database-backed analysis tasks.
//!
//! Each task loads what it needs through `air_map_database::queries`, runs
//! the matching pure analysis, and persists the side effects.

use air_map_analytics_models::{
    AttributionOutcome, DashboardStats, GeneratedPolicies, HotspotOutcome, PolicySimulation,
};
use air_map_database::queries;
use air_map_database_models::BoundingBox;
use air_map_pollution_models::AlertType;
use air_map_source_models::AlertDraft;
use chrono::{DateTime, Duration, Utc};
use switchy_database::Database;

use crate::stats::{DashboardRows, build_dashboard};
use crate::{AnalysisError, attribution, hotspots, policy, round_to, simulation};

/// Default look-back window for hotspot detection.
pub const DEFAULT_HOTSPOT_WINDOW_HOURS: i64 = 1;

/// Longest accepted hotspot look-back window (30 days).
pub const MAX_HOTSPOT_WINDOW_HOURS: i64 = 24 * 30;

/// Window zone analyses and the dashboard look at.
pub const ZONE_WINDOW_HOURS: i64 = 24;

/// Hotspots stored as alerts per run.
const STORED_HOTSPOT_ALERTS: usize = 5;

/// Hotspots returned per run.
const RETURNED_HOTSPOTS: usize = 10;

/// Resolves a requested hotspot window to
/// `1..=MAX_HOTSPOT_WINDOW_HOURS`, defaulting to
/// [`DEFAULT_HOTSPOT_WINDOW_HOURS`].
#[must_use]
pub fn hotspot_window_hours(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_HOTSPOT_WINDOW_HOURS)
        .clamp(1, MAX_HOTSPOT_WINDOW_HOURS)
}

/// Detects hotspots among readings from the last `window_hours`, stores
/// the five most severe as `hotspot_detected` alerts, and returns the ten
/// most severe.
///
/// # Errors
///
/// Returns [`AnalysisError`] if loading readings or storing alerts fails.
pub async fn run_hotspot_analysis(
    db: &dyn Database,
    bbox: Option<&BoundingBox>,
    window_hours: i64,
    now: DateTime<Utc>,
) -> Result<HotspotOutcome, AnalysisError> {
    let window_hours = hotspot_window_hours(Some(window_hours));
    let since = now - Duration::hours(window_hours);
    let readings = queries::recent_pm25_readings(db, since, bbox).await?;

    let report = match hotspots::detect_hotspots(&readings) {
        HotspotOutcome::Success(report) => report,
        insufficient @ HotspotOutcome::InsufficientData { .. } => {
            log::info!(
                "Hotspot analysis skipped: only {} readings in the last {window_hours}h",
                readings.len()
            );
            return Ok(insufficient);
        }
    };

    for hotspot in report.hotspots.iter().take(STORED_HOTSPOT_ALERTS) {
        let alert = AlertDraft {
            alert_type: AlertType::HotspotDetected,
            longitude: hotspot.longitude,
            latitude: hotspot.latitude,
            severity: hotspot.severity,
            message: format!("Pollution hotspot detected: {:.1} μg/m³ PM2.5", hotspot.pm25),
            pm25_level: Some(hotspot.pm25),
            zone_name: hotspot.location_name.clone(),
        };
        queries::insert_alert(db, &alert).await?;
    }

    log::info!(
        "Hotspot analysis: {} hotspots among {} readings",
        report.hotspot_count,
        report.total_readings
    );

    Ok(HotspotOutcome::Success(report.truncated(RETURNED_HOTSPOTS)))
}

/// Attributes a zone's last 24 hours of readings to source categories and
/// records the dominant source on the zone.
///
/// # Errors
///
/// Returns [`AnalysisError::NotFound`] if the zone does not exist, or
/// [`AnalysisError`] if a query fails.
pub async fn run_source_attribution(
    db: &dyn Database,
    grid_id: i32,
    now: DateTime<Utc>,
) -> Result<AttributionOutcome, AnalysisError> {
    if queries::get_zone(db, grid_id).await?.is_none() {
        return Err(AnalysisError::NotFound {
            what: format!("zone {grid_id}"),
        });
    }

    let since = now - Duration::hours(ZONE_WINDOW_HOURS);
    let rows = queries::zone_measurements(db, grid_id, since).await?;
    let outcome = attribution::attribute_sources(grid_id, &rows);

    if let AttributionOutcome::Success(result) = &outcome {
        queries::update_dominant_source(db, grid_id, &result.dominant_source.to_string()).await?;
    }

    Ok(outcome)
}

/// Generates policies for a zone from its dominant source and 24 hour mean
/// PM2.5, and stores them as pending recommendations.
///
/// # Errors
///
/// Returns [`AnalysisError::NotFound`] if the zone does not exist, or
/// [`AnalysisError`] if a query fails.
pub async fn generate_recommendations(
    db: &dyn Database,
    grid_id: i32,
    now: DateTime<Utc>,
) -> Result<GeneratedPolicies, AnalysisError> {
    let zone = queries::get_zone(db, grid_id)
        .await?
        .ok_or_else(|| AnalysisError::NotFound {
            what: format!("zone {grid_id}"),
        })?;

    let since = now - Duration::hours(ZONE_WINDOW_HOURS);
    let avg_pm25 = queries::zone_average_pm25(db, grid_id, since).await?;
    let policies = policy::recommend(&zone.dominant_source, avg_pm25);

    let mut recommendation_ids = Vec::with_capacity(policies.len());
    for template in &policies {
        let id = queries::insert_recommendation(db, &policy::to_draft(template, grid_id)).await?;
        recommendation_ids.push(id);
    }

    log::info!(
        "Zone {grid_id}: {} recommendations generated (dominant source {}, avg PM2.5 {avg_pm25:?})",
        policies.len(),
        zone.dominant_source,
    );

    Ok(GeneratedPolicies {
        grid_id,
        zone_name: zone.zone_name,
        dominant_source: zone.dominant_source,
        priority_score: zone.priority_score,
        avg_pm25: avg_pm25.map(|v| round_to(v, 1)),
        recommendation_ids,
        policies,
    })
}

/// Simulates a stored recommendation against its zone's recent PM2.5.
///
/// # Errors
///
/// Returns [`AnalysisError::NotFound`] if the recommendation does not
/// exist, or [`AnalysisError`] if a query fails.
pub async fn simulate_policy(
    db: &dyn Database,
    policy_id: i32,
    now: DateTime<Utc>,
) -> Result<PolicySimulation, AnalysisError> {
    let recommendation = queries::get_recommendation(db, policy_id)
        .await?
        .ok_or_else(|| AnalysisError::NotFound {
            what: format!("policy recommendation {policy_id}"),
        })?;

    let baseline = match recommendation.grid_id {
        Some(grid_id) => {
            let since = now - Duration::hours(ZONE_WINDOW_HOURS);
            queries::zone_average_pm25(db, grid_id, since).await?
        }
        None => None,
    };

    Ok(simulation::simulate(&recommendation, baseline))
}

/// Loads and assembles the policy dashboard.
///
/// # Errors
///
/// Returns [`AnalysisError`] if any aggregate query fails.
pub async fn dashboard(
    db: &dyn Database,
    now: DateTime<Utc>,
) -> Result<DashboardStats, AnalysisError> {
    let since = now - Duration::hours(ZONE_WINDOW_HOURS);

    let rows = DashboardRows {
        summary: queries::air_quality_summary(db, since).await?,
        statuses: queries::recommendations_by_status(db).await?,
        severities: queries::active_alerts_by_severity(db).await?,
        sources: queries::pm25_by_source(db, since).await?,
    };

    Ok(build_dashboard(&rows, ZONE_WINDOW_HOURS, now))
}

/// Recomputes every zone's priority score from the last 24 hours of
/// PM2.5 and returns the number of zones updated.
///
/// # Errors
///
/// Returns [`AnalysisError`] if the database function fails.
pub async fn refresh_priorities(db: &dyn Database) -> Result<i32, AnalysisError> {
    let updated = queries::update_grid_priorities(db).await?;
    log::info!("Grid priorities refreshed: {updated} zones updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hotspot_window_is_bounded() {
        assert_eq!(hotspot_window_hours(None), 1);
        assert_eq!(hotspot_window_hours(Some(0)), 1);
        assert_eq!(hotspot_window_hours(Some(-5)), 1);
        assert_eq!(hotspot_window_hours(Some(48)), 48);
        assert_eq!(hotspot_window_hours(Some(9_000_000_000_000)), 720);
        assert_eq!(hotspot_window_hours(Some(i64::MAX)), MAX_HOTSPOT_WINDOW_HOURS);
    }
}
