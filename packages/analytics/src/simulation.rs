//! Projected impact of enacting a recommendation.
//!
//! Health and economic figures scale linearly with the expected PM2.5
//! reduction from per-zone reference values for a full (100%) reduction.

use air_map_analytics_models::{HealthImpact, ImplementationTimeline, PolicySimulation};
use air_map_database_models::RecommendationRow;

use crate::round_to;

/// Baseline PM2.5 used when the zone has no recent readings.
pub const DEFAULT_BASELINE_PM25: f64 = 45.2;

const DEATHS_PER_FULL_REDUCTION: f64 = 5.2;
const HOSPITAL_VISITS_PER_FULL_REDUCTION: f64 = 120.0;
const ECONOMIC_BENEFIT_PER_FULL_REDUCTION: f64 = 485_000.0;
const PREPARATION_DAYS: i32 = 15;
const FULL_EFFECT_LAG_DAYS: i32 = 60;
const MODEL_CONFIDENCE: f64 = 0.78;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rounded_u32(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// Simulates `recommendation` against a baseline PM2.5 (the zone's recent
/// mean, or [`DEFAULT_BASELINE_PM25`] when unknown).
#[must_use]
pub fn simulate(recommendation: &RecommendationRow, baseline_pm25: Option<f64>) -> PolicySimulation {
    let baseline = baseline_pm25.unwrap_or(DEFAULT_BASELINE_PM25);
    let reduction = (recommendation.expected_impact / 100.0).clamp(0.0, 1.0);
    let implementation_days = recommendation.implementation_days.unwrap_or(0).max(0);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let economic_benefit = (reduction * ECONOMIC_BENEFIT_PER_FULL_REDUCTION).round() as u64;

    PolicySimulation {
        policy_id: recommendation.id,
        title: recommendation.title.clone(),
        baseline_pm25: round_to(baseline, 1),
        projected_pm25: round_to(baseline * (1.0 - reduction), 1),
        reduction_percent: reduction * 100.0,
        health_impact: HealthImpact {
            avoided_deaths: rounded_u32(reduction * DEATHS_PER_FULL_REDUCTION),
            avoided_hospital_visits: rounded_u32(reduction * HOSPITAL_VISITS_PER_FULL_REDUCTION),
        },
        economic_benefit,
        cost_estimate: recommendation.cost_estimate,
        timeline: ImplementationTimeline {
            preparation_days: PREPARATION_DAYS,
            implementation_days,
            full_effect_days: implementation_days + FULL_EFFECT_LAG_DAYS,
        },
        confidence: MODEL_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use air_map_pollution_models::{PolicyStatus, Priority};
    use chrono::Utc;

    use super::*;

    fn recommendation(impact: f64, days: Option<i32>) -> RecommendationRow {
        let now = Utc::now();
        RecommendationRow {
            id: 3,
            grid_id: Some(1),
            zone_name: Some("Nairobi CBD".to_string()),
            policy_type: "traffic_restriction".to_string(),
            title: "Peak-Hour Vehicle Restrictions".to_string(),
            description: String::new(),
            priority: Priority::High,
            expected_impact: impact,
            cost_estimate: Some(8_500.0),
            implementation_days: days,
            status: PolicyStatus::Pending,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn default_baseline_and_scaled_outcomes() {
        let sim = simulate(&recommendation(25.0, Some(30)), None);
        assert!((sim.baseline_pm25 - 45.2).abs() < f64::EPSILON);
        assert!((sim.projected_pm25 - 33.9).abs() < 1e-9);
        assert_eq!(sim.health_impact.avoided_deaths, 1);
        assert_eq!(sim.health_impact.avoided_hospital_visits, 30);
        assert_eq!(sim.economic_benefit, 121_250);
        assert_eq!(sim.timeline.preparation_days, 15);
        assert_eq!(sim.timeline.full_effect_days, 90);
        assert!((sim.confidence - 0.78).abs() < f64::EPSILON);
    }

    #[test]
    fn zone_baseline_is_used_when_known() {
        let sim = simulate(&recommendation(40.0, Some(60)), Some(80.0));
        assert!((sim.projected_pm25 - 48.0).abs() < 1e-9);
        assert_eq!(sim.health_impact.avoided_deaths, 2);
        assert_eq!(sim.health_impact.avoided_hospital_visits, 48);
    }

    #[test]
    fn impact_is_clamped_and_days_default_to_zero() {
        let sim = simulate(&recommendation(150.0, None), Some(50.0));
        assert!(sim.projected_pm25.abs() < f64::EPSILON);
        assert_eq!(sim.timeline.implementation_days, 0);
        assert_eq!(sim.timeline.full_effect_days, 60);
    }
}
