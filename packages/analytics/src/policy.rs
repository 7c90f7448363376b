//! Policy rule table.
//!
//! A zone whose mean PM2.5 exceeds the action threshold gets the policies
//! registered for its dominant source. Zones with a background or unknown
//! dominant source get nothing.

use air_map_analytics_models::PolicyTemplate;
use air_map_pollution_models::{PM25_ACTION_THRESHOLD, PolicyStatus, Priority, SourceCategory};
use air_map_source_models::RecommendationDraft;

/// Above this mean PM2.5, traffic restrictions become high priority.
const URGENT_TRAFFIC_PM25: f64 = 55.0;

const LOW_EMISSION_ZONE: PolicyTemplate = PolicyTemplate {
    policy_type: "low_emission_zone",
    title: "Low Emission Zone",
    description: "Restrict older vehicles (Euro 3 and below) from entering the zone",
    priority: Priority::Medium,
    expected_impact: 35.0,
    cost_estimate: 25_000.0,
    implementation_days: 180,
};

const INDUSTRIAL_MONITORING: PolicyTemplate = PolicyTemplate {
    policy_type: "industrial_monitoring",
    title: "Continuous Emissions Monitoring",
    description: "Install real-time monitoring systems on major industrial stacks",
    priority: Priority::High,
    expected_impact: 20.0,
    cost_estimate: 15_000.0,
    implementation_days: 90,
};

const EMISSION_STANDARDS: PolicyTemplate = PolicyTemplate {
    policy_type: "emission_standards",
    title: "Stricter Emission Standards",
    description: "Enforce tighter emission limits for industrial facilities",
    priority: Priority::Medium,
    expected_impact: 30.0,
    cost_estimate: 5_000.0,
    implementation_days: 120,
};

const WASTE_MANAGEMENT: PolicyTemplate = PolicyTemplate {
    policy_type: "waste_management",
    title: "Enhanced Waste Collection",
    description: "Increase waste collection frequency and anti-burning enforcement",
    priority: Priority::High,
    expected_impact: 40.0,
    cost_estimate: 7_500.0,
    implementation_days: 60,
};

const fn peak_hour_restrictions(priority: Priority) -> PolicyTemplate {
    PolicyTemplate {
        policy_type: "traffic_restriction",
        title: "Peak-Hour Vehicle Restrictions",
        description: "Implement odd-even license plate restrictions during peak hours",
        priority,
        expected_impact: 25.0,
        cost_estimate: 8_500.0,
        implementation_days: 30,
    }
}

/// Policies for a zone with the given dominant source label and mean PM2.5.
#[must_use]
pub fn recommend(dominant_source: &str, avg_pm25: Option<f64>) -> Vec<PolicyTemplate> {
    let Some(avg) = avg_pm25.filter(|v| *v > PM25_ACTION_THRESHOLD) else {
        return Vec::new();
    };

    match dominant_source.parse::<SourceCategory>() {
        Ok(SourceCategory::Traffic) => {
            let priority = if avg > URGENT_TRAFFIC_PM25 {
                Priority::High
            } else {
                Priority::Medium
            };
            vec![peak_hour_restrictions(priority), LOW_EMISSION_ZONE]
        }
        Ok(SourceCategory::Industry) => vec![INDUSTRIAL_MONITORING, EMISSION_STANDARDS],
        Ok(SourceCategory::WasteBurning) => vec![WASTE_MANAGEMENT],
        Ok(SourceCategory::Background) | Err(_) => Vec::new(),
    }
}

/// Converts a template into a pending recommendation for `grid_id`.
#[must_use]
pub fn to_draft(template: &PolicyTemplate, grid_id: i32) -> RecommendationDraft {
    RecommendationDraft {
        grid_id: Some(grid_id),
        policy_type: template.policy_type.to_string(),
        title: template.title.to_string(),
        description: template.description.to_string(),
        priority: template.priority,
        expected_impact: template.expected_impact,
        cost_estimate: Some(template.cost_estimate),
        implementation_days: Some(template.implementation_days),
        status: PolicyStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(policies: &[PolicyTemplate]) -> Vec<&'static str> {
        policies.iter().map(|p| p.policy_type).collect()
    }

    #[test]
    fn nothing_at_or_below_threshold() {
        assert!(recommend("traffic", Some(35.0)).is_empty());
        assert!(recommend("industry", None).is_empty());
    }

    #[test]
    fn traffic_priority_depends_on_level() {
        let moderate = recommend("traffic", Some(40.0));
        assert_eq!(types(&moderate), vec!["traffic_restriction", "low_emission_zone"]);
        assert_eq!(moderate[0].priority, Priority::Medium);

        let severe = recommend("Traffic", Some(56.0));
        assert_eq!(severe[0].priority, Priority::High);
        assert_eq!(severe[1].priority, Priority::Medium);
    }

    #[test]
    fn industry_and_waste_rules() {
        assert_eq!(
            types(&recommend("industry", Some(70.0))),
            vec!["industrial_monitoring", "emission_standards"]
        );
        assert_eq!(types(&recommend("waste", Some(50.0))), vec!["waste_management"]);
        assert_eq!(
            types(&recommend("waste_burning", Some(50.0))),
            vec!["waste_management"]
        );
    }

    #[test]
    fn background_and_unknown_get_nothing() {
        assert!(recommend("background", Some(90.0)).is_empty());
        assert!(recommend("unknown", Some(90.0)).is_empty());
    }

    #[test]
    fn drafts_are_pending() {
        let draft = to_draft(&WASTE_MANAGEMENT, 7);
        assert_eq!(draft.grid_id, Some(7));
        assert_eq!(draft.status, PolicyStatus::Pending);
        assert_eq!(draft.implementation_days, Some(60));
        assert_eq!(draft.cost_estimate, Some(7_500.0));
    }
}
