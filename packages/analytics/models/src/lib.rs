#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for the air-quality analyses.
//!
//! Hotspot detection, source attribution, policy generation, impact
//! simulation, and dashboard statistics each return one of these types.
//! They serialize in camelCase so the server can hand them straight to the
//! dashboard.

use air_map_pollution_models::{AlertSeverity, PolicyStatus, Priority, SourceCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum readings needed before hotspot statistics are meaningful.
pub const MIN_HOTSPOT_READINGS: usize = 5;

/// Minimum readings needed before a zone's sources are attributed.
pub const MIN_ATTRIBUTION_READINGS: usize = 10;

// ── Hotspots ─────────────────────────────────────────────────────────────

/// A reading that exceeds its population's statistical norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// Measurement id the hotspot came from.
    pub measurement_id: i64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// PM2.5 in µg/m³.
    pub pm25: f64,
    /// Station name, if known.
    pub location_name: Option<String>,
    /// `High` above mean+2σ, `Critical` above mean+3σ.
    pub severity: AlertSeverity,
    /// `pm25 / mean`.
    pub severity_score: f64,
    /// When the reading was taken.
    pub recorded_at: DateTime<Utc>,
}

/// The statistics hotspots were measured against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotThresholds {
    /// Mean PM2.5.
    pub mean: f64,
    /// Sample standard deviation of PM2.5.
    pub std_dev: f64,
    /// `mean + 2σ`.
    pub high: f64,
    /// `mean + 3σ`.
    pub critical: f64,
}

/// Hotspots found in a set of readings, most severe first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotReport {
    /// Readings analysed.
    pub total_readings: usize,
    /// Thresholds used.
    pub thresholds: HotspotThresholds,
    /// Number of hotspots found (may exceed `hotspots.len()` when truncated).
    pub hotspot_count: usize,
    /// Hotspots, most severe first.
    pub hotspots: Vec<Hotspot>,
}

impl HotspotReport {
    /// Keeps only the `n` most severe hotspots. `hotspot_count` is unchanged.
    #[must_use]
    pub fn truncated(mut self, n: usize) -> Self {
        self.hotspots.truncate(n);
        self
    }
}

/// Outcome of hotspot detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HotspotOutcome {
    /// Enough readings were available.
    Success(HotspotReport),
    /// Fewer than [`MIN_HOTSPOT_READINGS`] readings.
    #[serde(rename_all = "camelCase")]
    InsufficientData {
        /// Readings available.
        readings: usize,
        /// Readings required.
        required: usize,
    },
}

// ── Source attribution ───────────────────────────────────────────────────

/// Fractional contribution of each source category. Sums to 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContributions {
    /// Vehicle exhaust.
    pub traffic: f64,
    /// Industrial stacks.
    pub industry: f64,
    /// Open waste burning.
    pub waste_burning: f64,
    /// Everything else.
    pub background: f64,
}

impl SourceContributions {
    /// Contribution of one category.
    #[must_use]
    pub const fn get(&self, category: SourceCategory) -> f64 {
        match category {
            SourceCategory::Traffic => self.traffic,
            SourceCategory::Industry => self.industry,
            SourceCategory::WasteBurning => self.waste_burning,
            SourceCategory::Background => self.background,
        }
    }

    /// Sum of all contributions.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.traffic + self.industry + self.waste_burning + self.background
    }

    /// Scales contributions to sum to 1. All zero becomes background 1.0.
    #[must_use]
    pub fn normalized(self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return Self {
                background: 1.0,
                ..Self::default()
            };
        }
        Self {
            traffic: self.traffic / total,
            industry: self.industry / total,
            waste_burning: self.waste_burning / total,
            background: self.background / total,
        }
    }

    /// The largest contributor. Ties go to the earlier category in
    /// traffic, industry, waste burning, background order.
    #[must_use]
    pub fn dominant(&self) -> SourceCategory {
        let mut best = SourceCategory::Traffic;
        for &category in SourceCategory::all() {
            if self.get(category) > self.get(best) {
                best = category;
            }
        }
        best
    }
}

/// Chemical indicators the attribution was based on. `None` when no row
/// had the inputs for that indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChemicalSignatures {
    /// Mean NO2/PM2.5 ratio.
    pub no2_pm25_ratio: Option<f64>,
    /// Mean SO2 in µg/m³.
    pub so2_mean: Option<f64>,
    /// Mean PM2.5/PM10 ratio.
    pub pm25_pm10_ratio: Option<f64>,
    /// Mean PM2.5 between 18:00 and 21:59.
    pub evening_pm25: Option<f64>,
    /// Mean PM2.5 between 10:00 and 14:59.
    pub daytime_pm25: Option<f64>,
}

/// Attribution of a zone's pollution to source categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttribution {
    /// Grid cell analysed.
    pub grid_id: i32,
    /// Readings analysed.
    pub readings: usize,
    /// Normalized contributions.
    pub contributions: SourceContributions,
    /// Largest contributor.
    pub dominant_source: SourceCategory,
    /// 0..=0.8, grows with sample size.
    pub confidence: f64,
    /// Indicator values.
    pub signatures: ChemicalSignatures,
}

/// Outcome of source attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttributionOutcome {
    /// Enough readings were available.
    Success(SourceAttribution),
    /// Fewer than [`MIN_ATTRIBUTION_READINGS`] readings.
    #[serde(rename_all = "camelCase")]
    InsufficientData {
        /// Grid cell requested.
        grid_id: i32,
        /// Readings available.
        readings: usize,
        /// Readings required.
        required: usize,
    },
}

// ── Policy generation ────────────────────────────────────────────────────

/// A policy the rule table can recommend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTemplate {
    /// Machine-readable policy type.
    pub policy_type: &'static str,
    /// Title.
    pub title: &'static str,
    /// Description.
    pub description: &'static str,
    /// Priority level.
    pub priority: Priority,
    /// Expected PM2.5 reduction in percent.
    pub expected_impact: f64,
    /// Estimated cost in USD.
    pub cost_estimate: f64,
    /// Days needed to implement.
    pub implementation_days: i32,
}

/// Recommendations generated for one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPolicies {
    /// Grid cell.
    pub grid_id: i32,
    /// Zone name.
    pub zone_name: Option<String>,
    /// Dominant source label stored on the zone.
    pub dominant_source: String,
    /// Zone priority score.
    pub priority_score: f64,
    /// 24 hour mean PM2.5, rounded to one decimal.
    pub avg_pm25: Option<f64>,
    /// Ids of inserted recommendations, parallel to `policies`.
    pub recommendation_ids: Vec<i32>,
    /// Generated policies.
    pub policies: Vec<PolicyTemplate>,
}

// ── Impact simulation ────────────────────────────────────────────────────

/// Health outcomes avoided per year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthImpact {
    /// Premature deaths avoided.
    pub avoided_deaths: u32,
    /// Hospital visits avoided.
    pub avoided_hospital_visits: u32,
}

/// Days until each stage of the policy takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationTimeline {
    /// Preparation before rollout.
    pub preparation_days: i32,
    /// Rollout.
    pub implementation_days: i32,
    /// Until the full effect is visible.
    pub full_effect_days: i32,
}

/// Projected effect of enacting a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySimulation {
    /// Recommendation simulated.
    pub policy_id: i32,
    /// Title.
    pub title: String,
    /// PM2.5 before the policy.
    pub baseline_pm25: f64,
    /// PM2.5 after the policy, rounded to one decimal.
    pub projected_pm25: f64,
    /// Reduction in percent.
    pub reduction_percent: f64,
    /// Health outcomes.
    pub health_impact: HealthImpact,
    /// Economic benefit in USD per year.
    pub economic_benefit: u64,
    /// Estimated cost in USD.
    pub cost_estimate: Option<f64>,
    /// Timeline.
    pub timeline: ImplementationTimeline,
    /// Model confidence.
    pub confidence: f64,
}

// ── Dashboard ────────────────────────────────────────────────────────────

/// PM2.5 statistics over the dashboard window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualitySummary {
    /// Readings with PM2.5.
    pub total_readings: i64,
    /// Mean PM2.5, one decimal.
    pub avg_pm25: Option<f64>,
    /// Maximum PM2.5.
    pub max_pm25: Option<f64>,
    /// Minimum PM2.5.
    pub min_pm25: Option<f64>,
    /// Readings above the action threshold.
    pub readings_above_threshold: i64,
    /// Readings categorised Very Unhealthy or worse.
    pub very_unhealthy_readings: i64,
    /// Share of readings above the action threshold, in percent.
    pub percent_above_threshold: f64,
}

/// Recommendation count for one status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    /// Status.
    pub status: PolicyStatus,
    /// Recommendations in this status.
    pub count: i64,
    /// Mean expected impact, one decimal.
    pub avg_impact: Option<f64>,
}

/// Active alert count for one severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityCount {
    /// Severity.
    pub severity: AlertSeverity,
    /// Active alerts.
    pub count: i64,
}

/// PM2.5 statistics for one measurement source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakdown {
    /// Source type label.
    pub source_type: String,
    /// Readings.
    pub count: i64,
    /// Mean PM2.5, one decimal.
    pub avg_pm25: Option<f64>,
}

/// Everything the policy dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Window the statistics cover, in hours.
    pub window_hours: i64,
    /// PM2.5 summary.
    pub air_quality: AirQualitySummary,
    /// Recommendations per status, every status present.
    pub recommendations: Vec<StatusCount>,
    /// Active alerts per severity, every severity present.
    pub active_alerts: Vec<SeverityCount>,
    /// PM2.5 per measurement source.
    pub sources: Vec<SourceBreakdown>,
    /// When the statistics were computed.
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_contributions_sum_to_one() {
        let c = SourceContributions {
            traffic: 0.8,
            industry: 0.7,
            waste_burning: 0.5,
            background: 0.0,
        }
        .normalized();
        assert!((c.total() - 1.0).abs() < 1e-9);
        assert!((c.traffic - 0.4).abs() < 1e-9);
    }

    #[test]
    fn all_zero_contributions_become_background() {
        let c = SourceContributions::default().normalized();
        assert!((c.background - 1.0).abs() < f64::EPSILON);
        assert_eq!(c.dominant(), SourceCategory::Background);
    }

    #[test]
    fn dominant_ties_prefer_earlier_category() {
        let c = SourceContributions {
            traffic: 0.0,
            industry: 0.5,
            waste_burning: 0.5,
            background: 0.0,
        };
        assert_eq!(c.dominant(), SourceCategory::Industry);
    }

    #[test]
    fn insufficient_data_serializes_with_status_tag() {
        let outcome = HotspotOutcome::InsufficientData {
            readings: 3,
            required: MIN_HOTSPOT_READINGS,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["readings"], 3);
        assert_eq!(json["required"], 5);
    }
}
