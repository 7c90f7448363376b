#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air-quality taxonomy types shared across the air-map system.
//!
//! Defines the AQI category scale (WHO 2021 PM2.5 guidelines), the
//! pollutant set, the four pollution source categories used by source
//! attribution, and the priority/status/severity vocabularies used by
//! policy recommendations and alerts.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Average PM2.5 (µg/m³) above which a zone is considered polluted enough
/// to warrant policy recommendations and raise pollution alerts.
pub const PM25_ACTION_THRESHOLD: f64 = 35.0;

/// Air Quality Index category derived from a PM2.5 concentration.
///
/// Variants are declared from best to worst; [`AqiCategory::NoData`] sits
/// outside the scale and is used when no PM2.5 value is available.
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
pub enum AqiCategory {
    /// PM2.5 ≤ 15 µg/m³
    Good,
    /// PM2.5 ≤ 25 µg/m³
    Moderate,
    /// PM2.5 ≤ 35 µg/m³
    UnhealthySensitive,
    /// PM2.5 ≤ 55 µg/m³
    Unhealthy,
    /// PM2.5 ≤ 150 µg/m³
    VeryUnhealthy,
    /// PM2.5 > 150 µg/m³
    Hazardous,
    /// No PM2.5 reading available
    NoData,
}

impl AqiCategory {
    /// Classifies a PM2.5 concentration (µg/m³).
    ///
    /// A higher concentration never yields a better category.
    #[must_use]
    pub fn from_pm25(pm25: Option<f64>) -> Self {
        let Some(value) = pm25 else {
            return Self::NoData;
        };

        if value <= 15.0 {
            Self::Good
        } else if value <= 25.0 {
            Self::Moderate
        } else if value <= PM25_ACTION_THRESHOLD {
            Self::UnhealthySensitive
        } else if value <= 55.0 {
            Self::Unhealthy
        } else if value <= 150.0 {
            Self::VeryUnhealthy
        } else {
            Self::Hazardous
        }
    }

    /// Human-readable label as used by dashboards and CSV exports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthySensitive => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
            Self::NoData => "No Data",
        }
    }

    /// Parses either a human-readable label (`"Very Unhealthy"`) or the
    /// `snake_case` form (`"very_unhealthy"`).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(trimmed))
            .or_else(|| trimmed.to_ascii_lowercase().parse().ok())
    }

    /// Severity rank from 0 (good) to 5 (hazardous). `None` for
    /// [`AqiCategory::NoData`].
    #[must_use]
    pub const fn rank(self) -> Option<u8> {
        match self {
            Self::Good => Some(0),
            Self::Moderate => Some(1),
            Self::UnhealthySensitive => Some(2),
            Self::Unhealthy => Some(3),
            Self::VeryUnhealthy => Some(4),
            Self::Hazardous => Some(5),
            Self::NoData => None,
        }
    }

    /// Measurement quality flag stored alongside imported readings
    /// (1 = clean, 2 = elevated, 3 = severe).
    #[must_use]
    pub const fn quality_flag(self) -> u8 {
        match self {
            Self::Good | Self::Moderate => 1,
            Self::UnhealthySensitive | Self::Unhealthy | Self::NoData => 2,
            Self::VeryUnhealthy | Self::Hazardous => 3,
        }
    }

    /// Returns all variants of this enum, best to worst, followed by
    /// [`AqiCategory::NoData`].
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Good,
            Self::Moderate,
            Self::UnhealthySensitive,
            Self::Unhealthy,
            Self::VeryUnhealthy,
            Self::Hazardous,
            Self::NoData,
        ]
    }
}

/// Numeric AQI (0-500) from a PM2.5 concentration.
///
/// Piecewise linear over the WHO category breakpoints, truncated to an
/// integer and capped at 500. Missing or non-positive values map to 0.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::option_if_let_else
)]
pub fn aqi_from_pm25(pm25: Option<f64>) -> u16 {
    let Some(value) = pm25.filter(|v| *v > 0.0) else {
        return 0;
    };

    let aqi = if value <= 15.0 {
        (50.0 / 15.0) * value
    } else if value <= 25.0 {
        50.0 + (50.0 / 10.0) * (value - 15.0)
    } else if value <= 35.0 {
        100.0 + (50.0 / 10.0) * (value - 25.0)
    } else if value <= 55.0 {
        150.0 + (50.0 / 20.0) * (value - 35.0)
    } else {
        200.0 + (300.0 / 445.0) * (value - 55.0)
    };

    aqi.min(500.0) as u16
}

/// Measured pollutant species.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Pollutant {
    /// Fine particulate matter (≤ 2.5 µm)
    Pm25,
    /// Coarse particulate matter (≤ 10 µm)
    Pm10,
    /// Nitrogen dioxide
    No2,
    /// Sulphur dioxide
    So2,
    /// Ozone
    O3,
}

impl Pollutant {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Pm25, Self::Pm10, Self::No2, Self::So2, Self::O3]
    }
}

/// Pollution source category assigned by source attribution.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SourceCategory {
    /// Vehicle exhaust (high NO2 relative to PM2.5)
    Traffic,
    /// Industrial stacks (elevated SO2)
    Industry,
    /// Open waste burning (fine-particle dominated evening peaks)
    #[strum(serialize = "waste", to_string = "waste_burning")]
    WasteBurning,
    /// No distinctive signature
    Background,
}

impl SourceCategory {
    /// Returns all variants in attribution tie-break order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Traffic,
            Self::Industry,
            Self::WasteBurning,
            Self::Background,
        ]
    }
}

/// Priority level for recommendations, alerts, and zones.
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
pub enum Priority {
    /// Can wait
    Low,
    /// Normal
    Medium,
    /// Act soon
    High,
    /// Act now
    Critical,
}

impl Priority {
    /// Maps a 0-100 zone priority score to a priority level.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Critical
        } else if score >= 80.0 {
            Self::High
        } else if score >= 60.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Lifecycle status of a policy recommendation.
///
/// Parsing is strict: only the four `snake_case` names are accepted.
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
pub enum PolicyStatus {
    /// Awaiting review
    Pending,
    /// Approved for implementation
    Approved,
    /// Being implemented
    InProgress,
    /// Declined
    Rejected,
}

impl PolicyStatus {
    /// Lenient parse for imported spreadsheets, where statuses appear as
    /// free text (`"Pending Approval"`, `"In Progress"`). Unknown text
    /// falls back to [`PolicyStatus::Pending`].
    #[must_use]
    pub fn from_import_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        if let Ok(status) = normalized.parse() {
            return status;
        }
        if normalized.starts_with("pending") {
            Self::Pending
        } else if normalized.starts_with("approved") {
            Self::Approved
        } else if normalized.starts_with("in_progress") {
            Self::InProgress
        } else if normalized.starts_with("rejected") {
            Self::Rejected
        } else {
            Self::Pending
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Pending, Self::Approved, Self::InProgress, Self::Rejected]
    }
}

/// Severity of an alert.
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
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Elevated PM2.5
    Medium,
    /// PM2.5 > 55 µg/m³, or a statistical hotspot
    High,
    /// PM2.5 > 75 µg/m³, or an extreme statistical hotspot
    Critical,
}

impl AlertSeverity {
    /// Returns all variants, most severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Critical, Self::High, Self::Medium, Self::Low]
    }

    /// Severity of the alert a single PM2.5 reading raises, or `None` when
    /// the reading is at or below [`PM25_ACTION_THRESHOLD`].
    #[must_use]
    pub fn for_pm25(pm25: f64) -> Option<Self> {
        if pm25 <= PM25_ACTION_THRESHOLD {
            None
        } else if pm25 > 75.0 {
            Some(Self::Critical)
        } else if pm25 > 55.0 {
            Some(Self::High)
        } else {
            Some(Self::Medium)
        }
    }
}

/// What raised an alert.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertType {
    /// A single reading crossed the action threshold
    PollutionSpike,
    /// Statistical hotspot analysis flagged a location
    HotspotDetected,
    /// A policy should be activated
    PolicyTrigger,
}

/// Whether an alert still needs attention.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertStatus {
    /// Open
    Active,
    /// Closed
    Resolved,
}

/// Coarse quality grade of a monitoring location's reading set.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(serialize_all = "PascalCase")]
pub enum DataQuality {
    /// Three or more pollutants reported
    High,
    /// Two pollutants reported
    Medium,
    /// One pollutant reported
    Low,
    /// Nothing reported
    Poor,
}

impl DataQuality {
    /// Grades a location by how many distinct pollutants it reported.
    #[must_use]
    pub const fn from_parameter_count(count: usize) -> Self {
        match count {
            0 => Self::Poor,
            1 => Self::Low,
            2 => Self::Medium,
            _ => Self::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aqi_category_is_monotonic_in_pm25() {
        let mut previous = 0u8;
        let mut value = 0.0;
        while value <= 400.0 {
            let rank = AqiCategory::from_pm25(Some(value)).rank().unwrap();
            assert!(
                rank >= previous,
                "category got better going from lower pm25 to {value}"
            );
            previous = rank;
            value += 0.5;
        }
    }

    #[test]
    fn aqi_category_boundaries_are_inclusive() {
        assert_eq!(AqiCategory::from_pm25(Some(15.0)), AqiCategory::Good);
        assert_eq!(AqiCategory::from_pm25(Some(15.1)), AqiCategory::Moderate);
        assert_eq!(
            AqiCategory::from_pm25(Some(35.0)),
            AqiCategory::UnhealthySensitive
        );
        assert_eq!(AqiCategory::from_pm25(Some(55.0)), AqiCategory::Unhealthy);
        assert_eq!(
            AqiCategory::from_pm25(Some(150.0)),
            AqiCategory::VeryUnhealthy
        );
        assert_eq!(AqiCategory::from_pm25(Some(150.1)), AqiCategory::Hazardous);
        assert_eq!(AqiCategory::from_pm25(None), AqiCategory::NoData);
    }

    #[test]
    fn aqi_category_parses_labels_and_snake_case() {
        assert_eq!(
            AqiCategory::from_label("Unhealthy for Sensitive Groups"),
            Some(AqiCategory::UnhealthySensitive)
        );
        assert_eq!(
            AqiCategory::from_label("very_unhealthy"),
            Some(AqiCategory::VeryUnhealthy)
        );
        assert_eq!(AqiCategory::from_label("Unknown"), None);
    }

    #[test]
    fn quality_flag_matches_category() {
        assert_eq!(AqiCategory::Good.quality_flag(), 1);
        assert_eq!(AqiCategory::Unhealthy.quality_flag(), 2);
        assert_eq!(AqiCategory::Hazardous.quality_flag(), 3);
    }

    #[test]
    fn numeric_aqi_hits_breakpoints() {
        assert_eq!(aqi_from_pm25(None), 0);
        assert_eq!(aqi_from_pm25(Some(15.0)), 50);
        assert_eq!(aqi_from_pm25(Some(25.0)), 100);
        assert_eq!(aqi_from_pm25(Some(35.0)), 150);
        assert_eq!(aqi_from_pm25(Some(55.0)), 200);
        assert_eq!(aqi_from_pm25(Some(5000.0)), 500);
    }

    #[test]
    fn waste_alias_parses_to_waste_burning() {
        assert_eq!(
            "Waste".parse::<SourceCategory>().unwrap(),
            SourceCategory::WasteBurning
        );
        assert_eq!(
            "waste_burning".parse::<SourceCategory>().unwrap(),
            SourceCategory::WasteBurning
        );
        assert_eq!(SourceCategory::WasteBurning.to_string(), "waste_burning");
        assert_eq!(
            "Traffic".parse::<SourceCategory>().unwrap(),
            SourceCategory::Traffic
        );
    }

    #[test]
    fn policy_status_accepts_only_enumerated_names() {
        for status in PolicyStatus::all() {
            let parsed: PolicyStatus = status.as_ref().parse().unwrap();
            assert_eq!(parsed, *status);
        }
        assert_eq!(
            "in_progress".parse::<PolicyStatus>().unwrap(),
            PolicyStatus::InProgress
        );
        assert!("done".parse::<PolicyStatus>().is_err());
        assert!("Approved".parse::<PolicyStatus>().is_err());
        assert!("".parse::<PolicyStatus>().is_err());
    }

    #[test]
    fn policy_status_import_labels_are_lenient() {
        assert_eq!(
            PolicyStatus::from_import_label("Pending Approval"),
            PolicyStatus::Pending
        );
        assert_eq!(
            PolicyStatus::from_import_label("In Progress"),
            PolicyStatus::InProgress
        );
        assert_eq!(
            PolicyStatus::from_import_label("Approved"),
            PolicyStatus::Approved
        );
        assert_eq!(
            PolicyStatus::from_import_label("whatever"),
            PolicyStatus::Pending
        );
    }

    #[test]
    fn priority_from_score() {
        assert_eq!(Priority::from_score(92.0), Priority::Critical);
        assert_eq!(Priority::from_score(85.0), Priority::High);
        assert_eq!(Priority::from_score(78.0), Priority::Medium);
        assert_eq!(Priority::from_score(50.0), Priority::Low);
    }

    #[test]
    fn alert_severity_for_pm25() {
        assert_eq!(AlertSeverity::for_pm25(35.0), None);
        assert_eq!(AlertSeverity::for_pm25(45.2), Some(AlertSeverity::Medium));
        assert_eq!(AlertSeverity::for_pm25(67.3), Some(AlertSeverity::High));
        assert_eq!(AlertSeverity::for_pm25(89.5), Some(AlertSeverity::Critical));
    }

    #[test]
    fn data_quality_from_parameter_count() {
        assert_eq!(DataQuality::from_parameter_count(0), DataQuality::Poor);
        assert_eq!(DataQuality::from_parameter_count(2), DataQuality::Medium);
        assert_eq!(DataQuality::from_parameter_count(5), DataQuality::High);
    }

    #[test]
    fn pollutant_parses_openaq_parameter_names() {
        assert_eq!("pm25".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!("O3".parse::<Pollutant>().unwrap(), Pollutant::O3);
        assert!("co".parse::<Pollutant>().is_err());
    }
}
