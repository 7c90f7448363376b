//! Rule-based source attribution from chemical signatures.
//!
//! Each source category has a signature over a zone's recent readings:
//!
//! - traffic: mean NO2/PM2.5 ratio above 0.6
//! - industry: mean SO2 above 20 µg/m³
//! - waste burning: mean PM2.5/PM10 ratio above 0.7 together with an
//!   evening PM2.5 peak at least 30% above the midday level
//!
//! Raw scores are normalized so they sum to 1. A zone with no signature
//! at all is attributed entirely to background.
//!
//! Hours of day are evaluated on the stored UTC timestamps.

use air_map_analytics_models::{
    AttributionOutcome, ChemicalSignatures, MIN_ATTRIBUTION_READINGS, SourceAttribution,
    SourceContributions,
};
use air_map_database_models::MeasurementRow;
use chrono::Timelike as _;

use crate::{mean, round_to};

const TRAFFIC_RATIO_THRESHOLD: f64 = 0.6;
const TRAFFIC_MAX_CONTRIBUTION: f64 = 0.8;
const INDUSTRY_SO2_THRESHOLD: f64 = 20.0;
const INDUSTRY_SO2_SCALE: f64 = 50.0;
const INDUSTRY_MAX_CONTRIBUTION: f64 = 0.7;
const FINE_PARTICLE_RATIO_THRESHOLD: f64 = 0.7;
const EVENING_PEAK_FACTOR: f64 = 1.3;
const WASTE_CONTRIBUTION: f64 = 0.5;

/// Readings at which confidence stops growing.
const FULL_CONFIDENCE_READINGS: f64 = 50.0;
const MAX_CONFIDENCE: f64 = 0.8;

const EVENING_HOURS: std::ops::RangeInclusive<u32> = 18..=21;
const DAYTIME_HOURS: std::ops::RangeInclusive<u32> = 10..=14;

/// Computes the indicator values over readings that carry PM2.5.
#[must_use]
pub fn signatures(rows: &[&MeasurementRow]) -> ChemicalSignatures {
    let no2_pm25_ratio = mean(rows.iter().filter_map(|r| {
        let pm25 = r.levels.pm25.filter(|v| *v > 0.0)?;
        Some(r.levels.no2? / pm25)
    }));

    let so2_mean = mean(rows.iter().filter_map(|r| r.levels.so2));

    let pm25_pm10_ratio = mean(rows.iter().filter_map(|r| {
        let pm10 = r.levels.pm10.filter(|v| *v > 0.0)?;
        Some(r.levels.pm25? / pm10)
    }));

    let pm25_in_hours = |hours: &std::ops::RangeInclusive<u32>| {
        mean(
            rows.iter()
                .filter(|r| hours.contains(&r.recorded_at.hour()))
                .filter_map(|r| r.levels.pm25),
        )
    };

    ChemicalSignatures {
        no2_pm25_ratio,
        so2_mean,
        pm25_pm10_ratio,
        evening_pm25: pm25_in_hours(&EVENING_HOURS),
        daytime_pm25: pm25_in_hours(&DAYTIME_HOURS),
    }
}

/// Raw, un-normalized scores for each category.
#[must_use]
pub fn raw_contributions(signatures: &ChemicalSignatures) -> SourceContributions {
    let mut contributions = SourceContributions::default();

    if let Some(ratio) = signatures.no2_pm25_ratio
        && ratio > TRAFFIC_RATIO_THRESHOLD
    {
        contributions.traffic = ratio.min(TRAFFIC_MAX_CONTRIBUTION);
    }

    if let Some(so2) = signatures.so2_mean
        && so2 > INDUSTRY_SO2_THRESHOLD
    {
        contributions.industry = (so2 / INDUSTRY_SO2_SCALE).min(INDUSTRY_MAX_CONTRIBUTION);
    }

    if let Some(ratio) = signatures.pm25_pm10_ratio
        && ratio > FINE_PARTICLE_RATIO_THRESHOLD
        && let (Some(evening), Some(daytime)) = (signatures.evening_pm25, signatures.daytime_pm25)
        && evening > daytime * EVENING_PEAK_FACTOR
    {
        contributions.waste_burning = WASTE_CONTRIBUTION;
    }

    contributions
}

/// Confidence from sample size: `min(1, n/50) * 0.8`, two decimals.
#[must_use]
pub fn confidence(readings: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let coverage = (readings as f64 / FULL_CONFIDENCE_READINGS).min(1.0);
    round_to(coverage * MAX_CONFIDENCE, 2)
}

/// Attributes a zone's readings to source categories. Rows without PM2.5
/// are ignored.
#[must_use]
pub fn attribute_sources(grid_id: i32, rows: &[MeasurementRow]) -> AttributionOutcome {
    let usable: Vec<&MeasurementRow> = rows.iter().filter(|r| r.levels.pm25.is_some()).collect();

    if usable.len() < MIN_ATTRIBUTION_READINGS {
        return AttributionOutcome::InsufficientData {
            grid_id,
            readings: usable.len(),
            required: MIN_ATTRIBUTION_READINGS,
        };
    }

    let signatures = signatures(&usable);
    let contributions = raw_contributions(&signatures).normalized();
    let dominant_source = contributions.dominant();

    log::debug!(
        "Zone {grid_id}: {} readings attributed, dominant source {dominant_source}",
        usable.len()
    );

    AttributionOutcome::Success(SourceAttribution {
        grid_id,
        readings: usable.len(),
        contributions,
        dominant_source,
        confidence: confidence(usable.len()),
        signatures,
    })
}

#[cfg(test)]
mod tests {
    use air_map_pollution_models::SourceCategory;
    use air_map_source_models::{PollutantLevels, SourceType};
    use chrono::{TimeZone as _, Utc};

    use super::*;

    fn row(hour: u32, levels: PollutantLevels) -> MeasurementRow {
        MeasurementRow {
            id: 1,
            longitude: 36.85,
            latitude: -1.31,
            location_id: Some("s1".to_string()),
            location_name: None,
            levels,
            source_type: SourceType::Openaq,
            recorded_at: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            quality_flag: 2,
        }
    }

    fn levels(pm25: f64, pm10: Option<f64>, no2: Option<f64>, so2: Option<f64>) -> PollutantLevels {
        PollutantLevels {
            pm25: Some(pm25),
            pm10,
            no2,
            so2,
            o3: None,
        }
    }

    fn assert_sums_to_one(outcome: &AttributionOutcome) -> SourceAttribution {
        let AttributionOutcome::Success(a) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert!((a.contributions.total() - 1.0).abs() < 1e-9);
        a.clone()
    }

    #[test]
    fn fewer_than_ten_usable_rows_is_insufficient() {
        let mut rows: Vec<MeasurementRow> =
            (0..9).map(|h| row(h, levels(30.0, None, None, None))).collect();
        rows.push(row(9, PollutantLevels::default()));
        let outcome = attribute_sources(4, &rows);
        assert_eq!(
            outcome,
            AttributionOutcome::InsufficientData {
                grid_id: 4,
                readings: 9,
                required: 10
            }
        );
    }

    #[test]
    fn no_signature_is_all_background() {
        let rows: Vec<MeasurementRow> =
            (0..12).map(|h| row(h, levels(20.0, None, Some(5.0), Some(3.0)))).collect();
        let a = assert_sums_to_one(&attribute_sources(1, &rows));
        assert_eq!(a.dominant_source, SourceCategory::Background);
        assert!((a.contributions.background - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn high_no2_ratio_is_traffic() {
        let rows: Vec<MeasurementRow> =
            (0..20).map(|h| row(h, levels(40.0, None, Some(36.0), None))).collect();
        let a = assert_sums_to_one(&attribute_sources(2, &rows));
        assert_eq!(a.dominant_source, SourceCategory::Traffic);
        assert!((a.contributions.traffic - 1.0).abs() < f64::EPSILON);
        assert!((a.signatures.no2_pm25_ratio.unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn traffic_and_industry_share_after_normalization() {
        let rows: Vec<MeasurementRow> = (0..10)
            .map(|h| row(h, levels(50.0, None, Some(40.0), Some(30.0))))
            .collect();
        let a = assert_sums_to_one(&attribute_sources(3, &rows));
        // traffic raw 0.8, industry raw 0.6
        assert!((a.contributions.traffic - 0.8 / 1.4).abs() < 1e-9);
        assert!((a.contributions.industry - 0.6 / 1.4).abs() < 1e-9);
        assert_eq!(a.dominant_source, SourceCategory::Traffic);
    }

    #[test]
    fn waste_burning_needs_evening_peak() {
        let mut rows: Vec<MeasurementRow> = (10..=14)
            .map(|h| row(h, levels(20.0, Some(25.0), None, None)))
            .collect();
        rows.extend((18..=21).map(|h| row(h, levels(60.0, Some(70.0), None, None))));
        rows.push(row(3, levels(30.0, Some(35.0), None, None)));
        let a = assert_sums_to_one(&attribute_sources(5, &rows));
        assert_eq!(a.dominant_source, SourceCategory::WasteBurning);

        let flat: Vec<MeasurementRow> = (8..20)
            .map(|h| row(h, levels(30.0, Some(35.0), None, None)))
            .collect();
        let a = assert_sums_to_one(&attribute_sources(5, &flat));
        assert_eq!(a.dominant_source, SourceCategory::Background);
    }

    #[test]
    fn confidence_grows_with_sample_size() {
        assert!((confidence(10) - 0.16).abs() < f64::EPSILON);
        assert!((confidence(25) - 0.4).abs() < f64::EPSILON);
        assert!((confidence(50) - 0.8).abs() < f64::EPSILON);
        assert!((confidence(500) - 0.8).abs() < f64::EPSILON);
    }
}
