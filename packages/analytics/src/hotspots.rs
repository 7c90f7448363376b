//! Statistical hotspot detection.
//!
//! A reading is a hotspot when its PM2.5 is strictly above the sample's
//! mean plus two sample standard deviations, and critical above three.

use air_map_analytics_models::{
    Hotspot, HotspotOutcome, HotspotReport, HotspotThresholds, MIN_HOTSPOT_READINGS,
};
use air_map_database_models::Pm25ReadingRow;
use air_map_pollution_models::AlertSeverity;

use crate::mean;

/// Mean and sample (n-1) standard deviation. `None` for fewer than two
/// values.
#[must_use]
pub fn mean_and_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values.iter().copied())?;
    #[allow(clippy::cast_precision_loss)]
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some((mean, variance.sqrt()))
}

/// Builds thresholds from a mean and standard deviation.
#[must_use]
pub fn thresholds(mean: f64, std_dev: f64) -> HotspotThresholds {
    HotspotThresholds {
        mean,
        std_dev,
        high: 2.0f64.mul_add(std_dev, mean),
        critical: 3.0f64.mul_add(std_dev, mean),
    }
}

/// Severity of a reading against thresholds, or `None` when it is not a
/// hotspot.
#[must_use]
pub fn classify(pm25: f64, thresholds: &HotspotThresholds) -> Option<AlertSeverity> {
    if pm25 > thresholds.critical {
        Some(AlertSeverity::Critical)
    } else if pm25 > thresholds.high {
        Some(AlertSeverity::High)
    } else {
        None
    }
}

/// Finds hotspots among `readings`, most severe first.
#[must_use]
pub fn detect_hotspots(readings: &[Pm25ReadingRow]) -> HotspotOutcome {
    if readings.len() < MIN_HOTSPOT_READINGS {
        return HotspotOutcome::InsufficientData {
            readings: readings.len(),
            required: MIN_HOTSPOT_READINGS,
        };
    }

    let values: Vec<f64> = readings.iter().map(|r| r.pm25).collect();
    let Some((mean, std_dev)) = mean_and_std_dev(&values) else {
        return HotspotOutcome::InsufficientData {
            readings: readings.len(),
            required: MIN_HOTSPOT_READINGS,
        };
    };
    let thresholds = thresholds(mean, std_dev);

    let mut hotspots: Vec<Hotspot> = readings
        .iter()
        .filter_map(|r| {
            let severity = classify(r.pm25, &thresholds)?;
            Some(Hotspot {
                measurement_id: r.id,
                longitude: r.longitude,
                latitude: r.latitude,
                pm25: r.pm25,
                location_name: r.location_name.clone(),
                severity,
                severity_score: if mean > 0.0 { r.pm25 / mean } else { 0.0 },
                recorded_at: r.recorded_at,
            })
        })
        .collect();

    hotspots.sort_by(|a, b| b.severity_score.total_cmp(&a.severity_score));

    log::debug!(
        "Hotspot detection: {} readings, mean {mean:.1}, std dev {std_dev:.1}, {} hotspots",
        readings.len(),
        hotspots.len()
    );

    HotspotOutcome::Success(HotspotReport {
        total_readings: readings.len(),
        thresholds,
        hotspot_count: hotspots.len(),
        hotspots,
    })
}
