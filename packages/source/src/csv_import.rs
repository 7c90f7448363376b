//! CSV importers for monitoring readings and intervention zones.
//!
//! Rows missing a required column are skipped and counted; a bad row
//! never aborts the import. Only an unreadable header row is an error.

use std::io::Read;
use std::sync::LazyLock;

use air_map_pollution_models::{AqiCategory, PolicyStatus};
use air_map_source_models::{
    InterventionZone, NormalizedMeasurement, PollutantLevels, SourceType,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;

use crate::SourceError;
use crate::parsing::{parse_lat_lng_f64, parse_optional_f64, parse_timestamp};

/// Expected impact used when the cell is missing or has no percentage.
pub const DEFAULT_EXPECTED_IMPACT: f64 = 20.0;

/// Priority score used when the cell is missing.
pub const DEFAULT_PRIORITY_SCORE: f64 = 50.0;

static IMPACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:-\d+)?%").unwrap_or_else(|_| unreachable!()));

/// Parsed rows plus the number of rows that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvImport<T> {
    /// Successfully parsed rows, in file order.
    pub rows: Vec<T>,
    /// Rows skipped for missing or malformed required columns.
    pub skipped: u64,
}

#[derive(Debug, Default, Deserialize)]
struct MonitoringRow {
    #[serde(rename = "Location_ID", default)]
    location_id: Option<String>,
    #[serde(rename = "Location_Name", default)]
    location_name: Option<String>,
    #[serde(rename = "Latitude", default)]
    latitude: Option<String>,
    #[serde(rename = "Longitude", default)]
    longitude: Option<String>,
    #[serde(rename = "PM25_ugm3", default)]
    pm25: Option<String>,
    #[serde(rename = "PM10_ugm3", default)]
    pm10: Option<String>,
    #[serde(rename = "NO2_ugm3", default)]
    no2: Option<String>,
    #[serde(rename = "SO2_ugm3", default)]
    so2: Option<String>,
    #[serde(rename = "O3_ugm3", default)]
    o3: Option<String>,
    #[serde(rename = "AQI_Category", default)]
    aqi_category: Option<String>,
    #[serde(rename = "Last_Updated", default)]
    last_updated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InterventionRow {
    #[serde(rename = "Zone_Name", default)]
    zone_name: Option<String>,
    #[serde(rename = "Latitude", default)]
    latitude: Option<String>,
    #[serde(rename = "Longitude", default)]
    longitude: Option<String>,
    #[serde(rename = "Priority_Score", default)]
    priority_score: Option<String>,
    #[serde(rename = "Dominant_Source", default)]
    dominant_source: Option<String>,
    #[serde(rename = "Policy_Type", default)]
    policy_type: Option<String>,
    #[serde(rename = "Expected_Impact", default)]
    expected_impact: Option<String>,
    #[serde(rename = "Status", default)]
    status: Option<String>,
}

fn non_empty(cell: Option<&String>) -> Option<&str> {
    cell.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn number(cell: Option<&String>) -> Option<f64> {
    cell.and_then(|s| parse_optional_f64(s))
}

/// Extracts the first percentage from free text such as `"15-20%"` or
/// `"Reduce PM2.5 by 30%"`. Falls back to [`DEFAULT_EXPECTED_IMPACT`].
#[must_use]
pub fn extract_impact_percentage(text: &str) -> f64 {
    IMPACT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(DEFAULT_EXPECTED_IMPACT)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Parses a monitoring spreadsheet into measurements.
///
/// `Latitude` and `Longitude` are required. Readings without
/// `Last_Updated` are stamped with `now`. A missing or unrecognised
/// `AQI_Category` falls back to the category derived from PM2.5.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if the header row cannot be read.
pub fn parse_monitoring_csv<R: Read>(
    reader: R,
    now: DateTime<Utc>,
) -> Result<CsvImport<NormalizedMeasurement>, SourceError> {
    let mut reader = csv_reader(reader);
    reader.headers()?;

    let mut rows = Vec::new();
    let mut skipped = 0u64;

    for (index, result) in reader.deserialize::<MonitoringRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping monitoring row {}: {e}", index + 1);
                skipped += 1;
                continue;
            }
        };

        let Some((latitude, longitude)) =
            parse_lat_lng_f64(number(row.latitude.as_ref()), number(row.longitude.as_ref()))
        else {
            log::warn!("Skipping monitoring row {}: missing coordinates", index + 1);
            skipped += 1;
            continue;
        };

        let levels = PollutantLevels {
            pm25: number(row.pm25.as_ref()),
            pm10: number(row.pm10.as_ref()),
            no2: number(row.no2.as_ref()),
            so2: number(row.so2.as_ref()),
            o3: number(row.o3.as_ref()),
        };
        let aqi_category = non_empty(row.aqi_category.as_ref())
            .and_then(AqiCategory::from_label)
            .unwrap_or_else(|| AqiCategory::from_pm25(levels.pm25));
        let recorded_at = non_empty(row.last_updated.as_ref())
            .and_then(parse_timestamp)
            .unwrap_or(now);

        rows.push(NormalizedMeasurement {
            location_id: non_empty(row.location_id.as_ref()).map(ToString::to_string),
            location_name: non_empty(row.location_name.as_ref()).map(ToString::to_string),
            longitude,
            latitude,
            levels,
            recorded_at,
            source_type: SourceType::CsvImport,
            aqi_category,
        });
    }

    log::info!(
        "Parsed {} monitoring rows ({skipped} skipped)",
        rows.len()
    );
    Ok(CsvImport { rows, skipped })
}

/// Parses an interventions spreadsheet into zones.
///
/// `Latitude` and `Longitude` are required; every other column has a
/// default (`Priority_Score` 50, `Dominant_Source` unknown, `Policy_Type`
/// general, `Expected_Impact` 20 %, `Status` pending).
///
/// # Errors
///
/// Returns [`SourceError::Csv`] if the header row cannot be read.
pub fn parse_interventions_csv<R: Read>(
    reader: R,
) -> Result<CsvImport<InterventionZone>, SourceError> {
    let mut reader = csv_reader(reader);
    reader.headers()?;

    let mut rows = Vec::new();
    let mut skipped = 0u64;

    for (index, result) in reader.deserialize::<InterventionRow>().enumerate() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping intervention row {}: {e}", index + 1);
                skipped += 1;
                continue;
            }
        };

        let Some((latitude, longitude)) =
            parse_lat_lng_f64(number(row.latitude.as_ref()), number(row.longitude.as_ref()))
        else {
            log::warn!("Skipping intervention row {}: missing coordinates", index + 1);
            skipped += 1;
            continue;
        };

        let zone_name = non_empty(row.zone_name.as_ref()).map(ToString::to_string);
        let impact_text = non_empty(row.expected_impact.as_ref());
        let description = format!(
            "Policy intervention for {} - {}",
            zone_name.as_deref().unwrap_or("area"),
            impact_text.unwrap_or("Impact TBD")
        );

        rows.push(InterventionZone {
            longitude,
            latitude,
            priority_score: number(row.priority_score.as_ref()).unwrap_or(DEFAULT_PRIORITY_SCORE),
            dominant_source: non_empty(row.dominant_source.as_ref())
                .unwrap_or("unknown")
                .to_lowercase(),
            policy_type: non_empty(row.policy_type.as_ref())
                .unwrap_or("general")
                .to_lowercase()
                .replace(' ', "_"),
            expected_impact: impact_text.map_or(DEFAULT_EXPECTED_IMPACT, extract_impact_percentage),
            status: non_empty(row.status.as_ref())
                .map_or(PolicyStatus::Pending, PolicyStatus::from_import_label),
            description,
            zone_name,
        });
    }

    log::info!(
        "Parsed {} intervention rows ({skipped} skipped)",
        rows.len()
    );
    Ok(CsvImport { rows, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        parse_timestamp("2024-03-01T12:00:00Z").unwrap()
    }

    #[test]
    fn extracts_first_percentage() {
        assert!((extract_impact_percentage("15-20%") - 15.0).abs() < f64::EPSILON);
        assert!((extract_impact_percentage("Reduce by 30%") - 30.0).abs() < f64::EPSILON);
        assert!(
            (extract_impact_percentage("significant") - DEFAULT_EXPECTED_IMPACT).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn monitoring_rows_become_measurements() {
        let data = "\
Location_ID,Location_Name,Latitude,Longitude,PM25_ugm3,PM10_ugm3,NO2_ugm3,AQI_Category,Last_Updated
KE001,CBD,-1.2864,36.8172,45.2,78.1,32.1,Unhealthy,2024-03-01T08:00:00Z
KE002,Industrial Area,-1.3128,36.8581,67.3,,,Very Unhealthy,
KE003,Westlands,-1.2630,36.8089,32.1,55.0,21.0,,2024-03-01 09:00:00
";
        let import = parse_monitoring_csv(data.as_bytes(), now()).unwrap();
        assert_eq!(import.rows.len(), 3);
        assert_eq!(import.skipped, 0);

        let cbd = &import.rows[0];
        assert_eq!(cbd.location_id.as_deref(), Some("KE001"));
        assert_eq!(cbd.levels.pm25, Some(45.2));
        assert_eq!(cbd.aqi_category, AqiCategory::Unhealthy);
        assert_eq!(cbd.source_type, SourceType::CsvImport);

        let industrial = &import.rows[1];
        assert_eq!(industrial.levels.pm10, None);
        assert_eq!(industrial.recorded_at, now());
        assert_eq!(industrial.quality_flag(), 3);

        let westlands = &import.rows[2];
        assert_eq!(westlands.aqi_category, AqiCategory::UnhealthySensitive);
    }

    #[test]
    fn only_coordinate_columns_are_required() {
        let data = "Latitude,Longitude\n-1.2864,36.8172\n-1.3128,36.8581\n";
        let import = parse_monitoring_csv(data.as_bytes(), now()).unwrap();
        assert_eq!(import.rows.len(), 2);
        assert_eq!(import.rows[0].aqi_category, AqiCategory::NoData);
        assert_eq!(import.rows[0].quality_flag(), 2);
    }

    #[test]
    fn rows_without_coordinates_are_skipped_and_counted() {
        let data = "\
Latitude,Longitude,PM25_ugm3
-1.2864,36.8172,45.2
,36.8581,67.3
not-a-number,36.8089,32.1
-1.3167,36.8833,89.5
";
        let import = parse_monitoring_csv(data.as_bytes(), now()).unwrap();
        assert_eq!(import.rows.len(), 2);
        assert_eq!(import.skipped, 2);
    }

    #[test]
    fn missing_coordinate_columns_skip_every_row() {
        let data = "PM25_ugm3\n45.2\n67.3\n";
        let import = parse_monitoring_csv(data.as_bytes(), now()).unwrap();
        assert!(import.rows.is_empty());
        assert_eq!(import.skipped, 2);
    }

    #[test]
    fn intervention_rows_apply_defaults() {
        let data = "\
Zone_Name,Latitude,Longitude,Priority_Score,Dominant_Source,Policy_Type,Expected_Impact,Status
Nairobi CBD,-1.2864,36.8172,92,Traffic,Traffic Restriction,25-30%,Pending Approval
,-1.3128,36.8581,,,,,
";
        let import = parse_interventions_csv(data.as_bytes()).unwrap();
        assert_eq!(import.rows.len(), 2);

        let cbd = &import.rows[0];
        assert_eq!(cbd.zone_name.as_deref(), Some("Nairobi CBD"));
        assert_eq!(cbd.dominant_source, "traffic");
        assert_eq!(cbd.policy_type, "traffic_restriction");
        assert!((cbd.expected_impact - 25.0).abs() < f64::EPSILON);
        assert_eq!(cbd.status, PolicyStatus::Pending);
        assert_eq!(cbd.description, "Policy intervention for Nairobi CBD - 25-30%");

        let bare = &import.rows[1];
        assert_eq!(bare.zone_name, None);
        assert!((bare.priority_score - DEFAULT_PRIORITY_SCORE).abs() < f64::EPSILON);
        assert_eq!(bare.dominant_source, "unknown");
        assert_eq!(bare.policy_type, "general");
        assert!((bare.expected_impact - DEFAULT_EXPECTED_IMPACT).abs() < f64::EPSILON);
        assert_eq!(bare.description, "Policy intervention for area - Impact TBD");
    }
}
