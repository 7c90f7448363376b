//! CSV and GeoJSON export of measurements.

use std::cmp::Reverse;
use std::io::Write;

use air_map_pollution_models::aqi_from_pm25;
use air_map_source_models::NormalizedMeasurement;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::Serialize;

use crate::SourceError;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Location_ID")]
    location_id: Option<&'a str>,
    #[serde(rename = "Location_Name")]
    location_name: Option<&'a str>,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "PM25_ugm3")]
    pm25: Option<f64>,
    #[serde(rename = "PM10_ugm3")]
    pm10: Option<f64>,
    #[serde(rename = "NO2_ugm3")]
    no2: Option<f64>,
    #[serde(rename = "O3_ugm3")]
    o3: Option<f64>,
    #[serde(rename = "SO2_ugm3")]
    so2: Option<f64>,
    #[serde(rename = "AQI_Category")]
    aqi_category: &'static str,
    #[serde(rename = "AQI")]
    aqi: u16,
    #[serde(rename = "Data_Quality")]
    data_quality: String,
    #[serde(rename = "Source")]
    source: &'a str,
    #[serde(rename = "Last_Updated")]
    last_updated: String,
}

impl<'a> From<&'a NormalizedMeasurement> for ExportRow<'a> {
    fn from(m: &'a NormalizedMeasurement) -> Self {
        Self {
            location_id: m.location_id.as_deref(),
            location_name: m.location_name.as_deref(),
            latitude: m.latitude,
            longitude: m.longitude,
            pm25: m.levels.pm25,
            pm10: m.levels.pm10,
            no2: m.levels.no2,
            o3: m.levels.o3,
            so2: m.levels.so2,
            aqi_category: m.aqi_category.label(),
            aqi: aqi_from_pm25(m.levels.pm25),
            data_quality: m.data_quality().to_string(),
            source: m.source_type.as_ref(),
            last_updated: m.recorded_at.to_rfc3339(),
        }
    }
}

/// Orders measurements worst AQI category first, with No Data last.
/// Stable, so equal categories keep their input order.
#[must_use]
pub fn sorted_by_severity(measurements: &[NormalizedMeasurement]) -> Vec<&NormalizedMeasurement> {
    let mut sorted: Vec<&NormalizedMeasurement> = measurements.iter().collect();
    sorted.sort_by_key(|m| Reverse(m.aqi_category.rank()));
    sorted
}

/// Writes measurements as CSV, worst AQI category first. Returns the
/// number of rows written.
///
/// # Errors
///
/// Returns [`SourceError`] if writing fails.
pub fn write_csv<W: Write>(
    writer: W,
    measurements: &[NormalizedMeasurement],
) -> Result<usize, SourceError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let sorted = sorted_by_severity(measurements);
    for m in &sorted {
        csv_writer.serialize(ExportRow::from(*m))?;
    }
    csv_writer.flush()?;
    Ok(sorted.len())
}

/// Builds a GeoJSON point feature for a measurement. Returns `None` when
/// the coordinates are not finite.
#[must_use]
pub fn measurement_feature(m: &NormalizedMeasurement) -> Option<Feature> {
    if !m.longitude.is_finite() || !m.latitude.is_finite() {
        return None;
    }

    let mut properties = JsonObject::new();
    properties.insert("locationId".into(), serde_json::json!(m.location_id));
    properties.insert("locationName".into(), serde_json::json!(m.location_name));
    properties.insert("pm25".into(), serde_json::json!(m.levels.pm25));
    properties.insert("pm10".into(), serde_json::json!(m.levels.pm10));
    properties.insert("no2".into(), serde_json::json!(m.levels.no2));
    properties.insert("so2".into(), serde_json::json!(m.levels.so2));
    properties.insert("o3".into(), serde_json::json!(m.levels.o3));
    properties.insert(
        "aqiCategory".into(),
        serde_json::json!(m.aqi_category.label()),
    );
    properties.insert("aqi".into(), serde_json::json!(aqi_from_pm25(m.levels.pm25)));
    properties.insert(
        "dataQuality".into(),
        serde_json::json!(m.data_quality().to_string()),
    );
    properties.insert("source".into(), serde_json::json!(m.source_type.as_ref()));
    properties.insert(
        "lastUpdated".into(),
        serde_json::json!(m.recorded_at.to_rfc3339()),
    );

    Some(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![m.longitude, m.latitude]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Builds a GeoJSON `FeatureCollection` of measurement points.
#[must_use]
pub fn to_feature_collection(measurements: &[NormalizedMeasurement]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: measurements.iter().filter_map(measurement_feature).collect(),
        foreign_members: None,
    }
}

/// Serializes measurements as a GeoJSON string.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if serialization fails.
pub fn to_geojson_string(measurements: &[NormalizedMeasurement]) -> Result<String, SourceError> {
    Ok(serde_json::to_string_pretty(&to_feature_collection(
        measurements,
    ))?)
}

#[cfg(test)]
mod tests {
    use air_map_pollution_models::AqiCategory;
    use air_map_source_models::{PollutantLevels, SourceType};
    use chrono::Utc;

    use super::*;

    fn reading(id: &str, pm25: Option<f64>, lon: f64) -> NormalizedMeasurement {
        NormalizedMeasurement {
            location_id: Some(id.to_string()),
            location_name: None,
            longitude: lon,
            latitude: -1.28,
            levels: PollutantLevels {
                pm25,
                ..PollutantLevels::default()
            },
            recorded_at: Utc::now(),
            source_type: SourceType::CsvImport,
            aqi_category: AqiCategory::from_pm25(pm25),
        }
    }

    #[test]
    fn severity_sort_puts_worst_first_and_no_data_last() {
        let data = vec![
            reading("good", Some(10.0), 36.8),
            reading("none", None, 36.8),
            reading("bad", Some(89.5), 36.8),
            reading("mid", Some(45.2), 36.8),
        ];
        let ids: Vec<&str> = sorted_by_severity(&data)
            .iter()
            .filter_map(|m| m.location_id.as_deref())
            .collect();
        assert_eq!(ids, vec!["bad", "mid", "good", "none"]);
    }

    #[test]
    fn csv_has_header_and_one_line_per_row() {
        let data = vec![reading("a", Some(20.0), 36.8), reading("b", None, 36.9)];
        let mut buffer = Vec::new();
        let written = write_csv(&mut buffer, &data).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Location_ID,Location_Name,Latitude"));
        assert!(lines.next().unwrap().contains(",Moderate,"));
        assert!(lines.next().unwrap().contains(",No Data,"));
    }

    #[test]
    fn geojson_skips_non_finite_coordinates() {
        let data = vec![reading("a", Some(20.0), 36.8), reading("b", Some(20.0), f64::NAN)];
        let collection = to_feature_collection(&data);
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props["aqiCategory"], "Moderate");
        assert_eq!(props["aqi"], 75);
    }
}
