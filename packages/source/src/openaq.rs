//! `OpenAQ` v2 client.
//!
//! Fetches the monitoring locations and the raw measurements for a
//! country/city pair, then collapses the raw rows into one
//! [`NormalizedMeasurement`] per location holding the latest value of each
//! pollutant.

use std::collections::BTreeMap;

use air_map_pollution_models::{AqiCategory, Pollutant};
use air_map_source_models::{NormalizedMeasurement, PollutantLevels, SourceType};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;

use crate::parsing::{parse_lat_lng_f64, parse_timestamp};
use crate::{FetchOptions, SourceError, http};

/// Request configuration for an `OpenAQ` source.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAqConfig {
    /// API root, e.g. `https://api.openaq.org/v2`.
    pub base_url: String,
    /// ISO country code filter.
    pub country: String,
    /// City filter.
    pub city: String,
    /// Optional `[west, south, east, north]` coverage box. Readings outside
    /// it are dropped.
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
    /// Page size for `/locations`.
    #[serde(default = "default_locations_limit")]
    pub locations_limit: u64,
    /// Page size for `/measurements`.
    #[serde(default = "default_measurements_limit")]
    pub measurements_limit: u64,
    /// Window used when no `since` is given.
    #[serde(default = "default_hours_back")]
    pub hours_back: i64,
    /// Environment variable holding the optional `X-API-Key`.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

const fn default_locations_limit() -> u64 {
    100
}

const fn default_measurements_limit() -> u64 {
    10_000
}

const fn default_hours_back() -> i64 {
    24
}

/// A monitoring station as listed by `/locations`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAqLocation {
    /// Upstream location id.
    pub id: String,
    /// Station name.
    pub name: String,
    /// Latitude, when published.
    pub latitude: Option<f64>,
    /// Longitude, when published.
    pub longitude: Option<f64>,
    /// Parameters the station reports.
    pub parameters: Vec<String>,
    /// Last time the station reported.
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ResultsPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    id: serde_json::Value,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    coordinates: Option<RawCoordinates>,
    #[serde(default)]
    parameters: Vec<RawLocationParameter>,
    #[serde(default)]
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocationParameter {
    #[serde(default)]
    parameter: Option<String>,
}

/// A single row from `/measurements`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurement {
    #[serde(default)]
    location_id: Option<serde_json::Value>,
    #[serde(default)]
    location: Option<String>,
    parameter: String,
    #[serde(default)]
    value: Option<f64>,
    date: RawDate,
    #[serde(default)]
    coordinates: Option<RawCoordinates>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDate {
    utc: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawCoordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn request(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
) -> reqwest::RequestBuilder {
    let builder = client.get(url);
    match api_key {
        Some(key) => builder.header("X-API-Key", key),
        None => builder,
    }
}

/// Lists the monitoring locations for the configured city (one page).
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails or the body is malformed.
pub async fn fetch_locations(
    client: &reqwest::Client,
    config: &OpenAqConfig,
    api_key: Option<&str>,
) -> Result<Vec<OpenAqLocation>, SourceError> {
    let url = format!("{}/locations", config.base_url.trim_end_matches('/'));
    let limit = config.locations_limit.to_string();
    let params = [
        ("country", config.country.as_str()),
        ("city", config.city.as_str()),
        ("limit", limit.as_str()),
    ];

    let body = http::send_json(request(client, &url, api_key).query(&params)).await?;
    let page: ResultsPage<RawLocation> = serde_json::from_value(body)?;

    let locations: Vec<OpenAqLocation> = page
        .results
        .into_iter()
        .filter_map(|raw| {
            let id = id_string(&raw.id)?;
            Some(OpenAqLocation {
                name: raw.name.unwrap_or_else(|| id.clone()),
                id,
                latitude: raw.coordinates.and_then(|c| c.latitude),
                longitude: raw.coordinates.and_then(|c| c.longitude),
                parameters: raw
                    .parameters
                    .into_iter()
                    .filter_map(|p| p.parameter)
                    .collect(),
                last_updated: raw.last_updated.as_deref().and_then(parse_timestamp),
            })
        })
        .collect();

    log::info!(
        "Found {} monitoring locations in {}, {}",
        locations.len(),
        config.city,
        config.country
    );
    Ok(locations)
}

/// Fetches raw measurements for the configured city within the requested
/// window (one page, newest first).
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails or the body is malformed.
pub async fn fetch_raw_measurements(
    client: &reqwest::Client,
    config: &OpenAqConfig,
    api_key: Option<&str>,
    options: &FetchOptions,
) -> Result<Vec<RawMeasurement>, SourceError> {
    let url = format!("{}/measurements", config.base_url.trim_end_matches('/'));
    let until = options.until.unwrap_or_else(Utc::now);
    let since = options
        .since
        .unwrap_or_else(|| until - Duration::hours(config.hours_back));
    let limit = options
        .limit
        .unwrap_or(config.measurements_limit)
        .min(config.measurements_limit)
        .to_string();
    let date_from = since.to_rfc3339_opts(SecondsFormat::Secs, false);
    let date_to = until.to_rfc3339_opts(SecondsFormat::Secs, false);

    let params = [
        ("country", config.country.as_str()),
        ("city", config.city.as_str()),
        ("date_from", date_from.as_str()),
        ("date_to", date_to.as_str()),
        ("limit", limit.as_str()),
        ("sort", "desc"),
    ];

    let body = http::send_json(request(client, &url, api_key).query(&params)).await?;
    let page: ResultsPage<RawMeasurement> = serde_json::from_value(body)?;
    log::info!("Fetched {} raw measurements", page.results.len());
    Ok(page.results)
}

/// Lists the city's locations, then fetches and normalizes their latest
/// measurements. Returns an empty list without requesting measurements
/// when the city has no monitoring locations.
///
/// # Errors
///
/// Returns [`SourceError`] if a request fails or a body is malformed.
pub async fn fetch_measurements(
    client: &reqwest::Client,
    config: &OpenAqConfig,
    api_key: Option<&str>,
    options: &FetchOptions,
) -> Result<Vec<NormalizedMeasurement>, SourceError> {
    let locations = fetch_locations(client, config, api_key).await?;
    if locations.is_empty() {
        log::warn!("No OpenAQ locations in {}, {}", config.city, config.country);
        return Ok(Vec::new());
    }

    let raw = fetch_raw_measurements(client, config, api_key, options).await?;
    Ok(latest_per_location(&raw, &locations, config.bbox))
}

#[derive(Default)]
struct LocationAccumulator {
    name: Option<String>,
    coordinates: Option<(f64, f64)>,
    latest: BTreeMap<Pollutant, (DateTime<Utc>, f64)>,
}

/// Groups raw rows by location, keeping the most recent value per
/// pollutant. The reading's timestamp is the newest kept value. Rows with
/// unknown parameters, null values, or unparseable dates are ignored.
/// Names and coordinates missing from the rows are taken from the matching
/// entry of `locations`; locations still without coordinates (or outside
/// `bbox`) are dropped.
#[must_use]
pub fn latest_per_location(
    raw: &[RawMeasurement],
    locations: &[OpenAqLocation],
    bbox: Option<[f64; 4]>,
) -> Vec<NormalizedMeasurement> {
    let mut by_location: BTreeMap<String, LocationAccumulator> = BTreeMap::new();

    for row in raw {
        let Some(key) = row
            .location_id
            .as_ref()
            .and_then(id_string)
            .or_else(|| row.location.clone())
        else {
            continue;
        };
        let Ok(pollutant) = row.parameter.parse::<Pollutant>() else {
            log::trace!("Ignoring unsupported parameter {:?}", row.parameter);
            continue;
        };
        let Some(value) = row.value.filter(|v| v.is_finite()) else {
            continue;
        };
        let Some(recorded_at) = parse_timestamp(&row.date.utc) else {
            log::trace!("Ignoring measurement with bad date {:?}", row.date.utc);
            continue;
        };

        let entry = by_location.entry(key).or_default();
        if entry.name.is_none() {
            entry.name.clone_from(&row.location);
        }
        if entry.coordinates.is_none() {
            entry.coordinates = row
                .coordinates
                .and_then(|c| parse_lat_lng_f64(c.latitude, c.longitude));
        }

        let newer = entry
            .latest
            .get(&pollutant)
            .is_none_or(|(existing, _)| recorded_at > *existing);
        if newer {
            entry.latest.insert(pollutant, (recorded_at, value));
        }
    }

    by_location
        .into_iter()
        .filter_map(|(location_id, mut acc)| {
            if let Some(listed) = locations.iter().find(|l| l.id == location_id) {
                if acc.name.is_none() {
                    acc.name = Some(listed.name.clone());
                }
                if acc.coordinates.is_none() {
                    acc.coordinates = parse_lat_lng_f64(listed.latitude, listed.longitude);
                }
            }
            let (latitude, longitude) = acc.coordinates?;
            if let Some([west, south, east, north]) = bbox
                && (!(west..=east).contains(&longitude) || !(south..=north).contains(&latitude))
            {
                return None;
            }
            let recorded_at = acc.latest.values().map(|(t, _)| *t).max()?;
            let value = |p: Pollutant| acc.latest.get(&p).map(|(_, v)| *v);
            let levels = PollutantLevels {
                pm25: value(Pollutant::Pm25),
                pm10: value(Pollutant::Pm10),
                no2: value(Pollutant::No2),
                so2: value(Pollutant::So2),
                o3: value(Pollutant::O3),
            };

            Some(NormalizedMeasurement {
                location_id: Some(location_id),
                location_name: acc.name,
                longitude,
                latitude,
                aqi_category: AqiCategory::from_pm25(levels.pm25),
                levels,
                recorded_at,
                source_type: SourceType::Openaq,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: serde_json::Value) -> Vec<RawMeasurement> {
        serde_json::from_value::<ResultsPage<RawMeasurement>>(json)
            .unwrap()
            .results
    }

    #[test]
    fn keeps_latest_value_per_parameter() {
        let rows = raw(serde_json::json!({"results": [
            {"locationId": 101, "location": "Kibera", "parameter": "pm25", "value": 40.0,
             "date": {"utc": "2024-03-01T10:00:00Z"},
             "coordinates": {"latitude": -1.3128, "longitude": 36.7833}},
            {"locationId": 101, "location": "Kibera", "parameter": "pm25", "value": 55.0,
             "date": {"utc": "2024-03-01T12:00:00Z"},
             "coordinates": {"latitude": -1.3128, "longitude": 36.7833}},
            {"locationId": 101, "location": "Kibera", "parameter": "no2", "value": 20.0,
             "date": {"utc": "2024-03-01T11:00:00Z"},
             "coordinates": {"latitude": -1.3128, "longitude": 36.7833}}
        ]}));

        let out = latest_per_location(&rows, &[], None);
        assert_eq!(out.len(), 1);
        let m = &out[0];
        assert_eq!(m.location_id.as_deref(), Some("101"));
        assert_eq!(m.levels.pm25, Some(55.0));
        assert_eq!(m.levels.no2, Some(20.0));
        assert_eq!(m.recorded_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert_eq!(m.aqi_category, AqiCategory::VeryUnhealthy);
    }

    #[test]
    fn drops_locations_without_coordinates_or_outside_bbox() {
        let rows = raw(serde_json::json!({"results": [
            {"locationId": 1, "parameter": "pm25", "value": 10.0,
             "date": {"utc": "2024-03-01T10:00:00Z"}},
            {"locationId": 2, "parameter": "pm25", "value": 10.0,
             "date": {"utc": "2024-03-01T10:00:00Z"},
             "coordinates": {"latitude": -4.05, "longitude": 39.66}},
            {"locationId": 3, "parameter": "pm25", "value": 10.0,
             "date": {"utc": "2024-03-01T10:00:00Z"},
             "coordinates": {"latitude": -1.28, "longitude": 36.82}}
        ]}));

        let out = latest_per_location(&rows, &[], Some([36.70, -1.40, 37.12, -1.15]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location_id.as_deref(), Some("3"));
    }

    #[test]
    fn ignores_unknown_parameters() {
        let rows = raw(serde_json::json!({"results": [
            {"locationId": 7, "parameter": "co", "value": 300.0,
             "date": {"utc": "2024-03-01T10:00:00Z"},
             "coordinates": {"latitude": -1.28, "longitude": 36.82}}
        ]}));

        assert!(latest_per_location(&rows, &[], None).is_empty());
    }

    #[test]
    fn null_values_are_skipped_not_fatal() {
        let rows = raw(serde_json::json!({"results": [
            {"locationId": 9, "parameter": "pm25", "value": null,
             "date": {"utc": "2024-03-01T12:00:00Z"},
             "coordinates": {"latitude": -1.28, "longitude": 36.82}},
            {"locationId": 9, "parameter": "pm25", "value": 31.0,
             "date": {"utc": "2024-03-01T11:00:00Z"},
             "coordinates": {"latitude": -1.28, "longitude": 36.82}}
        ]}));

        let out = latest_per_location(&rows, &[], None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].levels.pm25, Some(31.0));
        assert_eq!(out[0].recorded_at.to_rfc3339(), "2024-03-01T11:00:00+00:00");
    }

    #[test]
    fn listed_locations_fill_names_and_coordinates() {
        let rows = raw(serde_json::json!({"results": [
            {"locationId": 42, "parameter": "pm10", "value": 60.0,
             "date": {"utc": "2024-03-01T10:00:00Z"}}
        ]}));
        let locations = [OpenAqLocation {
            id: "42".to_string(),
            name: "Industrial Area".to_string(),
            latitude: Some(-1.3067),
            longitude: Some(36.8509),
            parameters: vec!["pm10".to_string()],
            last_updated: None,
        }];

        assert!(latest_per_location(&rows, &[], None).is_empty());
        let out = latest_per_location(&rows, &locations, None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location_name.as_deref(), Some("Industrial Area"));
        assert!((out[0].longitude - 36.8509).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_results_key_is_empty() {
        let page: ResultsPage<RawMeasurement> =
            serde_json::from_value(serde_json::json!({"meta": {}})).unwrap();
        assert!(page.results.is_empty());
    }
}
