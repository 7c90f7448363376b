//! World Air Quality Index (WAQI) client.
//!
//! Searches stations by keyword and reads the feed of the first match.
//! Both endpoints answer HTTP 200 with `{"status": "error", ...}` on
//! failure, so the body status is checked as well as the HTTP status.

use std::collections::BTreeMap;

use air_map_pollution_models::{AqiCategory, Pollutant};
use air_map_source_models::{NormalizedMeasurement, PollutantLevels, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parsing::{parse_lat_lng_f64, parse_timestamp, round_to};
use crate::{SourceError, http};

/// Request configuration for a WAQI source.
#[derive(Debug, Clone, Deserialize)]
pub struct WaqiConfig {
    /// Search endpoint, e.g. `https://api.waqi.info/search/`.
    pub search_url: String,
    /// Feed endpoint root, e.g. `https://api.waqi.info/feed/`.
    pub feed_url: String,
    /// Keyword used for the station search.
    pub keyword: String,
    /// Environment variable holding the API token.
    pub token_env: String,
}

/// US EPA breakpoints as `(index_lo, index_hi, conc_lo, conc_hi)`.
type Breakpoints = [(f64, f64, f64, f64)];

/// PM2.5, 24 h, µg/m³.
const PM25_BREAKPOINTS: &Breakpoints = &[
    (0.0, 50.0, 0.0, 12.0),
    (51.0, 100.0, 12.1, 35.4),
    (101.0, 150.0, 35.5, 55.4),
    (151.0, 200.0, 55.5, 150.4),
    (201.0, 300.0, 150.5, 250.4),
    (301.0, 400.0, 250.5, 350.4),
    (401.0, 500.0, 350.5, 500.4),
];

/// PM10, 24 h, µg/m³.
const PM10_BREAKPOINTS: &Breakpoints = &[
    (0.0, 50.0, 0.0, 54.0),
    (51.0, 100.0, 55.0, 154.0),
    (101.0, 150.0, 155.0, 254.0),
    (151.0, 200.0, 255.0, 354.0),
    (201.0, 300.0, 355.0, 424.0),
    (301.0, 400.0, 425.0, 504.0),
    (401.0, 500.0, 505.0, 604.0),
];

/// NO2, 1 h, ppb.
const NO2_BREAKPOINTS: &Breakpoints = &[
    (0.0, 50.0, 0.0, 53.0),
    (51.0, 100.0, 54.0, 100.0),
    (101.0, 150.0, 101.0, 360.0),
    (151.0, 200.0, 361.0, 649.0),
    (201.0, 300.0, 650.0, 1249.0),
    (301.0, 400.0, 1250.0, 1649.0),
    (401.0, 500.0, 1650.0, 2049.0),
];

/// SO2, 1 h up to 200 then 24 h, ppb.
const SO2_BREAKPOINTS: &Breakpoints = &[
    (0.0, 50.0, 0.0, 35.0),
    (51.0, 100.0, 36.0, 75.0),
    (101.0, 150.0, 76.0, 185.0),
    (151.0, 200.0, 186.0, 304.0),
    (201.0, 300.0, 305.0, 604.0),
    (301.0, 400.0, 605.0, 804.0),
    (401.0, 500.0, 805.0, 1004.0),
];

/// O3, 8 h up to 300 then 1 h, ppm.
const O3_BREAKPOINTS: &Breakpoints = &[
    (0.0, 50.0, 0.0, 0.054),
    (51.0, 100.0, 0.055, 0.070),
    (101.0, 150.0, 0.071, 0.085),
    (151.0, 200.0, 0.086, 0.105),
    (201.0, 300.0, 0.106, 0.200),
    (301.0, 400.0, 0.405, 0.504),
    (401.0, 500.0, 0.505, 0.604),
];

/// ppb to µg/m³ at 25 °C and 1 atm (molar mass / 24.45).
const NO2_UGM3_PER_PPB: f64 = 1.88;
const SO2_UGM3_PER_PPB: f64 = 2.62;
const O3_UGM3_PER_PPB: f64 = 1.96;

fn invert(table: &Breakpoints, index: f64) -> Option<f64> {
    if !index.is_finite() || index < 0.0 {
        return None;
    }
    let &(i_lo, i_hi, c_lo, c_hi) = table
        .iter()
        .find(|(_, i_hi, _, _)| index <= *i_hi)
        .or_else(|| table.last())?;
    let fraction = ((index - i_lo) / (i_hi - i_lo)).max(0.0);
    Some(c_lo + fraction * (c_hi - c_lo))
}

/// Converts a WAQI per-pollutant sub-index (US EPA scale) back to a
/// concentration in µg/m³, rounded to one decimal. Indices above 500
/// extrapolate the top band; negative or non-finite indices give `None`.
#[must_use]
pub fn concentration_from_subindex(pollutant: Pollutant, index: f64) -> Option<f64> {
    let ugm3 = match pollutant {
        Pollutant::Pm25 => invert(PM25_BREAKPOINTS, index)?,
        Pollutant::Pm10 => invert(PM10_BREAKPOINTS, index)?,
        Pollutant::No2 => invert(NO2_BREAKPOINTS, index)? * NO2_UGM3_PER_PPB,
        Pollutant::So2 => invert(SO2_BREAKPOINTS, index)? * SO2_UGM3_PER_PPB,
        Pollutant::O3 => invert(O3_BREAKPOINTS, index)? * 1000.0 * O3_UGM3_PER_PPB,
    };
    Some(round_to(ugm3, 1))
}

/// Station snapshot returned by the feed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaqiStation {
    /// WAQI station uid.
    pub uid: i64,
    /// Station name from the search result.
    pub station_name: String,
    /// City name from the feed.
    pub city: String,
    /// Latitude, when published.
    pub latitude: Option<f64>,
    /// Longitude, when published.
    pub longitude: Option<f64>,
    /// Overall AQI, when numeric.
    pub aqi: Option<f64>,
    /// Individual AQI sub-indices keyed by pollutant code (`pm25`, `no2`, ...).
    pub iaqi: BTreeMap<String, f64>,
    /// Observation time.
    pub observed_at: Option<DateTime<Utc>>,
}

impl WaqiStation {
    /// Converts the snapshot into a measurement. Returns `None` when the
    /// station has no usable coordinates.
    ///
    /// WAQI publishes per-pollutant sub-indices; each is converted back
    /// to a concentration with [`concentration_from_subindex`].
    #[must_use]
    pub fn to_measurement(&self, fallback_time: DateTime<Utc>) -> Option<NormalizedMeasurement> {
        let (latitude, longitude) = parse_lat_lng_f64(self.latitude, self.longitude)?;
        let value = |p: Pollutant| {
            self.iaqi
                .get(p.as_ref())
                .and_then(|&index| concentration_from_subindex(p, index))
        };
        let levels = PollutantLevels {
            pm25: value(Pollutant::Pm25),
            pm10: value(Pollutant::Pm10),
            no2: value(Pollutant::No2),
            so2: value(Pollutant::So2),
            o3: value(Pollutant::O3),
        };

        Some(NormalizedMeasurement {
            location_id: Some(self.uid.to_string()),
            location_name: Some(self.station_name.clone()),
            longitude,
            latitude,
            aqi_category: AqiCategory::from_pm25(levels.pm25),
            levels,
            recorded_at: self.observed_at.unwrap_or(fallback_time),
            source_type: SourceType::Waqi,
        })
    }
}

fn check_status(body: &serde_json::Value, endpoint: &str) -> Result<(), SourceError> {
    if body.get("status").and_then(serde_json::Value::as_str) == Some("ok") {
        return Ok(());
    }
    let message = body
        .get("message")
        .or_else(|| body.get("data"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Unknown error");
    Err(SourceError::Normalization {
        message: format!("WAQI {endpoint} error: {message}"),
    })
}

fn as_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Parses a `/feed` body into a station snapshot.
///
/// # Errors
///
/// Returns [`SourceError::Normalization`] if the body status is not `ok`.
pub fn parse_feed(
    body: &serde_json::Value,
    uid: i64,
    station_name: &str,
) -> Result<WaqiStation, SourceError> {
    check_status(body, "feed")?;
    let data = &body["data"];
    let geo = data["city"]["geo"].as_array();
    let coordinate = |i: usize| geo.and_then(|g| g.get(i)).and_then(as_f64);

    let iaqi = data["iaqi"]
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| as_f64(&v["v"]).map(|value| (k.clone(), value)))
                .collect()
        })
        .unwrap_or_default();

    let observed_at = data["time"]["iso"]
        .as_str()
        .and_then(parse_timestamp)
        .or_else(|| data["time"]["s"].as_str().and_then(parse_timestamp));

    Ok(WaqiStation {
        uid,
        station_name: station_name.to_string(),
        city: data["city"]["name"]
            .as_str()
            .unwrap_or("Unknown")
            .to_string(),
        latitude: coordinate(0),
        longitude: coordinate(1),
        aqi: as_f64(&data["aqi"]),
        iaqi,
        observed_at,
    })
}

/// Searches for stations matching the configured keyword and returns the
/// feed of the first one. `Ok(None)` when the search finds nothing.
///
/// # Errors
///
/// Returns [`SourceError`] if either request fails or WAQI reports an
/// error status.
pub async fn fetch_station(
    client: &reqwest::Client,
    config: &WaqiConfig,
    token: &str,
) -> Result<Option<WaqiStation>, SourceError> {
    log::info!("Searching WAQI stations for {:?}", config.keyword);
    let search = http::send_json(
        client
            .get(&config.search_url)
            .query(&[("token", token), ("keyword", config.keyword.as_str())]),
    )
    .await?;
    check_status(&search, "search")?;

    let Some(first) = search["data"].as_array().and_then(|s| s.first()) else {
        log::warn!("No WAQI stations found for {:?}", config.keyword);
        return Ok(None);
    };
    let Some(uid) = first["uid"].as_i64() else {
        log::warn!("First WAQI station has no uid");
        return Ok(None);
    };
    let station_name = first["station"]["name"].as_str().unwrap_or("Unknown");

    let feed_url = format!("{}/@{uid}/", config.feed_url.trim_end_matches('/'));
    log::info!("Fetching WAQI feed for station {uid}");
    let feed = http::send_json(client.get(&feed_url).query(&[("token", token)])).await?;

    parse_feed(&feed, uid, station_name).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ok_feed() {
        let body = serde_json::json!({
            "status": "ok",
            "data": {
                "aqi": 87,
                "city": {"geo": [-1.2921, 36.8219], "name": "Nairobi US Embassy"},
                "iaqi": {"pm25": {"v": 87}, "pm10": {"v": 40}, "t": {"v": 22.5}},
                "time": {"s": "2024-03-01 12:00:00", "iso": "2024-03-01T12:00:00+03:00"}
            }
        });

        let station = parse_feed(&body, 8675, "US Embassy").unwrap();
        assert_eq!(station.city, "Nairobi US Embassy");
        assert_eq!(station.aqi, Some(87.0));
        assert_eq!(station.iaqi.get("pm25"), Some(&87.0));
        assert_eq!(
            station.observed_at.unwrap().to_rfc3339(),
            "2024-03-01T09:00:00+00:00"
        );

        let m = station.to_measurement(Utc::now()).unwrap();
        assert_eq!(m.source_type, SourceType::Waqi);
        assert_eq!(m.levels.pm25, Some(29.2));
        assert_eq!(m.levels.pm10, Some(43.2));
        assert_eq!(m.levels.no2, None);
        assert!((m.latitude - -1.2921).abs() < f64::EPSILON);
    }

    #[test]
    fn subindex_is_stored_as_concentration() {
        let station = WaqiStation {
            uid: 1,
            station_name: "US Embassy".to_string(),
            city: "Nairobi".to_string(),
            latitude: Some(-1.2921),
            longitude: Some(36.8219),
            aqi: Some(87.0),
            iaqi: BTreeMap::from([("pm25".to_string(), 87.0)]),
            observed_at: None,
        };

        let m = station.to_measurement(Utc::now()).unwrap();
        assert_ne!(m.levels.pm25, Some(87.0));
        assert_eq!(m.levels.pm25, Some(29.2));
        assert_eq!(m.aqi_category, AqiCategory::UnhealthySensitive);
        assert!(air_map_source_models::AlertDraft::pollution_spike("X", 0.0, 0.0, 29.2).is_none());
    }

    #[test]
    fn breakpoint_edges_invert_exactly() {
        assert_eq!(concentration_from_subindex(Pollutant::Pm25, 0.0), Some(0.0));
        assert_eq!(concentration_from_subindex(Pollutant::Pm25, 50.0), Some(12.0));
        assert_eq!(concentration_from_subindex(Pollutant::Pm25, 151.0), Some(55.5));
        assert_eq!(concentration_from_subindex(Pollutant::Pm10, 100.0), Some(154.0));
        // 53 ppb NO2
        assert_eq!(concentration_from_subindex(Pollutant::No2, 50.0), Some(99.6));
        // 0.054 ppm O3
        assert_eq!(concentration_from_subindex(Pollutant::O3, 50.0), Some(105.8));
        assert_eq!(concentration_from_subindex(Pollutant::So2, -1.0), None);
        assert_eq!(concentration_from_subindex(Pollutant::Pm25, f64::NAN), None);
    }

    #[test]
    fn non_numeric_aqi_is_none() {
        let body = serde_json::json!({
            "status": "ok",
            "data": {"aqi": "-", "city": {"geo": [], "name": "X"}, "iaqi": {}, "time": {}}
        });
        let station = parse_feed(&body, 1, "X").unwrap();
        assert_eq!(station.aqi, None);
        assert!(station.to_measurement(Utc::now()).is_none());
    }

    #[test]
    fn error_status_is_reported() {
        let body = serde_json::json!({"status": "error", "data": "Invalid key"});
        let err = parse_feed(&body, 1, "X").unwrap_err();
        assert!(err.to_string().contains("Invalid key"));
    }
}
