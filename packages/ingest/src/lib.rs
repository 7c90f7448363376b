#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for loading air-quality data into the `PostGIS` database.
//!
//! Pulls readings from the configured providers, imports monitoring and
//! intervention spreadsheets, raises alerts from fresh readings, seeds
//! demonstration data, and exports the latest readings.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use air_map_database::{DbError, queries};
use air_map_source::copernicus::{self, CopernicusProduct};
use air_map_source::progress::ProgressCallback;
use air_map_source::source_def::{FetcherConfig, SourceDefinition};
use air_map_source::{FetchOptions, SourceError, credential_from_env, csv_import, export, http};
use air_map_source::{mock, openaq, waqi};
use air_map_database_models::{MeasurementRow, NewZone};
use air_map_source_models::{AlertDraft, InterventionZone, NormalizedMeasurement, SourceType};
use chrono::{DateTime, Duration, Utc};
use switchy_database::Database;
use thiserror::Error;

/// Rows inserted per progress update.
pub const INSERT_CHUNK_SIZE: usize = 500;

/// Longest look-back window, in hours, accepted by the window-based
/// commands.
pub const MAX_WINDOW_HOURS: i64 = 24 * 30;

/// Longest Copernicus catalogue search, in days.
pub const MAX_SEARCH_DAYS: i64 = 30;

/// Stages reported by [`seed_mock_data`]: measurements, zones,
/// recommendations, alerts.
pub const MOCK_STAGES: u64 = 4;

/// Start of a look-back window of `hours`, bounded to
/// `1..=MAX_WINDOW_HOURS`.
#[must_use]
pub fn window_start(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - Duration::hours(hours.clamp(1, MAX_WINDOW_HOURS))
}

/// Errors that can occur while ingesting data.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetching or parsing source data failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Database operation failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No source has this id.
    #[error("Unknown source: {id}")]
    UnknownSource {
        /// Requested id.
        id: String,
    },

    /// The source exists but uses a different provider.
    #[error("Source {id} is not a {expected} source")]
    WrongSourceType {
        /// Requested id.
        id: String,
        /// Provider the command needs.
        expected: SourceType,
    },
}

/// Counts from one import or sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records parsed or fetched.
    pub parsed: u64,
    /// Rows rejected during parsing.
    pub skipped: u64,
    /// Rows actually inserted (duplicates excluded).
    pub inserted: u64,
}

/// Counts from seeding demonstration data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockSummary {
    /// Measurements inserted.
    pub measurements: u64,
    /// Zones inserted.
    pub zones: u64,
    /// Recommendations inserted.
    pub recommendations: u64,
    /// Alerts inserted.
    pub alerts: u64,
}

/// Returns all configured data sources from the TOML registry.
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    air_map_source::registry::all_sources()
}

/// Looks up a source and checks it uses the expected provider.
///
/// # Errors
///
/// Returns [`IngestError::UnknownSource`] or
/// [`IngestError::WrongSourceType`].
pub fn resolve_source(id: &str, expected: SourceType) -> Result<SourceDefinition, IngestError> {
    let source = air_map_source::registry::find_source(id).ok_or_else(|| {
        IngestError::UnknownSource { id: id.to_string() }
    })?;
    if source.source_type != expected {
        return Err(IngestError::WrongSourceType {
            id: id.to_string(),
            expected,
        });
    }
    Ok(source)
}

/// Inserts measurements in chunks, reporting progress per chunk.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if an insert fails.
pub async fn insert_measurements(
    db: &dyn Database,
    measurements: &[NormalizedMeasurement],
    progress: &Arc<dyn ProgressCallback>,
) -> Result<u64, IngestError> {
    progress.set_total(measurements.len() as u64);
    let mut inserted = 0u64;
    for chunk in measurements.chunks(INSERT_CHUNK_SIZE) {
        inserted += queries::insert_measurements(db, chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    Ok(inserted)
}

/// Fetches the latest readings per OpenAQ location and stores them. When
/// the city has no monitoring locations and `mock_fallback` is set, the
/// demonstration measurements are stored instead.
///
/// # Errors
///
/// Returns [`IngestError`] if the source is not an OpenAQ source, the
/// request fails, or an insert fails.
pub async fn sync_openaq(
    db: &dyn Database,
    source: &SourceDefinition,
    options: &FetchOptions,
    mock_fallback: bool,
    now: DateTime<Utc>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, IngestError> {
    let FetcherConfig::Openaq(config) = &source.fetcher else {
        return Err(IngestError::WrongSourceType {
            id: source.id.clone(),
            expected: SourceType::Openaq,
        });
    };

    let api_key = config
        .api_key_env
        .as_deref()
        .and_then(|var| credential_from_env(var).ok());
    if api_key.is_none() {
        log::warn!("[{}] No OpenAQ API key configured, requesting anonymously", source.id);
    }

    let start = Instant::now();
    let client = http::build_client(source.timeout())?;
    progress.set_message("fetching".to_string());
    let mut measurements =
        openaq::fetch_measurements(&client, config, api_key.as_deref(), options).await?;
    if measurements.is_empty() && mock_fallback {
        log::warn!("[{}] No readings available, storing demonstration data", source.id);
        measurements = mock::mock_measurements(now);
    }

    progress.set_message("storing".to_string());
    let inserted = insert_measurements(db, &measurements, progress).await?;

    log::info!(
        "[{}] {} locations fetched, {inserted} new readings in {:.1}s",
        source.id,
        measurements.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(ImportSummary {
        parsed: measurements.len() as u64,
        skipped: 0,
        inserted,
    })
}

/// Fetches the first WAQI station matching the configured keyword and
/// stores its current reading.
///
/// # Errors
///
/// Returns [`IngestError`] if the token is missing, the request fails, or
/// the insert fails.
pub async fn sync_waqi(
    db: &dyn Database,
    source: &SourceDefinition,
    now: DateTime<Utc>,
) -> Result<ImportSummary, IngestError> {
    let FetcherConfig::Waqi(config) = &source.fetcher else {
        return Err(IngestError::WrongSourceType {
            id: source.id.clone(),
            expected: SourceType::Waqi,
        });
    };

    let token = credential_from_env(&config.token_env)?;
    let client = http::build_client(source.timeout())?;

    let Some(station) = waqi::fetch_station(&client, config, &token).await? else {
        log::warn!("[{}] No station matched '{}'", source.id, config.keyword);
        return Ok(ImportSummary::default());
    };

    let Some(measurement) = station.to_measurement(now) else {
        log::warn!(
            "[{}] Station {} has no usable coordinates",
            source.id,
            station.station_name
        );
        return Ok(ImportSummary {
            parsed: 1,
            skipped: 1,
            inserted: 0,
        });
    };

    log::info!(
        "[{}] {} AQI {:?}, PM2.5 {:?}",
        source.id,
        station.station_name,
        station.aqi,
        measurement.levels.pm25
    );

    let inserted = queries::insert_measurements(db, std::slice::from_ref(&measurement)).await?;

    Ok(ImportSummary {
        parsed: 1,
        skipped: 0,
        inserted,
    })
}

/// Lists Sentinel-5P products for the configured area over the last
/// `days` (bounded to `1..=MAX_SEARCH_DAYS`), optionally downloading a capped sample of the first product
/// into `download_dir`.
///
/// # Errors
///
/// Returns [`IngestError`] if credentials are missing or a request or
/// write fails.
pub async fn search_copernicus(
    source: &SourceDefinition,
    days: i64,
    download_dir: Option<&Path>,
    now: DateTime<Utc>,
) -> Result<(Vec<CopernicusProduct>, Option<PathBuf>), IngestError> {
    let FetcherConfig::Copernicus(config) = &source.fetcher else {
        return Err(IngestError::WrongSourceType {
            id: source.id.clone(),
            expected: SourceType::Copernicus,
        });
    };

    let client_id = credential_from_env(&config.client_id_env)?;
    let client_secret = credential_from_env(&config.client_secret_env)?;
    let client = http::build_client(source.timeout())?;

    let token = copernicus::fetch_token(&client, config, &client_id, &client_secret).await?;
    let since = now - Duration::days(days.clamp(1, MAX_SEARCH_DAYS));
    let products = copernicus::search_products(&client, config, &token, since, now).await?;
    log::info!("[{}] {} products found", source.id, products.len());

    let mut sample = None;
    if let (Some(dir), Some(first)) = (download_dir, products.first()) {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.sample", first.id));
        let bytes = copernicus::download_sample(&client, config, &token, &first.id, &path).await?;
        log::info!("[{}] Saved {bytes} bytes of {} to {}", source.id, first.name, path.display());
        sample = Some(path);
    }

    Ok((products, sample))
}

/// Imports a monitoring-station CSV.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or an insert fails.
/// Malformed rows are skipped, not fatal.
pub async fn import_monitoring_csv(
    db: &dyn Database,
    path: &Path,
    now: DateTime<Utc>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, IngestError> {
    let file = File::open(path)?;
    let parsed = csv_import::parse_monitoring_csv(BufReader::new(file), now)?;
    if parsed.skipped > 0 {
        log::warn!(
            "{}: skipped {} rows without valid coordinates",
            path.display(),
            parsed.skipped
        );
    }

    let inserted = insert_measurements(db, &parsed.rows, progress).await?;
    progress.finish(format!("{inserted} readings stored"));

    Ok(ImportSummary {
        parsed: parsed.rows.len() as u64,
        skipped: parsed.skipped,
        inserted,
    })
}

fn new_zone(zone: &InterventionZone) -> NewZone {
    NewZone {
        zone_name: zone.zone_name.clone(),
        longitude: zone.longitude,
        latitude: zone.latitude,
        priority_score: zone.priority_score,
        dominant_source: zone.dominant_source.clone(),
    }
}

/// Imports a policy-intervention CSV: each row becomes a grid zone and a
/// recommendation attached to it.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read. A row whose zone or
/// recommendation fails to insert leaves neither behind and is logged and
/// counted as skipped.
pub async fn import_interventions_csv(
    db: &dyn Database,
    path: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, IngestError> {
    let file = File::open(path)?;
    let parsed = csv_import::parse_interventions_csv(BufReader::new(file))?;
    progress.set_total(parsed.rows.len() as u64);

    let mut summary = ImportSummary {
        parsed: parsed.rows.len() as u64,
        skipped: parsed.skipped,
        inserted: 0,
    };

    for zone in &parsed.rows {
        let result = queries::insert_zone_with_recommendation(db, &new_zone(zone), |grid_id| {
            zone.recommendation(grid_id)
        })
        .await;

        match result {
            Ok((grid_id, _)) => {
                log::debug!("Imported {}", zone.display_name(grid_id));
                summary.inserted += 1;
            }
            Err(e) => {
                log::error!("Failed to import intervention zone {:?}: {e}", zone.zone_name);
                summary.skipped += 1;
            }
        }
        progress.inc(1);
    }

    progress.finish(format!("{} zones imported", summary.inserted));
    Ok(summary)
}

/// Raises a `pollution_spike` alert for every location whose latest
/// reading within the last `window_hours` exceeds the action threshold.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if a query fails.
pub async fn raise_measurement_alerts(
    db: &dyn Database,
    window_hours: i64,
    now: DateTime<Utc>,
) -> Result<u64, IngestError> {
    let since = window_start(now, window_hours);
    let latest = queries::latest_measurements(db).await?;
    let mut raised = 0u64;

    for row in latest.iter().filter(|r| r.recorded_at >= since) {
        let Some(pm25) = row.levels.pm25 else {
            continue;
        };
        let zone = row
            .location_name
            .as_deref()
            .or(row.location_id.as_deref())
            .unwrap_or("unnamed location");
        if let Some(alert) = AlertDraft::pollution_spike(
            zone,
            row.longitude,
            row.latitude,
            pm25,
        ) {
            queries::insert_alert(db, &alert).await?;
            raised += 1;
        }
    }

    log::info!("{raised} alerts raised from {} locations", latest.len());
    Ok(raised)
}

/// Seeds the fixed Nairobi demonstration data.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if an insert fails.
pub async fn seed_mock_data(
    db: &dyn Database,
    now: DateTime<Utc>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<MockSummary, IngestError> {
    let mut summary = MockSummary::default();

    progress.set_message("measurements".to_string());
    summary.measurements = queries::insert_measurements(db, &mock::mock_measurements(now)).await?;
    progress.inc(1);

    progress.set_message("zones".to_string());
    for zone in mock::mock_grid_zones() {
        queries::insert_zone(db, &new_zone(&zone)).await?;
        summary.zones += 1;
    }
    progress.inc(1);

    progress.set_message("recommendations".to_string());
    for draft in mock::mock_recommendations() {
        queries::insert_recommendation(db, &draft).await?;
        summary.recommendations += 1;
    }
    progress.inc(1);

    progress.set_message("alerts".to_string());
    for alert in mock::mock_alerts() {
        queries::insert_alert(db, &alert).await?;
        summary.alerts += 1;
    }
    progress.inc(1);

    progress.finish("mock data seeded".to_string());
    Ok(summary)
}

/// Writes the latest reading of every location as CSV and `GeoJSON`.
/// Returns the number of readings exported.
///
/// # Errors
///
/// Returns [`IngestError`] if a query or file write fails.
pub async fn export_latest(
    db: &dyn Database,
    csv_path: &Path,
    geojson_path: &Path,
) -> Result<usize, IngestError> {
    let latest: Vec<NormalizedMeasurement> = queries::latest_measurements(db)
        .await?
        .iter()
        .map(MeasurementRow::to_normalized)
        .collect();

    let written = export::write_csv(File::create(csv_path)?, &latest)?;
    std::fs::write(geojson_path, export::to_geojson_string(&latest)?)?;

    log::info!(
        "Exported {written} readings to {} and {}",
        csv_path.display(),
        geojson_path.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_sources_by_type() {
        assert!(resolve_source("openaq_nairobi", SourceType::Openaq).is_ok());
        assert!(matches!(
            resolve_source("openaq_nairobi", SourceType::Waqi),
            Err(IngestError::WrongSourceType { .. })
        ));
        assert!(matches!(
            resolve_source("nowhere", SourceType::Waqi),
            Err(IngestError::UnknownSource { .. })
        ));
    }

    #[test]
    fn windows_are_bounded() {
        let now = Utc::now();
        assert_eq!(window_start(now, 24), now - Duration::hours(24));
        assert_eq!(window_start(now, 0), now - Duration::hours(1));
        assert_eq!(
            window_start(now, 9_000_000_000_000),
            now - Duration::hours(MAX_WINDOW_HOURS)
        );
        assert_eq!(window_start(now, i64::MIN), now - Duration::hours(1));
    }

    #[test]
    fn registry_exposes_every_provider() {
        let types: Vec<SourceType> = all_sources().iter().map(|s| s.source_type).collect();
        assert!(types.contains(&SourceType::Openaq));
        assert!(types.contains(&SourceType::Waqi));
        assert!(types.contains(&SourceType::Copernicus));
    }
}
