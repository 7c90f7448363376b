//! Database query functions for air-quality data.
//!
//! Every query is parameterized raw SQL through `query_raw_params()` /
//! `exec_raw_params()`, using `PostGIS` functions for the spatial parts.
//! Timestamps are stored as UTC in `TIMESTAMP` columns.

use std::fmt::Write as _;

use air_map_database_models::{
    AirQualitySummaryRow, AlertQuery, AlertRow, BoundingBox, MeasurementQuery, MeasurementRow,
    NewZone, Pm25ReadingRow, RecommendationQuery, RecommendationRow, SeverityCountRow,
    SourceBreakdownRow, StatusCountRow, ZoneRow,
};
use air_map_pollution_models::{
    AlertSeverity, AlertStatus, AlertType, PM25_ACTION_THRESHOLD, PolicyStatus, Priority,
};
use air_map_source_models::{
    AlertDraft, NormalizedMeasurement, PollutantLevels, RecommendationDraft, SourceType,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// Radius, in degrees, of the polygon created around a zone centre.
pub const ZONE_BUFFER_DEGREES: f64 = 0.01;

const MEASUREMENT_COLUMNS: &str = "m.id, m.location_id, m.location_name,
    m.pm25, m.pm10, m.no2, m.so2, m.o3, m.source_type, m.recorded_at, m.quality_flag,
    ST_X(m.location) AS longitude, ST_Y(m.location) AS latitude";

const ZONE_COLUMNS: &str = "g.grid_id, g.zone_name, g.priority_score, g.dominant_source,
    g.population_density, g.last_updated,
    ST_X(ST_Centroid(g.geom)) AS longitude, ST_Y(ST_Centroid(g.geom)) AS latitude,
    ST_AsGeoJSON(g.geom) AS geometry_json";

const RECOMMENDATION_COLUMNS: &str = "r.id, r.grid_id, g.zone_name, r.policy_type, r.title,
    r.description, r.priority, r.expected_impact_percent, r.cost_estimate,
    r.implementation_time_days, r.status, r.notes, r.created_at, r.updated_at";

const ALERT_COLUMNS: &str = "a.id, a.alert_type, a.severity, a.message, a.pm25_level,
    a.zone_name, a.triggered_at, a.status,
    ST_X(a.location) AS longitude, ST_Y(a.location) AS latitude";

fn utc(naive: NaiveDateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

fn opt_string(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.to_string()))
}

fn opt_real(value: Option<f64>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Real64)
}

fn measurement_from_row(row: &switchy_database::Row) -> Option<MeasurementRow> {
    let id: i64 = row.to_value("id").unwrap_or(0);
    let source_type: String = row.to_value("source_type").unwrap_or_default();
    let Ok(source_type) = source_type.parse::<SourceType>() else {
        log::warn!("Measurement {id} has unknown source type {source_type:?}, skipping");
        return None;
    };
    let recorded_at: NaiveDateTime = row.to_value("recorded_at").unwrap_or_default();

    Some(MeasurementRow {
        id,
        longitude: row.to_value("longitude").unwrap_or(0.0),
        latitude: row.to_value("latitude").unwrap_or(0.0),
        location_id: row.to_value("location_id").unwrap_or(None),
        location_name: row.to_value("location_name").unwrap_or(None),
        levels: PollutantLevels {
            pm25: row.to_value("pm25").unwrap_or(None),
            pm10: row.to_value("pm10").unwrap_or(None),
            no2: row.to_value("no2").unwrap_or(None),
            so2: row.to_value("so2").unwrap_or(None),
            o3: row.to_value("o3").unwrap_or(None),
        },
        source_type,
        recorded_at: utc(recorded_at),
        quality_flag: row.to_value("quality_flag").unwrap_or(2),
    })
}

fn zone_from_row(row: &switchy_database::Row) -> ZoneRow {
    let last_updated: NaiveDateTime = row.to_value("last_updated").unwrap_or_default();
    ZoneRow {
        grid_id: row.to_value("grid_id").unwrap_or(0),
        zone_name: row.to_value("zone_name").unwrap_or(None),
        longitude: row.to_value("longitude").unwrap_or(0.0),
        latitude: row.to_value("latitude").unwrap_or(0.0),
        geometry_json: row.to_value("geometry_json").unwrap_or(None),
        priority_score: row.to_value("priority_score").unwrap_or(0.0),
        dominant_source: row
            .to_value("dominant_source")
            .unwrap_or_else(|_| "unknown".to_string()),
        population_density: row.to_value("population_density").unwrap_or(None),
        last_updated: utc(last_updated),
    }
}

fn recommendation_from_row(row: &switchy_database::Row) -> RecommendationRow {
    let priority: String = row.to_value("priority").unwrap_or_default();
    let status: String = row.to_value("status").unwrap_or_default();
    let created_at: NaiveDateTime = row.to_value("created_at").unwrap_or_default();
    let updated_at: NaiveDateTime = row.to_value("updated_at").unwrap_or_default();

    RecommendationRow {
        id: row.to_value("id").unwrap_or(0),
        grid_id: row.to_value("grid_id").unwrap_or(None),
        zone_name: row.to_value("zone_name").unwrap_or(None),
        policy_type: row.to_value("policy_type").unwrap_or_default(),
        title: row.to_value("title").unwrap_or_default(),
        description: row.to_value("description").unwrap_or_default(),
        priority: priority.parse().unwrap_or(Priority::Medium),
        expected_impact: row.to_value("expected_impact_percent").unwrap_or(0.0),
        cost_estimate: row.to_value("cost_estimate").unwrap_or(None),
        implementation_days: row.to_value("implementation_time_days").unwrap_or(None),
        status: status.parse().unwrap_or(PolicyStatus::Pending),
        notes: row.to_value("notes").unwrap_or(None),
        created_at: utc(created_at),
        updated_at: utc(updated_at),
    }
}

fn alert_from_row(row: &switchy_database::Row) -> AlertRow {
    let alert_type: String = row.to_value("alert_type").unwrap_or_default();
    let severity: String = row.to_value("severity").unwrap_or_default();
    let status: String = row.to_value("status").unwrap_or_default();
    let triggered_at: NaiveDateTime = row.to_value("triggered_at").unwrap_or_default();

    AlertRow {
        id: row.to_value("id").unwrap_or(0),
        alert_type: alert_type.parse().unwrap_or(AlertType::PollutionSpike),
        longitude: row.to_value("longitude").unwrap_or(None),
        latitude: row.to_value("latitude").unwrap_or(None),
        severity: severity.parse().unwrap_or(AlertSeverity::Medium),
        message: row.to_value("message").unwrap_or_default(),
        pm25_level: row.to_value("pm25_level").unwrap_or(None),
        zone_name: row.to_value("zone_name").unwrap_or(None),
        triggered_at: utc(triggered_at),
        status: status.parse().unwrap_or(AlertStatus::Active),
    }
}

// ── Measurements ─────────────────────────────────────────────────────────

/// Inserts a batch of measurements, skipping duplicates on
/// `(source_type, location_id, recorded_at)`. Returns the number of rows
/// actually inserted.
///
/// # Errors
///
/// Returns [`DbError`] if any insert fails.
pub async fn insert_measurements(
    db: &dyn Database,
    measurements: &[NormalizedMeasurement],
) -> Result<u64, DbError> {
    let mut inserted = 0u64;

    for m in measurements {
        inserted += db
            .exec_raw_params(
                "INSERT INTO air_measurements (
                    location, location_id, location_name,
                    pm25, pm10, no2, so2, o3,
                    source_type, recorded_at, quality_flag
                ) VALUES (
                    ST_SetSRID(ST_MakePoint($1, $2), 4326), $3, $4,
                    $5, $6, $7, $8, $9,
                    $10, $11, $12
                )
                ON CONFLICT (source_type, location_id, recorded_at) DO NOTHING",
                &[
                    DatabaseValue::Real64(m.longitude),
                    DatabaseValue::Real64(m.latitude),
                    opt_string(m.location_id.as_deref()),
                    opt_string(m.location_name.as_deref()),
                    opt_real(m.levels.pm25),
                    opt_real(m.levels.pm10),
                    opt_real(m.levels.no2),
                    opt_real(m.levels.so2),
                    opt_real(m.levels.o3),
                    DatabaseValue::String(m.source_type.as_ref().to_string()),
                    DatabaseValue::DateTime(m.recorded_at.naive_utc()),
                    DatabaseValue::Int32(i32::from(m.quality_flag())),
                ],
            )
            .await?;
    }

    Ok(inserted)
}

/// Queries measurements with optional bbox/time/source filters, newest
/// first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_measurements(
    db: &dyn Database,
    query: &MeasurementQuery,
) -> Result<Vec<MeasurementRow>, DbError> {
    let mut sql = format!("SELECT {MEASUREMENT_COLUMNS} FROM air_measurements m WHERE 1=1");
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut param_idx = 1u32;

    if let Some(bbox) = &query.bbox {
        write!(
            sql,
            " AND m.location && ST_MakeEnvelope(${}, ${}, ${}, ${}, 4326)",
            param_idx,
            param_idx + 1,
            param_idx + 2,
            param_idx + 3,
        )
        .unwrap();
        params.push(DatabaseValue::Real64(bbox.west));
        params.push(DatabaseValue::Real64(bbox.south));
        params.push(DatabaseValue::Real64(bbox.east));
        params.push(DatabaseValue::Real64(bbox.north));
        param_idx += 4;
    }

    if let Some(from) = &query.from {
        write!(sql, " AND m.recorded_at >= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(from.naive_utc()));
        param_idx += 1;
    }

    if let Some(to) = &query.to {
        write!(sql, " AND m.recorded_at <= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(to.naive_utc()));
        param_idx += 1;
    }

    if let Some(source_type) = query.source_type {
        write!(sql, " AND m.source_type = ${param_idx}").unwrap();
        params.push(DatabaseValue::String(source_type.as_ref().to_string()));
        param_idx += 1;
    }

    sql.push_str(" ORDER BY m.recorded_at DESC, m.id DESC");

    write!(sql, " LIMIT ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.limit)));
    param_idx += 1;

    write!(sql, " OFFSET ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.offset)));

    let rows = db.query_raw_params(&sql, &params).await?;
    Ok(rows.iter().filter_map(measurement_from_row).collect())
}

/// Returns the most recent reading of every location.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn latest_measurements(db: &dyn Database) -> Result<Vec<MeasurementRow>, DbError> {
    let sql = format!(
        "SELECT DISTINCT ON (m.source_type, COALESCE(m.location_id, m.id::text))
                {MEASUREMENT_COLUMNS}
         FROM air_measurements m
         ORDER BY m.source_type, COALESCE(m.location_id, m.id::text), m.recorded_at DESC"
    );
    let rows = db.query_raw_params(&sql, &[]).await?;
    Ok(rows.iter().filter_map(measurement_from_row).collect())
}

/// PM2.5 readings recorded at or after `since`, optionally inside `bbox`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn recent_pm25_readings(
    db: &dyn Database,
    since: DateTime<Utc>,
    bbox: Option<&BoundingBox>,
) -> Result<Vec<Pm25ReadingRow>, DbError> {
    let mut frags = vec![
        "m.pm25 IS NOT NULL".to_string(),
        "m.recorded_at >= $1".to_string(),
    ];
    let mut params = vec![DatabaseValue::DateTime(since.naive_utc())];

    if let Some(bbox) = bbox {
        frags.push("m.location && ST_MakeEnvelope($2, $3, $4, $5, 4326)".to_string());
        params.push(DatabaseValue::Real64(bbox.west));
        params.push(DatabaseValue::Real64(bbox.south));
        params.push(DatabaseValue::Real64(bbox.east));
        params.push(DatabaseValue::Real64(bbox.north));
    }

    let sql = format!(
        "SELECT m.id, m.pm25, m.location_name, m.recorded_at,
                ST_X(m.location) AS longitude, ST_Y(m.location) AS latitude
         FROM air_measurements m
         WHERE {}
         ORDER BY m.recorded_at DESC",
        frags.join(" AND ")
    );

    let rows = db.query_raw_params(&sql, &params).await?;

    Ok(rows
        .iter()
        .map(|row| {
            let recorded_at: NaiveDateTime = row.to_value("recorded_at").unwrap_or_default();
            Pm25ReadingRow {
                id: row.to_value("id").unwrap_or(0),
                longitude: row.to_value("longitude").unwrap_or(0.0),
                latitude: row.to_value("latitude").unwrap_or(0.0),
                pm25: row.to_value("pm25").unwrap_or(0.0),
                location_name: row.to_value("location_name").unwrap_or(None),
                recorded_at: utc(recorded_at),
            }
        })
        .collect())
}

/// Measurements recorded inside a grid cell at or after `since`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn zone_measurements(
    db: &dyn Database,
    grid_id: i32,
    since: DateTime<Utc>,
) -> Result<Vec<MeasurementRow>, DbError> {
    let sql = format!(
        "SELECT {MEASUREMENT_COLUMNS}
         FROM air_measurements m
         JOIN policy_grid g ON ST_Contains(g.geom, m.location)
         WHERE g.grid_id = $1 AND m.recorded_at >= $2
         ORDER BY m.recorded_at"
    );
    let rows = db
        .query_raw_params(
            &sql,
            &[
                DatabaseValue::Int32(grid_id),
                DatabaseValue::DateTime(since.naive_utc()),
            ],
        )
        .await?;
    Ok(rows.iter().filter_map(measurement_from_row).collect())
}

/// Mean PM2.5 of readings inside a grid cell at or after `since`, or
/// `None` when there are none.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn zone_average_pm25(
    db: &dyn Database,
    grid_id: i32,
    since: DateTime<Utc>,
) -> Result<Option<f64>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT AVG(m.pm25) AS avg_pm25
             FROM air_measurements m
             JOIN policy_grid g ON ST_Contains(g.geom, m.location)
             WHERE g.grid_id = $1 AND m.recorded_at >= $2 AND m.pm25 IS NOT NULL",
            &[
                DatabaseValue::Int32(grid_id),
                DatabaseValue::DateTime(since.naive_utc()),
            ],
        )
        .await?;

    Ok(rows
        .first()
        .and_then(|row| row.to_value::<Option<f64>>("avg_pm25").unwrap_or(None)))
}

// ── Zones ────────────────────────────────────────────────────────────────

/// Inserts a grid cell and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn insert_zone(db: &dyn Database, zone: &NewZone) -> Result<i32, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO policy_grid (geom, zone_name, priority_score, dominant_source)
             VALUES (
                 ST_SetSRID(ST_Buffer(ST_SetSRID(ST_MakePoint($1, $2), 4326), $3), 4326),
                 $4, $5, $6
             )
             RETURNING grid_id",
            &[
                DatabaseValue::Real64(zone.longitude),
                DatabaseValue::Real64(zone.latitude),
                DatabaseValue::Real64(ZONE_BUFFER_DEGREES),
                opt_string(zone.zone_name.as_deref()),
                DatabaseValue::Real64(zone.priority_score.clamp(0.0, 100.0)),
                DatabaseValue::String(zone.dominant_source.clone()),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "Failed to get grid id from insert".to_string(),
    })?;

    row.to_value("grid_id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse grid id: {e}"),
    })
}

/// Lists all grid cells, highest priority first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_zones(db: &dyn Database) -> Result<Vec<ZoneRow>, DbError> {
    let sql = format!(
        "SELECT {ZONE_COLUMNS} FROM policy_grid g ORDER BY g.priority_score DESC, g.grid_id"
    );
    let rows = db.query_raw_params(&sql, &[]).await?;
    Ok(rows.iter().map(zone_from_row).collect())
}

/// Fetches one grid cell.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_zone(db: &dyn Database, grid_id: i32) -> Result<Option<ZoneRow>, DbError> {
    let sql = format!("SELECT {ZONE_COLUMNS} FROM policy_grid g WHERE g.grid_id = $1");
    let rows = db
        .query_raw_params(&sql, &[DatabaseValue::Int32(grid_id)])
        .await?;
    Ok(rows.first().map(zone_from_row))
}

/// Records the dominant source inferred for a grid cell.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub async fn update_dominant_source(
    db: &dyn Database,
    grid_id: i32,
    dominant_source: &str,
) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "UPDATE policy_grid
             SET dominant_source = $2, last_updated = NOW() AT TIME ZONE 'UTC'
             WHERE grid_id = $1",
            &[
                DatabaseValue::Int32(grid_id),
                DatabaseValue::String(dominant_source.to_string()),
            ],
        )
        .await?)
}

/// Runs the `update_grid_priorities()` database function and returns the
/// number of cells rescored.
///
/// # Errors
///
/// Returns [`DbError`] if the function call fails.
pub async fn update_grid_priorities(db: &dyn Database) -> Result<i32, DbError> {
    let rows = db
        .query_raw_params("SELECT update_grid_priorities() AS updated", &[])
        .await?;
    Ok(rows
        .first()
        .and_then(|row| row.to_value::<i32>("updated").ok())
        .unwrap_or(0))
}

/// Inserts a zone and the recommendation built for its new grid id in one
/// transaction. Returns `(grid_id, recommendation_id)`; on failure neither
/// row is kept.
///
/// # Errors
///
/// Returns [`DbError`] if either insert or the commit fails.
pub async fn insert_zone_with_recommendation(
    db: &dyn Database,
    zone: &NewZone,
    recommendation: impl FnOnce(i32) -> RecommendationDraft,
) -> Result<(i32, i32), DbError> {
    let txn = db.begin_transaction().await?;

    let grid_id = match insert_zone(txn.as_ref(), zone).await {
        Ok(grid_id) => grid_id,
        Err(e) => return crate::finish_transaction(txn, Err(e)).await,
    };
    let result = insert_recommendation(txn.as_ref(), &recommendation(grid_id))
        .await
        .map(|recommendation_id| (grid_id, recommendation_id));

    crate::finish_transaction(txn, result).await
}

// ── Recommendations ──────────────────────────────────────────────────────

/// Inserts a recommendation and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn insert_recommendation(
    db: &dyn Database,
    draft: &RecommendationDraft,
) -> Result<i32, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO policy_recommendations (
                grid_id, policy_type, title, description, priority,
                expected_impact_percent, cost_estimate, implementation_time_days, status
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id",
            &[
                draft.grid_id.map_or(DatabaseValue::Null, DatabaseValue::Int32),
                DatabaseValue::String(draft.policy_type.clone()),
                DatabaseValue::String(draft.title.clone()),
                DatabaseValue::String(draft.description.clone()),
                DatabaseValue::String(draft.priority.as_ref().to_string()),
                DatabaseValue::Real64(draft.expected_impact),
                opt_real(draft.cost_estimate),
                draft
                    .implementation_days
                    .map_or(DatabaseValue::Null, DatabaseValue::Int32),
                DatabaseValue::String(draft.status.as_ref().to_string()),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "Failed to get recommendation id from insert".to_string(),
    })?;

    row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse recommendation id: {e}"),
    })
}

/// Lists recommendations, highest priority then newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_recommendations(
    db: &dyn Database,
    query: &RecommendationQuery,
) -> Result<Vec<RecommendationRow>, DbError> {
    let mut frags: Vec<String> = Vec::new();
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut idx = 1u32;

    if let Some(priority) = query.priority {
        frags.push(format!("r.priority = ${idx}"));
        params.push(DatabaseValue::String(priority.as_ref().to_string()));
        idx += 1;
    }

    if let Some(status) = query.status {
        frags.push(format!("r.status = ${idx}"));
        params.push(DatabaseValue::String(status.as_ref().to_string()));
        idx += 1;
    }

    if let Some(grid_id) = query.grid_id {
        frags.push(format!("r.grid_id = ${idx}"));
        params.push(DatabaseValue::Int32(grid_id));
        idx += 1;
    }

    let where_clause = if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    };

    let sql = format!(
        "SELECT {RECOMMENDATION_COLUMNS}
         FROM policy_recommendations r
         LEFT JOIN policy_grid g ON g.grid_id = r.grid_id{where_clause}
         ORDER BY CASE r.priority
                      WHEN 'critical' THEN 4 WHEN 'high' THEN 3
                      WHEN 'medium' THEN 2 ELSE 1 END DESC,
                  r.created_at DESC, r.id DESC
         LIMIT ${idx}"
    );
    params.push(DatabaseValue::Int64(i64::from(query.limit)));

    let rows = db.query_raw_params(&sql, &params).await?;
    Ok(rows.iter().map(recommendation_from_row).collect())
}

/// Fetches one recommendation.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_recommendation(
    db: &dyn Database,
    id: i32,
) -> Result<Option<RecommendationRow>, DbError> {
    let sql = format!(
        "SELECT {RECOMMENDATION_COLUMNS}
         FROM policy_recommendations r
         LEFT JOIN policy_grid g ON g.grid_id = r.grid_id
         WHERE r.id = $1"
    );
    let rows = db.query_raw_params(&sql, &[DatabaseValue::Int32(id)]).await?;
    Ok(rows.first().map(recommendation_from_row))
}

/// Sets a recommendation's status (and notes, when given) and returns the
/// updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no recommendation has this id, or
/// [`DbError`] if the update fails.
pub async fn update_recommendation_status(
    db: &dyn Database,
    id: i32,
    status: PolicyStatus,
    notes: Option<&str>,
) -> Result<RecommendationRow, DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE policy_recommendations
             SET status = $2,
                 notes = COALESCE($3, notes),
                 updated_at = NOW() AT TIME ZONE 'UTC'
             WHERE id = $1",
            &[
                DatabaseValue::Int32(id),
                DatabaseValue::String(status.as_ref().to_string()),
                opt_string(notes),
            ],
        )
        .await?;

    if updated == 0 {
        return Err(DbError::NotFound {
            what: format!("policy recommendation {id}"),
        });
    }

    get_recommendation(db, id)
        .await?
        .ok_or_else(|| DbError::NotFound {
            what: format!("policy recommendation {id}"),
        })
}

// ── Alerts ───────────────────────────────────────────────────────────────

/// Inserts an alert and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn insert_alert(db: &dyn Database, alert: &AlertDraft) -> Result<i32, DbError> {
    let rows = db
        .query_raw_params(
            "INSERT INTO alert_history (
                alert_type, location, severity, message, pm25_level, zone_name
             ) VALUES ($1, ST_SetSRID(ST_MakePoint($2, $3), 4326), $4, $5, $6, $7)
             RETURNING id",
            &[
                DatabaseValue::String(alert.alert_type.as_ref().to_string()),
                DatabaseValue::Real64(alert.longitude),
                DatabaseValue::Real64(alert.latitude),
                DatabaseValue::String(alert.severity.as_ref().to_string()),
                DatabaseValue::String(alert.message.clone()),
                opt_real(alert.pm25_level),
                opt_string(alert.zone_name.as_deref()),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "Failed to get alert id from insert".to_string(),
    })?;

    row.to_value("id").map_err(|e| DbError::Conversion {
        message: format!("Failed to parse alert id: {e}"),
    })
}

/// Lists alerts, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_alerts(db: &dyn Database, query: &AlertQuery) -> Result<Vec<AlertRow>, DbError> {
    let mut frags: Vec<String> = Vec::new();
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut idx = 1u32;

    if let Some(severity) = query.severity {
        frags.push(format!("a.severity = ${idx}"));
        params.push(DatabaseValue::String(severity.as_ref().to_string()));
        idx += 1;
    }

    if let Some(status) = query.status {
        frags.push(format!("a.status = ${idx}"));
        params.push(DatabaseValue::String(status.as_ref().to_string()));
        idx += 1;
    }

    let where_clause = if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    };

    let sql = format!(
        "SELECT {ALERT_COLUMNS} FROM alert_history a{where_clause}
         ORDER BY a.triggered_at DESC, a.id DESC
         LIMIT ${idx}"
    );
    params.push(DatabaseValue::Int64(i64::from(query.limit)));

    let rows = db.query_raw_params(&sql, &params).await?;
    Ok(rows.iter().map(alert_from_row).collect())
}

// ── Dashboard aggregates ─────────────────────────────────────────────────

/// PM2.5 summary over readings recorded at or after `since`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn air_quality_summary(
    db: &dyn Database,
    since: DateTime<Utc>,
) -> Result<AirQualitySummaryRow, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) AS total_readings,
                    AVG(pm25) AS avg_pm25,
                    MAX(pm25) AS max_pm25,
                    MIN(pm25) AS min_pm25,
                    COUNT(*) FILTER (WHERE pm25 > $2) AS readings_above_threshold,
                    COUNT(*) FILTER (WHERE pm25 > 55) AS very_unhealthy_readings
             FROM air_measurements
             WHERE recorded_at >= $1 AND pm25 IS NOT NULL",
            &[
                DatabaseValue::DateTime(since.naive_utc()),
                DatabaseValue::Real64(PM25_ACTION_THRESHOLD),
            ],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(AirQualitySummaryRow::default());
    };

    Ok(AirQualitySummaryRow {
        total_readings: row.to_value("total_readings").unwrap_or(0),
        avg_pm25: row.to_value("avg_pm25").unwrap_or(None),
        max_pm25: row.to_value("max_pm25").unwrap_or(None),
        min_pm25: row.to_value("min_pm25").unwrap_or(None),
        readings_above_threshold: row.to_value("readings_above_threshold").unwrap_or(0),
        very_unhealthy_readings: row.to_value("very_unhealthy_readings").unwrap_or(0),
    })
}

/// Recommendation counts and mean expected impact per status.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn recommendations_by_status(db: &dyn Database) -> Result<Vec<StatusCountRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT status, COUNT(*) AS count, AVG(expected_impact_percent) AS avg_impact
             FROM policy_recommendations
             GROUP BY status
             ORDER BY status",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let status: String = row.to_value("status").unwrap_or_default();
            Some(StatusCountRow {
                status: status.parse().ok()?,
                count: row.to_value("count").unwrap_or(0),
                avg_impact: row.to_value("avg_impact").unwrap_or(None),
            })
        })
        .collect())
}

/// Active alert counts per severity.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn active_alerts_by_severity(
    db: &dyn Database,
) -> Result<Vec<SeverityCountRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT severity, COUNT(*) AS count
             FROM alert_history
             WHERE status = 'active'
             GROUP BY severity
             ORDER BY severity",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let severity: String = row.to_value("severity").unwrap_or_default();
            Some(SeverityCountRow {
                severity: severity.parse().ok()?,
                count: row.to_value("count").unwrap_or(0),
            })
        })
        .collect())
}

/// Reading counts and mean PM2.5 per source type, at or after `since`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn pm25_by_source(
    db: &dyn Database,
    since: DateTime<Utc>,
) -> Result<Vec<SourceBreakdownRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT source_type, COUNT(*) AS count, AVG(pm25) AS avg_pm25
             FROM air_measurements
             WHERE recorded_at >= $1
             GROUP BY source_type
             ORDER BY count DESC",
            &[DatabaseValue::DateTime(since.naive_utc())],
        )
        .await?;

    Ok(rows
        .iter()
        .map(|row| SourceBreakdownRow {
            source_type: row.to_value("source_type").unwrap_or_default(),
            count: row.to_value("count").unwrap_or(0),
            avg_pm25: row.to_value("avg_pm25").unwrap_or(None),
        })
        .collect())
}
