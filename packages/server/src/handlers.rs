//! HTTP handler functions for the air-quality API.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use air_map_analytics::{AnalysisError, tasks};
use air_map_analytics_models::HotspotOutcome;
use air_map_database::{DbError, queries};
use air_map_database_models::{AlertQuery, BoundingBox, MeasurementQuery, RecommendationQuery};
use air_map_pollution_models::{AlertSeverity, AlertStatus, PolicyStatus, Priority};
use air_map_server_models::{
    AlertQueryParams, AnalysisRequest, AnalysisStarted, ApiAlert, ApiHealth, ApiRecommendation,
    HotspotQueryParams, MeasurementQueryParams, RecommendationQueryParams, SimulateRequest,
    StatusUpdateRequest, hotspot_collection, zone_collection,
};
use air_map_source::export::measurement_feature;
use chrono::Utc;
use geojson::FeatureCollection;
use serde_json::json;

use crate::AppState;

const DEFAULT_MEASUREMENT_LIMIT: u32 = 1000;
const MAX_MEASUREMENT_LIMIT: u32 = 10_000;
const DEFAULT_LIST_LIMIT: u32 = 50;

fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": message.into() }))
}

fn not_found(message: impl Into<String>) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": message.into() }))
}

fn internal_error(context: &str, e: &dyn std::fmt::Display) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(json!({ "error": context }))
}

fn analysis_error(context: &str, e: &AnalysisError) -> HttpResponse {
    if e.is_not_found() {
        not_found(e.to_string())
    } else {
        internal_error(context, e)
    }
}

/// `GET /health`, `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// `GET /api/air/zones`
///
/// Returns every grid zone as a polygon feature.
pub async fn zones(state: web::Data<AppState>) -> HttpResponse {
    match queries::list_zones(state.db.as_ref()).await {
        Ok(rows) => HttpResponse::Ok().json(zone_collection(&rows)),
        Err(e) => internal_error("Failed to query zones", &e),
    }
}

/// `GET /api/air/hotspots`
///
/// Runs hotspot detection over the requested window (default one hour)
/// and returns the hotspots as point features.
pub async fn hotspots(
    state: web::Data<AppState>,
    params: web::Query<HotspotQueryParams>,
) -> HttpResponse {
    let bbox = match params.bbox.as_deref().map(parse_bbox) {
        Some(None) => return bad_request("bbox must be west,south,east,north"),
        Some(bbox) => bbox,
        None => None,
    };
    let hours = tasks::hotspot_window_hours(params.hours);

    match tasks::run_hotspot_analysis(state.db.as_ref(), bbox.as_ref(), hours, Utc::now()).await
    {
        Ok(HotspotOutcome::Success(report)) => {
            HttpResponse::Ok().json(hotspot_collection(&report, hours))
        }
        Ok(insufficient @ HotspotOutcome::InsufficientData { .. }) => {
            HttpResponse::Ok().json(insufficient)
        }
        Err(e) => analysis_error("Failed to detect hotspots", &e),
    }
}

/// `GET /api/air/measurements`
///
/// Queries measurements with bounding box, time range, and source filters.
pub async fn measurements(
    state: web::Data<AppState>,
    params: web::Query<MeasurementQueryParams>,
) -> HttpResponse {
    let bbox = match params.bbox.as_deref().map(parse_bbox) {
        Some(None) => return bad_request("bbox must be west,south,east,north"),
        Some(bbox) => bbox,
        None => None,
    };

    let source_type = match params.source.as_deref().map(str::parse) {
        Some(Err(_)) => return bad_request("Unknown measurement source"),
        Some(Ok(source)) => Some(source),
        None => None,
    };

    let query = MeasurementQuery {
        bbox,
        from: params.from,
        to: params.to,
        source_type,
        limit: params
            .limit
            .unwrap_or(DEFAULT_MEASUREMENT_LIMIT)
            .min(MAX_MEASUREMENT_LIMIT),
        offset: params.offset.unwrap_or(0),
    };

    match queries::query_measurements(state.db.as_ref(), &query).await {
        Ok(rows) => {
            let features = rows
                .iter()
                .filter_map(|row| {
                    let mut feature = measurement_feature(&row.to_normalized())?;
                    feature.id = Some(geojson::feature::Id::Number(row.id.into()));
                    Some(feature)
                })
                .collect();
            HttpResponse::Ok().json(FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            })
        }
        Err(e) => internal_error("Failed to query measurements", &e),
    }
}

/// `POST /api/air/analysis`
///
/// Starts hotspot detection in the background and returns immediately.
pub async fn start_analysis(
    state: web::Data<AppState>,
    body: Option<web::Json<AnalysisRequest>>,
) -> HttpResponse {
    let request = body.map(web::Json::into_inner).unwrap_or_default();

    let bbox = match request.bbox.as_deref().map(parse_bbox) {
        Some(None) => return bad_request("bbox must be west,south,east,north"),
        Some(bbox) => bbox,
        None => None,
    };
    let hours = tasks::hotspot_window_hours(request.hours);

    let analysis_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    let db: Arc<_> = state.db.clone();
    let id = analysis_id.clone();

    actix_rt::spawn(async move {
        match tasks::run_hotspot_analysis(db.as_ref(), bbox.as_ref(), hours, started_at).await {
            Ok(HotspotOutcome::Success(report)) => log::info!(
                "Analysis {id} finished: {} hotspots among {} readings",
                report.hotspot_count,
                report.total_readings
            ),
            Ok(HotspotOutcome::InsufficientData { readings, .. }) => {
                log::info!("Analysis {id} finished: insufficient data ({readings} readings)");
            }
            Err(e) => log::error!("Analysis {id} failed: {e}"),
        }
    });

    HttpResponse::Accepted().json(AnalysisStarted {
        analysis_id,
        status: "started".to_string(),
        started_at,
    })
}

/// `GET /api/air/zones/{id}/attribution`
pub async fn zone_attribution(state: web::Data<AppState>, path: web::Path<i32>) -> HttpResponse {
    let grid_id = path.into_inner();
    match tasks::run_source_attribution(state.db.as_ref(), grid_id, Utc::now()).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => analysis_error("Failed to attribute sources", &e),
    }
}

/// `POST /api/air/zones/{id}/recommendations`
pub async fn zone_recommendations(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> HttpResponse {
    let grid_id = path.into_inner();
    match tasks::generate_recommendations(state.db.as_ref(), grid_id, Utc::now()).await {
        Ok(generated) => HttpResponse::Ok().json(generated),
        Err(e) => analysis_error("Failed to generate recommendations", &e),
    }
}

/// `GET /api/policy/recommendations`
pub async fn recommendations(
    state: web::Data<AppState>,
    params: web::Query<RecommendationQueryParams>,
) -> HttpResponse {
    let priority = match params.priority.as_deref().map(str::parse::<Priority>) {
        Some(Err(_)) => {
            return bad_request("Invalid priority. Must be one of: low, medium, high, critical");
        }
        Some(Ok(priority)) => Some(priority),
        None => None,
    };
    let status = match params.status.as_deref().map(str::parse::<PolicyStatus>) {
        Some(Err(_)) => return bad_request(invalid_status_message()),
        Some(Ok(status)) => Some(status),
        None => None,
    };

    let query = RecommendationQuery {
        priority,
        status,
        grid_id: None,
        limit: params.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    };

    match queries::query_recommendations(state.db.as_ref(), &query).await {
        Ok(rows) => {
            let api: Vec<ApiRecommendation> =
                rows.into_iter().map(ApiRecommendation::from).collect();
            HttpResponse::Ok().json(api)
        }
        Err(e) => internal_error("Failed to query recommendations", &e),
    }
}

/// `PATCH /api/policy/recommendations/{id}`
pub async fn update_recommendation(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    body: web::Json<StatusUpdateRequest>,
) -> HttpResponse {
    let id = path.into_inner();
    let Ok(status) = body.status.parse::<PolicyStatus>() else {
        return bad_request(invalid_status_message());
    };

    match queries::update_recommendation_status(
        state.db.as_ref(),
        id,
        status,
        body.notes.as_deref(),
    )
    .await
    {
        Ok(row) => {
            log::info!("Recommendation {id} set to {status}");
            HttpResponse::Ok().json(ApiRecommendation::from(row))
        }
        Err(DbError::NotFound { .. }) => not_found(format!("Policy recommendation {id} not found")),
        Err(e) => internal_error("Failed to update recommendation", &e),
    }
}

/// `POST /api/policy/simulate`
pub async fn simulate(
    state: web::Data<AppState>,
    body: web::Json<SimulateRequest>,
) -> HttpResponse {
    match tasks::simulate_policy(state.db.as_ref(), body.policy_id, Utc::now()).await {
        Ok(simulation) => HttpResponse::Ok().json(simulation),
        Err(e) => analysis_error("Failed to simulate policy", &e),
    }
}

/// `GET /api/policy/alerts`
///
/// Lists active alerts, newest first.
pub async fn alerts(
    state: web::Data<AppState>,
    params: web::Query<AlertQueryParams>,
) -> HttpResponse {
    let severity = match params.severity.as_deref().map(str::parse::<AlertSeverity>) {
        Some(Err(_)) => {
            return bad_request("Invalid severity. Must be one of: low, medium, high, critical");
        }
        Some(Ok(severity)) => Some(severity),
        None => None,
    };

    let query = AlertQuery {
        severity,
        status: Some(AlertStatus::Active),
        limit: params.limit.unwrap_or(DEFAULT_LIST_LIMIT),
    };

    match queries::query_alerts(state.db.as_ref(), &query).await {
        Ok(rows) => {
            let api: Vec<ApiAlert> = rows.into_iter().map(ApiAlert::from).collect();
            HttpResponse::Ok().json(api)
        }
        Err(e) => internal_error("Failed to query alerts", &e),
    }
}

/// `GET /api/policy/dashboard`
pub async fn dashboard(state: web::Data<AppState>) -> HttpResponse {
    match tasks::dashboard(state.db.as_ref(), Utc::now()).await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => analysis_error("Failed to load dashboard", &e),
    }
}

/// `POST /api/policy/priorities`
pub async fn refresh_priorities(state: web::Data<AppState>) -> HttpResponse {
    match tasks::refresh_priorities(state.db.as_ref()).await {
        Ok(updated) => HttpResponse::Ok().json(json!({ "updatedZones": updated })),
        Err(e) => analysis_error("Failed to refresh priorities", &e),
    }
}

fn invalid_status_message() -> String {
    let allowed: Vec<&str> = PolicyStatus::all().iter().map(AsRef::as_ref).collect();
    format!("Invalid status. Must be one of: {}", allowed.join(", "))
}

/// Parses a bounding box string `"west,south,east,north"` into a
/// [`BoundingBox`]. Returns `None` unless there are exactly four numbers
/// with west < east and south < north.
fn parse_bbox(s: &str) -> Option<BoundingBox> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    if parts.len() == 4 && parts[0] < parts[2] && parts[1] < parts[3] {
        Some(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{App, body::to_bytes, http::StatusCode, test};

    use super::*;

    #[::core::prelude::v1::test]
    fn bbox_requires_four_ordered_numbers() {
        let bbox = parse_bbox("36.70, -1.40, 37.12, -1.15").unwrap();
        assert!((bbox.north - -1.15).abs() < f64::EPSILON);
        assert!(parse_bbox("36.70,-1.40,37.12").is_none());
        assert!(parse_bbox("37.12,-1.40,36.70,-1.15").is_none());
        assert!(parse_bbox("a,b,c,d").is_none());
    }

    #[::core::prelude::v1::test]
    fn status_message_lists_every_status() {
        assert_eq!(
            invalid_status_message(),
            "Invalid status. Must be one of: pending, approved, in_progress, rejected"
        );
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = test::init_service(App::new().route("/health", web::get().to(health))).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["healthy"], true);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    /// Application state backed by an empty `SQLite` file. Handlers that
    /// reject their input never reach it.
    fn empty_state(name: &str) -> web::Data<AppState> {
        let path = std::env::temp_dir().join(format!("air_map_{name}_{}.db", std::process::id()));
        std::fs::remove_file(&path).ok();
        let db = switchy_database_connection::init_sqlite_rusqlite(Some(path.as_path())).unwrap();
        web::Data::new(AppState { db: Arc::from(db) })
    }

    async fn json_body(resp: actix_web::dev::ServiceResponse) -> serde_json::Value {
        let body = to_bytes(resp.into_body()).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[actix_web::test]
    async fn unknown_recommendation_status_is_rejected() {
        let app = test::init_service(
            App::new().app_data(empty_state("status")).route(
                "/api/policy/recommendations/{id}",
                web::patch().to(update_recommendation),
            ),
        )
        .await;
        let req = test::TestRequest::patch()
            .uri("/api/policy/recommendations/7")
            .set_json(json!({ "status": "bogus", "notes": "typo" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json = json_body(resp).await;
        assert_eq!(json["error"], invalid_status_message());
    }

    #[actix_web::test]
    async fn malformed_hotspot_bbox_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(empty_state("bbox"))
                .route("/api/air/hotspots", web::get().to(hotspots)),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/air/hotspots?bbox=37.12,-1.40,36.70,-1.15")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn huge_hotspot_window_does_not_panic() {
        let app = test::init_service(
            App::new()
                .app_data(empty_state("window"))
                .route("/api/air/hotspots", web::get().to(hotspots))
                .route("/api/air/analysis", web::post().to(start_analysis)),
        )
        .await;

        // No measurements table exists, so the query fails cleanly.
        let req = test::TestRequest::get()
            .uri("/api/air/hotspots?hours=9000000000000")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["error"], "Failed to detect hotspots");

        let req = test::TestRequest::post()
            .uri("/api/air/analysis")
            .set_json(json!({ "hours": i64::MIN }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(resp).await["status"], "started");
    }
}
