#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the air-quality monitoring platform.
//!
//! Serves map layers (zones, hotspots, measurements) as `GeoJSON`, runs
//! analyses on demand, and exposes the policy workflow (recommendations,
//! simulation, alerts, dashboard). A background task refreshes zone
//! priorities on a fixed interval.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use air_map_analytics::tasks;
use air_map_database::{db, run_migrations};
use switchy_database::Database;

/// Default port, matching the hosting platform's expectation.
pub const DEFAULT_PORT: u16 = 10000;

/// Default interval between zone priority refreshes.
pub const DEFAULT_PRIORITY_REFRESH_SECS: u64 = 3600;

/// Shared application state.
pub struct AppState {
    /// `PostGIS` database connection.
    pub db: Arc<dyn Database>,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Spawns the periodic `update_grid_priorities()` refresh. A failed run is
/// logged and the next tick tries again.
fn spawn_priority_refresh(db: Arc<dyn Database>, interval: Duration) {
    actix_rt::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = tasks::refresh_priorities(db.as_ref()).await {
                log::error!("Scheduled priority refresh failed: {e}");
            }
        }
    });
}

/// Starts the air-quality API server.
///
/// Connects to the `PostGIS` database, runs migrations, starts the
/// priority refresh loop, and serves the API. The caller provides the
/// async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the database connection or
/// migrations fail, or if the HTTP server fails to bind or encounters a
/// runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {e}")))?;

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to run migrations: {e}")))?;

    let db: Arc<dyn Database> = Arc::from(db_conn);

    let refresh_secs = env_or("PRIORITY_REFRESH_SECS", DEFAULT_PRIORITY_REFRESH_SECS);
    if refresh_secs > 0 {
        log::info!("Refreshing zone priorities every {refresh_secs}s");
        spawn_priority_refresh(db.clone(), Duration::from_secs(refresh_secs));
    }

    let state = web::Data::new(AppState { db });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env_or("PORT", DEFAULT_PORT);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .service(
                        web::scope("/air")
                            .route("/zones", web::get().to(handlers::zones))
                            .route("/hotspots", web::get().to(handlers::hotspots))
                            .route("/measurements", web::get().to(handlers::measurements))
                            .route("/analysis", web::post().to(handlers::start_analysis))
                            .route(
                                "/zones/{id}/attribution",
                                web::get().to(handlers::zone_attribution),
                            )
                            .route(
                                "/zones/{id}/recommendations",
                                web::post().to(handlers::zone_recommendations),
                            ),
                    )
                    .service(
                        web::scope("/policy")
                            .route(
                                "/recommendations",
                                web::get().to(handlers::recommendations),
                            )
                            .route(
                                "/recommendations/{id}",
                                web::patch().to(handlers::update_recommendation),
                            )
                            .route("/simulate", web::post().to(handlers::simulate))
                            .route("/alerts", web::get().to(handlers::alerts))
                            .route("/dashboard", web::get().to(handlers::dashboard))
                            .route("/priorities", web::post().to(handlers::refresh_priorities)),
                    ),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
