#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the air-quality ingestion tool.

use std::path::PathBuf;
use std::time::Instant;

use air_map_analytics::tasks;
use air_map_analytics_models::HotspotOutcome;
use air_map_cli_utils::IndicatifProgress;
use air_map_database::{db, run_migrations};
use air_map_ingest::{
    MAX_SEARCH_DAYS, MAX_WINDOW_HOURS, MOCK_STAGES, all_sources, export_latest, import_interventions_csv, import_monitoring_csv,
    raise_measurement_alerts, resolve_source, search_copernicus, seed_mock_data, sync_openaq,
    sync_waqi, window_start,
};
use air_map_source::FetchOptions;
use air_map_source_models::SourceType;
use chrono::Utc;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "air_map_ingest", about = "Air-quality data ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// List all configured data sources
    Sources,
    /// Fetch the latest readings from `OpenAQ`
    Openaq {
        /// Source identifier
        #[arg(long, default_value = "openaq_nairobi")]
        source: String,
        /// Maximum number of raw measurements to request
        #[arg(long)]
        limit: Option<u64>,
        /// Only request measurements from the last N hours (1-720)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_HOURS))]
        hours: Option<i64>,
        /// Store demonstration readings when the city has no locations
        #[arg(long)]
        mock_fallback: bool,
    },
    /// Fetch the current reading of the first matching WAQI station
    Waqi {
        /// Source identifier
        #[arg(long, default_value = "waqi_nairobi")]
        source: String,
    },
    /// Search the Copernicus catalogue for Sentinel-5P products
    Copernicus {
        /// Source identifier
        #[arg(long, default_value = "copernicus_s5p")]
        source: String,
        /// How many days back to search (1-30)
        #[arg(long, default_value = "7", value_parser = clap::value_parser!(i64).range(1..=MAX_SEARCH_DAYS))]
        days: i64,
        /// Download a capped sample of the first product into this directory
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
    /// Import a monitoring-station CSV export
    ImportMonitoring {
        /// Path to the CSV file
        path: PathBuf,
    },
    /// Import a policy-intervention CSV (zones plus recommendations)
    ImportInterventions {
        /// Path to the CSV file
        path: PathBuf,
    },
    /// Raise alerts for locations whose latest reading is unhealthy
    Alerts {
        /// Only consider readings from the last N hours (1-720)
        #[arg(long, default_value = "24", value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_HOURS))]
        hours: i64,
    },
    /// Run hotspot detection over recent readings
    Hotspots {
        /// Window size in hours (1-720)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(i64).range(1..=MAX_WINDOW_HOURS))]
        hours: i64,
    },
    /// Recompute zone priority scores
    Priorities,
    /// Print dashboard statistics as JSON
    Summary,
    /// Export the latest reading per location as CSV and `GeoJSON`
    Export {
        /// CSV output path
        #[arg(long, default_value = "air_quality_data.csv")]
        csv: PathBuf,
        /// `GeoJSON` output path
        #[arg(long, default_value = "air_quality_map.geojson")]
        geojson: PathBuf,
    },
    /// Seed the database with demonstration data
    Mock,
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = air_map_cli_utils::init_logger();
    let cli = Cli::parse();

    if let Commands::Sources = cli.command {
        println!("{:<18} {:<12} {:<24} NAME", "ID", "TYPE", "CREDENTIAL");
        println!("{}", "-".repeat(80));
        for source in all_sources() {
            let config = source.config();
            println!(
                "{:<18} {:<12} {:<24} {}",
                config.id,
                config.source_type.as_ref(),
                config.credential_env.as_deref().unwrap_or("-"),
                config.name
            );
        }
        return Ok(());
    }

    let db = db::connect_from_env().await?;
    let db = db.as_ref();
    let start = Instant::now();
    let now = Utc::now();

    match cli.command {
        Commands::Sources => {}
        Commands::Migrate => {
            log::info!("Running database migrations...");
            run_migrations(db).await?;
            log::info!("Migrations complete.");
        }
        Commands::Openaq {
            source,
            limit,
            hours,
            mock_fallback,
        } => {
            let source = resolve_source(&source, SourceType::Openaq)?;
            let options = FetchOptions {
                since: hours.map(|h| window_start(now, h)),
                until: None,
                limit,
            };
            let progress = IndicatifProgress::readings_bar(&multi, &source.id);
            let summary =
                sync_openaq(db, &source, &options, mock_fallback, now, &progress).await?;
            progress.finish(format!("{} new readings", summary.inserted));
        }
        Commands::Waqi { source } => {
            let source = resolve_source(&source, SourceType::Waqi)?;
            let summary = sync_waqi(db, &source, now).await?;
            log::info!("[{}] {} new readings", source.id, summary.inserted);
        }
        Commands::Copernicus {
            source,
            days,
            download_dir,
        } => {
            let source = resolve_source(&source, SourceType::Copernicus)?;
            let (products, sample) =
                search_copernicus(&source, days, download_dir.as_deref(), now).await?;
            for product in &products {
                let sensed = product
                    .sensing_start
                    .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
                println!("{:<38} {:<26} {}", product.id, sensed, product.name);
            }
            if let Some(path) = sample {
                println!("Sample saved to {}", path.display());
            }
        }
        Commands::ImportMonitoring { path } => {
            let progress = IndicatifProgress::rows_bar(&multi, &path);
            let summary = import_monitoring_csv(db, &path, now, &progress).await?;
            log::info!(
                "{} rows parsed, {} skipped, {} inserted",
                summary.parsed,
                summary.skipped,
                summary.inserted
            );
        }
        Commands::ImportInterventions { path } => {
            let progress = IndicatifProgress::rows_bar(&multi, &path);
            let summary = import_interventions_csv(db, &path, &progress).await?;
            log::info!(
                "{} zones imported, {} skipped",
                summary.inserted,
                summary.skipped
            );
        }
        Commands::Alerts { hours } => {
            let raised = raise_measurement_alerts(db, hours, now).await?;
            println!("{raised} alerts raised");
        }
        Commands::Hotspots { hours } => {
            match tasks::run_hotspot_analysis(db, None, hours, now).await? {
                HotspotOutcome::Success(report) => {
                    println!(
                        "mean {:.1} sd {:.1} high>{:.1} critical>{:.1}",
                        report.thresholds.mean,
                        report.thresholds.std_dev,
                        report.thresholds.high,
                        report.thresholds.critical
                    );
                    for hotspot in &report.hotspots {
                        println!(
                            "{:<9} {:>7.1} {:>10.5} {:>10.5} {}",
                            hotspot.severity.as_ref(),
                            hotspot.pm25,
                            hotspot.longitude,
                            hotspot.latitude,
                            hotspot.location_name.as_deref().unwrap_or("-")
                        );
                    }
                }
                HotspotOutcome::InsufficientData { readings, required } => {
                    println!("Not enough readings: {readings} of {required} required");
                }
            }
        }
        Commands::Priorities => {
            let updated = tasks::refresh_priorities(db).await?;
            println!("{updated} zones updated");
        }
        Commands::Summary => {
            let stats = tasks::dashboard(db, now).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Export { csv, geojson } => {
            let written = export_latest(db, &csv, &geojson).await?;
            println!("{written} readings exported");
        }
        Commands::Mock => {
            let progress = IndicatifProgress::stages_bar(&multi, "Seeding mock data", MOCK_STAGES);
            let summary = seed_mock_data(db, now, &progress).await?;
            log::info!(
                "Seeded {} measurements, {} zones, {} recommendations, {} alerts",
                summary.measurements,
                summary.zones,
                summary.recommendations,
                summary.alerts
            );
        }
    }

    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("air_map_ingest").chain(args.iter().copied()))
    }

    #[test]
    fn out_of_range_windows_are_rejected() {
        assert!(parse(&["hotspots", "--hours", "9000000000000"]).is_err());
        assert!(parse(&["alerts", "--hours", "0"]).is_err());
        assert!(parse(&["openaq", "--hours", "721"]).is_err());
        assert!(parse(&["copernicus", "--days", "31"]).is_err());
    }

    #[test]
    fn in_range_windows_parse() {
        let cli = parse(&["hotspots", "--hours", "720"]).unwrap();
        assert!(matches!(cli.command, Commands::Hotspots { hours: 720 }));

        let cli = parse(&["alerts"]).unwrap();
        assert!(matches!(cli.command, Commands::Alerts { hours: 24 }));

        let cli = parse(&["openaq", "--mock-fallback"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Openaq { hours: None, mock_fallback: true, .. }
        ));
    }
}
