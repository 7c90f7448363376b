#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database connection, queries, and migrations for the air-quality
//! platform.
//!
//! Uses `switchy_database` for parameterized raw SQL against `PostGIS` and
//! `switchy_schema` for embedded SQL migrations.

pub mod db;
pub mod queries;

use include_dir::{Dir, include_dir};
use switchy_database::{Database, DatabaseTransaction};
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// A row that should exist was not found.
    #[error("Not found: {what}")]
    NotFound {
        /// What was being looked up.
        what: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Commits `txn` when `result` is `Ok`, otherwise rolls it back and
/// returns the original error.
///
/// # Errors
///
/// Returns the error from `result`, or [`DbError::Database`] if the commit
/// fails.
pub async fn finish_transaction<T>(
    txn: Box<dyn DatabaseTransaction>,
    result: Result<T, DbError>,
) -> Result<T, DbError> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = txn.rollback().await {
                log::warn!("Rollback failed after {e}: {rollback}");
            }
            Err(e)
        }
    }
}

/// Runs all pending database migrations, including the
/// `update_grid_priorities()` function.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}
