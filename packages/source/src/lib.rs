#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air-quality data source clients and normalization logic.
//!
//! Each provider module knows how to call one third-party API and turn its
//! response into [`air_map_source_models::NormalizedMeasurement`] records.
//! Every call is a single attempt with a per-client timeout.

pub mod copernicus;
pub mod csv_import;
pub mod export;
pub mod http;
pub mod mock;
pub mod openaq;
pub mod parsing;
pub mod progress;
pub mod registry;
pub mod source_def;
pub mod waqi;

use chrono::{DateTime, Utc};

/// Errors that can occur during data source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required credential was not configured.
    #[error("Missing credential: set the {variable} environment variable")]
    MissingCredential {
        /// Environment variable that should hold the credential.
        variable: String,
    },

    /// The provider answered but reported an error or an unexpected shape.
    #[error("Normalization error: {message}")]
    Normalization {
        /// Description of what went wrong.
        message: String,
    },
}

/// Configuration for fetching data from a source.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Only fetch records newer than this timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Only fetch records older than this timestamp.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of records to fetch.
    pub limit: Option<u64>,
}

/// Reads a credential from the environment, treating empty values as
/// missing.
///
/// # Errors
///
/// Returns [`SourceError::MissingCredential`] if the variable is unset or
/// blank.
pub fn credential_from_env(variable: &str) -> Result<String, SourceError> {
    std::env::var(variable)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SourceError::MissingCredential {
            variable: variable.to_string(),
        })
}
