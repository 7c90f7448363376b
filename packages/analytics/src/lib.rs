#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Air-quality analysis.
//!
//! The algorithm modules ([`hotspots`], [`attribution`], [`policy`],
//! [`simulation`], [`stats`]) are pure functions over already-loaded rows.
//! [`tasks`] wires them to the database: load rows, run the algorithm,
//! persist whatever the analysis produces (alerts, dominant sources,
//! recommendations).

pub mod attribution;
pub mod hotspots;
pub mod policy;
pub mod simulation;
pub mod stats;
pub mod tasks;

use air_map_database::DbError;
use thiserror::Error;

/// Errors that can occur during analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Database operation failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A zone or recommendation the analysis needs does not exist.
    #[error("Not found: {what}")]
    NotFound {
        /// What was being looked up.
        what: String,
    },
}

impl AnalysisError {
    /// Whether this error means a requested row is missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Database(DbError::NotFound { .. })
        )
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / f64::from(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(Vec::new()), None);
        assert_eq!(mean(vec![1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn not_found_covers_database_not_found() {
        let err = AnalysisError::Database(DbError::NotFound {
            what: "zone 9".to_string(),
        });
        assert!(err.is_not_found());
        assert!(
            !AnalysisError::Database(DbError::Conversion {
                message: "x".to_string()
            })
            .is_not_found()
        );
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert!((round_to(0.635, 1) - 0.6).abs() < 1e-9);
        assert!((round_to(60.266_666, 2) - 60.27).abs() < 1e-9);
    }
}
