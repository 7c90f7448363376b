//! Source registry: loads every provider definition from embedded TOML.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`].

use crate::source_def::{SourceDefinition, parse_source_toml};

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    (
        "openaq_nairobi",
        include_str!("../sources/openaq_nairobi.toml"),
    ),
    ("waqi_nairobi", include_str!("../sources/waqi_nairobi.toml")),
    (
        "copernicus_s5p",
        include_str!("../sources/copernicus_s5p.toml"),
    ),
];

/// Returns all configured source definitions.
///
/// # Panics
///
/// Panics if an embedded TOML config is malformed.
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_source_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a source definition by id.
#[must_use]
pub fn find_source(id: &str) -> Option<SourceDefinition> {
    all_sources().into_iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use air_map_source_models::SourceType;

    use super::*;
    use crate::source_def::FetcherConfig;

    #[test]
    fn loads_all_sources() {
        assert_eq!(all_sources().len(), SOURCE_TOMLS.len());
    }

    #[test]
    fn ids_match_file_names() {
        for ((name, _), source) in SOURCE_TOMLS.iter().zip(all_sources()) {
            assert_eq!(*name, source.id);
        }
    }

    #[test]
    fn fetcher_matches_source_type() {
        for source in all_sources() {
            let expected = match source.fetcher {
                FetcherConfig::Openaq(_) => SourceType::Openaq,
                FetcherConfig::Waqi(_) => SourceType::Waqi,
                FetcherConfig::Copernicus(_) => SourceType::Copernicus,
            };
            assert_eq!(source.source_type, expected, "{}", source.id);
        }
    }

    #[test]
    fn waqi_uses_short_timeout() {
        let waqi = find_source("waqi_nairobi").unwrap();
        assert_eq!(waqi.timeout_secs, 8);
        assert!(find_source("nope").is_none());
    }
}
