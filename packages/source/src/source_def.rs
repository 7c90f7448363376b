//! Config-driven source definition.
//!
//! [`SourceDefinition`] captures everything unique about a provider in a
//! serializable struct loaded from the embedded TOML files under
//! `packages/source/sources/`.

use std::time::Duration;

use air_map_source_models::{SourceConfig, SourceType};
use serde::Deserialize;

use crate::copernicus::CopernicusConfig;
use crate::openaq::OpenAqConfig;
use crate::waqi::WaqiConfig;

/// Default per-request timeout when a definition does not set one.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A complete provider definition.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"openaq_nairobi"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Kind of provider, stored with every measurement.
    pub source_type: SourceType,
    /// Geographic coverage description.
    pub coverage_area: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How to call the provider.
    pub fetcher: FetcherConfig,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Provider-specific request configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetcherConfig {
    /// `OpenAQ` v2 `/locations` + `/measurements`.
    Openaq(OpenAqConfig),
    /// WAQI keyword search followed by a station feed.
    Waqi(WaqiConfig),
    /// Copernicus Data Space OData catalogue.
    Copernicus(CopernicusConfig),
}

impl SourceDefinition {
    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base API URL of the provider.
    #[must_use]
    pub fn api_url(&self) -> &str {
        match &self.fetcher {
            FetcherConfig::Openaq(c) => &c.base_url,
            FetcherConfig::Waqi(c) => &c.search_url,
            FetcherConfig::Copernicus(c) => &c.catalogue_url,
        }
    }

    /// Environment variable holding this provider's primary credential.
    #[must_use]
    pub fn credential_env(&self) -> Option<&str> {
        match &self.fetcher {
            FetcherConfig::Openaq(c) => c.api_key_env.as_deref(),
            FetcherConfig::Waqi(c) => Some(&c.token_env),
            FetcherConfig::Copernicus(c) => Some(&c.client_id_env),
        }
    }

    /// Summary view used by listings and the REST API.
    #[must_use]
    pub fn config(&self) -> SourceConfig {
        SourceConfig {
            id: self.id.clone(),
            name: self.name.clone(),
            source_type: self.source_type,
            api_url: Some(self.api_url().to_string()),
            coverage_area: self.coverage_area.clone(),
            credential_env: self.credential_env().map(ToString::to_string),
        }
    }
}

/// Parses a TOML source definition.
///
/// # Errors
///
/// Returns the TOML error message if the document is malformed.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_waqi_definition_with_default_timeout() {
        let def = parse_source_toml(
            r#"
            id = "waqi_test"
            name = "WAQI test"
            source_type = "waqi"
            coverage_area = "Nairobi, KE"

            [fetcher]
            type = "waqi"
            search_url = "https://api.waqi.info/search/"
            feed_url = "https://api.waqi.info/feed/"
            keyword = "Nairobi"
            token_env = "WAQI_TOKEN"
            "#,
        )
        .unwrap();

        assert_eq!(def.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(def.credential_env(), Some("WAQI_TOKEN"));
        assert!(matches!(def.fetcher, FetcherConfig::Waqi(_)));
        assert_eq!(def.config().source_type, SourceType::Waqi);
    }

    #[test]
    fn rejects_unknown_fetcher_type() {
        let result = parse_source_toml(
            r#"
            id = "x"
            name = "x"
            source_type = "mock"
            coverage_area = "x"

            [fetcher]
            type = "ftp"
            "#,
        );
        assert!(result.is_err());
    }
}
