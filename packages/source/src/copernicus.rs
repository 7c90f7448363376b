//! Copernicus Data Space client for Sentinel-5P products.
//!
//! Obtains an access token with the client-credentials grant, searches the
//! OData catalogue for products intersecting a bounding box within a time
//! window, and can download a capped sample of a product.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::parsing::parse_timestamp;
use crate::{SourceError, http};

/// Request configuration for the Copernicus catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct CopernicusConfig {
    /// OpenID Connect token endpoint.
    pub token_url: String,
    /// OData `Products` collection URL.
    pub catalogue_url: String,
    /// Collection name filter (e.g., `SENTINEL-5P`).
    pub collection: String,
    /// `[west, south, east, north]` search area.
    pub bbox: [f64; 4],
    /// Maximum number of products returned (`$top`).
    #[serde(default = "default_top")]
    pub top: u32,
    /// Download cap for product samples, in bytes.
    #[serde(default = "default_sample_bytes")]
    pub sample_bytes: u64,
    /// Environment variable holding the OAuth client id.
    pub client_id_env: String,
    /// Environment variable holding the OAuth client secret.
    pub client_secret_env: String,
}

const fn default_top() -> u32 {
    10
}

const fn default_sample_bytes() -> u64 {
    1024 * 1024
}

/// A catalogue product summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopernicusProduct {
    /// Product UUID.
    pub id: String,
    /// Product file name.
    pub name: String,
    /// Sensing start time.
    pub sensing_start: Option<DateTime<Utc>>,
    /// Sensing end time.
    pub sensing_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogueResponse {
    #[serde(default)]
    value: Vec<RawProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawProduct {
    id: String,
    name: String,
    #[serde(default)]
    content_date: Option<RawContentDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawContentDate {
    start: Option<String>,
    end: Option<String>,
}

/// Builds the OData `$filter` expression for a collection, area, and
/// sensing window.
#[must_use]
pub fn build_filter(
    collection: &str,
    bbox: [f64; 4],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> String {
    let [west, south, east, north] = bbox;
    let polygon =
        format!("POLYGON(({west} {south}, {east} {south}, {east} {north}, {west} {north}, {west} {south}))");
    format!(
        "Collection/Name eq '{collection}' and \
         OData.CSC.Intersects(area=geography'SRID=4326;{polygon}') and \
         ContentDate/Start gt {} and \
         ContentDate/Start lt {}",
        start.to_rfc3339_opts(SecondsFormat::Millis, true),
        end.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Exchanges client credentials for an access token.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails or no token is returned.
pub async fn fetch_token(
    client: &reqwest::Client,
    config: &CopernicusConfig,
    client_id: &str,
    client_secret: &str,
) -> Result<String, SourceError> {
    let form = [
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];
    let body = http::send_json(client.post(&config.token_url).form(&form)).await?;
    let token: TokenResponse = serde_json::from_value(body)?;
    token
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SourceError::Normalization {
            message: "Copernicus token response had no access_token".to_string(),
        })
}

/// Searches the catalogue for products in the configured area between
/// `start` and `end`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails or the body is malformed.
pub async fn search_products(
    client: &reqwest::Client,
    config: &CopernicusConfig,
    token: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<CopernicusProduct>, SourceError> {
    let filter = build_filter(&config.collection, config.bbox, start, end);
    let top = config.top.to_string();
    log::debug!("Copernicus filter: {filter}");

    let body = http::send_json(
        client
            .get(&config.catalogue_url)
            .bearer_auth(token)
            .query(&[("$filter", filter.as_str()), ("$top", top.as_str())]),
    )
    .await?;

    Ok(parse_catalogue(body)?)
}

fn parse_catalogue(body: serde_json::Value) -> Result<Vec<CopernicusProduct>, serde_json::Error> {
    let response: CatalogueResponse = serde_json::from_value(body)?;
    Ok(response
        .value
        .into_iter()
        .map(|raw| {
            let (start, end) = raw
                .content_date
                .map_or((None, None), |d| (d.start, d.end));
            CopernicusProduct {
                id: raw.id,
                name: raw.name,
                sensing_start: start.as_deref().and_then(parse_timestamp),
                sensing_end: end.as_deref().and_then(parse_timestamp),
            }
        })
        .collect())
}

/// Downloads at most roughly `config.sample_bytes` of a product to
/// `path`. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails or the file cannot be
/// written.
pub async fn download_sample(
    client: &reqwest::Client,
    config: &CopernicusConfig,
    token: &str,
    product_id: &str,
    path: &Path,
) -> Result<u64, SourceError> {
    let url = format!(
        "{}({product_id})/$value",
        config.catalogue_url.trim_end_matches('/')
    );
    http::download_capped(client.get(&url).bearer_auth(token), path, config.sample_bytes).await
}
