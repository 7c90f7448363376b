//! Single-attempt HTTP helpers shared by every provider client.
//!
//! Providers call [`send_json`], [`send_text`], or [`download_capped`]
//! instead of `reqwest::RequestBuilder::send()` directly, so that status
//! handling and error logging are uniform. There is no retry: a failed
//! request surfaces immediately as a [`SourceError`].

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt as _;

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Builds a client with the given per-request timeout.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("air-map/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Sends a request and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails, the server returns a
/// non-success status, or the body is not valid JSON.
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, SourceError> {
    let text = send_text(request).await?;
    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed: {e}\n  body preview: {}",
            preview(&text)
        );
        SourceError::Json(e)
    })
}

/// Sends a request and returns the response body as a `String`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails or the server returns a
/// non-success status.
pub async fn send_text(request: reqwest::RequestBuilder) -> Result<String, SourceError> {
    let response = send_checked(request).await?;
    Ok(response.text().await?)
}

/// Streams a response body to `path`, stopping once more than `max_bytes`
/// have been written. Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails, the server returns a
/// non-success status, or the file cannot be written.
pub async fn download_capped(
    request: reqwest::RequestBuilder,
    path: &Path,
    max_bytes: u64,
) -> Result<u64, SourceError> {
    let mut response = send_checked(request).await?;
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        if written > max_bytes {
            log::debug!("Stopped download after {written} bytes (cap {max_bytes})");
            break;
        }
    }

    file.flush().await?;
    Ok(written)
}

async fn send_checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    log::error!(
        "HTTP {status} from {url}\n  body preview: {}",
        preview(&body)
    );

    Err(SourceError::Normalization {
        message: format!("HTTP {status} from {url}"),
    })
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        let text = "é".repeat(400);
        let cut = preview(&text);
        assert!(cut.len() <= BODY_PREVIEW_LEN);
        assert!(text.starts_with(cut));
    }

    #[test]
    fn preview_keeps_short_bodies() {
        assert_eq!(preview("{\"ok\":true}"), "{\"ok\":true}");
    }
}
