//! Async STAC client for Item Search.
//!
//! Targets Earth Search by default; any STAC API root works through
//! [`StacCatalog::Custom`].

use std::time::Duration;

use tracing::debug;

use crate::error::{CloudError, Result};
use crate::stac_models::{StacItemCollection, StacSearchParams};

/// Well-known STAC catalogs plus custom endpoints.
#[derive(Debug, Clone, PartialEq)]
pub enum StacCatalog {
    /// AWS Earth Search (Element 84).
    EarthSearch,
    /// Any STAC API endpoint (root URL, e.g. `"https://my-stac.example.com/api/v1"`).
    Custom(String),
}

impl StacCatalog {
    /// Return the full POST `/search` URL for this catalog.
    pub fn search_url(&self) -> String {
        match self {
            Self::EarthSearch => "https://earth-search.aws.element84.com/v1/search".to_string(),
            Self::Custom(base) => {
                let base = base.trim_end_matches('/');
                if base.ends_with("/search") {
                    base.to_string()
                } else {
                    format!("{}/search", base)
                }
            }
        }
    }

    /// Parse a shorthand string into a catalog.
    ///
    /// `"es"` and `"earth-search"` select Earth Search; anything else is
    /// treated as a custom URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "es" | "earth-search" | "earthsearch" => Self::EarthSearch,
            _ => Self::Custom(s.to_string()),
        }
    }
}

/// Configuration for [`StacClient`].
#[derive(Debug, Clone)]
pub struct StacClientOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
}

impl Default for StacClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Async client for STAC Item Search.
pub struct StacClient {
    catalog: StacCatalog,
    client: reqwest::Client,
}

impl StacClient {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| CloudError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { catalog, client })
    }

    /// The catalog this client is configured for.
    pub fn catalog(&self) -> &StacCatalog {
        &self.catalog
    }

    /// Execute one search request and return the first page of results.
    ///
    /// A non-2xx status or an unparsable body is an error; nothing is retried.
    pub async fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
        let url = self.catalog.search_url();
        debug!(%url, ?params, "STAC search");

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(params)
            .send()
            .await
            .map_err(|e| CloudError::Network(format!("STAC search request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CloudError::Network(format!(
                "STAC search returned HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| CloudError::Network(format!("reading response body: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| CloudError::InvalidResponse(format!("parsing STAC response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_search_urls() {
        assert_eq!(
            StacCatalog::EarthSearch.search_url(),
            "https://earth-search.aws.element84.com/v1/search"
        );
        assert_eq!(
            StacCatalog::Custom("https://example.com/stac".into()).search_url(),
            "https://example.com/stac/search"
        );
        assert_eq!(
            StacCatalog::Custom("https://example.com/stac/search".into()).search_url(),
            "https://example.com/stac/search"
        );
        assert_eq!(
            StacCatalog::Custom("https://example.com/stac/".into()).search_url(),
            "https://example.com/stac/search"
        );
    }

    #[test]
    fn catalog_from_str_or_url() {
        assert_eq!(StacCatalog::from_str_or_url("es"), StacCatalog::EarthSearch);
        assert_eq!(
            StacCatalog::from_str_or_url("https://my-stac.com"),
            StacCatalog::Custom("https://my-stac.com".into())
        );
    }

    #[tokio::test]
    async fn unreachable_catalog_is_network_error() {
        let client = StacClient::new(
            StacCatalog::Custom("http://127.0.0.1:9".into()),
            StacClientOptions {
                request_timeout: Duration::from_secs(2),
            },
        )
        .unwrap();
        let err = client.search(&StacSearchParams::new()).await.unwrap_err();
        assert!(matches!(err, CloudError::Network(_)));
    }
}
