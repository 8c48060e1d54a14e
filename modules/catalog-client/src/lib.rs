pub mod error;

pub use error::{CatalogError, Result};

use std::time::Duration;

use tracing::debug;

/// Client for the two external bibliographic services: ISBN lookup
/// (structured record per identifier) and citation retrieval (formatted
/// citation text per secondary catalog id).
pub struct CatalogClient {
    client: reqwest::Client,
    lookup_url: String,
    citation_url: String,
    api_key: Option<String>,
}

impl CatalogClient {
    pub fn new(lookup_url: &str, citation_url: &str, api_key: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            lookup_url: lookup_url.trim_end_matches('/').to_string(),
            citation_url: citation_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
        }
    }

    /// Fetch the raw bibliographic record for an ISBN.
    /// `Ok(None)` means the service has no record for this identifier;
    /// authorization and throttling failures surface as `CatalogError::Api`.
    pub async fn lookup_isbn(&self, isbn: &str) -> Result<Option<serde_json::Value>> {
        let endpoint = format!("{}/books", self.lookup_url);
        let mut req = self.client.get(&endpoint).query(&[("isbn", isbn)]);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        debug!(isbn, "Catalog lookup");
        let resp = req.send().await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CatalogError::Malformed(e.to_string()))?;
        if body.is_null() {
            return Ok(None);
        }
        Ok(Some(body))
    }

    /// Fetch formatted citation text for a secondary catalog identifier.
    pub async fn fetch_citation(&self, catalog_id: &str) -> Result<Option<String>> {
        let endpoint = format!("{}/citations/{}", self.citation_url, catalog_id);
        let mut req = self.client.get(&endpoint);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        debug!(catalog_id, "Citation fetch");
        let resp = req.send().await?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}
