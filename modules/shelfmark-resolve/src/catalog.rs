//! Trait abstraction over the external bibliographic services.
//!
//! `BookCatalog` is the resolver's only view of the network; the real
//! implementation delegates to `catalog_client::CatalogClient`, and tests
//! substitute an in-memory catalog for deterministic runs — no network,
//! no sleeping rate limiter.

use async_trait::async_trait;
use catalog_client::{CatalogClient, Result};

#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// Raw bibliographic record for an ISBN, `None` if the service has no
    /// entry for it.
    async fn lookup_isbn(&self, isbn: &str) -> Result<Option<serde_json::Value>>;

    /// Raw citation text for a secondary catalog identifier.
    async fn fetch_citation(&self, catalog_id: &str) -> Result<Option<String>>;
}

#[async_trait]
impl BookCatalog for CatalogClient {
    async fn lookup_isbn(&self, isbn: &str) -> Result<Option<serde_json::Value>> {
        CatalogClient::lookup_isbn(self, isbn).await
    }

    async fn fetch_citation(&self, catalog_id: &str) -> Result<Option<String>> {
        CatalogClient::fetch_citation(self, catalog_id).await
    }
}
