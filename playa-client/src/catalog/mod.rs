//! Content catalog port.
//!
//! A [`CatalogProvider`] answers the contractual sync requests with a
//! [`SyncResponse`] and serves package bytes. The orchestrator never talks
//! to the network directly; the CLI plugs in [`DirectoryCatalog`] and tests
//! use [`MockCatalog`].

mod dir;
mod mock;

pub use dir::DirectoryCatalog;
pub use mock::MockCatalog;

use async_trait::async_trait;
use playa_types::{ContentPackage, FullSyncRequest, IncrementalSyncRequest, SyncResponse};
use thiserror::Error;

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog could not be reached.
    #[error("catalog offline: {0}")]
    Offline(String),

    /// The catalog does not serve this package.
    #[error("package not found: {package_id}")]
    NotFound {
        /// Requested package id
        package_id: String,
    },

    /// Downloaded length differs from the declared size.
    #[error("size mismatch for {package_id}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Package id
        package_id: String,
        /// Declared size
        expected: u64,
        /// Received size
        actual: u64,
    },

    /// Catalog answered with something we could not decode.
    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),

    /// Local I/O failure while reading the catalog.
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Whether the failure means the catalog is unreachable, as opposed to
    /// a problem with one package.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}

/// Source of candidate packages and their bytes.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Answer a full sync request.
    async fn fetch_full(&self, request: &FullSyncRequest) -> Result<SyncResponse, CatalogError>;

    /// Answer an incremental sync request.
    async fn fetch_incremental(
        &self,
        request: &IncrementalSyncRequest,
    ) -> Result<SyncResponse, CatalogError>;

    /// Fetch the bytes of one package. `url` is the location from the
    /// response's `download_urls`, if it supplied one.
    async fn download(
        &self,
        package: &ContentPackage,
        url: Option<&str>,
    ) -> Result<Vec<u8>, CatalogError>;
}
