//! Catalog served from a local directory.
//!
//! Layout:
//!
//! ```text
//! <root>/catalog.json        full SyncResponse
//! <root>/incremental.json    optional; falls back to catalog.json
//! <root>/packages/<id>       package bytes unless download_urls says otherwise
//! ```
//!
//! Download URLs are paths relative to the root. A missing root reads as
//! offline, which is how a detached sync medium looks to the device.

use super::{CatalogError, CatalogProvider};
use async_trait::async_trait;
use playa_types::{ContentPackage, FullSyncRequest, IncrementalSyncRequest, SyncResponse};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const FULL_CATALOG: &str = "catalog.json";
const INCREMENTAL_CATALOG: &str = "incremental.json";
const PACKAGES_DIR: &str = "packages";

/// Catalog rooted at a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    /// Catalog at `root`. The directory is not touched until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Catalog root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_reachable(&self) -> Result<(), CatalogError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CatalogError::Offline(format!(
                "{} is not a directory",
                self.root.display()
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CatalogError::Offline(format!(
                "{} not found",
                self.root.display()
            ))),
            Err(e) => Err(CatalogError::Io(e)),
        }
    }

    async fn read_response(&self, name: &str) -> Result<SyncResponse, CatalogError> {
        let path = self.root.join(name);
        debug!(path = %path.display(), "Reading catalog");
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                CatalogError::InvalidResponse(format!("{} missing", path.display()))
            } else {
                CatalogError::Io(e)
            }
        })?;
        SyncResponse::from_json(&bytes).map_err(|e| CatalogError::InvalidResponse(e.to_string()))
    }

    fn package_path(&self, package: &ContentPackage, url: Option<&str>) -> Result<PathBuf, CatalogError> {
        let Some(url) = url else {
            return Ok(self.root.join(PACKAGES_DIR).join(&package.id));
        };
        let relative = Path::new(url);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(CatalogError::InvalidResponse(format!(
                "download url for {} leaves the catalog: {url}",
                package.id
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl CatalogProvider for DirectoryCatalog {
    async fn fetch_full(&self, _request: &FullSyncRequest) -> Result<SyncResponse, CatalogError> {
        self.ensure_reachable().await?;
        self.read_response(FULL_CATALOG).await
    }

    async fn fetch_incremental(
        &self,
        _request: &IncrementalSyncRequest,
    ) -> Result<SyncResponse, CatalogError> {
        self.ensure_reachable().await?;
        if tokio::fs::try_exists(self.root.join(INCREMENTAL_CATALOG)).await? {
            self.read_response(INCREMENTAL_CATALOG).await
        } else {
            self.read_response(FULL_CATALOG).await
        }
    }

    async fn download(
        &self,
        package: &ContentPackage,
        url: Option<&str>,
    ) -> Result<Vec<u8>, CatalogError> {
        self.ensure_reachable().await?;
        let path = self.package_path(package, url)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CatalogError::NotFound {
                package_id: package.id.clone(),
            }),
            Err(e) => Err(CatalogError::Io(e)),
        }
    }
}
