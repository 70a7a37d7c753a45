//! Catalog wire shapes.
//!
//! Field names are contractual; the catalog service decodes these as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{ContentPackage, DeviceId, EventId, PlayaError, SyncId};

/// Storage budget a device advertises when it does not say otherwise.
pub const DEFAULT_MAX_STORAGE_BYTES: u64 = 2_000_000_000;

fn default_max_storage_bytes() -> u64 {
    DEFAULT_MAX_STORAGE_BYTES
}

/// Request for the complete catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullSyncRequest {
    /// Requesting device
    pub device_id: DeviceId,
    /// Event whose catalog is requested
    pub event_id: EventId,
    /// Device storage budget
    #[serde(default = "default_max_storage_bytes")]
    pub max_storage_bytes: u64,
    /// Package ids the device wants regardless of priority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_packages: Option<Vec<String>>,
    /// Unix milliseconds of the last successful sync (0 = never)
    #[serde(default)]
    pub last_sync_timestamp: i64,
}

impl FullSyncRequest {
    /// Request with the default budget and no sync history.
    pub fn new(device_id: DeviceId, event_id: EventId) -> Self {
        Self {
            device_id,
            event_id,
            max_storage_bytes: DEFAULT_MAX_STORAGE_BYTES,
            priority_packages: None,
            last_sync_timestamp: 0,
        }
    }
}

/// Request for packages changed since the last sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalSyncRequest {
    /// Requesting device
    pub device_id: DeviceId,
    /// Event whose catalog is requested
    pub event_id: EventId,
    /// Unix milliseconds of the last successful sync
    pub last_sync_timestamp: i64,
}

/// Catalog answer to either request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Catalog-assigned id of this response
    pub sync_id: SyncId,
    /// Sum of all listed package sizes
    pub total_size_bytes: u64,
    /// Candidate packages
    pub content_packages: Vec<ContentPackage>,
    /// Package id to download location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_urls: Option<HashMap<String, String>>,
}

impl SyncResponse {
    /// Build a response listing `packages`, computing the total size.
    pub fn new(packages: Vec<ContentPackage>) -> Self {
        Self {
            sync_id: SyncId::new(),
            total_size_bytes: packages.iter().map(|p| p.size_bytes).sum(),
            content_packages: packages,
            download_urls: None,
        }
    }

    /// Add a download location for a package.
    pub fn with_download_url(mut self, package_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.download_urls
            .get_or_insert_with(HashMap::new)
            .insert(package_id.into(), url.into());
        self
    }

    /// Download location for a package, if the catalog supplied one.
    pub fn download_url(&self, package_id: &str) -> Option<&str> {
        self.download_urls
            .as_ref()
            .and_then(|urls| urls.get(package_id))
            .map(String::as_str)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, PlayaError> {
        serde_json::to_vec(self).map_err(PlayaError::Serialization)
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, PlayaError> {
        serde_json::from_slice(bytes).map_err(PlayaError::Deserialization)
    }
}
