//! Mock catalog for testing.
//!
//! Allows queueing responses, injecting failures and capturing requests
//! for verification.

use super::{CatalogError, CatalogProvider};
use crate::cancel::CancellationToken;
use async_trait::async_trait;
use playa_types::{ContentPackage, FullSyncRequest, IncrementalSyncRequest, SyncResponse};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock catalog for testing.
///
/// Packages without an explicit payload download as `size_bytes` zero
/// bytes. Clones share the same state.
#[derive(Debug, Default, Clone)]
pub struct MockCatalog {
    inner: Arc<Mutex<MockCatalogInner>>,
}

#[derive(Debug, Default)]
struct MockCatalogInner {
    offline: bool,
    full_queue: VecDeque<SyncResponse>,
    incremental_queue: VecDeque<SyncResponse>,
    payloads: HashMap<String, Vec<u8>>,
    missing: HashSet<String>,
    full_requests: Vec<FullSyncRequest>,
    incremental_requests: Vec<IncrementalSyncRequest>,
    downloads: Vec<(String, Option<String>)>,
    fail_next_download: Option<String>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockCatalog {
    /// Create a new mock catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next `fetch_full()` call.
    pub fn queue_full(&self, response: SyncResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.full_queue.push_back(response);
    }

    /// Queue a response for the next `fetch_incremental()` call.
    pub fn queue_incremental(&self, response: SyncResponse) {
        let mut inner = self.inner.lock().unwrap();
        inner.incremental_queue.push_back(response);
    }

    /// Serve `bytes` for a package id.
    pub fn set_payload(&self, package_id: &str, bytes: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.payloads.insert(package_id.to_string(), bytes);
    }

    /// Answer downloads of this package id with `NotFound`.
    pub fn set_missing(&self, package_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.missing.insert(package_id.to_string());
    }

    /// Make every call fail with `Offline` until switched back.
    pub fn set_offline(&self, offline: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.offline = offline;
    }

    /// Cause the next download to fail with `Offline`.
    pub fn fail_next_download(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_download = Some(error.to_string());
    }

    /// Cancel `token` once `n` downloads have been served.
    pub fn cancel_after_downloads(&self, n: usize, token: CancellationToken) {
        let mut inner = self.inner.lock().unwrap();
        inner.cancel_after = Some((n, token));
    }

    /// Full sync requests received so far.
    pub fn full_requests(&self) -> Vec<FullSyncRequest> {
        let inner = self.inner.lock().unwrap();
        inner.full_requests.clone()
    }

    /// Incremental sync requests received so far.
    pub fn incremental_requests(&self) -> Vec<IncrementalSyncRequest> {
        let inner = self.inner.lock().unwrap();
        inner.incremental_requests.clone()
    }

    /// Ids of packages served, in order.
    pub fn downloaded_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner.downloads.iter().map(|(id, _)| id.clone()).collect()
    }

    /// URLs passed to `download()`, in order.
    pub fn download_urls(&self) -> Vec<Option<String>> {
        let inner = self.inner.lock().unwrap();
        inner.downloads.iter().map(|(_, url)| url.clone()).collect()
    }
}

impl MockCatalogInner {
    fn check_online(&self) -> Result<(), CatalogError> {
        if self.offline {
            return Err(CatalogError::Offline("mock catalog offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogProvider for MockCatalog {
    async fn fetch_full(&self, request: &FullSyncRequest) -> Result<SyncResponse, CatalogError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_online()?;
        inner.full_requests.push(request.clone());
        inner
            .full_queue
            .pop_front()
            .ok_or_else(|| CatalogError::InvalidResponse("no full response queued".into()))
    }

    async fn fetch_incremental(
        &self,
        request: &IncrementalSyncRequest,
    ) -> Result<SyncResponse, CatalogError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_online()?;
        inner.incremental_requests.push(request.clone());
        inner
            .incremental_queue
            .pop_front()
            .ok_or_else(|| CatalogError::InvalidResponse("no incremental response queued".into()))
    }

    async fn download(
        &self,
        package: &ContentPackage,
        url: Option<&str>,
    ) -> Result<Vec<u8>, CatalogError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_online()?;

        // Check for forced failure
        if let Some(error) = inner.fail_next_download.take() {
            return Err(CatalogError::Offline(error));
        }
        if inner.missing.contains(&package.id) {
            return Err(CatalogError::NotFound {
                package_id: package.id.clone(),
            });
        }

        let bytes = inner
            .payloads
            .get(&package.id)
            .cloned()
            .unwrap_or_else(|| vec![0u8; package.size_bytes as usize]);
        inner
            .downloads
            .push((package.id.clone(), url.map(str::to_string)));

        let served = inner.downloads.len();
        if let Some((after, token)) = &inner.cancel_after {
            if served >= *after {
                token.cancel();
            }
        }
        Ok(bytes)
    }
}
