//! Sync session driver.
//!
//! [`SyncOrchestrator`] runs one full or incremental session at a time:
//!
//! 1. Filter the catalog (expired, unchanged, not-installed-for-incremental).
//! 2. Run the allocator once over the installed set and the candidates.
//! 3. Apply the plan in order: download, verify size, store bytes, drop
//!    evicted packages, commit the snapshot.
//! 4. Stamp the session and emit exactly one terminal progress event.
//!
//! Phase bookkeeping is the pure [`SyncPhase`] machine from `playa-core`.
//! A start request while a session is running is ignored and reported as
//! `Ok(None)`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use playa_core::{
    admit, Clock, Placement, ProgressTracker, SyncEvent, SyncKind, SyncPhase, SyncProgress,
};
use playa_types::{
    ContentPackage, DeviceId, EventId, FullSyncRequest, IncrementalSyncRequest, InstalledPackage,
    SyncResponse, SyncSession, SyncSnapshot, DEFAULT_MAX_STORAGE_BYTES,
};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::catalog::{CatalogError, CatalogProvider};
use crate::packages::{parse_hash, PackageStore, PackageStoreError};
use crate::store::{StateStore, StoreError};

/// Sync errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Catalog unreachable; the caller decides when to retry.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// Cancellation observed between steps.
    #[error("sync cancelled")]
    Cancelled,

    /// Snapshot could not be loaded or committed.
    #[error("sync persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Catalog answered but the answer was unusable.
    #[error("catalog error: {0}")]
    Download(#[from] CatalogError),

    /// Package bytes could not be stored.
    #[error("package store error: {0}")]
    PackageStore(#[from] PackageStoreError),
}

/// Per-device sync parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// This device.
    pub device_id: DeviceId,
    /// Event whose catalog is synced.
    pub event_id: EventId,
    /// Storage budget for installed packages.
    pub capacity_bytes: u64,
    /// Package ids requested from the catalog regardless of priority.
    pub priority_packages: Option<Vec<String>>,
}

impl SyncSettings {
    /// Settings with the default budget.
    pub fn new(device_id: DeviceId, event_id: EventId) -> Self {
        Self {
            device_id,
            event_id,
            capacity_bytes: DEFAULT_MAX_STORAGE_BYTES,
            priority_packages: None,
        }
    }

    /// Override the storage budget.
    pub fn with_capacity(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }
}

/// A package whose transfer failed without ending the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFailure {
    /// The package.
    pub package: ContentPackage,
    /// Why it failed.
    pub error: String,
}

/// Outcome of a session that ran to the end.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncResult {
    /// Packages downloaded and installed, in application order.
    pub synced_packages: Vec<ContentPackage>,
    /// Candidates not admitted: expired, or no room.
    pub skipped_packages: Vec<ContentPackage>,
    /// Installed packages removed to make room.
    pub evicted_packages: Vec<ContentPackage>,
    /// Incremental entries for packages not installed; left for a full sync.
    pub deferred_packages: Vec<ContentPackage>,
    /// Admitted packages whose transfer failed.
    pub failed_packages: Vec<PackageFailure>,
    /// Storage in use after the session.
    pub total_used_bytes: u64,
    /// No package failed.
    pub success: bool,
}

/// Drives sync sessions against a state store and a package store.
pub struct SyncOrchestrator<S, P, C> {
    store: S,
    packages: P,
    clock: C,
    settings: SyncSettings,
    phase: Mutex<SyncPhase>,
    snapshot: RwLock<SyncSnapshot>,
}

impl<S, P, C> SyncOrchestrator<S, P, C>
where
    S: StateStore,
    P: PackageStore,
    C: Clock,
{
    /// Load the device's snapshot (or start empty) and build the driver.
    pub async fn load(store: S, packages: P, clock: C, settings: SyncSettings) -> Result<Self, SyncError> {
        let snapshot = match store.load_sync_snapshot(&settings.device_id).await? {
            Some(snapshot) => snapshot,
            None => SyncSnapshot::empty(settings.device_id.clone(), settings.event_id.clone()),
        };
        debug!(
            device = %settings.device_id,
            installed = snapshot.installed.len(),
            used = snapshot.session.storage_used_bytes,
            "Loaded sync snapshot"
        );

        Ok(Self {
            store,
            packages,
            clock,
            settings,
            phase: Mutex::new(SyncPhase::Idle),
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Settings in use.
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.lock_phase().clone()
    }

    /// Last committed snapshot.
    pub async fn snapshot(&self) -> SyncSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Last committed session record.
    pub async fn session(&self) -> SyncSession {
        self.snapshot.read().await.session.clone()
    }

    /// Request the full catalog from `catalog` and apply it.
    pub async fn full_sync(
        &self,
        catalog: &dyn CatalogProvider,
        progress: &mpsc::Sender<SyncProgress>,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncResult>, SyncError> {
        let Some(_session) = self.begin(SyncKind::Full) else {
            return Ok(None);
        };

        let request = self.full_request().await;
        let response = match catalog.fetch_full(&request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fetch_failed(e, progress).await),
        };
        self.execute(SyncKind::Full, catalog, response, progress, cancel)
            .await
            .map(Some)
    }

    /// Request changes since the last sync from `catalog` and apply them.
    pub async fn incremental_sync(
        &self,
        catalog: &dyn CatalogProvider,
        progress: &mpsc::Sender<SyncProgress>,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncResult>, SyncError> {
        let Some(_session) = self.begin(SyncKind::Incremental) else {
            return Ok(None);
        };

        let request = self.incremental_request().await;
        let response = match catalog.fetch_incremental(&request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fetch_failed(e, progress).await),
        };
        self.execute(SyncKind::Incremental, catalog, response, progress, cancel)
            .await
            .map(Some)
    }

    /// Apply an already-fetched full catalog. Bytes are downloaded from
    /// `catalog`, using the response's download URLs where given.
    pub async fn perform_full_sync(
        &self,
        catalog: &dyn CatalogProvider,
        response: SyncResponse,
        progress: &mpsc::Sender<SyncProgress>,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncResult>, SyncError> {
        let Some(_session) = self.begin(SyncKind::Full) else {
            return Ok(None);
        };
        self.execute(SyncKind::Full, catalog, response, progress, cancel)
            .await
            .map(Some)
    }

    /// Apply already-fetched updates. Only packages already installed are
    /// considered; the rest are reported as deferred.
    pub async fn perform_incremental_sync(
        &self,
        catalog: &dyn CatalogProvider,
        response: SyncResponse,
        progress: &mpsc::Sender<SyncProgress>,
        cancel: &CancellationToken,
    ) -> Result<Option<SyncResult>, SyncError> {
        let Some(_session) = self.begin(SyncKind::Incremental) else {
            return Ok(None);
        };
        self.execute(SyncKind::Incremental, catalog, response, progress, cancel)
            .await
            .map(Some)
    }

    /// Wire request for a full sync.
    pub async fn full_request(&self) -> FullSyncRequest {
        let snapshot = self.snapshot.read().await;
        FullSyncRequest {
            device_id: self.settings.device_id.clone(),
            event_id: self.settings.event_id.clone(),
            max_storage_bytes: self.settings.capacity_bytes,
            priority_packages: self.settings.priority_packages.clone(),
            last_sync_timestamp: snapshot.session.last_sync_timestamp(),
        }
    }

    /// Wire request for an incremental sync.
    pub async fn incremental_request(&self) -> IncrementalSyncRequest {
        let snapshot = self.snapshot.read().await;
        IncrementalSyncRequest {
            device_id: self.settings.device_id.clone(),
            event_id: self.settings.event_id.clone(),
            last_sync_timestamp: snapshot.session.last_sync_timestamp(),
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, SyncPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, event: SyncEvent) -> Option<SyncProgress> {
        let mut phase = self.lock_phase();
        let (next, out) = std::mem::take(&mut *phase).on_event(event);
        *phase = next;
        out
    }

    fn begin(&self, kind: SyncKind) -> Option<SessionGuard<'_>> {
        let mut phase = self.lock_phase();
        if !phase.is_idle() {
            debug!(?kind, phase = ?*phase, "Sync already running, start ignored");
            return None;
        }
        let (next, _) = std::mem::take(&mut *phase).on_event(SyncEvent::StartRequested { kind });
        *phase = next;
        info!(?kind, device = %self.settings.device_id, "Sync started");
        Some(SessionGuard { phase: &self.phase })
    }

    /// Emit the terminal event for `event` and return to idle.
    async fn finish(&self, event: SyncEvent, progress: &mpsc::Sender<SyncProgress>) {
        if let Some(out) = self.transition(event) {
            emit(progress, out).await;
        }
        self.transition(SyncEvent::Reset);
    }

    async fn fetch_failed(&self, error: CatalogError, progress: &mpsc::Sender<SyncProgress>) -> SyncError {
        if error.is_offline() {
            let message = error.to_string();
            warn!(error = %message, "Catalog unreachable");
            self.record_failure(&message).await;
            self.finish(SyncEvent::WentOffline { message: message.clone() }, progress)
                .await;
            SyncError::NetworkUnavailable(message)
        } else {
            self.abort(error.into(), progress).await
        }
    }

    async fn abort(&self, error: SyncError, progress: &mpsc::Sender<SyncProgress>) -> SyncError {
        let message = error.to_string();
        warn!(error = %message, "Sync failed");
        self.record_failure(&message).await;
        self.finish(SyncEvent::Failed { error: message }, progress).await;
        error
    }

    async fn cancelled(&self, progress: &mpsc::Sender<SyncProgress>) -> SyncError {
        info!("Sync cancelled");
        self.finish(SyncEvent::Cancelled, progress).await;
        SyncError::Cancelled
    }

    /// Best-effort write of the failure message; a store that is down
    /// already explains the failure.
    async fn record_failure(&self, message: &str) {
        let mut next = self.snapshot.read().await.clone();
        next.session.error_message = Some(message.to_string());
        match self.store.commit_sync_snapshot(&next).await {
            Ok(()) => *self.snapshot.write().await = next,
            Err(e) => warn!(error = %e, "Failed to record sync error"),
        }
    }

    async fn execute(
        &self,
        kind: SyncKind,
        catalog: &dyn CatalogProvider,
        response: SyncResponse,
        progress: &mpsc::Sender<SyncProgress>,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, SyncError> {
        if cancel.is_cancelled() {
            return Err(self.cancelled(progress).await);
        }

        let now = self.clock.now();
        let mut working = self.snapshot.read().await.clone();
        let mut result = SyncResult::default();

        let candidates = select_candidates(kind, &working, &response, now, &mut result);
        let installed: Vec<ContentPackage> =
            working.installed.iter().map(|i| i.package.clone()).collect();
        let admission = admit(&installed, &candidates, self.settings.capacity_bytes);
        result.skipped_packages.extend(admission.skipped.iter().cloned());

        debug!(
            candidates = candidates.len(),
            planned = admission.plan.len(),
            skipped = result.skipped_packages.len(),
            "Admission planned"
        );
        self.transition(SyncEvent::CatalogReady {
            packages: admission.plan.len(),
        });

        let mut tracker = ProgressTracker::new(admission.plan.iter().map(|p| &p.package));

        for placement in &admission.plan {
            if cancel.is_cancelled() {
                return Err(self.cancelled(progress).await);
            }

            let package = &placement.package;
            let url = response.download_url(&package.id);
            let bytes = match catalog.download(package, url).await {
                Ok(bytes) => bytes,
                Err(e) if e.is_offline() => {
                    let message = e.to_string();
                    warn!(package = %package.id, error = %message, "Catalog went offline");
                    self.record_failure(&message).await;
                    self.finish(SyncEvent::WentOffline { message: message.clone() }, progress)
                        .await;
                    return Err(SyncError::NetworkUnavailable(message));
                }
                Err(e) => {
                    self.skip_placement(&mut working, placement, e.to_string(), &mut result)
                        .await?;
                    continue;
                }
            };

            let actual = bytes.len() as u64;
            if actual != package.size_bytes {
                let error = CatalogError::SizeMismatch {
                    package_id: package.id.clone(),
                    expected: package.size_bytes,
                    actual,
                };
                self.skip_placement(&mut working, placement, error.to_string(), &mut result)
                    .await?;
                continue;
            }

            let hash = match self.packages.put(&bytes).await {
                Ok(hash) => hash,
                Err(e) => return Err(self.abort(e.into(), progress).await),
            };

            let mut next = working.clone();
            let mut released = remove_evicted(&mut next, &placement.evicts);
            released.extend(remove_other_versions(&mut next, package));
            next.installed.push(InstalledPackage {
                package: package.clone(),
                content_hash: hex::encode(hash),
            });
            next.session.storage_used_bytes = next.installed_bytes();

            if let Err(e) = self.commit(&next).await {
                self.release_unreferenced(&working, [hex::encode(hash)]).await;
                return Err(self.abort(e, progress).await);
            }
            working = next;

            info!(
                package = %package.id,
                version = package.version,
                evicted = placement.evicts.len(),
                used = working.session.storage_used_bytes,
                "Package installed"
            );
            self.release_unreferenced(&working, released.into_iter().map(|i| i.content_hash))
                .await;

            result.synced_packages.push(package.clone());
            result.evicted_packages.extend(placement.evicts.iter().cloned());
            emit(progress, tracker.record(package)).await;
            self.transition(SyncEvent::PackageApplied);
        }

        result.success = result.failed_packages.is_empty();
        let finished_at = self.clock.now();
        let mut next = working.clone();
        next.session.storage_used_bytes = next.installed_bytes();
        if result.success {
            stamp(&mut next.session, kind, finished_at);
            next.session.error_message = None;
        } else {
            next.session.error_message = Some(failure_summary(&result.failed_packages));
        }
        if let Err(e) = self.commit(&next).await {
            return Err(self.abort(e, progress).await);
        }
        result.total_used_bytes = next.session.storage_used_bytes;

        let terminal = match &next.session.error_message {
            None => SyncEvent::Finished {
                total_bytes: result.total_used_bytes,
            },
            Some(summary) => SyncEvent::Failed {
                error: summary.clone(),
            },
        };
        info!(
            ?kind,
            synced = result.synced_packages.len(),
            skipped = result.skipped_packages.len(),
            evicted = result.evicted_packages.len(),
            failed = result.failed_packages.len(),
            used = result.total_used_bytes,
            "Sync finished"
        );
        self.finish(terminal, progress).await;
        Ok(result)
    }

    /// Record a failed transfer. The placement's evictions are still
    /// applied, so later placements keep the budget the allocator computed.
    async fn skip_placement(
        &self,
        working: &mut SyncSnapshot,
        placement: &Placement,
        error: String,
        result: &mut SyncResult,
    ) -> Result<(), SyncError> {
        warn!(package = %placement.package.id, error = %error, "Package transfer failed");
        result.failed_packages.push(PackageFailure {
            package: placement.package.clone(),
            error,
        });

        if placement.evicts.is_empty() {
            return Ok(());
        }
        let mut next = working.clone();
        let released = remove_evicted(&mut next, &placement.evicts);
        next.session.storage_used_bytes = next.installed_bytes();
        self.commit(&next).await?;
        *working = next;
        self.release_unreferenced(working, released.into_iter().map(|i| i.content_hash))
            .await;
        result.evicted_packages.extend(placement.evicts.iter().cloned());
        Ok(())
    }

    async fn commit(&self, next: &SyncSnapshot) -> Result<(), SyncError> {
        self.store.commit_sync_snapshot(next).await?;
        *self.snapshot.write().await = next.clone();
        Ok(())
    }

    /// Delete stored bytes no installed package refers to. Failures only
    /// leak disk space, so they are logged.
    async fn release_unreferenced(
        &self,
        snapshot: &SyncSnapshot,
        hashes: impl IntoIterator<Item = String>,
    ) {
        for hex_hash in hashes {
            if snapshot.installed.iter().any(|i| i.content_hash == hex_hash) {
                continue;
            }
            let removed = match parse_hash(&hex_hash) {
                Ok(hash) => self.packages.remove(&hash).await,
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                warn!(hash = %hex_hash, error = %e, "Failed to release package content");
            }
        }
    }
}

/// Returns the phase to idle if a session future is dropped mid-flight.
struct SessionGuard<'a> {
    phase: &'a Mutex<SyncPhase>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if phase.is_active() {
            *phase = SyncPhase::Idle;
        }
    }
}

async fn emit(progress: &mpsc::Sender<SyncProgress>, event: SyncProgress) {
    if progress.send(event).await.is_err() {
        debug!("Progress receiver dropped");
    }
}

/// Split the catalog into allocator candidates and packages reported
/// straight into `result`.
fn select_candidates(
    kind: SyncKind,
    snapshot: &SyncSnapshot,
    response: &SyncResponse,
    now: DateTime<Utc>,
    result: &mut SyncResult,
) -> Vec<ContentPackage> {
    let mut candidates = Vec::new();
    for package in &response.content_packages {
        if package.is_expired(now) {
            debug!(package = %package.id, "Skipping expired package");
            result.skipped_packages.push(package.clone());
            continue;
        }

        let installed = || snapshot.installed.iter().filter(|i| i.package.id == package.id);
        let is_installed = installed().next().is_some();
        let unchanged = installed().any(|i| i.package.version == package.version);

        if kind == SyncKind::Incremental && !is_installed {
            result.deferred_packages.push(package.clone());
        } else if !unchanged {
            candidates.push(package.clone());
        }
    }
    candidates
}

/// Remove evicted packages (matched by id and version) and return them.
fn remove_evicted(snapshot: &mut SyncSnapshot, evicts: &[ContentPackage]) -> Vec<InstalledPackage> {
    let mut removed = Vec::new();
    for victim in evicts {
        if let Some(pos) = snapshot
            .installed
            .iter()
            .position(|i| i.package.id == victim.id && i.package.version == victim.version)
        {
            removed.push(snapshot.installed.remove(pos));
        }
    }
    removed
}

/// Remove installed versions of `package.id` other than `package.version`.
fn remove_other_versions(snapshot: &mut SyncSnapshot, package: &ContentPackage) -> Vec<InstalledPackage> {
    let (replaced, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut snapshot.installed)
        .into_iter()
        .partition(|i| i.package.id == package.id && i.package.version != package.version);
    snapshot.installed = kept;
    replaced
}

fn stamp(session: &mut SyncSession, kind: SyncKind, at: DateTime<Utc>) {
    match kind {
        SyncKind::Full => session.last_full_sync_at = Some(at),
        SyncKind::Incremental => session.last_incremental_sync_at = Some(at),
    }
}

fn failure_summary(failures: &[PackageFailure]) -> String {
    let ids: Vec<&str> = failures.iter().map(|f| f.package.id.as_str()).collect();
    format!("{} package(s) failed: {}", failures.len(), ids.join(", "))
}
