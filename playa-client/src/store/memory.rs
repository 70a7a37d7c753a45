//! In-memory state store for testing.
//!
//! Allows injecting commit failures and counting writes.

use super::{StateStore, StoreError};
use async_trait::async_trait;
use playa_types::{DeviceId, EventId, SyncSnapshot, UnlockState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory state store.
///
/// Clones share the same records. Not persistent.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<MemoryStateStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStateStoreInner {
    unlock: HashMap<EventId, UnlockState>,
    snapshots: HashMap<DeviceId, SyncSnapshot>,
    commits: usize,
    fail_next_commit: Option<String>,
    fail_commits_after: Option<usize>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cause the next commit to fail with the given error.
    pub fn fail_next_commit(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_commit = Some(error.to_string());
    }

    /// Let `n` more commits succeed, then fail every commit after them.
    pub fn fail_commits_after(&self, n: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_commits_after = Some(inner.commits + n);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.inner.lock().unwrap().commits
    }

    /// Stored unlock record, bypassing the async API.
    pub fn unlock_record(&self, event_id: &EventId) -> Option<UnlockState> {
        self.inner.lock().unwrap().unlock.get(event_id).copied()
    }

    /// Stored snapshot, bypassing the async API.
    pub fn snapshot(&self, device_id: &DeviceId) -> Option<SyncSnapshot> {
        self.inner.lock().unwrap().snapshots.get(device_id).cloned()
    }

    /// Seed a snapshot directly.
    pub fn insert_snapshot(&self, snapshot: SyncSnapshot) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .snapshots
            .insert(snapshot.session.device_id.clone(), snapshot);
    }
}

impl MemoryStateStoreInner {
    fn check_commit(&mut self) -> Result<(), StoreError> {
        // Check for forced failure
        if let Some(error) = self.fail_next_commit.take() {
            return Err(StoreError::Unavailable(error));
        }
        if self.fail_commits_after.is_some_and(|limit| self.commits >= limit) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.commits += 1;
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_unlock_state(
        &self,
        event_id: &EventId,
    ) -> Result<Option<UnlockState>, StoreError> {
        Ok(self.unlock_record(event_id))
    }

    async fn commit_unlock_state(
        &self,
        event_id: &EventId,
        state: &UnlockState,
    ) -> Result<UnlockState, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_commit()?;
        let stored = inner.unlock.entry(event_id.clone()).or_insert(*state);
        if !stored.is_unlocked {
            *stored = *state;
        }
        Ok(*stored)
    }

    async fn load_sync_snapshot(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<SyncSnapshot>, StoreError> {
        Ok(self.snapshot(device_id))
    }

    async fn commit_sync_snapshot(&self, snapshot: &SyncSnapshot) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.check_commit()?;
        inner
            .snapshots
            .insert(snapshot.session.device_id.clone(), snapshot.clone());
        Ok(())
    }
}
