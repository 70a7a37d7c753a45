//! Durable state port.
//!
//! The unlock record and the sync snapshot live behind [`StateStore`], so
//! the latch and the orchestrator stay storage-agnostic. Every commit is
//! all-or-nothing: after an error the previously stored value is intact.

mod memory;

pub use memory::MemoryStateStore;

use async_trait::async_trait;
use playa_types::{DeviceId, EventId, SyncSnapshot, UnlockState};
use thiserror::Error;

/// State store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be encoded or decoded.
    #[error("record serialization error: {0}")]
    Serialization(String),

    /// Database backend failure.
    #[error("database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable key-value records for one device.
///
/// Implementations must make each `commit_*` atomic.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the unlock record for an event.
    async fn load_unlock_state(&self, event_id: &EventId)
        -> Result<Option<UnlockState>, StoreError>;

    /// Write the unlock record for an event unless an unlocked record is
    /// already stored. Returns the record stored after the call, which is
    /// the earlier one when another writer got there first.
    async fn commit_unlock_state(
        &self,
        event_id: &EventId,
        state: &UnlockState,
    ) -> Result<UnlockState, StoreError>;

    /// Load the sync session and installed set for a device.
    async fn load_sync_snapshot(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<SyncSnapshot>, StoreError>;

    /// Replace the sync session and installed set for a device.
    async fn commit_sync_snapshot(&self, snapshot: &SyncSnapshot) -> Result<(), StoreError>;
}
