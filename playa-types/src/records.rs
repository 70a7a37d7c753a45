//! Records persisted by the durable state store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DeviceId, EventId, InstalledPackage};

/// Persisted unlock latch value.
///
/// Once `is_unlocked` is true it is never written back to false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnlockState {
    /// Whether the latch has been set.
    pub is_unlocked: bool,
    /// When the latch was set.
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl UnlockState {
    /// The latched state, set at `at`.
    pub fn unlocked(at: DateTime<Utc>) -> Self {
        Self {
            is_unlocked: true,
            unlocked_at: Some(at),
        }
    }
}

/// Per-device sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSession {
    /// Device this session belongs to.
    pub device_id: DeviceId,
    /// Event whose content is synced.
    pub event_id: EventId,
    /// Completion time of the last successful full sync.
    pub last_full_sync_at: Option<DateTime<Utc>>,
    /// Completion time of the last successful incremental sync.
    pub last_incremental_sync_at: Option<DateTime<Utc>>,
    /// Sum of installed package sizes.
    pub storage_used_bytes: u64,
    /// Error from the most recent session, cleared on success.
    pub error_message: Option<String>,
}

impl SyncSession {
    /// A session that has never synced.
    pub fn new(device_id: DeviceId, event_id: EventId) -> Self {
        Self {
            device_id,
            event_id,
            last_full_sync_at: None,
            last_incremental_sync_at: None,
            storage_used_bytes: 0,
            error_message: None,
        }
    }

    /// Most recent successful sync of either kind, as Unix milliseconds.
    ///
    /// Zero when the device has never synced.
    pub fn last_sync_timestamp(&self) -> i64 {
        self.last_full_sync_at
            .max(self.last_incremental_sync_at)
            .map(|t| t.timestamp_millis())
            .unwrap_or(0)
    }
}

/// Session plus the installed set, committed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// Sync bookkeeping.
    pub session: SyncSession,
    /// Packages currently on the device.
    pub installed: Vec<InstalledPackage>,
}

impl SyncSnapshot {
    /// An empty snapshot for a device that has never synced.
    pub fn empty(device_id: DeviceId, event_id: EventId) -> Self {
        Self {
            session: SyncSession::new(device_id, event_id),
            installed: Vec::new(),
        }
    }

    /// Sum of installed package sizes.
    pub fn installed_bytes(&self) -> u64 {
        self.installed.iter().map(|p| p.package.size_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_unlock_state_is_locked() {
        let state = UnlockState::default();
        assert!(!state.is_unlocked);
        assert_eq!(state.unlocked_at, None);
    }

    #[test]
    fn last_sync_timestamp_picks_latest() {
        let mut session = SyncSession::new(DeviceId::new("d"), EventId::new("e"));
        assert_eq!(session.last_sync_timestamp(), 0);

        let full = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let incr = Utc.with_ymd_and_hms(2026, 4, 2, 0, 0, 0).unwrap();
        session.last_full_sync_at = Some(full);
        assert_eq!(session.last_sync_timestamp(), full.timestamp_millis());

        session.last_incremental_sync_at = Some(incr);
        assert_eq!(session.last_sync_timestamp(), incr.timestamp_millis());
    }

    #[test]
    fn unlock_state_wire_shape() {
        let at = Utc.with_ymd_and_hms(2026, 4, 27, 9, 30, 0).unwrap();
        let value = serde_json::to_value(UnlockState::unlocked(at)).unwrap();
        assert_eq!(value["is_unlocked"], true);
        assert!(value["unlocked_at"].is_string());
    }
}
