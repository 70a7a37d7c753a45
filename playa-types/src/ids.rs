//! Identity types for playa.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the device holding the offline content.
///
/// Opaque string on the wire. Freshly provisioned devices get a UUID v4.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap an existing device identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random DeviceId.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(8).collect();
        write!(f, "DeviceId({})", short)
    }
}

/// Identifier of the event whose content and unlock state are tracked.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wrap an event identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

/// Identifier the catalog assigns to a sync response.
///
/// Opaque string on the wire. Locally built responses use a UUID v4.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(String);

impl SyncId {
    /// Create a new random SyncId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an identifier issued by a catalog.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_device_ids_differ() {
        assert_ne!(DeviceId::random(), DeviceId::random());
    }

    #[test]
    fn device_id_serializes_as_plain_string() {
        let id = DeviceId::new("phone-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"phone-7\"");
    }

    #[test]
    fn device_id_debug_is_truncated() {
        let id = DeviceId::new("0123456789abcdef");
        assert_eq!(format!("{:?}", id), "DeviceId(01234567)");
    }

    #[test]
    fn short_device_id_debug_does_not_panic() {
        let id = DeviceId::new("ab");
        assert_eq!(format!("{:?}", id), "DeviceId(ab)");
    }

    #[test]
    fn new_sync_id_is_uuid_v4() {
        let id = SyncId::new();
        let parsed = uuid::Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn sync_id_accepts_any_string() {
        let id: SyncId = serde_json::from_str("\"catalog-2026-04-17\"").unwrap();
        assert_eq!(id, SyncId::from_string("catalog-2026-04-17"));
        assert_eq!(id.to_string(), "catalog-2026-04-17");
    }

    #[test]
    fn event_id_display() {
        assert_eq!(EventId::new("afrikaburn-2026").to_string(), "afrikaburn-2026");
    }
}
