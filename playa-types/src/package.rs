//! Catalog entries and location samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::PlayaError;

/// Kind of content a package carries or a screen wants to show.
///
/// Closed set; access rules are defined per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    /// Safety information (always available).
    Safety,
    /// Emergency contacts and procedures (always available).
    Emergency,
    /// Event map.
    Map,
    /// Theme camp listings.
    ThemeCamp,
    /// Art installation details.
    ArtInstallation,
    /// Performance schedule.
    Performance,
    /// Hidden content discovered at a specific spot.
    EasterEgg,
}

impl ContentType {
    /// All content types, in declaration order.
    pub const ALL: [ContentType; 7] = [
        ContentType::Safety,
        ContentType::Emergency,
        ContentType::Map,
        ContentType::ThemeCamp,
        ContentType::ArtInstallation,
        ContentType::Performance,
        ContentType::EasterEgg,
    ];

    /// Wire name of this content type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Safety => "SAFETY",
            ContentType::Emergency => "EMERGENCY",
            ContentType::Map => "MAP",
            ContentType::ThemeCamp => "THEME_CAMP",
            ContentType::ArtInstallation => "ART_INSTALLATION",
            ContentType::Performance => "PERFORMANCE",
            ContentType::EasterEgg => "EASTER_EGG",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = PlayaError;

    /// Accepts the wire name in any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        ContentType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| PlayaError::UnknownContentType(s.to_string()))
    }
}

/// A downloadable content package as published by the catalog.
///
/// Immutable once issued. A new `version` of the same `id` is a new
/// admission candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPackage {
    /// Unique package identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Lower number = more important.
    pub priority: i32,
    /// Declared size of the package payload.
    pub size_bytes: u64,
    /// Package version.
    pub version: i32,
    /// After this instant the package must not be admitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    /// Kind of content, used to group sync progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
}

impl ContentPackage {
    /// Create a package with no expiry and no content type.
    pub fn new(id: impl Into<String>, priority: i32, size_bytes: u64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            priority,
            size_bytes,
            version: 1,
            expiry_date: None,
            content_type: None,
        }
    }

    /// Set the version.
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Set the expiry instant.
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry_date = Some(expiry);
        self
    }

    /// Whether the package has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= now)
    }
}

/// A package that has been admitted and whose bytes are on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// The catalog entry that was admitted.
    pub package: ContentPackage,
    /// Hex-encoded BLAKE3 hash of the stored bytes.
    pub content_hash: String,
}

/// One reading from the location producer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Reported horizontal accuracy.
    pub accuracy_meters: f32,
    /// Unix timestamp of the fix in milliseconds.
    pub timestamp_ms: i64,
}

impl LocationSample {
    /// Create a sample with unknown accuracy and no timestamp.
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters: 0.0,
            timestamp_ms: 0,
        }
    }
}
