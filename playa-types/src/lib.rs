//! # playa-types
//!
//! Data model and wire shapes for the playa offline content kit.
//!
//! This crate provides the foundational types used across all playa crates:
//! - [`DeviceId`], [`EventId`], [`SyncId`] - Identity types
//! - [`ContentPackage`], [`ContentType`] - Catalog entries
//! - [`UnlockState`], [`SyncSession`], [`SyncSnapshot`] - Persisted records
//! - [`FullSyncRequest`], [`IncrementalSyncRequest`], [`SyncResponse`] - Catalog wire shapes
//! - [`PlayaError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod package;
mod records;
mod wire;

pub use error::PlayaError;
pub use ids::{DeviceId, EventId, SyncId};
pub use package::{ContentPackage, ContentType, InstalledPackage, LocationSample};
pub use records::{SyncSession, SyncSnapshot, UnlockState};
pub use wire::{
    FullSyncRequest, IncrementalSyncRequest, SyncResponse, DEFAULT_MAX_STORAGE_BYTES,
};
