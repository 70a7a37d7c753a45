//! # playa-client
//!
//! Runtime side of the playa offline kit.
//!
//! ## Features
//!
//! - **Unlock latch**: persisted one-way gate over event date and geofence
//! - **Content sync**: priority admission over a storage budget, with
//!   ordered progress and cooperative cancellation
//! - **Pluggable ports**: durable state, content catalog and package bytes
//!   are traits with in-memory implementations for tests
//! - **Pure core**: decisions come from `playa-core`; this crate performs
//!   the I/O they call for
//!
//! ## Example
//!
//! ```ignore
//! use playa_client::{MemoryStateStore, UnlockLatch};
//! use playa_core::{EventConfig, EventWindow, SystemClock};
//!
//! let window = EventWindow::new(EventConfig::default())?;
//! let latch = UnlockLatch::load(MemoryStateStore::new(), SystemClock, window).await?;
//!
//! if latch.is_unlocked(Some(&sample)).await? {
//!     // show gated features
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod catalog;
pub mod latch;
pub mod orchestrator;
pub mod packages;
pub mod store;

pub use cancel::CancellationToken;
pub use catalog::{CatalogError, CatalogProvider, DirectoryCatalog, MockCatalog};
pub use latch::{spawn_location_watcher, LatchError, UnlockLatch};
pub use orchestrator::{PackageFailure, SyncError, SyncOrchestrator, SyncResult, SyncSettings};
pub use packages::{DirectoryPackageStore, MemoryPackageStore, PackageStore, PackageStoreError};
pub use store::{MemoryStateStore, StateStore, StoreError};
