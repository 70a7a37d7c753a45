//! # playa-store
//!
//! SQLite implementation of the playa [`StateStore`](playa_client::StateStore).
//!
//! Holds the per-event unlock record, the per-device sync session and the
//! installed package set. Every commit runs in one transaction, so a failed
//! write leaves the previous record in place.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod sqlite;

pub use error::StorageError;
pub use sqlite::SqliteStateStore;
