//! # playa-core
//!
//! Pure logic for the playa offline kit (no I/O, instant tests).
//!
//! This crate implements the rules, state machines and algorithms without
//! any network, disk or wall-clock access:
//! - [`geo`] - haversine distance
//! - [`clock`] - injected time source
//! - [`window`] - event calendar ("has it started", "is it on")
//! - [`geofence`] - proximity to the event center
//! - [`unlock`] - the one-way unlock condition
//! - [`access`] - per-content-type access rules
//! - [`allocator`] - priority admission/eviction over a byte budget
//! - [`sync_state`] - sync session phases
//!
//! The actual I/O (catalog downloads, durable writes, location streams) is
//! performed by `playa-client`, which drives these pieces.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod allocator;
pub mod clock;
pub mod geo;
pub mod geofence;
pub mod sync_state;
pub mod unlock;
pub mod window;

pub use access::{AccessDecision, ContentAccessValidator, LocationRequirement};
pub use allocator::{admit, Admission, Placement};
pub use clock::{Clock, FixedClock, SystemClock};
pub use geo::{distance_km, distance_m, EARTH_RADIUS_KM};
pub use geofence::GeofenceEvaluator;
pub use sync_state::{ProgressTracker, SyncEvent, SyncKind, SyncPhase, SyncProgress};
pub use unlock::{unlock_condition, LatchAction, LatchState};
pub use window::{EventConfig, EventConfigError, EventWindow};
