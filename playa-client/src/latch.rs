//! Persisted one-way unlock gate.
//!
//! [`UnlockLatch`] wraps the pure [`LatchState`] machine from `playa-core`
//! and performs the durable write it asks for. The in-memory state only
//! moves to `Unlocked` after the store accepted the record, so a latch that
//! reports unlocked is always unlocked on disk too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use playa_core::{
    unlock_condition, Clock, EventWindow, GeofenceEvaluator, LatchAction, LatchState,
};
use playa_types::{EventId, LocationSample};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::store::{StateStore, StoreError};

/// Unlock latch errors.
#[derive(Debug, Error)]
pub enum LatchError {
    /// Reading or writing the unlock record failed.
    #[error("unlock persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

/// One-way gate over the event date and geofence, persisted per event.
pub struct UnlockLatch<S, C> {
    store: S,
    clock: C,
    window: EventWindow,
    geofence: GeofenceEvaluator,
    event_id: EventId,
    state: RwLock<LatchState>,
    bypass: AtomicBool,
    // Set while a commit is in flight. Still set on entry means the commit
    // future was dropped and the stored record is unknown.
    pending_commit: AtomicBool,
}

impl<S: StateStore, C: Clock> UnlockLatch<S, C> {
    /// Load the latch for the window's event from `store`.
    pub async fn load(store: S, clock: C, window: EventWindow) -> Result<Self, LatchError> {
        let event_id = EventId::new(window.config().event_id.clone());
        let record = store.load_unlock_state(&event_id).await?;
        let state = LatchState::from_record(record);
        debug!(event = %event_id.as_str(), unlocked = state.is_unlocked(), "Loaded unlock state");

        Ok(Self {
            store,
            clock,
            geofence: GeofenceEvaluator::for_event(&window),
            window,
            event_id,
            state: RwLock::new(state),
            bypass: AtomicBool::new(false),
            pending_commit: AtomicBool::new(false),
        })
    }

    /// Force `is_unlocked` to report true without touching the store.
    /// Disabling it falls back to the persisted value.
    pub fn set_bypass(&self, enabled: bool) {
        self.bypass.store(enabled, Ordering::SeqCst);
        debug!(enabled, "Unlock bypass changed");
    }

    /// Whether the debug bypass is on.
    pub fn is_bypassed(&self) -> bool {
        self.bypass.load(Ordering::SeqCst)
    }

    /// Whether gated features should be visible.
    ///
    /// Evaluates the unlock condition and latches it if it holds. A failed
    /// write surfaces as [`LatchError::Persistence`] and leaves the latch
    /// locked.
    pub async fn is_unlocked(&self, location: Option<&LocationSample>) -> Result<bool, LatchError> {
        if self.is_bypassed() {
            return Ok(true);
        }
        self.evaluate(location).await
    }

    /// Evaluate and latch the condition, ignoring the bypass.
    pub async fn check_and_update_unlock_state(
        &self,
        location: Option<&LocationSample>,
    ) -> Result<(), LatchError> {
        self.evaluate(location).await.map(|_| ())
    }

    /// Persisted latch value, ignoring the bypass and the current condition.
    pub async fn is_latched(&self) -> bool {
        self.state.read().await.is_unlocked()
    }

    /// When the latch was set, if it was.
    pub async fn unlocked_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.unlocked_at()
    }

    /// Distance from a point to the event center.
    pub fn distance_to_center_km(&self, latitude: f64, longitude: f64) -> f64 {
        self.geofence.distance_to_center_km(latitude, longitude)
    }

    /// Event window this latch evaluates.
    pub fn window(&self) -> &EventWindow {
        &self.window
    }

    async fn evaluate(&self, location: Option<&LocationSample>) -> Result<bool, LatchError> {
        // Unlocked in memory implies unlocked on disk.
        if self.state.read().await.is_unlocked() {
            return Ok(true);
        }

        let mut state = self.state.write().await;
        if self.pending_commit.swap(false, Ordering::SeqCst) {
            let record = self.store.load_unlock_state(&self.event_id).await?;
            *state = LatchState::from_record(record);
            debug!(unlocked = state.is_unlocked(), "Reloaded unlock state after interrupted commit");
        }
        if state.is_unlocked() {
            return Ok(true);
        }

        let now = self.clock.now();
        let condition = unlock_condition(&self.window, &self.geofence, now, location);
        let (_, action) = state.on_check(condition, now);

        if let Some(LatchAction::Persist(record)) = action {
            self.pending_commit.store(true, Ordering::SeqCst);
            let result = self.store.commit_unlock_state(&self.event_id, &record).await;
            self.pending_commit.store(false, Ordering::SeqCst);

            let stored = match result {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(error = %e, "Failed to persist unlock state");
                    return Err(e.into());
                }
            };
            // Another latch on the same store may have unlocked first
            *state = LatchState::from_record(Some(stored));
            info!(
                event = %self.event_id.as_str(),
                at = ?state.unlocked_at(),
                "Unlock persisted"
            );
        }

        Ok(state.is_unlocked())
    }
}

/// Feed location samples into the latch until it latches, the stream
/// closes, or `cancel` fires.
///
/// Each sample is evaluated once. Errors are logged and the watcher keeps
/// going.
pub fn spawn_location_watcher<S, C>(
    latch: Arc<UnlockLatch<S, C>>,
    mut samples: mpsc::Receiver<LocationSample>,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    S: StateStore + 'static,
    C: Clock + 'static,
{
    tokio::spawn(async move {
        if latch.is_latched().await {
            debug!("Latch already set, location watcher not needed");
            return;
        }

        loop {
            let sample = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Location watcher cancelled");
                    break;
                }
                sample = samples.recv() => sample,
            };

            let Some(sample) = sample else {
                debug!("Location stream closed");
                break;
            };

            if let Err(e) = latch.check_and_update_unlock_state(Some(&sample)).await {
                warn!(error = %e, "Unlock check failed");
                continue;
            }
            if latch.is_latched().await {
                info!("Unlock latched, location watcher stopping");
                break;
            }
        }
    })
}
