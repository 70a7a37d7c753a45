//! One-way unlock latch: the condition and the state transitions.
//!
//! The latch has two states, `Locked` and `Unlocked`, and only one
//! transition between them. This module decides *when* to transition and
//! what must be persisted; `playa-client` performs the durable write.

use chrono::{DateTime, Utc};
use playa_types::{LocationSample, UnlockState};

use crate::geofence::GeofenceEvaluator;
use crate::window::EventWindow;

/// Whether the unlock condition currently holds.
///
/// True once the event has started, or while the device is inside the
/// event geofence.
pub fn unlock_condition(
    window: &EventWindow,
    geofence: &GeofenceEvaluator,
    now: DateTime<Utc>,
    location: Option<&LocationSample>,
) -> bool {
    window.is_event_started(now) || geofence.is_within_geofence(location)
}

/// Latch state - NO I/O, just transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatchState {
    /// Condition never observed.
    #[default]
    Locked,
    /// Terminal.
    Unlocked {
        /// When the transition was persisted.
        at: DateTime<Utc>,
    },
}

/// Instruction for the caller after a latch check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchAction {
    /// Write this record before adopting the new state.
    Persist(UnlockState),
}

impl LatchState {
    /// Rebuild the state from a persisted record.
    ///
    /// A record claiming `is_unlocked` without a timestamp is still unlocked;
    /// the epoch stands in for the unknown instant.
    pub fn from_record(record: Option<UnlockState>) -> Self {
        match record {
            Some(UnlockState {
                is_unlocked: true,
                unlocked_at,
            }) => Self::Unlocked {
                at: unlocked_at.unwrap_or_default(),
            },
            _ => Self::Locked,
        }
    }

    /// Whether the latch is set.
    pub fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked { .. })
    }

    /// When the latch was set, if it was.
    pub fn unlocked_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Unlocked { at } => Some(*at),
            Self::Locked => None,
        }
    }

    /// Process a condition check and return the new state plus the write to
    /// perform, if any.
    ///
    /// The caller must only adopt the returned state after the write
    /// succeeds.
    pub fn on_check(self, condition: bool, now: DateTime<Utc>) -> (Self, Option<LatchAction>) {
        match (self, condition) {
            (Self::Locked, true) => (
                Self::Unlocked { at: now },
                Some(LatchAction::Persist(UnlockState::unlocked(now))),
            ),
            // Unlocked is terminal; a false condition never relocks.
            (state, _) => (state, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::EventConfig;
    use chrono::TimeZone;

    fn pre_event() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 20, 12, 0, 0).unwrap()
    }

    fn during_event() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 28, 12, 0, 0).unwrap()
    }

    fn setup() -> (EventWindow, GeofenceEvaluator) {
        let window = EventWindow::new(EventConfig::default()).unwrap();
        let fence = GeofenceEvaluator::for_event(&window);
        (window, fence)
    }

    #[test]
    fn condition_false_before_event_and_away() {
        let (w, f) = setup();
        let away = LocationSample::at(-33.9249, 18.4241);
        assert!(!unlock_condition(&w, &f, pre_event(), Some(&away)));
        assert!(!unlock_condition(&w, &f, pre_event(), None));
    }

    #[test]
    fn condition_true_inside_geofence_before_event() {
        let (w, f) = setup();
        let here = LocationSample::at(-32.5513, 19.9884);
        assert!(unlock_condition(&w, &f, pre_event(), Some(&here)));
    }

    #[test]
    fn condition_true_once_event_started_without_location() {
        let (w, f) = setup();
        assert!(unlock_condition(&w, &f, during_event(), None));
    }

    #[test]
    fn locked_to_unlocked_requests_persist() {
        let now = pre_event();
        let (state, action) = LatchState::Locked.on_check(true, now);
        assert_eq!(state, LatchState::Unlocked { at: now });
        assert_eq!(
            action,
            Some(LatchAction::Persist(UnlockState::unlocked(now)))
        );
    }

    #[test]
    fn locked_stays_locked_without_condition() {
        let (state, action) = LatchState::Locked.on_check(false, pre_event());
        assert_eq!(state, LatchState::Locked);
        assert_eq!(action, None);
    }

    #[test]
    fn unlocked_is_terminal() {
        let at = pre_event();
        let unlocked = LatchState::Unlocked { at };
        for condition in [true, false] {
            let (state, action) = unlocked.on_check(condition, during_event());
            assert_eq!(state, LatchState::Unlocked { at });
            assert_eq!(action, None);
        }
    }

    #[test]
    fn from_record() {
        assert_eq!(LatchState::from_record(None), LatchState::Locked);
        assert_eq!(
            LatchState::from_record(Some(UnlockState::default())),
            LatchState::Locked
        );
        let at = pre_event();
        assert_eq!(
            LatchState::from_record(Some(UnlockState::unlocked(at))).unlocked_at(),
            Some(at)
        );
        let no_time = UnlockState {
            is_unlocked: true,
            unlocked_at: None,
        };
        assert!(LatchState::from_record(Some(no_time)).is_unlocked());
    }
}
