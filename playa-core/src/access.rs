//! Per-content-type access rules.
//!
//! Every negative outcome is data ([`AccessDecision::Limited`] or
//! [`AccessDecision::Denied`]); evaluation never fails.

use chrono::{DateTime, Utc};
use playa_types::{ContentType, LocationSample};
use serde::{Deserialize, Serialize};

use crate::geo::distance_m;
use crate::geofence::GeofenceEvaluator;
use crate::window::EventWindow;

/// Radius applied to a spot requirement when none is given.
pub const DEFAULT_REQUIREMENT_RADIUS_M: f64 = 100.0;

/// Outcome of an access query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Full access.
    Granted(String),
    /// Reduced access, e.g. a preview.
    Limited(String),
    /// No access.
    Denied(String),
}

impl AccessDecision {
    /// Whether this is [`AccessDecision::Granted`].
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Whether this is [`AccessDecision::Limited`].
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited(_))
    }

    /// Whether this is [`AccessDecision::Denied`].
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    /// Human-readable reason.
    pub fn reason(&self) -> &str {
        match self {
            Self::Granted(r) | Self::Limited(r) | Self::Denied(r) => r,
        }
    }
}

/// A spot the device must be at to see a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationRequirement {
    /// Latitude of the spot.
    pub latitude: f64,
    /// Longitude of the spot.
    pub longitude: f64,
    /// How close the device must be.
    pub radius_m: f64,
}

impl LocationRequirement {
    /// Requirement with the default 100 m radius.
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self::with_radius(latitude, longitude, DEFAULT_REQUIREMENT_RADIUS_M)
    }

    /// Requirement with an explicit radius.
    pub fn with_radius(latitude: f64, longitude: f64, radius_m: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_m,
        }
    }

    /// Whether `location` satisfies this requirement. `None` never does.
    pub fn is_satisfied_by(&self, location: Option<&LocationSample>) -> bool {
        location.is_some_and(|loc| {
            distance_m(loc.latitude, loc.longitude, self.latitude, self.longitude)
                <= self.radius_m
        })
    }
}

/// Fixed rule table over the event window and geofence.
#[derive(Debug, Clone)]
pub struct ContentAccessValidator {
    window: EventWindow,
    geofence: GeofenceEvaluator,
}

impl ContentAccessValidator {
    /// Validator for the given event.
    pub fn new(window: EventWindow) -> Self {
        let geofence = GeofenceEvaluator::for_event(&window);
        Self { window, geofence }
    }

    /// The event window rules are evaluated against.
    pub fn window(&self) -> &EventWindow {
        &self.window
    }

    /// Decide access to `content_type`.
    pub fn evaluate(
        &self,
        content_type: ContentType,
        location: Option<&LocationSample>,
        now: DateTime<Utc>,
        requirement: Option<&LocationRequirement>,
    ) -> AccessDecision {
        let active = self.window.is_event_active(now);
        let in_radius = self.geofence.is_within_geofence(location);

        match content_type {
            ContentType::Safety | ContentType::Emergency => {
                AccessDecision::Granted("safety information is always available".into())
            }

            ContentType::Map | ContentType::ThemeCamp | ContentType::Performance => {
                if active && in_radius {
                    AccessDecision::Granted("event is active and you are on site".into())
                } else if active {
                    AccessDecision::Limited("event is active but you are off site".into())
                } else if content_type == ContentType::Performance
                    && self
                        .window
                        .is_in_preview(now, self.window.config().performance_preview_hours)
                {
                    AccessDecision::Limited("performance preview before the event".into())
                } else if content_type == ContentType::Map && !self.window.is_event_started(now) {
                    AccessDecision::Limited("map preview before the event".into())
                } else {
                    AccessDecision::Denied("available during the event only".into())
                }
            }

            ContentType::ArtInstallation => {
                if active && in_radius {
                    AccessDecision::Granted("event is active and you are on site".into())
                } else if requirement.is_some_and(|req| req.is_satisfied_by(location)) {
                    AccessDecision::Granted("you found the installation".into())
                } else {
                    AccessDecision::Denied("visit the installation to unlock".into())
                }
            }

            ContentType::EasterEgg => {
                if requirement.is_some_and(|req| req.is_satisfied_by(location)) {
                    AccessDecision::Granted("you found it".into())
                } else {
                    AccessDecision::Denied("keep looking".into())
                }
            }
        }
    }
}
