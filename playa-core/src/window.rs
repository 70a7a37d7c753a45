//! Event configuration and calendar window.
//!
//! Dates are compared in the event's local calendar, expressed as a fixed
//! UTC offset. All checks are pure functions of the instant passed in.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Fixed event configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Event identifier used for persisted records and catalog requests.
    #[serde(default = "default_event_id")]
    pub event_id: String,
    /// First day of the event (inclusive, local calendar).
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    /// Last day of the event (inclusive, local calendar).
    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,
    /// Offset of the event's timezone from UTC.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Latitude of the event center.
    #[serde(default = "default_center_latitude")]
    pub center_latitude: f64,
    /// Longitude of the event center.
    #[serde(default = "default_center_longitude")]
    pub center_longitude: f64,
    /// Radius of the event geofence.
    #[serde(default = "default_geofence_radius_km")]
    pub geofence_radius_km: f64,
    /// How long before the start performances may be previewed.
    #[serde(default = "default_performance_preview_hours")]
    pub performance_preview_hours: i64,
    /// Radius used for spot requirements that don't specify one.
    #[serde(default = "default_requirement_radius_m")]
    pub default_requirement_radius_m: f64,
}

// Default value functions
fn default_event_id() -> String {
    "afrikaburn-2026".to_string()
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 27).unwrap_or(NaiveDate::MIN)
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 3).unwrap_or(NaiveDate::MIN)
}

fn default_utc_offset_minutes() -> i32 {
    120 // SAST
}

fn default_center_latitude() -> f64 {
    -32.551296
}

fn default_center_longitude() -> f64 {
    19.988442
}

fn default_geofence_radius_km() -> f64 {
    5.0
}

fn default_performance_preview_hours() -> i64 {
    24
}

fn default_requirement_radius_m() -> f64 {
    100.0
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            event_id: default_event_id(),
            start_date: default_start_date(),
            end_date: default_end_date(),
            utc_offset_minutes: default_utc_offset_minutes(),
            center_latitude: default_center_latitude(),
            center_longitude: default_center_longitude(),
            geofence_radius_km: default_geofence_radius_km(),
            performance_preview_hours: default_performance_preview_hours(),
            default_requirement_radius_m: default_requirement_radius_m(),
        }
    }
}

/// Invalid event configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventConfigError {
    /// End date precedes start date.
    #[error("event ends ({end}) before it starts ({start})")]
    EndBeforeStart {
        /// Configured start date.
        start: NaiveDate,
        /// Configured end date.
        end: NaiveDate,
    },
    /// UTC offset outside ±24h.
    #[error("invalid utc offset: {0} minutes")]
    InvalidOffset(i32),
    /// Negative or non-finite radius.
    #[error("invalid geofence radius: {0} km")]
    InvalidRadius(f64),
}

/// Event calendar checks over a validated [`EventConfig`].
#[derive(Debug, Clone)]
pub struct EventWindow {
    config: EventConfig,
    offset: FixedOffset,
}

impl EventWindow {
    /// Validate `config` and build the window.
    pub fn new(config: EventConfig) -> Result<Self, EventConfigError> {
        if config.end_date < config.start_date {
            return Err(EventConfigError::EndBeforeStart {
                start: config.start_date,
                end: config.end_date,
            });
        }
        if !config.geofence_radius_km.is_finite() || config.geofence_radius_km < 0.0 {
            return Err(EventConfigError::InvalidRadius(config.geofence_radius_km));
        }
        let offset = config
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(EventConfigError::InvalidOffset(config.utc_offset_minutes))?;
        Ok(Self { config, offset })
    }

    /// The configuration this window was built from.
    pub fn config(&self) -> &EventConfig {
        &self.config
    }

    /// Center of the event as `(latitude, longitude)`.
    pub fn center(&self) -> (f64, f64) {
        (self.config.center_latitude, self.config.center_longitude)
    }

    /// Geofence radius in kilometres.
    pub fn radius_km(&self) -> f64 {
        self.config.geofence_radius_km
    }

    /// Calendar date of `now` in the event's timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Local midnight at the start of the first event day, in UTC.
    pub fn starts_at(&self) -> DateTime<Utc> {
        let local_midnight = self.config.start_date.and_time(NaiveTime::MIN);
        let utc = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    /// Whether the first event day has been reached.
    pub fn is_event_started(&self, now: DateTime<Utc>) -> bool {
        self.local_date(now) >= self.config.start_date
    }

    /// Whether `now` falls on an event day.
    pub fn is_event_active(&self, now: DateTime<Utc>) -> bool {
        let today = self.local_date(now);
        self.config.start_date <= today && today <= self.config.end_date
    }

    /// Whether `now` is within `hours` before the event starts.
    pub fn is_in_preview(&self, now: DateTime<Utc>, hours: i64) -> bool {
        let start = self.starts_at();
        start - Duration::hours(hours) <= now && now < start
    }

    /// Whether the last event day has passed.
    pub fn is_event_over(&self, now: DateTime<Utc>) -> bool {
        self.local_date(now) > self.config.end_date
    }
}
