//! Proximity to the event center.

use playa_types::LocationSample;

use crate::geo::distance_km;
use crate::window::EventWindow;

/// Tests whether locations fall inside the event geofence.
///
/// A missing location is never inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceEvaluator {
    center_latitude: f64,
    center_longitude: f64,
    radius_km: f64,
}

impl GeofenceEvaluator {
    /// Geofence around an arbitrary center.
    pub fn new(center_latitude: f64, center_longitude: f64, radius_km: f64) -> Self {
        Self {
            center_latitude,
            center_longitude,
            radius_km,
        }
    }

    /// Geofence around the event center with the configured radius.
    pub fn for_event(window: &EventWindow) -> Self {
        let (lat, lon) = window.center();
        Self::new(lat, lon, window.radius_km())
    }

    /// Radius in kilometres.
    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Distance from a point to the center, for display.
    pub fn distance_to_center_km(&self, latitude: f64, longitude: f64) -> f64 {
        distance_km(
            latitude,
            longitude,
            self.center_latitude,
            self.center_longitude,
        )
    }

    /// Whether a point is within the radius (boundary inclusive).
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.distance_to_center_km(latitude, longitude) <= self.radius_km
    }

    /// Whether a sample is within the radius. `None` is outside.
    pub fn is_within_geofence(&self, location: Option<&LocationSample>) -> bool {
        location.is_some_and(|loc| self.contains(loc.latitude, loc.longitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::EventConfig;

    fn fence() -> GeofenceEvaluator {
        GeofenceEvaluator::for_event(&EventWindow::new(EventConfig::default()).unwrap())
    }

    #[test]
    fn center_is_inside() {
        let f = fence();
        let loc = LocationSample::at(-32.551296, 19.988442);
        assert!(f.is_within_geofence(Some(&loc)));
        assert_eq!(f.distance_to_center_km(loc.latitude, loc.longitude), 0.0);
    }

    #[test]
    fn missing_location_is_outside() {
        assert!(!fence().is_within_geofence(None));
    }

    #[test]
    fn far_location_is_outside() {
        let cape_town = LocationSample::at(-33.9249, 18.4241);
        assert!(!fence().is_within_geofence(Some(&cape_town)));
    }

    #[test]
    fn boundary_is_inclusive() {
        let f = GeofenceEvaluator::new(0.0, 0.0, 0.0);
        assert!(f.contains(0.0, 0.0));
        assert!(!f.contains(0.0, 0.0001));
    }

    #[test]
    fn just_inside_and_outside_radius() {
        let f = fence();
        // 0.04 degrees of latitude is about 4.4 km, 0.05 about 5.6 km.
        assert!(f.contains(-32.551296 + 0.04, 19.988442));
        assert!(!f.contains(-32.551296 + 0.05, 19.988442));
    }
}
