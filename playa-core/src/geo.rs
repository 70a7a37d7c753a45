//! Great-circle distance.
//!
//! Coordinates are taken as-is; range validation belongs to the caller.

/// Mean Earth radius used by [`distance_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Haversine distance between two points, in metres.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_km(lat1, lon1, lat2, lon2) * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TANKWA: (f64, f64) = (-32.551296, 19.988442);
    const CAPE_TOWN: (f64, f64) = (-33.9249, 18.4241);

    #[test]
    fn identical_points_are_zero() {
        let d = distance_km(TANKWA.0, TANKWA.1, TANKWA.0, TANKWA.1);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = distance_km(TANKWA.0, TANKWA.1, CAPE_TOWN.0, CAPE_TOWN.1);
        let ba = distance_km(CAPE_TOWN.0, CAPE_TOWN.1, TANKWA.0, TANKWA.1);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn known_distance_within_half_percent() {
        // Roughly 210 km by great circle.
        let d = distance_km(TANKWA.0, TANKWA.1, CAPE_TOWN.0, CAPE_TOWN.1);
        assert!((d - 210.0).abs() / 210.0 < 0.02, "got {d}");
    }

    #[test]
    fn one_degree_latitude() {
        let d = distance_km(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn metres_scale_kilometres() {
        let km = distance_km(0.0, 0.0, 0.0, 0.001);
        let m = distance_m(0.0, 0.0, 0.0, 0.001);
        assert!((m - km * 1000.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_input_is_not_rejected() {
        let d = distance_km(95.0, 200.0, -95.0, -200.0);
        assert!(d.is_finite());
    }
}
