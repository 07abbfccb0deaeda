/// Mean Earth radius in meters, as used by the standard haversine formula.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two (lat, lon) points in degrees.
/// Spherical-Earth haversine; callers guarantee finite inputs.
pub fn distance_m(a_lat: f64, a_lon: f64, b_lat: f64, b_lon: f64) -> f64 {
    let d_lat = (b_lat - a_lat).to_radians();
    let d_lon = (b_lon - a_lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a_lat.to_radians().cos() * b_lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::distance_m;

    #[test]
    fn zero_for_identical_points() {
        assert_eq!(distance_m(-6.2, 106.8, -6.2, 106.8), 0.0);
    }

    #[test]
    fn symmetric() {
        let ab = distance_m(-6.2, 106.8, -6.21, 106.81);
        let ba = distance_m(-6.21, 106.81, -6.2, 106.8);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn short_hop_near_equator() {
        // 0.001 deg of longitude at the equator is ~111.2 m.
        let d = distance_m(0.0, 0.0, 0.0, 0.001);
        assert!((d - 111.195).abs() < 0.5, "got {}", d);
    }
}
