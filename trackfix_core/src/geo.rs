use crate::error::TrackfixError;

/// Mean Earth radius in metres, the value used for all distance calculations.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres between two `(lat, lon)` pairs, both in
/// decimal degrees.
pub fn haversine(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Linear interpolation between two optional values at parameter `t`. When
/// one side is absent the present side is returned; when both are absent the
/// result is `None`.
pub fn interp(a: Option<f64>, b: Option<f64>, t: f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + t * (b - a)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// As [`interp`], for the integer-valued biometric fields. The interpolated
/// value is rounded to the nearest integer.
pub fn interp_int(a: Option<u32>, b: Option<u32>, t: f64) -> Option<u32> {
    interp(a.map(f64::from), b.map(f64::from), t).map(|v| v.round() as u32)
}

/// Describes the first problem with a latitude/longitude pair, if any.
/// NaN and the infinities fail the range checks along with everything else
/// outside WGS84.
pub(crate) fn coord_error(lat: f64, lon: f64) -> Option<String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Some(format!("invalid latitude {lat}, valid range is -90.0..=90.0"));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Some(format!(
            "invalid longitude {lon}, valid range is -180.0..=180.0"
        ));
    }
    None
}

/// Checks that a latitude/longitude pair lies within the WGS84 ranges.
pub fn validate_coords(lat: f64, lon: f64) -> Result<(), TrackfixError> {
    match coord_error(lat, lon) {
        Some(msg) => Err(TrackfixError::InvalidArgument(msg)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_of_identical_points_is_zero() {
        let p = (51.472, -0.292);
        assert!(haversine(p, p).abs() < 1e-9);
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = (51.472, -0.292);
        let b = (48.8584, 2.2945);
        assert!((haversine(a, b) - haversine(b, a)).abs() < 1e-9);
    }

    #[test]
    fn haversine_along_the_equator() {
        // One thousandth of a degree of longitude at the equator is about
        // 111.19 metres (2 * pi * R / 360_000).
        let d = haversine((0.0, 0.0), (0.0, 0.001));
        assert!((d - 111.1949).abs() < 0.01, "got {d}");
    }

    #[test]
    fn interp_both_present() {
        assert_eq!(interp(Some(10.0), Some(20.0), 0.25), Some(12.5));
    }

    #[test]
    fn interp_one_absent() {
        assert_eq!(interp(Some(10.0), None, 0.25), Some(10.0));
        assert_eq!(interp(None, Some(20.0), 0.25), Some(20.0));
        assert_eq!(interp(None, None, 0.25), None);
    }

    #[test]
    fn interp_int_rounds_to_nearest() {
        assert_eq!(interp_int(Some(100), Some(101), 0.5), Some(101));
        assert_eq!(interp_int(Some(100), Some(103), 0.5), Some(102));
        assert_eq!(interp_int(Some(90), None, 0.9), Some(90));
    }

    #[test]
    fn validate_coords_rejects_out_of_range() {
        assert!(validate_coords(0.0, 0.0).is_ok());
        assert!(validate_coords(-90.0, 180.0).is_ok());
        assert!(validate_coords(90.01, 0.0).is_err());
        assert!(validate_coords(0.0, -180.5).is_err());
    }

    #[test]
    fn validate_coords_rejects_non_finite_values() {
        assert!(validate_coords(f64::NAN, 0.0).is_err());
        assert!(validate_coords(0.0, f64::NAN).is_err());
        assert!(validate_coords(f64::INFINITY, 0.0).is_err());
        assert!(validate_coords(0.0, f64::NEG_INFINITY).is_err());
    }
}
