use serde::{Deserialize, Serialize};

/// Sphere radius used for closest-point-of-approach distances
pub const CPA_EARTH_RADIUS_KM: f64 = 6372.795;

/// A ground location in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl GeoPoint {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }

    pub fn lat_rad(&self) -> f64 {
        self.lat_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.lon_deg.to_radians()
    }

    pub fn position_ecef_km(&self) -> [f64; 3] {
        // WGS-84 constants, observer on the ellipsoid surface
        let a = 6378.137;
        let e2 = 0.00669437999014;
        let lat = self.lat_rad();
        let lon = self.lon_rad();
        let sin_lat = lat.sin();
        let cos_lat = lat.cos();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let x = n * cos_lat * lon.cos();
        let y = n * cos_lat * lon.sin();
        let z = n * (1.0 - e2) * sin_lat;
        [x, y, z]
    }

    /// Geocentric sub-point of an ECEF position
    pub fn from_ecef(pos: [f64; 3]) -> Self {
        let lon = pos[1].atan2(pos[0]).to_degrees();
        let lat = pos[2]
            .atan2((pos[0] * pos[0] + pos[1] * pos[1]).sqrt())
            .to_degrees();
        Self::new(normalize_lon(lon), lat)
    }

    /// Great-circle distance in km on the CPA sphere
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat_rad(), other.lat_rad());
        let dlat = lat2 - lat1;
        let dlon = other.lon_rad() - self.lon_rad();
        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * h.sqrt().min(1.0).asin() * CPA_EARTH_RADIUS_KM
    }
}

pub fn normalize_lon(lon_deg: f64) -> f64 {
    let lon = (lon_deg + 180.0).rem_euclid(360.0) - 180.0;
    if lon == -180.0 && lon_deg > 0.0 {
        180.0
    } else {
        lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_degree_on_equator() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let expected = CPA_EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
        assert!((a.distance_km(&b) - expected).abs() < 1e-6);
    }

    #[test]
    fn distance_across_antimeridian() {
        let a = GeoPoint::new(179.5, 10.0);
        let b = GeoPoint::new(-179.5, 10.0);
        assert!(a.distance_km(&b) < 120.0);
    }

    #[test]
    fn ecef_round_trip_on_equator() {
        let p = GeoPoint::new(-75.0, 0.0);
        let back = GeoPoint::from_ecef(p.position_ecef_km());
        assert!((back.lon_deg + 75.0).abs() < 1e-9);
        assert!(back.lat_deg.abs() < 1e-9);
    }

    #[test]
    fn longitudes_normalize_into_range() {
        assert_eq!(normalize_lon(190.0), -170.0);
        assert_eq!(normalize_lon(-190.0), 170.0);
        assert_eq!(normalize_lon(180.0), 180.0);
        assert_eq!(normalize_lon(45.0), 45.0);
    }
}
