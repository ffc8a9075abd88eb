use crate::predict::error::PredictError;
use crate::predict::geo_point::{normalize_lon, GeoPoint, CPA_EARTH_RADIUS_KM};
use crate::sector::Sector;

pub const SAMPLE_POINT_COUNT: usize = 9;

// Keeps blends finite for sectors centered on a pole
const MIN_COS_LAT: f64 = 1e-6;

/// Representative ground points of a sector, most representative first:
/// center, left and right midpoints, then blends between them.
pub fn sample_points(sector: &Sector) -> Result<Vec<GeoPoint>, PredictError> {
    check_geometry(sector)?;

    let clon = sector.center_lon;
    let clat = sector.center_lat;
    let cos_lat = clat.to_radians().cos().abs().max(MIN_COS_LAT);
    let half_width_deg = (sector.width_km / 2.0 / (CPA_EARTH_RADIUS_KM * cos_lat))
        .to_degrees()
        .min(180.0);

    // Longitudes stay unwrapped until the end so blends never straddle the antimeridian
    let center = (clon, clat);
    let left = (clon - half_width_deg, clat);
    let right = (clon + half_width_deg, clat);
    let mid1_1 = blend(left, center);
    let mid1_2 = blend(center, right);
    let mid2_1 = blend(left, mid1_1);
    let mid2_2 = blend(mid1_1, center);
    let mid2_3 = blend(center, mid1_2);
    let mid2_4 = blend(mid1_2, right);

    Ok([
        center, left, right, mid1_1, mid1_2, mid2_1, mid2_2, mid2_3, mid2_4,
    ]
    .into_iter()
    .map(|(lon, lat)| GeoPoint::new(normalize_lon(lon), lat))
    .collect())
}

/// Bounding-box diagonal, the farthest a swath can travel across the sector
pub fn characteristic_size_km(sector: &Sector) -> f64 {
    sector.width_km.hypot(sector.height_km)
}

pub fn width_km(sector: &Sector) -> f64 {
    sector.width_km
}

pub fn center(sector: &Sector) -> GeoPoint {
    GeoPoint::new(normalize_lon(sector.center_lon), sector.center_lat)
}

fn check_geometry(sector: &Sector) -> Result<(), PredictError> {
    let degenerate = |reason: String| PredictError::GeometryDegenerate {
        sector: sector.name.clone(),
        reason,
    };
    for (label, value) in [("width", sector.width_km), ("height", sector.height_km)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(degenerate(format!("{} is {} km", label, value)));
        }
    }
    if !sector.center_lat.is_finite()
        || !sector.center_lon.is_finite()
        || sector.center_lat.abs() > 90.0
    {
        return Err(degenerate(format!(
            "center {},{} is not a valid location",
            sector.center_lon, sector.center_lat
        )));
    }
    Ok(())
}

fn blend(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector(lon: f64, lat: f64, width: f64, height: f64) -> Sector {
        Sector {
            name: "test".to_string(),
            active: true,
            dynamic: false,
            sources: vec!["viirs".to_string()],
            center_lon: lon,
            center_lat: lat,
            width_km: width,
            height_km: height,
            active_window: None,
        }
    }

    #[test]
    fn nine_points_center_first() {
        let s = sector(-90.0, 25.0, 1600.0, 1000.0);
        let points = sample_points(&s).unwrap();
        assert_eq!(points.len(), SAMPLE_POINT_COUNT);
        assert_eq!(points[0], GeoPoint::new(-90.0, 25.0));

        // left and right midpoints sit half the width away from the center
        let c = points[0];
        assert!((c.distance_km(&points[1]) - 800.0).abs() < 15.0);
        assert!((c.distance_km(&points[2]) - 800.0).abs() < 15.0);
        assert!(points[1].lon_deg < -90.0 && points[2].lon_deg > -90.0);

        // blends are symmetric around the center
        assert!((points[3].lon_deg + points[4].lon_deg + 180.0).abs() < 1e-9);
        assert!((points[5].lon_deg + points[8].lon_deg + 180.0).abs() < 1e-9);
        assert!((points[6].lon_deg + points[7].lon_deg + 180.0).abs() < 1e-9);
    }

    #[test]
    fn antimeridian_sector_wraps() {
        let s = sector(179.0, 0.0, 1000.0, 500.0);
        let points = sample_points(&s).unwrap();
        assert!(points.iter().all(|p| (-180.0..=180.0).contains(&p.lon_deg)));
        assert!(points[2].lon_deg < 0.0);
    }

    #[test]
    fn polar_sector_stays_finite() {
        let s = sector(0.0, 90.0, 2000.0, 2000.0);
        let points = sample_points(&s).unwrap();
        assert!(points.iter().all(|p| p.lon_deg.is_finite()));
    }

    #[test]
    fn size_is_bounding_box_diagonal() {
        let s = sector(0.0, 0.0, 300.0, 400.0);
        assert_eq!(characteristic_size_km(&s), 500.0);
        assert_eq!(width_km(&s), 300.0);
    }

    #[test]
    fn zero_extent_is_degenerate() {
        let s = sector(0.0, 0.0, 0.0, 400.0);
        assert!(matches!(
            sample_points(&s),
            Err(PredictError::GeometryDegenerate { .. })
        ));
        let s = sector(0.0, 95.0, 100.0, 400.0);
        assert!(sample_points(&s).is_err());
    }
}
