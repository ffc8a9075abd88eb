use chrono::{DateTime, Duration, Utc};
use sgp4::Constants;

use crate::predict::error::PredictError;
use crate::predict::geo_point::GeoPoint;
use crate::predict::tle_loader::Tle;

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute for initial scan
const FINE_STEP_SECONDS: i64 = 1; // 1 second for refinement
const SEARCH_WINDOW_HOURS: i64 = 48;
const HORIZON_ELEVATION: f64 = 0.0;

/// Culmination of one pass over an observer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSighting {
    pub time: DateTime<Utc>,
    pub sub_point: GeoPoint,
}

pub trait Propagator {
    /// First pass over `observer` that is in progress at or rises after `after`
    fn next_pass(
        &self,
        tle: &Tle,
        observer: GeoPoint,
        after: DateTime<Utc>,
    ) -> Result<Option<PassSighting>, PredictError>;

    fn geostationary_subpoint(&self, tle: &Tle, at: DateTime<Utc>)
        -> Result<GeoPoint, PredictError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sgp4Propagator;

impl Propagator for Sgp4Propagator {
    fn next_pass(
        &self,
        tle: &Tle,
        observer: GeoPoint,
        after: DateTime<Utc>,
    ) -> Result<Option<PassSighting>, PredictError> {
        let constants = constants_for(tle)?;
        let coarse_step = Duration::seconds(COARSE_STEP_SECONDS);
        let limit = after + Duration::hours(SEARCH_WINDOW_HOURS);

        // Rise: first coarse sample above the horizon
        let mut cursor = after;
        loop {
            if cursor > limit {
                return Ok(None);
            }
            if elevation_deg(tle, &constants, observer, cursor)? >= HORIZON_ELEVATION {
                break;
            }
            cursor += coarse_step;
        }

        // Follow the pass to its set, keeping the highest coarse sample
        let rise = cursor;
        let mut max_el = elevation_deg(tle, &constants, observer, rise)?;
        let mut max_el_time = rise;
        loop {
            cursor += coarse_step;
            let el = elevation_deg(tle, &constants, observer, cursor)?;
            if el < HORIZON_ELEVATION || cursor > limit {
                break;
            }
            if el > max_el {
                max_el = el;
                max_el_time = cursor;
            }
        }
        let set = cursor;

        let time = refine_culmination(
            tle,
            &constants,
            observer,
            (max_el_time - coarse_step).max(rise),
            (max_el_time + coarse_step).min(set),
        )?;
        let sub_point = GeoPoint::from_ecef(position_ecef_km(tle, &constants, time)?);

        Ok(Some(PassSighting { time, sub_point }))
    }

    fn geostationary_subpoint(
        &self,
        tle: &Tle,
        at: DateTime<Utc>,
    ) -> Result<GeoPoint, PredictError> {
        let constants = constants_for(tle)?;
        Ok(GeoPoint::from_ecef(position_ecef_km(tle, &constants, at)?))
    }
}

fn constants_for(tle: &Tle) -> Result<Constants, PredictError> {
    Constants::from_elements(&tle.elements).map_err(|e| PredictError::Propagation(e.to_string()))
}

/// Ternary search for the elevation maximum between two bracketing times
fn refine_culmination(
    tle: &Tle,
    constants: &Constants,
    observer: GeoPoint,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, PredictError> {
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let third = (high - low) / 3;
        let m1 = low + third;
        let m2 = high - third;
        if elevation_deg(tle, constants, observer, m1)?
            < elevation_deg(tle, constants, observer, m2)?
        {
            low = m1;
        } else {
            high = m2;
        }
    }

    Ok(low + (high - low) / 2)
}

fn position_ecef_km(
    tle: &Tle,
    constants: &Constants,
    timestamp: DateTime<Utc>,
) -> Result<[f64; 3], PredictError> {
    let minutes = tle
        .elements
        .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
        .map_err(|e| PredictError::Propagation(e.to_string()))?;

    let prediction = constants
        .propagate(minutes)
        .map_err(|e| PredictError::Propagation(e.to_string()))?;

    let sidereal =
        sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&timestamp.naive_utc()));

    Ok(teme_to_ecef_position(prediction.position, sidereal))
}

fn elevation_deg(
    tle: &Tle,
    constants: &Constants,
    observer: GeoPoint,
    timestamp: DateTime<Utc>,
) -> Result<f64, PredictError> {
    let sat_ecef = position_ecef_km(tle, constants, timestamp)?;
    let obs_ecef = observer.position_ecef_km();

    let dr = [
        sat_ecef[0] - obs_ecef[0],
        sat_ecef[1] - obs_ecef[1],
        sat_ecef[2] - obs_ecef[2],
    ];
    let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

    let (_, _, up) = ecef_to_enu(dr, observer.lat_rad(), observer.lon_rad());
    Ok(if range_km > 0.0 {
        (up / range_km).asin().to_degrees()
    } else {
        90.0
    })
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}
