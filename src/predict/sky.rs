use chrono::{DateTime, Datelike, Timelike, Utc};
use practical_astronomy_rust::{moon as pa_moon, sun as pa_sun};

use crate::predict::geo_point::GeoPoint;

/// Sun and moon as seen from a ground point at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyConditions {
    /// Illuminated fraction of the lunar disc, 0 (new) to 1 (full)
    pub lunar_phase: f64,
    pub lunar_alt_deg: f64,
    pub solar_alt_deg: f64,
}

#[derive(Debug, Clone, Copy)]
struct Equatorial {
    ra_deg: f64,
    dec_deg: f64,
}

impl Equatorial {
    fn from_sexagesimal(ra: (f64, f64, f64), dec: (f64, f64, f64)) -> Self {
        let ra_deg = (ra.0 + ra.1 / 60.0 + ra.2 / 3600.0) * 15.0;
        let magnitude = dec.0.abs() + dec.1.abs() / 60.0 + dec.2.abs() / 3600.0;
        let negative = dec.0.is_sign_negative() || dec.1 < 0.0 || dec.2 < 0.0;
        Self {
            ra_deg,
            dec_deg: if negative { -magnitude } else { magnitude },
        }
    }

    /// Altitude above the horizon for a local sidereal time in degrees
    fn altitude_deg(&self, point: GeoPoint, local_sidereal_deg: f64) -> f64 {
        let hour_angle = (local_sidereal_deg - self.ra_deg).to_radians();
        let lat = point.lat_rad();
        let dec = self.dec_deg.to_radians();
        (lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.cos())
            .clamp(-1.0, 1.0)
            .asin()
            .to_degrees()
    }

    fn separation_deg(&self, other: &Equatorial) -> f64 {
        let (d1, d2) = (self.dec_deg.to_radians(), other.dec_deg.to_radians());
        let dra = (self.ra_deg - other.ra_deg).to_radians();
        (d1.sin() * d2.sin() + d1.cos() * d2.cos() * dra.cos())
            .clamp(-1.0, 1.0)
            .acos()
            .to_degrees()
    }
}

pub fn sky_conditions(at: DateTime<Utc>, point: GeoPoint) -> SkyConditions {
    let hour = at.hour() as f64;
    let minute = at.minute() as f64;
    let second = at.second() as f64 + at.timestamp_subsec_micros() as f64 / 1.0e6;
    let day = at.day() as f64;
    let (month, year) = (at.month(), at.year() as u32);

    let (ra_h, ra_m, ra_s, dec_d, dec_m, dec_s) =
        pa_sun::precise_position_of_sun(hour, minute, second, day, month, year, false, 0);
    let sun = Equatorial::from_sexagesimal((ra_h, ra_m, ra_s), (dec_d, dec_m, dec_s));

    let (ra_h, ra_m, ra_s, dec_d, dec_m, dec_s, _distance_km, _parallax) =
        pa_moon::precise_position_of_moon(hour, minute, second, false, 0, day, month, year);
    let moon = Equatorial::from_sexagesimal((ra_h, ra_m, ra_s), (dec_d, dec_m, dec_s));

    let gmst_deg =
        sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&at.naive_utc()))
            .to_degrees();
    let local_sidereal_deg = gmst_deg + point.lon_deg;

    SkyConditions {
        lunar_phase: (1.0 - sun.separation_deg(&moon).to_radians().cos()) / 2.0,
        lunar_alt_deg: moon.altitude_deg(point, local_sidereal_deg),
        solar_alt_deg: sun.altitude_deg(point, local_sidereal_deg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, day, h, m, 0).unwrap()
    }

    #[test]
    fn sun_is_high_at_noon_and_low_at_midnight() {
        let equinox_noon = Utc.with_ymd_and_hms(2016, 3, 20, 12, 0, 0).unwrap();
        let origin = GeoPoint::new(0.0, 0.0);
        assert!(sky_conditions(equinox_noon, origin).solar_alt_deg > 80.0);

        let midnight = Utc.with_ymd_and_hms(2016, 3, 20, 0, 0, 0).unwrap();
        assert!(sky_conditions(midnight, origin).solar_alt_deg < -80.0);
    }

    #[test]
    fn lunar_phase_follows_the_lunation() {
        let gulf = GeoPoint::new(-90.0, 25.0);
        // new moon 2016-01-10 01:30, full moon 2016-01-24 01:46
        assert!(sky_conditions(at(10, 1, 30), gulf).lunar_phase < 0.05);
        assert!(sky_conditions(at(24, 1, 46), gulf).lunar_phase > 0.95);
        let first_quarter = sky_conditions(at(16, 23, 26), gulf).lunar_phase;
        assert!((first_quarter - 0.5).abs() < 0.1, "{first_quarter}");
    }

    #[test]
    fn full_moon_stands_opposite_the_sun() {
        let sky = sky_conditions(at(24, 1, 46), GeoPoint::new(-90.0, 25.0));
        assert!((sky.lunar_alt_deg + sky.solar_alt_deg).abs() < 15.0, "{sky:?}");
        assert!((-90.0..=90.0).contains(&sky.lunar_alt_deg));
    }
}
