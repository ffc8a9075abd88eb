use chrono::{DateTime, Duration, Utc};

use crate::config::SatSensorInfo;
use crate::predict::error::PredictError;
use crate::predict::geo_point::GeoPoint;
use crate::predict::propagation::Propagator;
use crate::predict::sky;
use crate::predict::swath;
use crate::predict::tle_loader::Tle;
use crate::predict::types::{OverPass, PassDetails};
use crate::sector::Sector;

// Two passes closer than this mean the search is stuck on the same pass
const REPEATED_PASS_GUARD: Duration = Duration::minutes(5);
const CONCURRENT_BASE: Duration = Duration::minutes(10);

/// Where a satellite's sub-point comes from
#[derive(Debug, Clone, Copy)]
pub enum Ephemeris<'a> {
    Elements(&'a Tle),
    /// Geostationary satellite parked at a known sub-point
    Fixed(GeoPoint),
}

/// Whether the `index`-th (1-based) sample point adds nothing for a swath this wide
pub fn skip_sample(index: usize, swath_width_km: Option<f64>, size_km: f64) -> bool {
    let Some(swath) = swath_width_km else {
        return false;
    };
    (index > 5 && 4.0 * swath > size_km)
        || (index > 3 && 2.0 * swath > size_km)
        || (index > 1 && swath > size_km)
}

/// Candidate overpasses of one satellite/sensor over one sector
pub fn find_overpasses<P: Propagator + ?Sized>(
    propagator: &P,
    info: &SatSensorInfo,
    sector: &Sector,
    ephemeris: Ephemeris<'_>,
    start: DateTime<Utc>,
    duration_hours: f64,
    sample_points: &[GeoPoint],
) -> Result<Vec<OverPass>, PredictError> {
    let half_window =
        Duration::milliseconds((info.per_file_duration_minutes * 30_000.0).round() as i64);

    if info.geostationary {
        return geostationary_candidate(propagator, info, sector, ephemeris, start, half_window)
            .map(|c| vec![c]);
    }

    let Ephemeris::Elements(tle) = ephemeris else {
        log::warn!(
            "{} is not geostationary but has no orbital elements, skipping {}",
            info.satellite,
            sector.name
        );
        return Ok(Vec::new());
    };
    let Some(period_s) = info.orbital_period_s else {
        log::warn!("{} has no orbital period defined, skipping", info.satellite);
        return Ok(Vec::new());
    };
    let Some(swath_width) = info.swath_width_km else {
        log::warn!(
            "{} {} has no swath width, no pass can be accepted",
            info.satellite,
            info.sensor
        );
        return Ok(Vec::new());
    };

    let half_period = Duration::milliseconds((period_s * 500.0).round() as i64);
    let horizon = Duration::milliseconds((duration_hours * 3_600_000.0).round() as i64);
    let size_km = swath::characteristic_size_km(sector);
    let center = swath::center(sector);

    let mut candidates = Vec::new();
    for (idx, point) in sample_points.iter().enumerate() {
        let index = idx + 1;
        if skip_sample(index, Some(swath_width), size_km) {
            continue;
        }
        log::debug!(
            "Trying {} lon: {:.3} lat: {:.3} starting at {} for {}h",
            info.satellite,
            point.lon_deg,
            point.lat_deg,
            start.format("%Y/%m/%d %H:%M:%S"),
            duration_hours
        );

        let mut observer_time = start;
        let mut sighting = propagator.next_pass(tle, *point, observer_time)?;
        while let Some(pass) = sighting {
            if observer_time - start >= horizon {
                break;
            }

            let cpa_km = point.distance_km(&pass.sub_point);
            // Coverage is checked from the sample point, the record shows distance from the center
            let display_cpa_km = if index > 1 {
                GeoPoint::new(center.lon_deg, point.lat_deg).distance_km(&pass.sub_point)
            } else {
                cpa_km
            };

            let candidate = OverPass::new(
                info.satellite.as_str(),
                pass.time - half_window,
                pass.time + half_window,
                vec![sector.name.clone()],
                display_cpa_km,
            )?;

            if cpa_km < swath_width && pass.time - horizon < start {
                let candidate = candidate.with_details(pass_details(pass.time, *point));
                log::debug!("USING {} {:.1} {}", swath_width, cpa_km, candidate);
                candidates.push(candidate);
            } else {
                log::debug!("SKIP  {} {:.1} {}", swath_width, cpa_km, candidate);
            }

            observer_time = pass.time + half_period;
            sighting = propagator
                .next_pass(tle, *point, observer_time)?
                .filter(|next| (next.time - pass.time).abs() >= REPEATED_PASS_GUARD);
        }
    }

    Ok(candidates)
}

fn geostationary_candidate<P: Propagator + ?Sized>(
    propagator: &P,
    info: &SatSensorInfo,
    sector: &Sector,
    ephemeris: Ephemeris<'_>,
    start: DateTime<Utc>,
    half_window: Duration,
) -> Result<OverPass, PredictError> {
    let sub_point = match ephemeris {
        Ephemeris::Elements(tle) => propagator.geostationary_subpoint(tle, start)?,
        Ephemeris::Fixed(point) => point,
    };
    let center = swath::center(sector);
    let base = start + half_window;

    let candidate = OverPass::new(
        info.satellite.as_str(),
        base - half_window,
        base + half_window,
        vec![sector.name.clone()],
        center.distance_km(&sub_point),
    )?
    .with_details(pass_details(base, center));
    log::debug!("USING geostationary {}", candidate);
    Ok(candidate)
}

/// Sun, moon and location details of a pass seen from `point`
fn pass_details(at: DateTime<Utc>, point: GeoPoint) -> PassDetails {
    let sky = sky::sky_conditions(at, point);
    PassDetails {
        lunar_phase: Some(sky.lunar_phase),
        lunar_alt_deg: Some(sky.lunar_alt_deg),
        solar_alt_deg: Some(sky.solar_alt_deg),
        center_lat: Some(point.lat_deg),
        center_lon: Some(point.lon_deg),
    }
}

/// Add candidates to a running list, dropping any that repeat an existing
/// record (same satellite and sectors, base within 10 minutes)
pub fn accumulate(passes: &mut Vec<OverPass>, candidates: Vec<OverPass>) {
    for candidate in candidates {
        let repeated = passes.iter().any(|existing| {
            existing.satellite_name() == candidate.satellite_name()
                && existing.sector_names() == candidate.sector_names()
                && existing.concurrent_base(&candidate, CONCURRENT_BASE)
        });
        if !repeated {
            passes.push(candidate);
        }
    }
}
