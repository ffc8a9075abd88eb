mod error;
mod geo_point;
mod merge;
mod pass_finder;
mod propagation;
mod sky;
mod swath;
mod tle_loader;
mod types;

pub use error::PredictError;
pub use geo_point::{normalize_lon, GeoPoint, CPA_EARTH_RADIUS_KM};
pub use merge::{chronological, reduce, CutoffTable};
pub use pass_finder::{accumulate, find_overpasses, skip_sample, Ephemeris};
pub use propagation::{PassSighting, Propagator, Sgp4Propagator};
pub use sky::{sky_conditions, SkyConditions};
pub use swath::{characteristic_size_km, sample_points, width_km, SAMPLE_POINT_COUNT};
pub use tle_loader::{Tle, TleDirectory, TleResolver, TleSource, MAX_LOOKBACK_DAYS};
pub use types::{strip_track_suffix, Combined, OverPass, PassDetails};

#[cfg(test)]
pub(crate) use pass_finder::tests as pass_finder_tests;
#[cfg(test)]
pub(crate) use tle_loader::tests as tle_loader_tests;
