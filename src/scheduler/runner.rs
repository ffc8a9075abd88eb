use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};

use crate::alert::Alerter;
use crate::cache::{ResultCache, SectorKind};
use crate::config::{SatSensorInfo, SchedulingConfig};
use crate::predict::{
    accumulate, find_overpasses, reduce, sample_points, Ephemeris, GeoPoint, OverPass,
    PredictError, Propagator, TleResolver, TleSource,
};
use crate::scheduler::time_range::TimeRangeArgs;
use crate::sector::Sector;

// Only every fifth day back gets its own element set
const TLE_DATE_STRIDE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum OutputMode {
    Individual,
    #[default]
    Combined,
    Both,
}

#[derive(Debug, Clone, Default)]
pub struct PredictRequest {
    pub satellites: Vec<String>,
    /// Empty means every sensor configured for a satellite
    pub sensors: Vec<String>,
    pub time_range: TimeRangeArgs,
    pub sector_filter: Option<Vec<String>>,
    /// Ignore cached predictions
    pub force: bool,
    pub output: OutputMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Reduced per sector set
    pub individual: Vec<OverPass>,
    /// Reduced across sectors, absent for individual-only requests
    pub combined: Option<Vec<OverPass>>,
    pub from_cache: bool,
}

impl Prediction {
    fn empty(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            individual: Vec::new(),
            combined: None,
            from_cache: false,
        }
    }

    /// The list a caller asked for: combined when present
    pub fn preferred(&self) -> &[OverPass] {
        self.combined.as_deref().unwrap_or(&self.individual)
    }

    pub fn is_empty(&self) -> bool {
        self.individual.is_empty()
    }
}

/// Resolved request window shared by every satellite of a run
#[derive(Debug, Clone, Copy)]
struct RunWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    hours: f64,
    now: DateTime<Utc>,
}

pub struct Scheduler<S: TleSource, A: Alerter, P: Propagator> {
    config: SchedulingConfig,
    resolver: TleResolver<S, A>,
    propagator: P,
    cache: Option<ResultCache>,
}

impl<S: TleSource, A: Alerter, P: Propagator> Scheduler<S, A, P> {
    pub fn new(config: SchedulingConfig, resolver: TleResolver<S, A>, propagator: P) -> Self {
        Self {
            config,
            resolver,
            propagator,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn resolver(&self) -> &TleResolver<S, A> {
        &self.resolver
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Overpasses of the requested satellites over `sectors`.
    ///
    /// Only an unusable time range is an error. Satellites, sensors and sectors
    /// that cannot be predicted are logged and left out.
    pub fn predict(
        &self,
        request: &PredictRequest,
        sectors: &[Sector],
        now: DateTime<Utc>,
    ) -> Result<Prediction, PredictError> {
        let (start, end) = request.time_range.resolve(now)?;
        let individual_only = request.output == OutputMode::Individual;
        let cutoffs = self.config.cutoff_table();

        if !request.force {
            if let Some(cached) = self.lookup(request, start, end) {
                let combined = (!individual_only).then(|| reduce(cached.clone(), Some(&cutoffs), false));
                return Ok(Prediction {
                    start,
                    end,
                    individual: cached,
                    combined,
                    from_cache: true,
                });
            }
            log::info!("Found no overpasses in pass prediction list, rerunning pass predictor");
        }

        let pairs = self.sat_sensor_pairs(request);
        if pairs.is_empty() {
            log::warn!("No satellite/sensor pairs to predict for {:?}", request.satellites);
            return Ok(Prediction::empty(start, end));
        }

        let hours = (end - start).num_milliseconds() as f64 / 3_600_000.0;
        let window = RunWindow {
            start,
            end,
            hours,
            now,
        };
        let mut all_passes = Vec::new();

        for satellite in unique(pairs.iter().map(|p| p.satellite.as_str())) {
            let sat_pairs: Vec<&SatSensorInfo> =
                pairs.iter().filter(|p| p.satellite == satellite).collect();
            self.predict_satellite(satellite, &sat_pairs, sectors, request, &window, &mut all_passes);
        }

        let individual = reduce(all_passes, None, true);
        let combined = (!individual_only).then(|| reduce(individual.clone(), Some(&cutoffs), false));
        log::info!(
            "{} individual overpasses predicted between {} and {}",
            individual.len(),
            start,
            end
        );

        Ok(Prediction {
            start,
            end,
            individual,
            combined,
            from_cache: false,
        })
    }

    fn lookup(
        &self,
        request: &PredictRequest,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Vec<OverPass>> {
        let cache = self.cache.as_ref()?;
        let found = cache.lookup(
            &request.satellites,
            start,
            end,
            request.sector_filter.as_deref(),
        );
        (!found.is_empty()).then_some(found)
    }

    fn sat_sensor_pairs(&self, request: &PredictRequest) -> Vec<SatSensorInfo> {
        let mut pairs = Vec::new();
        for satellite in &request.satellites {
            let sensors = if request.sensors.is_empty() {
                self.config.sensors_for(satellite)
            } else {
                request.sensors.clone()
            };
            for sensor in &sensors {
                let Some(info) = self.config.sat_sensor(satellite, sensor) else {
                    log::debug!("No metadata for {} / {}", satellite, sensor);
                    continue;
                };
                if !info.geostationary && info.orbital_period_s.is_none() {
                    log::warn!(
                        "{} is not geostationary and has no orbital period, not predicting {}",
                        satellite,
                        sensor
                    );
                    continue;
                }
                pairs.push(info);
            }
        }
        pairs
    }

    fn predict_satellite(
        &self,
        satellite: &str,
        pairs: &[&SatSensorInfo],
        sectors: &[Sector],
        request: &PredictRequest,
        window: &RunWindow,
        all_passes: &mut Vec<OverPass>,
    ) {
        let RunWindow {
            start,
            end,
            hours,
            now,
        } = *window;
        let Some(sat_config) = self.config.satellite(satellite) else {
            return;
        };
        let nominal = sat_config
            .nominal_longitude
            .filter(|_| sat_config.geostationary)
            .map(|lon| GeoPoint::new(lon, 0.0));
        // Static sectors run once per satellite and swath width, whatever the element date
        let mut swaths_done: HashMap<String, Vec<Option<f64>>> = HashMap::new();

        let day_count = (hours / 24.0).ceil() as i64;
        for n in (0..day_count).step_by(TLE_DATE_STRIDE) {
            let reference = end - Duration::days(n);
            let tle = match self.resolver.resolve(satellite, sat_config, reference, now) {
                Ok(tle) => Some(tle),
                Err(e) if nominal.is_some() => {
                    log::info!("{}, using nominal longitude for {}", e, satellite);
                    None
                }
                Err(e) => {
                    log::warn!("{}, skipping {} for {}", e, satellite, reference);
                    continue;
                }
            };
            let ephemeris = match (&tle, nominal) {
                (Some(tle), _) => Ephemeris::Elements(tle),
                (None, Some(point)) => Ephemeris::Fixed(point),
                (None, None) => continue,
            };

            for info in pairs {
                for sector in sectors {
                    if let Some(filter) = &request.sector_filter {
                        if !sector.matches_filter(filter) {
                            continue;
                        }
                    }
                    if !sector.active {
                        log::debug!("Sector {} is not active, skipping", sector.name);
                        continue;
                    }
                    if !sector.uses_sensor(&info.sensor) {
                        continue;
                    }
                    if sector.dynamic && sector.active_window.is_some_and(|w| w.start > end) {
                        continue;
                    }
                    if !sector.dynamic {
                        let done = swaths_done.entry(sector.name.clone()).or_default();
                        if done.contains(&info.swath_width_km) {
                            continue;
                        }
                        done.push(info.swath_width_km);
                    }

                    let (window_start, window_hours) = match sector.active_window {
                        Some(w) => (w.start, (w.end - w.start).num_milliseconds() as f64 / 3_600_000.0),
                        None => (start, hours.floor() + 1.0),
                    };
                    log::info!(
                        "Running {} {} over {} from {} for {}h",
                        satellite,
                        info.sensor,
                        sector.name,
                        window_start,
                        window_hours
                    );

                    let candidates = sample_points(sector).and_then(|points| {
                        find_overpasses(
                            &self.propagator,
                            info,
                            sector,
                            ephemeris,
                            window_start,
                            window_hours,
                            &points,
                        )
                    });
                    match candidates {
                        Ok(candidates) => accumulate(all_passes, candidates),
                        Err(e) => log::warn!(
                            "Failed to predict {} {} over {}: {}",
                            satellite,
                            info.sensor,
                            sector.name,
                            e
                        ),
                    }
                }
            }
            log::info!(
                "{} passes were predicted so far for {:.1} hour period starting on {}",
                all_passes.len(),
                hours,
                start
            );
        }
    }
}

/// Split a batch by the cache partition its sectors belong to. A pass is
/// dynamic only when every one of its sectors is.
pub fn partition_by_kind(
    passes: &[OverPass],
    sectors: &[Sector],
) -> Vec<(SectorKind, Vec<OverPass>)> {
    let dynamic: BTreeSet<&str> = sectors
        .iter()
        .filter(|s| s.dynamic)
        .map(|s| s.name.as_str())
        .collect();

    let (dynamic_passes, static_passes): (Vec<OverPass>, Vec<OverPass>) =
        passes.iter().cloned().partition(|p| {
            p.sector_names()
                .iter()
                .all(|name| dynamic.contains(name.as_str()))
        });

    [
        (SectorKind::Static, static_passes),
        (SectorKind::Dynamic, dynamic_passes),
    ]
    .into_iter()
    .filter(|(_, batch)| !batch.is_empty())
    .collect()
}

fn unique<'a>(names: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    names.filter(|n| seen.insert(*n)).collect()
}
