use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sgp4::Elements;

use crate::alert::{AlertLevel, Alerter};
use crate::config::SatelliteConfig;
use crate::predict::error::PredictError;

pub const MAX_LOOKBACK_DAYS: i64 = 90;
const LEVEL1_AFTER_DAYS: i64 = 4;
const LEVEL2_AFTER_DAYS: i64 = 6;
const GIVE_UP_AFTER_DAYS: i64 = 8;

/// Orbital elements for one satellite, fixed for a prediction run
#[derive(Debug)]
pub struct Tle {
    pub catalog_name: String,
    pub line1: String,
    pub line2: String,
    pub epoch: DateTime<Utc>,
    pub elements: Elements,
}

impl Tle {
    pub fn parse(catalog_name: &str, line1: &str, line2: &str) -> Result<Self, PredictError> {
        let elements = Elements::from_tle(
            Some(catalog_name.to_string()),
            line1.as_bytes(),
            line2.as_bytes(),
        )
        .map_err(|e| PredictError::InvalidTle {
            satellite: catalog_name.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            catalog_name: catalog_name.to_string(),
            line1: line1.to_string(),
            line2: line2.to_string(),
            epoch: elements.datetime.and_utc(),
            elements,
        })
    }
}

/// Where daily element files come from
pub trait TleSource {
    fn read_day(&self, day: NaiveDate) -> io::Result<String>;
}

/// Daily element files stored as `<tle_dir>/YYYY/MM/DD`
pub struct TleDirectory {
    tle_dir: PathBuf,
}

impl TleDirectory {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self { tle_dir }
    }

    pub fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.tle_dir.join(day.format("%Y/%m/%d").to_string())
    }
}

impl TleSource for TleDirectory {
    fn read_day(&self, day: NaiveDate) -> io::Result<String> {
        fs::read_to_string(self.day_path(day))
    }
}

pub struct TleResolver<S: TleSource, A: Alerter> {
    source: S,
    alerter: A,
}

impl<S: TleSource, A: Alerter> TleResolver<S, A> {
    pub fn new(source: S, alerter: A) -> Self {
        Self { source, alerter }
    }

    pub fn alerter(&self) -> &A {
        &self.alerter
    }

    /// Find the newest elements at or before `reference`, walking back one day at a time.
    /// Elements older than a week are never used for past references; operators are
    /// alerted instead.
    pub fn resolve(
        &self,
        satellite: &str,
        info: &SatelliteConfig,
        reference: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Tle, PredictError> {
        let names = catalog_names(satellite, info);
        let enforce_staleness = reference < now && !info.inactive;
        let mut alerted_level1 = false;
        let mut alerted_level2 = false;

        for nn in 1..=MAX_LOOKBACK_DAYS {
            let day = (reference - Duration::days(nn - 1)).date_naive();

            if enforce_staleness && nn > LEVEL1_AFTER_DAYS {
                let message = format!(
                    "Haven't seen a TLE from {} in more than {} days, names {:?}, last tried {}",
                    satellite,
                    nn,
                    names,
                    day.format("%Y/%m/%d")
                );
                if nn > LEVEL2_AFTER_DAYS {
                    if !alerted_level2 {
                        alerted_level2 = true;
                        self.alerter.alert(AlertLevel::Level2, satellite, &message);
                    }
                    if nn > GIVE_UP_AFTER_DAYS {
                        continue;
                    }
                } else if !alerted_level1 {
                    alerted_level1 = true;
                    self.alerter.alert(AlertLevel::Level1, satellite, &message);
                }
            }

            let content = match self.source.read_day(day) {
                Ok(content) => content,
                Err(e) => {
                    log::warn!(
                        "Could not open TLE file for {} ({}): try previous day",
                        day,
                        e
                    );
                    continue;
                }
            };

            if let Some((name, line1, line2)) = find_entry(&content, &names) {
                log::info!("Using TLE '{}' for {} from {}", name, satellite, day);
                return Tle::parse(&name, &line1, &line2);
            }
        }

        log::warn!(
            "Never found TLE for {}, inactive: {}",
            satellite,
            info.inactive
        );
        Err(PredictError::TleNotFound {
            satellite: satellite.to_string(),
            reference,
            days: MAX_LOOKBACK_DAYS,
        })
    }
}

fn catalog_names(satellite: &str, info: &SatelliteConfig) -> Vec<String> {
    if info.tle_names.is_empty() {
        vec![satellite.to_string()]
    } else {
        info.tle_names.clone()
    }
}

/// First named entry whose name line contains any of `names`
fn find_entry(content: &str, names: &[String]) -> Option<(String, String, String)> {
    let wanted: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
    parse_multi_tle(content)
        .into_iter()
        .find_map(|(name, line1, line2)| {
            let name = name?;
            let lower = name.to_lowercase();
            wanted
                .iter()
                .any(|w| !w.is_empty() && lower.contains(w.as_str()))
                .then_some((name, line1, line2))
        })
}

/// Parse multi-satellite TLE content
fn parse_multi_tle(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1;
        }
    }

    result
}
