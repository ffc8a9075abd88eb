use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::predict::error::PredictError;

const RENDER_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const MERGE_TOLERANCE: Duration = Duration::minutes(5);
const DEFAULT_PARSED_MINUTES: f64 = 10.0;

/// Optional per-pass illumination and location details.
/// They never influence merging; a merge keeps the first operand's values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassDetails {
    pub lunar_phase: Option<f64>,
    pub lunar_alt_deg: Option<f64>,
    pub solar_alt_deg: Option<f64>,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
}

/// One predicted viewing opportunity of a satellite over one or more sectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverPass {
    satellite_name: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    sector_names: Vec<String>,
    cpa_km: f64,
    #[serde(default)]
    details: PassDetails,
}

/// Outcome of [`OverPass::combine`]
#[derive(Debug, Clone, PartialEq)]
pub enum Combined {
    Merged(OverPass),
    Unmerged(OverPass, OverPass),
}

impl OverPass {
    pub fn new(
        satellite_name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sector_names: Vec<String>,
        cpa_km: f64,
    ) -> Result<Self, PredictError> {
        if end < start {
            return Err(PredictError::InvalidWindow { start, end });
        }
        Ok(Self::from_parts(
            satellite_name.into(),
            start,
            end,
            sector_names,
            cpa_km,
            PassDetails::default(),
        ))
    }

    fn from_parts(
        satellite_name: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sector_names: Vec<String>,
        cpa_km: f64,
        details: PassDetails,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let sector_names = sector_names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self {
            satellite_name,
            start,
            end,
            sector_names,
            cpa_km,
            details,
        }
    }

    pub fn with_details(mut self, details: PassDetails) -> Self {
        self.details = details;
        self
    }

    pub fn satellite_name(&self) -> &str {
        &self.satellite_name
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn sector_names(&self) -> &[String] {
        &self.sector_names
    }

    pub fn cpa_km(&self) -> f64 {
        self.cpa_km
    }

    pub fn details(&self) -> &PassDetails {
        &self.details
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration().num_milliseconds() as f64 / 60_000.0
    }

    /// Midpoint of the observation window
    pub fn base(&self) -> DateTime<Utc> {
        self.start + self.duration() / 2
    }

    /// Sector names with any trailing 6-digit ground-track suffix removed
    pub fn actual_sector_names(&self) -> BTreeSet<String> {
        self.sector_names
            .iter()
            .map(|name| strip_track_suffix(name).to_string())
            .collect()
    }

    pub fn overlap(&self, other: &OverPass, max_time_diff: Duration) -> bool {
        self.overlap_window(other.start, other.end, max_time_diff)
    }

    /// Overlap test against a window that has no `OverPass` yet.
    ///
    /// Windows overlap when they share more than an instant, or when the gap
    /// between them is strictly shorter than `max_time_diff`.
    pub fn overlap_window(
        &self,
        other_start: DateTime<Utc>,
        other_end: DateTime<Utc>,
        max_time_diff: Duration,
    ) -> bool {
        let gap = (other_start - self.end).max(self.start - other_end);
        gap < max_time_diff.max(Duration::zero())
    }

    pub fn concurrent_base(&self, other: &OverPass, max_time_diff: Duration) -> bool {
        (self.base() - other.base()).abs() < max_time_diff
    }

    /// Merge `other` into `self` when both describe the same viewing opportunity.
    /// `cutoff` bounds the duration `other` may already have; `None` disables it.
    pub fn combine(
        &self,
        other: Option<&OverPass>,
        cutoff: Option<Duration>,
        individual: bool,
    ) -> Combined {
        let Some(other) = other else {
            return Combined::Merged(self.clone());
        };

        let within_cutoff = cutoff.map_or(true, |c| other.duration() < c);
        if self.satellite_name != other.satellite_name
            || !within_cutoff
            || !self.overlap(other, MERGE_TOLERANCE)
        {
            return Combined::Unmerged(self.clone(), other.clone());
        }
        if individual && self.sector_names != other.sector_names {
            return Combined::Unmerged(self.clone(), other.clone());
        }

        let sector_names: BTreeSet<String> = self
            .sector_names
            .iter()
            .chain(other.sector_names.iter())
            .cloned()
            .collect();

        Combined::Merged(Self::from_parts(
            self.satellite_name.clone(),
            self.start.min(other.start),
            self.end.max(other.end),
            sector_names.into_iter().collect(),
            (self.cpa_km + other.cpa_km) / 2.0,
            self.details.clone(),
        ))
    }
}

/// Renders `base satellite cpa sectors minutes` plus any tagged details.
///
/// Precision is lost in these fields: the base time keeps whole seconds, the
/// CPA whole kilometres, the duration a tenth of a minute and each detail a
/// tenth of its unit (lunar phase a tenth of a percent).
impl fmt::Display for OverPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {:5.0} {} {:5.1}",
            self.base().format(RENDER_TIME_FORMAT),
            self.satellite_name,
            self.cpa_km,
            self.sector_names.join("-"),
            self.duration_minutes()
        )?;
        let d = &self.details;
        let tagged = [
            (d.lunar_phase.map(|p| p * 100.0), "LP"),
            (d.lunar_alt_deg, "LA"),
            (d.solar_alt_deg, "SA"),
            (d.center_lat, "CLat"),
            (d.center_lon, "CLon"),
        ];
        for (value, tag) in tagged {
            if let Some(v) = value {
                write!(f, " {:5.1}{}", v, tag)?;
            }
        }
        Ok(())
    }
}

impl FromStr for OverPass {
    type Err = PredictError;

    /// Parses the rendered form. The window is rebuilt symmetrically around
    /// the base time from the encoded duration.
    ///
    /// Besides the precision dropped by `Display`, the satellite name comes
    /// back lower-cased and a sector name containing `-` comes back split in two.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PredictError::Parse(s.trim().to_string());
        let parts: Vec<&str> = s.split_whitespace().collect();
        if parts.len() < 5 {
            return Err(err());
        }

        let base = NaiveDateTime::parse_from_str(
            &format!("{} {}", parts[0], parts[1]),
            RENDER_TIME_FORMAT,
        )
        .map_err(|_| err())?
        .and_utc();
        let satellite_name = parts[2].to_lowercase();
        let cpa_km: f64 = parts[3].parse().map_err(|_| err())?;
        let sector_names = parts[4].split('-').map(String::from).collect();

        let minutes = match parts.get(5) {
            Some(m) => m.parse::<f64>().map_err(|_| err())?,
            None => {
                log::warn!(
                    "Total minutes not specified for overpass, defaulting to {}",
                    DEFAULT_PARSED_MINUTES
                );
                DEFAULT_PARSED_MINUTES
            }
        };
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(err());
        }
        let half = Duration::milliseconds((minutes * 30_000.0).round() as i64);

        let mut details = PassDetails::default();
        for token in parts.iter().skip(6) {
            // CLat/CLon first so "LA" does not swallow "CLat"
            let (slot, value) = if let Some(v) = token.strip_suffix("CLat") {
                (&mut details.center_lat, v)
            } else if let Some(v) = token.strip_suffix("CLon") {
                (&mut details.center_lon, v)
            } else if let Some(v) = token.strip_suffix("LP") {
                (&mut details.lunar_phase, v)
            } else if let Some(v) = token.strip_suffix("LA") {
                (&mut details.lunar_alt_deg, v)
            } else if let Some(v) = token.strip_suffix("SA") {
                (&mut details.solar_alt_deg, v)
            } else {
                return Err(err());
            };
            *slot = Some(value.parse().map_err(|_| err())?);
        }
        if let Some(phase) = details.lunar_phase.as_mut() {
            *phase /= 100.0;
        }

        Ok(Self::from_parts(
            satellite_name,
            base - half,
            base + half,
            sector_names,
            cpa_km,
            details,
        ))
    }
}

/// Strips a trailing 6-digit ground-track suffix from a dynamic sector name
pub fn strip_track_suffix(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() >= 6 && bytes[bytes.len() - 6..].iter().all(u8::is_ascii_digit) {
        &name[..name.len() - 6]
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 1, 10, h, m, s).unwrap()
    }

    fn pass(sat: &str, start: DateTime<Utc>, mins: i64, sectors: &[&str], cpa: f64) -> OverPass {
        OverPass::new(
            sat,
            start,
            start + Duration::minutes(mins),
            sectors.iter().map(|s| s.to_string()).collect(),
            cpa,
        )
        .unwrap()
    }

    #[test]
    fn rejects_inverted_window() {
        let res = OverPass::new("npp", at(1, 0, 0), at(0, 0, 0), vec!["a".into()], 0.0);
        assert!(matches!(res, Err(PredictError::InvalidWindow { .. })));
    }

    #[test]
    fn base_is_window_midpoint() {
        let p = pass("npp", at(10, 0, 0), 10, &["gulfmex"], 100.0);
        assert_eq!(p.base(), at(10, 5, 0));
        assert!(p.start() <= p.base() && p.base() <= p.end());
    }

    #[test]
    fn sector_names_are_deduplicated_in_order() {
        let p = pass("npp", at(10, 0, 0), 10, &["b", "a", "b"], 0.0);
        assert_eq!(p.sector_names(), &["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn renders_fixed_format() {
        let p = pass("npp", at(10, 0, 0), 10, &["gulfmex", "wpac"], 123.4);
        assert_eq!(p.to_string(), "2016/01/10 10:05:00 npp   123 gulfmex-wpac  10.0");
    }

    #[test]
    fn renders_tagged_details() {
        let p = pass("npp", at(10, 0, 0), 10, &["gulfmex"], 5.0).with_details(PassDetails {
            lunar_phase: Some(0.5),
            center_lat: Some(25.0),
            ..Default::default()
        });
        assert_eq!(
            p.to_string(),
            "2016/01/10 10:05:00 npp     5 gulfmex  10.0  50.0LP  25.0CLat"
        );
    }

    #[test]
    fn parse_render_round_trip() {
        let p = pass("goes16", at(3, 20, 0), 12, &["conus", "gulfmex"], 812.0).with_details(
            PassDetails {
                lunar_phase: Some(0.25),
                lunar_alt_deg: Some(-12.5),
                solar_alt_deg: Some(40.0),
                center_lat: Some(25.5),
                center_lon: Some(-90.5),
            },
        );
        let parsed: OverPass = p.to_string().parse().unwrap();
        assert_eq!(parsed, p);
        assert_eq!(parsed.to_string(), p.to_string());
    }

    #[test]
    fn parse_drops_only_the_documented_precision() {
        let start = at(3, 20, 0) + Duration::milliseconds(400);
        let p = OverPass::new(
            "NPP",
            start,
            start + Duration::seconds(12 * 60 + 2),
            vec!["conus".to_string(), "gulfmex".to_string()],
            123.4,
        )
        .unwrap()
        .with_details(PassDetails {
            lunar_phase: Some(0.12345),
            solar_alt_deg: Some(-7.26),
            center_lat: Some(25.04),
            ..Default::default()
        });
        let parsed: OverPass = p.to_string().parse().unwrap();

        assert_eq!(parsed.satellite_name(), "npp");
        assert_eq!(parsed.sector_names(), p.sector_names());
        assert_eq!(parsed.base(), at(3, 26, 1));
        assert_eq!(parsed.duration(), Duration::seconds(12 * 60));
        assert_eq!(parsed.cpa_km(), 123.0);
        let phase = parsed.details().lunar_phase.unwrap();
        assert!((phase - 0.123).abs() < 1e-12);
        assert_eq!(parsed.details().lunar_alt_deg, None);
        assert_eq!(parsed.details().solar_alt_deg, Some(-7.3));
        assert_eq!(parsed.details().center_lat, Some(25.0));
        assert_eq!(parsed.to_string(), p.to_string().replacen("NPP", "npp", 1));
    }

    #[test]
    fn parse_defaults_missing_duration() {
        let parsed: OverPass = "2016/01/10 10:05:00 NPP 12 gulfmex".parse().unwrap();
        assert_eq!(parsed.satellite_name(), "npp");
        assert_eq!(parsed.duration(), Duration::minutes(10));
        assert_eq!(parsed.base(), at(10, 5, 0));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("not an overpass".parse::<OverPass>().is_err());
        assert!("2016/01/10 10:05:00 npp x gulfmex 10.0".parse::<OverPass>().is_err());
        assert!("2016/01/10 10:05:00 npp 1 gulfmex 10.0 3.0XX".parse::<OverPass>().is_err());
    }

    #[test]
    fn strips_track_suffix() {
        let p = pass("npp", at(0, 0, 0), 10, &["wp152016", "tc2016wp15", "gulfmex"], 0.0);
        let names: Vec<String> = p.actual_sector_names().into_iter().collect();
        assert_eq!(names, vec!["gulfmex", "tc2016wp15", "wp"]);
        assert_eq!(strip_track_suffix("12345"), "12345");
    }

    #[test]
    fn overlap_allows_tolerance() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 0.0);
        let b = pass("npp", at(10, 14, 0), 10, &["a"], 0.0);
        assert!(!a.overlap(&b, Duration::zero()));
        assert!(a.overlap(&b, Duration::minutes(5)));
        assert!(b.overlap(&a, Duration::minutes(5)));
        assert!(a.overlap_window(at(10, 9, 0), at(10, 30, 0), Duration::zero()));
    }

    #[test]
    fn overlap_tolerance_is_strict() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 0.0);
        let five_apart = pass("npp", at(10, 15, 0), 10, &["a"], 0.0);
        let just_under = pass("npp", at(10, 14, 59), 10, &["a"], 0.0);
        assert!(!a.overlap(&five_apart, Duration::minutes(5)));
        assert!(!five_apart.overlap(&a, Duration::minutes(5)));
        assert!(a.overlap(&just_under, Duration::minutes(5)));
        assert!(matches!(
            a.combine(Some(&five_apart), None, false),
            Combined::Unmerged(_, _)
        ));
    }

    #[test]
    fn touching_windows_need_a_tolerance() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 0.0);
        let b = pass("npp", at(10, 10, 0), 10, &["a"], 0.0);
        assert!(!a.overlap(&b, Duration::zero()));
        assert!(a.overlap(&b, Duration::seconds(1)));
        assert!(a.overlap(&pass("npp", at(10, 2, 0), 3, &["a"], 0.0), Duration::zero()));
    }

    #[test]
    fn concurrent_base_within_ten_minutes() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 0.0);
        let b = pass("npp", at(10, 9, 0), 10, &["a"], 0.0);
        let exactly_ten = pass("npp", at(10, 10, 0), 10, &["a"], 0.0);
        let c = pass("npp", at(10, 11, 0), 10, &["a"], 0.0);
        assert!(a.concurrent_base(&b, Duration::minutes(10)));
        assert!(!a.concurrent_base(&exactly_ten, Duration::minutes(10)));
        assert!(!a.concurrent_base(&c, Duration::minutes(10)));
    }

    #[test]
    fn combine_merges_window_and_sectors() {
        let a = pass("npp", at(10, 0, 0), 10, &["b"], 100.0);
        let b = pass("npp", at(10, 6, 0), 10, &["a"], 200.0);
        match a.combine(Some(&b), Some(Duration::minutes(90)), false) {
            Combined::Merged(m) => {
                assert_eq!(m.start(), at(10, 0, 0));
                assert_eq!(m.end(), at(10, 16, 0));
                assert_eq!(m.sector_names(), &["a".to_string(), "b".to_string()]);
                assert_eq!(m.cpa_km(), 150.0);
            }
            other => panic!("expected merge, got {other:?}"),
        }
    }

    #[test]
    fn combine_without_other_returns_self() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 1.0);
        assert_eq!(a.combine(None, None, true), Combined::Merged(a.clone()));
    }

    #[test]
    fn individual_keeps_distinct_sector_sets_apart() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 0.0);
        let b = pass("npp", at(10, 2, 0), 10, &["b"], 0.0);
        assert!(matches!(
            a.combine(Some(&b), None, true),
            Combined::Unmerged(_, _)
        ));
        assert!(matches!(a.combine(Some(&b), None, false), Combined::Merged(_)));
    }

    #[test]
    fn different_satellites_never_merge() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 0.0);
        let b = pass("noaa20", at(10, 0, 0), 10, &["a"], 0.0);
        match a.combine(Some(&b), None, false) {
            Combined::Unmerged(x, y) => {
                assert_eq!(x, a);
                assert_eq!(y, b);
            }
            other => panic!("expected no merge, got {other:?}"),
        }
    }

    #[test]
    fn cutoff_limits_duration_of_other() {
        let a = pass("npp", at(10, 0, 0), 10, &["a"], 0.0);
        let long = pass("npp", at(9, 50, 0), 30, &["a"], 0.0);
        assert!(matches!(
            a.combine(Some(&long), Some(Duration::minutes(20)), false),
            Combined::Unmerged(_, _)
        ));
        assert!(matches!(a.combine(Some(&long), None, false), Combined::Merged(_)));
    }

    #[test]
    fn goes16_sector_sets_merge_in_combined_mode() {
        let a = pass("goes16", at(12, 0, 0), 10, &["A"], 10.0);
        let b = pass("goes16", at(12, 12, 0), 10, &["A", "B"], 20.0);
        match a.combine(Some(&b), Some(Duration::minutes(20)), false) {
            Combined::Merged(m) => {
                assert_eq!(m.sector_names(), &["A".to_string(), "B".to_string()]);
                assert_eq!(m.start(), at(12, 0, 0));
                assert_eq!(m.end(), at(12, 22, 0));
            }
            other => panic!("expected merge, got {other:?}"),
        }
    }
}
