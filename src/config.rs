use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::predict::CutoffTable;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Daily element files, laid out as YYYY/MM/DD
    pub tle_dir: PathBuf,
    /// Pass prediction list root; caching is off without it
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub scheduling: SchedulingConfig,
}

impl Config {
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }
}

/// Static satellite and sensor metadata the scheduler is driven by
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub satellites: BTreeMap<String, SatelliteConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SatelliteConfig {
    /// Catalog names in TLE files, current name first
    #[serde(default)]
    pub tle_names: Vec<String>,
    #[serde(default)]
    pub orbital_period_s: Option<f64>,
    #[serde(default)]
    pub merge_cutoff_minutes: Option<f64>,
    #[serde(default)]
    pub geostationary: bool,
    /// Fixed sub-point longitude for geostationary satellites without elements
    #[serde(default)]
    pub nominal_longitude: Option<f64>,
    /// Permanently out of service, never alert on missing elements
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub swath_width_km: Option<f64>,
    pub per_file_duration_minutes: f64,
}

/// Metadata for one satellite/sensor pair
#[derive(Debug, Clone, PartialEq)]
pub struct SatSensorInfo {
    pub satellite: String,
    pub sensor: String,
    pub orbital_period_s: Option<f64>,
    pub swath_width_km: Option<f64>,
    pub per_file_duration_minutes: f64,
    pub geostationary: bool,
}

impl SchedulingConfig {
    pub fn satellite(&self, name: &str) -> Option<&SatelliteConfig> {
        self.satellites.get(name)
    }

    pub fn sat_sensor(&self, satellite: &str, sensor: &str) -> Option<SatSensorInfo> {
        let sat = self.satellites.get(satellite)?;
        let (sensor_name, info) = sat
            .sensors
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(sensor))?;
        Some(SatSensorInfo {
            satellite: satellite.to_string(),
            sensor: sensor_name.clone(),
            orbital_period_s: sat.orbital_period_s,
            swath_width_km: info.swath_width_km,
            per_file_duration_minutes: info.per_file_duration_minutes,
            geostationary: sat.geostationary,
        })
    }

    /// Every sensor configured for a satellite
    pub fn sensors_for(&self, satellite: &str) -> Vec<String> {
        self.satellites
            .get(satellite)
            .map(|s| s.sensors.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cutoff_table(&self) -> CutoffTable {
        self.satellites
            .iter()
            .filter_map(|(name, sat)| sat.merge_cutoff_minutes.map(|c| (name.clone(), c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
tle_dir: /data/tle
cache_dir: /data/pass_prediction
satellites:
  npp:
    tle_names: ["SUOMI NPP", "NPP"]
    orbital_period_s: 6086
    merge_cutoff_minutes: 20
    sensors:
      viirs: { swath_width_km: 3000, per_file_duration_minutes: 6 }
  goes16:
    geostationary: true
    nominal_longitude: -75.2
    sensors:
      abi: { per_file_duration_minutes: 10 }
"#;

    #[test]
    fn parses_config() {
        let config = Config::from_str(YAML).unwrap();
        assert_eq!(config.tle_dir, PathBuf::from("/data/tle"));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/data/pass_prediction")));
        assert_eq!(config.scheduling.satellites.len(), 2);
    }

    #[test]
    fn resolves_sat_sensor_case_insensitive() {
        let config = Config::from_str(YAML).unwrap();
        let info = config.scheduling.sat_sensor("npp", "VIIRS").unwrap();
        assert_eq!(info.sensor, "viirs");
        assert_eq!(info.swath_width_km, Some(3000.0));
        assert_eq!(info.orbital_period_s, Some(6086.0));
        assert!(!info.geostationary);

        let geo = config.scheduling.sat_sensor("goes16", "abi").unwrap();
        assert!(geo.geostationary);
        assert_eq!(geo.orbital_period_s, None);

        assert!(config.scheduling.sat_sensor("npp", "abi").is_none());
        assert!(config.scheduling.sat_sensor("metop-a", "avhrr").is_none());
    }

    #[test]
    fn cutoff_table_only_lists_configured_satellites() {
        let config = Config::from_str(YAML).unwrap();
        let table = config.scheduling.cutoff_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("npp"), Some(&20.0));
        assert_eq!(config.scheduling.sensors_for("goes16"), vec!["abi".to_string()]);
    }
}
