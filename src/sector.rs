use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ActiveWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A geographic region of interest, static or moving with a tracked storm
#[derive(Debug, Clone, Deserialize)]
pub struct Sector {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub dynamic: bool,
    /// Sensors whose data this sector is produced from
    #[serde(default)]
    pub sources: Vec<String>,
    pub center_lon: f64,
    pub center_lat: f64,
    pub width_km: f64,
    pub height_km: f64,
    #[serde(default)]
    pub active_window: Option<ActiveWindow>,
}

fn default_active() -> bool {
    true
}

impl Sector {
    pub fn uses_sensor(&self, sensor: &str) -> bool {
        self.sources.iter().any(|s| s.eq_ignore_ascii_case(sensor))
    }

    pub fn matches_filter(&self, filter: &[String]) -> bool {
        filter.iter().any(|f| f.eq_ignore_ascii_case(&self.name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectorList {
    pub sectors: Vec<Sector>,
}

impl SectorList {
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }
}
