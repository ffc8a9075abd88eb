use std::sync::Mutex;

/// Escalation level of an operator alert about missing orbital elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum AlertLevel {
    #[strum(serialize = "level 1")]
    Level1,
    #[strum(serialize = "level 2")]
    Level2,
}

/// Delivers operator alerts. Transport (mail, paging) lives outside this crate.
pub trait Alerter {
    fn alert(&self, level: AlertLevel, satellite: &str, message: &str);
}

/// Writes alerts to the log: level 1 as warnings, level 2 as errors
#[derive(Debug, Default)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, level: AlertLevel, satellite: &str, message: &str) {
        match level {
            AlertLevel::Level1 => log::warn!("[{}] CHECK ON {} TLE: {}", level, satellite, message),
            AlertLevel::Level2 => log::error!("[{}] CHECK ON {} TLE: {}", level, satellite, message),
        }
    }
}

/// Keeps every alert in memory, used to inspect escalation
#[derive(Debug, Default)]
pub struct RecordingAlerter {
    alerts: Mutex<Vec<(AlertLevel, String)>>,
}

impl RecordingAlerter {
    pub fn alerts(&self) -> Vec<(AlertLevel, String)> {
        self.alerts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn count(&self, level: AlertLevel) -> usize {
        self.alerts().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Alerter for RecordingAlerter {
    fn alert(&self, level: AlertLevel, satellite: &str, _message: &str) {
        if let Ok(mut alerts) = self.alerts.lock() {
            alerts.push((level, satellite.to_string()));
        }
    }
}
