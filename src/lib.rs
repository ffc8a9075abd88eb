pub mod alert;
pub mod cache;
pub mod config;
pub mod predict;
pub mod scheduler;
pub mod sector;

pub use alert::{AlertLevel, Alerter, LogAlerter};
pub use config::{Config, ConfigError, SchedulingConfig};
pub use predict::{OverPass, PredictError};
pub use scheduler::{OutputMode, PredictRequest, Prediction, Scheduler};
pub use sector::{Sector, SectorList};
