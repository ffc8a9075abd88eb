use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("No TLE found for {satellite} within {days} days before {reference}")]
    TleNotFound {
        satellite: String,
        reference: DateTime<Utc>,
        days: i64,
    },
    #[error("Invalid TLE for {satellite}: {message}")]
    InvalidTle { satellite: String, message: String },
    #[error("Propagation error: {0}")]
    Propagation(String),
    #[error("Degenerate geometry for sector {sector}: {reason}")]
    GeometryDegenerate { sector: String, reason: String },
    #[error("Invalid overpass window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("Invalid overpass record '{0}'")]
    Parse(String),
}
