pub mod runner;
pub mod time_range;

pub use runner::{partition_by_kind, OutputMode, PredictRequest, Prediction, Scheduler};
pub use time_range::{parse_duration, parse_time, TimeRangeArgs};
