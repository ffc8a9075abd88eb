mod storage;

use thiserror::Error;

pub use storage::{parse_marker_name, select_files, CacheMarker, ResultCache, SectorKind};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Invalid cache file name: {0}")]
    InvalidName(String),
}
