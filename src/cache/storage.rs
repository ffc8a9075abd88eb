use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::{debug, error, info, warn};

use crate::cache::CacheError;
use crate::predict::OverPass;

const NAME_TIME_FORMAT: &str = "%Y%m%d.%H%M%S";
const MARKER_TAG: &str = "_individual";
const PAYLOAD_SUFFIX: &str = ".pkl";

/// Top-level partition of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SectorKind {
    Static,
    Dynamic,
}

/// A cache marker file and the window encoded in its name
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMarker {
    pub path: PathBuf,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CacheMarker {
    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !(end < self.start || self.end < start)
    }

    pub fn payload_path(&self) -> PathBuf {
        payload_path(&self.path)
    }
}

/// Date-partitioned store of prediction batches, laid out as
/// `<root>/{static|dynamic}/YYYYMM/DD/<start>_<end>_individual[.pkl]`
pub struct ResultCache {
    root: PathBuf,
}

impl ResultCache {
    pub fn new(root: PathBuf) -> Self {
        ResultCache { root }
    }

    fn day_path(&self, kind: SectorKind, day: DateTime<Utc>) -> PathBuf {
        self.root
            .join(kind.as_ref())
            .join(day.format("%Y%m/%d").to_string())
    }

    /// Previously stored overpasses of `satellites` within `[start, end]`.
    /// An empty result means the caller has to predict.
    pub fn lookup(
        &self,
        satellites: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        sector_filter: Option<&[String]>,
    ) -> Vec<OverPass> {
        let wanted_sectors: Option<HashSet<String>> =
            sector_filter.map(|f| f.iter().map(|s| s.to_lowercase()).collect());

        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for kind in [SectorKind::Static, SectorKind::Dynamic] {
            let markers = self.markers_newest_first(kind, start, end);
            for marker in select_files(&markers, start, end) {
                let payload = marker.payload_path();
                info!("Using pass prediction list {}", payload.display());
                let batch = match load_payload(&payload) {
                    Ok(batch) => batch,
                    Err(e) => {
                        warn!("Cannot open pass prediction list {}: {}", payload.display(), e);
                        continue;
                    }
                };

                for pass in batch {
                    if !satellites.iter().any(|s| s == pass.satellite_name()) {
                        continue;
                    }
                    if let Some(wanted) = &wanted_sectors {
                        let in_filter = pass
                            .actual_sector_names()
                            .iter()
                            .any(|name| wanted.contains(&name.to_lowercase()));
                        if !in_filter {
                            continue;
                        }
                    }
                    if !pass.overlap_window(start, end, Duration::zero()) {
                        continue;
                    }
                    if seen.insert(pass.to_string()) {
                        found.push(pass);
                    }
                }
            }
        }

        found
    }

    /// Marker files in the day directories around `[start, end]`, newest first
    fn markers_newest_first(
        &self,
        kind: SectorKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<CacheMarker> {
        // Predictions run for more than a day, so look a day before the start
        let day_count = (end - start).num_days() + 4;
        let list_start = start - Duration::days(1);

        let mut markers = Vec::new();
        for n in (-1..=day_count).rev() {
            let dir = self.day_path(kind, list_start + Duration::days(n));
            if !dir.is_dir() {
                debug!("Directory does not exist: {}", dir.display());
                continue;
            }
            info!("Checking {}", dir.display());

            let files = match files_newest_first(&dir) {
                Ok(files) => files,
                Err(e) => {
                    error!("Failed to list {}: {}", dir.display(), e);
                    continue;
                }
            };

            for (name, path) in files {
                if name.contains(PAYLOAD_SUFFIX) || !name.contains(MARKER_TAG) {
                    continue;
                }
                match parse_marker_name(&name) {
                    Ok((start, end)) => markers.push(CacheMarker { path, start, end }),
                    Err(e) => warn!("SKIPPING: {}", e),
                }
            }
        }

        markers
    }

    /// Write a batch as payload plus marker. Each file appears under its
    /// final name only once fully written.
    pub fn store(
        &self,
        batch: &[OverPass],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        kind: SectorKind,
    ) -> Result<PathBuf, CacheError> {
        let dir = self.day_path(kind, start);
        fs::create_dir_all(&dir)?;

        let marker = dir.join(marker_name(start, end));
        write_atomic(&dir, &payload_path(&marker), &serde_json::to_vec(batch)?)?;

        let listing: String = batch.iter().map(|pass| format!("{}\n", pass)).collect();
        write_atomic(&dir, &marker, listing.as_bytes())?;

        info!("Stored {} overpasses in {}", batch.len(), marker.display());
        Ok(marker)
    }
}

/// Pick the marker files whose payloads cover a request.
///
/// `markers` must be ordered newest first. The newest overlapping marker is
/// always passed over since its writer may still be running. The next one is
/// kept; after that, once a marker ends before the kept coverage begins, the
/// marker visited just before it is kept and coverage extends to its start.
pub fn select_files(
    markers: &[CacheMarker],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<&CacheMarker> {
    let mut selected: Vec<&CacheMarker> = Vec::new();
    let mut skipped_newest = false;
    let mut coverage_start: Option<DateTime<Utc>> = None;
    let mut prev: Option<&CacheMarker> = None;

    for marker in markers.iter().filter(|m| m.overlaps(start, end)) {
        if !skipped_newest {
            skipped_newest = true;
            debug!("Skipping newest {}", marker.path.display());
            continue;
        }

        let keep = match (prev, coverage_start) {
            (None, _) => Some(marker),
            (Some(p), Some(limit)) if marker.end < limit => Some(p),
            _ => None,
        };
        if let Some(kept) = keep {
            coverage_start = Some(kept.start);
            if !selected.iter().any(|s| s.path == kept.path) {
                selected.push(kept);
            }
        }
        prev = Some(marker);
    }

    selected
}

/// Window encoded in a marker name `<start>_<end>_<rest>`
pub fn parse_marker_name(name: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), CacheError> {
    let invalid = || CacheError::InvalidName(name.to_string());
    let mut parts = name.splitn(3, '_');
    let (Some(start), Some(end), Some(_)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let parse = |s: &str| {
        NaiveDateTime::parse_from_str(s, NAME_TIME_FORMAT)
            .map(|dt| dt.and_utc())
            .map_err(|_| invalid())
    };
    Ok((parse(start)?, parse(end)?))
}

fn marker_name(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "{}_{}{}",
        start.format(NAME_TIME_FORMAT),
        end.format(NAME_TIME_FORMAT),
        MARKER_TAG
    )
}

fn payload_path(marker: &Path) -> PathBuf {
    let mut name = marker.as_os_str().to_owned();
    name.push(PAYLOAD_SUFFIX);
    PathBuf::from(name)
}

fn load_payload(path: &Path) -> Result<Vec<OverPass>, CacheError> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Directory entries newest first; equal times put the later name first.
/// Entries that vanish or cannot be inspected while listing are skipped.
fn files_newest_first(dir: &Path) -> Result<Vec<(String, PathBuf)>, CacheError> {
    let mut files: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in dir.read_dir()? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()).map(String::from) else {
            continue;
        };
        match modified_time(&path) {
            Ok(Some(modified)) => files.push((modified, name, path)),
            Ok(None) => {}
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(files.into_iter().map(|(_, name, path)| (name, path)).collect())
}

/// Modification time of a regular file, `None` for anything else
fn modified_time(path: &Path) -> std::io::Result<Option<SystemTime>> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Ok(None);
    }
    metadata.modified().map(Some)
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    let written = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, target));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", tmp.display(), cleanup);
            }
        }
        return Err(e.into());
    }
    Ok(())
}
