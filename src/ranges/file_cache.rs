//! File-based local copy of the egress range list
//!
//! The last successfully fetched document is mirrored to
//! `{data_dir}/cache/egress-ip-ranges.csv`. The file's modification time is
//! the staleness oracle: it records when the data was fetched, and survives
//! process restarts so a fresh process can warm up without a network call.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::error::{RangeError, RangeResult};

/// Default TTL for the range list (24 hours)
pub const DEFAULT_RANGES_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// File name of the local copy inside the cache directory
pub const RANGES_CACHE_FILE: &str = "egress-ip-ranges.csv";

/// Check whether data modified at `modified_at` is still fresh at `now`.
///
/// The comparison is strict: data exactly `max_age` old is stale. A
/// modification time in the future (clock skew) counts as fresh.
pub fn is_within_age(modified_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    let age = now.signed_duration_since(modified_at);
    match chrono::Duration::from_std(max_age) {
        Ok(max_age) => age < max_age,
        // max_age beyond chrono's range never expires
        Err(_) => true,
    }
}

/// Local copy of the range list
#[derive(Debug, Clone)]
pub struct RangeFileCache {
    path: PathBuf,
}

impl RangeFileCache {
    /// Create a file cache under `{data_dir}/cache`, creating the directory
    pub fn new(data_dir: &str) -> RangeResult<Self> {
        let cache_dir = PathBuf::from(data_dir).join("cache");
        fs::create_dir_all(&cache_dir).map_err(|source| RangeError::LocalCopy {
            path: cache_dir.clone(),
            source,
        })?;
        Ok(Self::at_path(cache_dir.join(RANGES_CACHE_FILE)))
    }

    /// Use an explicit file path, without touching the filesystem
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Modification time of the local copy, if it exists
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(&self.path).ok()?.modified().ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    /// Check if the local copy exists and is younger than `max_age` at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.modified_at()
            .is_some_and(|modified_at| is_within_age(modified_at, now, max_age))
    }

    /// Read the local copy
    pub fn load(&self) -> RangeResult<String> {
        fs::read_to_string(&self.path).map_err(|source| RangeError::LocalCopy {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrite the local copy with a freshly fetched document.
    ///
    /// The document is written to a sibling temporary file and renamed into
    /// place, so readers never see a half-written copy.
    pub fn store(&self, content: &str) -> RangeResult<()> {
        let tmp_path = self.path.with_extension("csv.tmp");
        let to_error = |source| RangeError::LocalCopy {
            path: self.path.clone(),
            source,
        };

        fs::write(&tmp_path, content).map_err(to_error)?;
        fs::rename(&tmp_path, &self.path).map_err(to_error)?;

        info!("Cached {} bytes of range data to {:?}", content.len(), self.path);
        Ok(())
    }

    /// Remove the local copy
    pub fn clear(&self) -> RangeResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|source| RangeError::LocalCopy {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
