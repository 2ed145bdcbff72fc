use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::models::DateRange;

const EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to create cache directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read cache file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to serialize cache entry '{key}': {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
    #[error("failed to write cache file '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Cache key of the account tree for a reference date
pub fn accounts_key(reference_date: NaiveDate) -> String {
    format!("accounts_{}", reference_date.format("%Y-%m-%d"))
}

/// Cache key of a report batch for a date range
pub fn analytics_key(range: &DateRange) -> String {
    format!(
        "analytics_{}_{}",
        range.start_date.format("%Y-%m-%d"),
        range.end_date.format("%Y-%m-%d")
    )
}

/// JSON snapshots stored one file per key under a single directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open the cache directory, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| CacheError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    /// Load the snapshot stored under `key`
    ///
    /// Returns `None` when no snapshot exists. A snapshot that no longer
    /// deserializes is deleted and also reported as `None`.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let path = self.path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Read { path, source }),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!("Loaded cache entry from '{}'", path.display());
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Discarding unreadable cache file '{}': {e}", path.display());
                if let Err(e) = fs::remove_file(&path).await {
                    warn!("Failed to remove '{}': {e}", path.display());
                }
                Ok(None)
            }
        }
    }

    /// Store `value` under `key`, replacing any previous snapshot atomically
    ///
    /// The snapshot is written to a temporary sibling and renamed into place;
    /// on failure the temporary file is removed and nothing is left behind.
    pub async fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<PathBuf, CacheError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| CacheError::Serialize {
            key: key.to_string(),
            source,
        })?;

        let path = self.path(key);
        let tmp = self.dir.join(format!(".{key}.{EXTENSION}.tmp"));

        let written = match fs::write(&tmp, &bytes).await {
            Ok(()) => fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };

        if let Err(source) = written {
            if let Err(e) = fs::remove_file(&tmp).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove partial cache file '{}': {e}", tmp.display());
                }
            }
            return Err(CacheError::Write { path, source });
        }

        debug!("Stored cache entry at '{}'", path.display());
        Ok(path)
    }

    /// Remove the snapshot stored under `key`; returns whether one existed
    pub async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Write { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        values: Vec<u32>,
    }

    fn entry() -> Entry {
        Entry {
            name: "acme".into(),
            values: vec![1, 2, 3],
        }
    }

    #[test]
    fn keys_embed_dates() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

        assert_eq!(accounts_key(day), "accounts_2024-01-15");
        assert_eq!(
            analytics_key(&DateRange::new(day, later).unwrap()),
            "analytics_2024-01-15_2024-02-01"
        );
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path().join("2024/January")).await.unwrap();

        assert_eq!(cache.load::<Entry>("accounts_2024-01-15").await.unwrap(), None);

        let path = cache.store("accounts_2024-01-15", &entry()).await.unwrap();
        assert_eq!(path, tmp.path().join("2024/January/accounts_2024-01-15.json"));
        assert_eq!(
            cache.load::<Entry>("accounts_2024-01-15").await.unwrap(),
            Some(entry())
        );

        let leftovers: Vec<_> = std::fs::read_dir(cache.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).await.unwrap();
        std::fs::write(cache.path("broken"), b"{\"name\": ").unwrap();

        assert_eq!(cache.load::<Entry>("broken").await.unwrap(), None);
        assert!(!cache.path("broken").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).await.unwrap();
        // A directory in place of the target makes the rename fail
        std::fs::create_dir(cache.path("blocked")).unwrap();
        std::fs::write(cache.path("blocked").join("child"), b"x").unwrap();

        let err = cache.store("blocked", &entry()).await.unwrap_err();

        assert!(matches!(err, CacheError::Write { .. }));
        assert!(!tmp.path().join(".blocked.json.tmp").exists());
    }

    #[tokio::test]
    async fn remove_reports_whether_entry_existed() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path()).await.unwrap();
        cache.store("k", &entry()).await.unwrap();

        assert!(cache.remove("k").await.unwrap());
        assert!(!cache.remove("k").await.unwrap());
    }
}
