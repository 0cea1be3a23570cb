//! Durable file cache: one file per request fingerprint, raw response body as
//! the payload, file mtime driving TTL expiry.

use super::keys::RequestFingerprint;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &RequestFingerprint) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Load a cached payload if present and younger than `ttl`.
    /// `None` TTL means entries never expire. Unreadable entries are misses.
    pub fn load(&self, key: &RequestFingerprint, ttl: Option<Duration>) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        if let Some(ttl) = ttl {
            if entry_age(&path)? > ttl {
                debug!("cache entry expired: {}", key);
                return None;
            }
        } else if !path.exists() {
            return None;
        }
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("cache hit: {}", key);
                Some(bytes)
            }
            Err(err) => {
                debug!("cache read failed for {}: {}", key, err);
                None
            }
        }
    }

    /// Persist a payload, overwriting any previous entry for the fingerprint.
    pub fn store(&self, key: &RequestFingerprint, payload: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        fs::write(&path, payload)?;
        Ok(path)
    }
}

fn entry_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(
        SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO),
    )
}
