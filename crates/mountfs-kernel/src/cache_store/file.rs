//! File-backed cache store.
//!
//! One file per key. The file name is the BLAKE3 hex digest of the key; the
//! first eight bytes hold the expiry as little-endian unix seconds (0 for
//! never), the rest is the value. Writes go to a temporary file that is then
//! renamed over the entry, so readers never see a torn value.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::fs;

use super::{CacheStore, TTL_FOREVER};
use crate::vfs::error::{FsError, FsResult};

const HEADER_LEN: usize = 8;

/// Cache store persisting entries under a directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Open (and create if needed) a cache directory.
    pub async fn open(dir: impl Into<PathBuf>) -> FsResult<Self> {
        let dir: PathBuf = dir.into();
        fs::create_dir_all(&dir).await?;
        let dir = dunce::canonicalize(&dir)?;
        Ok(Self { dir })
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(blake3::hash(key.as_bytes()).to_hex().as_str())
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Read a fresh entry, removing it if it has expired.
    async fn load(&self, key: &str) -> FsResult<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        let mut raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.len() < HEADER_LEN {
            tracing::warn!(path = %path.display(), "truncated cache entry, discarding");
            self.remove(&path).await?;
            return Ok(None);
        }
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&raw[..HEADER_LEN]);
        let expires_at = u64::from_le_bytes(header);
        if expires_at != 0 && expires_at <= Self::now() {
            self.remove(&path).await?;
            return Ok(None);
        }
        Ok(Some(raw.split_off(HEADER_LEN)))
    }

    async fn remove(&self, path: &Path) -> FsResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FsError::backend_with("removing cache entry", e)),
        }
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn contains(&self, key: &str) -> FsResult<bool> {
        Ok(self.load(key).await?.is_some())
    }

    async fn fetch(&self, key: &str) -> FsResult<Option<Vec<u8>>> {
        self.load(key).await
    }

    async fn save(&self, key: &str, value: Vec<u8>, ttl: u64) -> FsResult<()> {
        let expires_at = if ttl == TTL_FOREVER {
            0
        } else {
            Self::now().saturating_add(ttl)
        };
        let mut raw = Vec::with_capacity(HEADER_LEN + value.len());
        raw.extend_from_slice(&expires_at.to_le_bytes());
        raw.extend_from_slice(&value);

        let path = self.entry_path(key);
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::now_v7().simple()));
        let replaced = match fs::write(&tmp, &raw).await {
            Ok(()) => fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = replaced {
            let _ = fs::remove_file(&tmp).await;
            return Err(FsError::backend_with("replacing cache entry", e));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> FsResult<()> {
        self.remove(&self.entry_path(key)).await
    }
}
