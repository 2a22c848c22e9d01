//! Cache-through adapter.
//!
//! Metadata and directory listings are read through a [`CacheStore`]: a miss
//! asks the wrapped adapter, stores the combined snapshot with the configured
//! TTL and returns it. File contents are never cached.
//!
//! Mutations invalidate the affected keys after the wrapped adapter reports
//! success and before returning. Keys are computed up front because an
//! identifier may stop resolving once its file is gone. Writes and removals
//! also drop the parent directory's listing; removing or moving a directory
//! drops every entry beneath it.

use std::sync::Arc;

use async_trait::async_trait;
use mountfs_types::Visibility;
use serde::{Deserialize, Serialize};

use super::error::FsResult;
use super::ops::{AdapterOps, CacheKeying};
use super::path;
use super::types::{ByteStream, Metadata, WriteConfig};
use crate::cache_store::CacheStore;

/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "mountfs";

/// What the cache holds for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub metadata: Metadata,
    /// Immediate children, for directories only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<Metadata>>,
}

/// Adapter serving metadata and listings from a cache store.
pub struct CachedAdapter {
    inner: Arc<dyn AdapterOps>,
    store: Arc<dyn CacheStore>,
    keying: CacheKeying,
    namespace: String,
    ttl: u64,
}

impl std::fmt::Debug for CachedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedAdapter")
            .field("keying", &self.keying)
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CachedAdapter {
    /// Wrap `inner`. `ttl` is in seconds, 0 caches until invalidated.
    pub fn new(inner: Arc<dyn AdapterOps>, store: Arc<dyn CacheStore>, ttl: u64) -> Self {
        let keying = inner.cache_keying();
        Self {
            inner,
            store,
            keying,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl,
        }
    }

    /// Prefix keys with `namespace`, so adapters can share one store.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn keying(&self) -> &CacheKeying {
        &self.keying
    }

    /// Store key for a location, or `None` when it cannot be keyed.
    pub async fn key_for(&self, location: &str) -> FsResult<Option<String>> {
        let key = match &self.keying {
            CacheKeying::Default => path::normalize(location)
                .ok()
                .map(|p| blake3::hash(p.as_bytes()).to_hex().to_string()),
            CacheKeying::Custom(provider) => provider.cache_key(location).await?,
        };
        Ok(key.map(|k| format!("{}:{}", self.namespace, k)))
    }

    /// Read-through primitive behind every metadata and listing read.
    pub async fn get_cached(&self, location: &str) -> FsResult<CacheSnapshot> {
        let Some(key) = self.key_for(location).await? else {
            tracing::debug!(location, "unkeyed location, bypassing cache");
            return self.snapshot(location).await;
        };

        if let Some(raw) = self.store.fetch(&key).await? {
            match serde_json::from_slice::<CacheSnapshot>(&raw) {
                Ok(snapshot) => {
                    tracing::debug!(location, key, "cache hit");
                    return Ok(snapshot);
                }
                Err(e) => tracing::warn!(location, key, error = %e, "unreadable cache entry"),
            }
        }

        tracing::debug!(location, key, "cache miss");
        let snapshot = self.snapshot(location).await?;
        self.store
            .save(&key, serde_json::to_vec(&snapshot)?, self.ttl)
            .await?;
        Ok(snapshot)
    }

    async fn snapshot(&self, location: &str) -> FsResult<CacheSnapshot> {
        let metadata = self.inner.get_metadata(location).await?;
        let contents = if metadata.is_dir() {
            Some(self.inner.list_contents(location, false).await?)
        } else {
            None
        };
        Ok(CacheSnapshot { metadata, contents })
    }

    /// Key of the directory holding a normalized path.
    async fn parent_key(&self, path: &str) -> FsResult<Option<String>> {
        match path::parent(path) {
            Some(parent) => self.key_for(parent).await,
            None => Ok(None),
        }
    }

    /// Keys a new file at a literal path makes stale.
    async fn written_keys(&self, path: &str) -> FsResult<Vec<String>> {
        let mut keys: Vec<String> = self.key_for(path).await?.into_iter().collect();
        if let Ok(normalized) = path::normalize(path) {
            keys.extend(self.parent_key(&normalized).await?);
        }
        Ok(keys)
    }

    /// Keys that removing or moving `location` makes stale: its own entry,
    /// its parent's listing and, for a directory, every entry beneath it.
    ///
    /// An unkeyable location is not scanned; the wrapped adapter rejects it.
    async fn removed_keys(&self, location: &str) -> FsResult<Vec<String>> {
        let Some(own) = self.key_for(location).await? else {
            return Ok(Vec::new());
        };
        let metadata = match self.inner.get_metadata(location).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => return Ok(vec![own]),
            Err(e) => return Err(e),
        };

        let mut keys = vec![own];
        keys.extend(self.parent_key(&metadata.path).await?);
        if metadata.is_dir() {
            for entry in self.inner.list_contents(location, true).await? {
                keys.extend(self.key_for(&entry.path).await?);
            }
        }
        Ok(keys)
    }

    async fn invalidate<I>(&self, succeeded: bool, keys: I) -> FsResult<()>
    where
        I: IntoIterator<Item = String>,
    {
        if !succeeded {
            return Ok(());
        }
        for key in keys {
            self.store.delete(&key).await?;
            tracing::debug!(key, "invalidated");
        }
        Ok(())
    }
}

#[async_trait]
impl AdapterOps for CachedAdapter {
    async fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool> {
        let keys = self.written_keys(path).await?;
        let written = self.inner.write(path, contents, config).await?;
        self.invalidate(written, keys).await?;
        Ok(written)
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let keys = self.written_keys(path).await?;
        let written = self.inner.write_stream(path, stream, config).await?;
        self.invalidate(written, keys).await?;
        Ok(written)
    }

    async fn update(
        &self,
        location: &str,
        contents: &[u8],
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let key = self.key_for(location).await?;
        let updated = self.inner.update(location, contents, config).await?;
        self.invalidate(updated, key).await?;
        Ok(updated)
    }

    async fn update_stream(
        &self,
        location: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let key = self.key_for(location).await?;
        let updated = self.inner.update_stream(location, stream, config).await?;
        self.invalidate(updated, key).await?;
        Ok(updated)
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        let keys = match self.key_for(to).await? {
            Some(_) => self.removed_keys(from).await?,
            // Rejected by the wrapped adapter; nothing to scan.
            None => self.key_for(from).await?.into_iter().collect(),
        };
        let moved = self.inner.rename(from, to).await?;
        self.invalidate(moved, keys).await?;
        Ok(moved)
    }

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        self.inner.copy(from, to).await
    }

    async fn delete(&self, location: &str) -> FsResult<bool> {
        let keys = self.removed_keys(location).await?;
        let deleted = self.inner.delete(location).await?;
        self.invalidate(deleted, keys).await?;
        Ok(deleted)
    }

    async fn delete_dir(&self, location: &str) -> FsResult<bool> {
        let keys = self.removed_keys(location).await?;
        let deleted = self.inner.delete_dir(location).await?;
        self.invalidate(deleted, keys).await?;
        Ok(deleted)
    }

    async fn create_dir(&self, path: &str, config: &WriteConfig) -> FsResult<bool> {
        self.inner.create_dir(path, config).await
    }

    async fn set_visibility(&self, location: &str, visibility: Visibility) -> FsResult<bool> {
        let key = self.key_for(location).await?;
        let changed = self.inner.set_visibility(location, visibility).await?;
        self.invalidate(changed, key).await?;
        Ok(changed)
    }

    async fn has(&self, location: &str) -> FsResult<bool> {
        if let Some(key) = self.key_for(location).await? {
            if self.store.contains(&key).await? {
                return Ok(true);
            }
        }
        self.inner.has(location).await
    }

    async fn read(&self, location: &str) -> FsResult<Vec<u8>> {
        self.inner.read(location).await
    }

    async fn read_stream(&self, location: &str) -> FsResult<ByteStream> {
        self.inner.read_stream(location).await
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> FsResult<Vec<Metadata>> {
        let Some(children) = self.get_cached(directory).await?.contents else {
            return Ok(Vec::new());
        };
        if !recursive {
            return Ok(children);
        }

        let mut listing = children.clone();
        for child in children.iter().filter(|c| c.is_dir()) {
            listing.extend(self.list_contents(&child.path, true).await?);
        }
        Ok(listing)
    }

    async fn get_metadata(&self, location: &str) -> FsResult<Metadata> {
        Ok(self.get_cached(location).await?.metadata)
    }

    async fn get_size(&self, location: &str) -> FsResult<Option<u64>> {
        Ok(self.get_cached(location).await?.metadata.size)
    }

    async fn get_mimetype(&self, location: &str) -> FsResult<Option<String>> {
        Ok(self.get_cached(location).await?.metadata.mimetype)
    }

    async fn get_timestamp(&self, location: &str) -> FsResult<Option<u64>> {
        Ok(self.get_cached(location).await?.metadata.timestamp)
    }

    async fn get_visibility(&self, location: &str) -> FsResult<Option<Visibility>> {
        Ok(self.get_cached(location).await?.metadata.visibility)
    }

    fn cache_keying(&self) -> CacheKeying {
        self.keying.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::MemoryCacheStore;
    use crate::vfs::backends::MemoryBackend;
    use crate::vfs::backends::testing::{Op, SpyAdapter};

    fn setup(ttl: u64) -> (Arc<SpyAdapter>, Arc<MemoryCacheStore>, CachedAdapter) {
        let spy = Arc::new(SpyAdapter::new(Arc::new(MemoryBackend::new())));
        let store = Arc::new(MemoryCacheStore::new());
        let cached = CachedAdapter::new(spy.clone(), store.clone(), ttl);
        (spy, store, cached)
    }

    #[tokio::test]
    async fn test_second_read_is_a_hit() {
        let (spy, _, fs) = setup(0);
        fs.write("a.txt", b"abc", &WriteConfig::default()).await.unwrap();

        assert_eq!(fs.get_size("a.txt").await.unwrap(), Some(3));
        assert_eq!(fs.get_size("a.txt").await.unwrap(), Some(3));
        assert_eq!(spy.calls(Op::GetMetadata), 1);
    }

    #[tokio::test]
    async fn test_update_invalidates() {
        let (_, store, fs) = setup(0);
        let config = WriteConfig::default();
        fs.write("a.txt", b"abc", &config).await.unwrap();
        assert_eq!(fs.get_size("a.txt").await.unwrap(), Some(3));
        assert_eq!(store.len(), 1);

        assert!(fs.update("a.txt", b"abcdef", &config).await.unwrap());
        assert!(store.is_empty());
        assert_eq!(fs.get_size("a.txt").await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_declined_write_keeps_entry() {
        let (_, store, fs) = setup(0);
        let config = WriteConfig::default();
        fs.write("a.txt", b"abc", &config).await.unwrap();
        fs.get_metadata("a.txt").await.unwrap();

        // Backend refuses to overwrite an existing file.
        assert!(!fs.write("a.txt", b"zzz", &config).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_invalidates_source() {
        let (_, store, fs) = setup(0);
        let config = WriteConfig::default();
        fs.write("a.txt", b"abc", &config).await.unwrap();
        fs.get_metadata("a.txt").await.unwrap();
        let source = fs.key_for("a.txt").await.unwrap().unwrap();

        assert!(fs.rename("a.txt", "b.txt").await.unwrap());
        assert!(!store.contains(&source).await.unwrap());
        assert!(fs.get_metadata("a.txt").await.unwrap_err().is_not_found());
        assert_eq!(fs.get_size("b.txt").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_delete_dir_drops_nested_entries() {
        let (_, store, fs) = setup(0);
        let config = WriteConfig::default();
        fs.write("d/sub/a.txt", b"abc", &config).await.unwrap();
        fs.get_metadata("d/sub/a.txt").await.unwrap();
        fs.get_metadata("d/sub").await.unwrap();
        assert_eq!(store.len(), 2);

        assert!(fs.delete_dir("d").await.unwrap());
        assert!(store.is_empty());
        assert!(!fs.has("d/sub/a.txt").await.unwrap());
        assert!(fs.get_metadata("d/sub/a.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rename_dir_drops_nested_entries() {
        let (_, _, fs) = setup(0);
        let config = WriteConfig::default();
        fs.write("d/a.txt", b"abc", &config).await.unwrap();
        fs.get_size("d/a.txt").await.unwrap();

        assert!(fs.rename("d", "e").await.unwrap());
        assert!(!fs.has("d/a.txt").await.unwrap());
        assert_eq!(fs.get_size("e/a.txt").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_write_and_delete_refresh_parent_listing() {
        let (_, _, fs) = setup(0);
        let config = WriteConfig::default();
        fs.write("d/a.txt", b"a", &config).await.unwrap();
        assert_eq!(fs.list_contents("d", false).await.unwrap().len(), 1);

        fs.write("d/b.txt", b"b", &config).await.unwrap();
        assert_eq!(fs.list_contents("d", false).await.unwrap().len(), 2);

        assert!(fs.delete("d/a.txt").await.unwrap());
        let listing = fs.list_contents("d", false).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].path, "d/b.txt");
    }

    #[tokio::test]
    async fn test_copy_and_create_dir_leave_cache_alone() {
        let (_, store, fs) = setup(0);
        let config = WriteConfig::default();
        fs.write("a.txt", b"abc", &config).await.unwrap();
        fs.get_metadata("a.txt").await.unwrap();

        assert!(fs.copy("a.txt", "b.txt").await.unwrap());
        assert!(fs.create_dir("dir", &config).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_has_short_circuits_on_cached_entry() {
        let (spy, _, fs) = setup(0);
        fs.write("a.txt", b"abc", &WriteConfig::default()).await.unwrap();
        fs.get_metadata("a.txt").await.unwrap();

        assert!(fs.has("a.txt").await.unwrap());
        assert_eq!(spy.calls(Op::Has), 0);

        assert!(!fs.has("missing.txt").await.unwrap());
        assert_eq!(spy.calls(Op::Has), 1);
    }

    #[tokio::test]
    async fn test_set_visibility_invalidates() {
        let (_, _, fs) = setup(0);
        fs.write("a.txt", b"abc", &WriteConfig::default()).await.unwrap();
        assert_eq!(
            fs.get_visibility("a.txt").await.unwrap(),
            Some(Visibility::Public)
        );

        assert!(fs.set_visibility("a.txt", Visibility::Private).await.unwrap());
        assert_eq!(
            fs.get_visibility("a.txt").await.unwrap(),
            Some(Visibility::Private)
        );
    }

    #[tokio::test]
    async fn test_file_lists_as_empty() {
        let (_, _, fs) = setup(0);
        fs.write("a.txt", b"abc", &WriteConfig::default()).await.unwrap();
        assert!(fs.list_contents("a.txt", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_namespace_prefixes_keys() {
        let (_, _, fs) = setup(0);
        let fs = fs.with_namespace("public");
        let key = fs.key_for("a.txt").await.unwrap().unwrap();
        assert!(key.starts_with("public:"));
        assert_eq!(key, fs.key_for("/a.txt").await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (spy, store, fs) = setup(0);
        fs.write("a.txt", b"abc", &WriteConfig::default()).await.unwrap();
        let key = fs.key_for("a.txt").await.unwrap().unwrap();
        store.save(&key, b"not json".to_vec(), 0).await.unwrap();

        assert_eq!(fs.get_size("a.txt").await.unwrap(), Some(3));
        assert_eq!(spy.calls(Op::GetMetadata), 1);
    }
}
