//! The adapter operations trait.
//!
//! Every layer of a chain implements [`AdapterOps`]: raw backends, the
//! guarded resolving adapter and the cache-through adapter. A decorator takes
//! the next layer as an `Arc<dyn AdapterOps>` and exposes the same trait, so
//! layers stack in any order.
//!
//! Locations are strings. Backends treat them as paths; the guarded adapter
//! also accepts identifiers in every location slot.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mountfs_types::Visibility;
use tokio::io::AsyncReadExt;

use super::error::FsResult;
use super::types::{ByteStream, Metadata, WriteConfig};

/// How a cache-through adapter derives keys for the layer it wraps.
///
/// Resolved once when the cache adapter is built.
#[derive(Clone, Default)]
pub enum CacheKeying {
    /// Hash of the normalized literal path.
    #[default]
    Default,
    /// The wrapped layer computes keys itself (identifier-aware).
    Custom(Arc<dyn CacheKeyProvider>),
}

impl fmt::Debug for CacheKeying {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKeying::Default => f.write_str("Default"),
            CacheKeying::Custom(_) => f.write_str("Custom(<provider>)"),
        }
    }
}

/// Supplies cache keys on behalf of an adapter.
#[async_trait]
pub trait CacheKeyProvider: Send + Sync {
    /// Key for a location, or `None` when the location cannot be keyed
    /// (an identifier that does not resolve). Unkeyed locations bypass the
    /// cache.
    async fn cache_key(&self, location: &str) -> FsResult<Option<String>>;
}

/// Core adapter operations trait.
///
/// Mutating operations return `Ok(false)` when the backend declined the
/// operation (destination exists, source missing, ...) and `Err` for real
/// failures. Layers must not perform side effects unless the delegate
/// returned `Ok(true)`.
#[async_trait]
pub trait AdapterOps: Send + Sync {
    // ========================================================================
    // Writing
    // ========================================================================

    /// Write a new file. Declines if the file already exists.
    async fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool>;

    /// Write a new file from a stream.
    async fn write_stream(
        &self,
        path: &str,
        mut stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let mut contents = Vec::new();
        stream.read_to_end(&mut contents).await?;
        self.write(path, &contents, config).await
    }

    /// Replace the contents of an existing file. Declines if it is missing.
    async fn update(&self, location: &str, contents: &[u8], config: &WriteConfig)
    -> FsResult<bool>;

    /// Replace the contents of an existing file from a stream.
    async fn update_stream(
        &self,
        location: &str,
        mut stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let mut contents = Vec::new();
        stream.read_to_end(&mut contents).await?;
        self.update(location, &contents, config).await
    }

    /// Move a file or directory.
    async fn rename(&self, from: &str, to: &str) -> FsResult<bool>;

    /// Copy a file.
    async fn copy(&self, from: &str, to: &str) -> FsResult<bool>;

    /// Delete a file.
    async fn delete(&self, location: &str) -> FsResult<bool>;

    /// Delete a directory and everything beneath it.
    async fn delete_dir(&self, location: &str) -> FsResult<bool>;

    /// Create a directory (and missing parents).
    async fn create_dir(&self, path: &str, config: &WriteConfig) -> FsResult<bool>;

    async fn set_visibility(&self, location: &str, visibility: Visibility) -> FsResult<bool>;

    // ========================================================================
    // Reading
    // ========================================================================

    /// Check whether an entry exists.
    async fn has(&self, location: &str) -> FsResult<bool>;

    /// Read a whole file.
    async fn read(&self, location: &str) -> FsResult<Vec<u8>>;

    /// Open a file as a stream.
    async fn read_stream(&self, location: &str) -> FsResult<ByteStream> {
        let contents = self.read(location).await?;
        Ok(Box::new(std::io::Cursor::new(contents)))
    }

    /// List a directory. `recursive` includes every descendant.
    async fn list_contents(&self, directory: &str, recursive: bool) -> FsResult<Vec<Metadata>>;

    /// Metadata of one entry; `NotFound` if the backend has none.
    async fn get_metadata(&self, location: &str) -> FsResult<Metadata>;

    async fn get_size(&self, location: &str) -> FsResult<Option<u64>> {
        Ok(self.get_metadata(location).await?.size)
    }

    async fn get_mimetype(&self, location: &str) -> FsResult<Option<String>> {
        Ok(self.get_metadata(location).await?.mimetype)
    }

    async fn get_timestamp(&self, location: &str) -> FsResult<Option<u64>> {
        Ok(self.get_metadata(location).await?.timestamp)
    }

    async fn get_visibility(&self, location: &str) -> FsResult<Option<Visibility>> {
        Ok(self.get_metadata(location).await?.visibility)
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// Cache keying this layer asks of a cache adapter wrapped around it.
    fn cache_keying(&self) -> CacheKeying {
        CacheKeying::Default
    }
}
