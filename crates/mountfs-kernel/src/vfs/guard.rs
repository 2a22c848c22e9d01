//! Guarded resolving adapter.
//!
//! Wraps a backend so that every location is first translated (identifiers
//! go through the [`IdentifierResolver`]) and then checked against a root
//! subtree. Nothing outside the root reaches the backend. Successful
//! mutations are reported back to the resolver so its records follow the
//! files.

use std::sync::Arc;

use async_trait::async_trait;
use mountfs_types::{Location, Visibility};

use super::error::{FsError, FsResult};
use super::ops::{AdapterOps, CacheKeyProvider, CacheKeying};
use super::path;
use super::types::{ByteStream, Metadata, WriteConfig};
use crate::resolver::IdentifierResolver;

/// Adapter confining a backend to a root subtree and resolving identifiers.
#[derive(Clone)]
pub struct GuardedAdapter {
    inner: Arc<dyn AdapterOps>,
    resolver: Arc<dyn IdentifierResolver>,
    root: String,
}

impl std::fmt::Debug for GuardedAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedAdapter")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GuardedAdapter {
    /// Wrap `inner`, confining it to `root`.
    ///
    /// An empty root admits the whole namespace.
    pub fn new(
        inner: Arc<dyn AdapterOps>,
        resolver: Arc<dyn IdentifierResolver>,
        root: &str,
    ) -> FsResult<Self> {
        Ok(Self {
            inner,
            resolver,
            root: path::normalize(root)?,
        })
    }

    /// The normalized root subtree.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Translate a location to a normalized path.
    ///
    /// Identifiers that have no record fail with `NotFound`.
    pub async fn resolve(&self, location: &str) -> FsResult<String> {
        match Location::parse(location) {
            Location::Id(id) => {
                let resolved = self.resolver.resolve(&id).await.inspect_err(|e| {
                    if e.is_not_found() {
                        tracing::warn!(id = %id, "identifier does not resolve");
                    }
                })?;
                path::normalize(&resolved)
            }
            Location::Path(p) => path::normalize(&p),
        }
    }

    fn guard(&self, path: &str) -> FsResult<()> {
        if path::is_within(path, &self.root) {
            Ok(())
        } else {
            tracing::warn!(path, root = %self.root, "rejected path outside root");
            Err(FsError::boundary_violation(path))
        }
    }

    /// Resolve and guard.
    async fn locate(&self, location: &str) -> FsResult<String> {
        let path = self.resolve(location).await?;
        self.guard(&path)?;
        tracing::trace!(location, path, "delegating");
        Ok(path)
    }

    /// Like `locate`, but an empty location means the root itself.
    async fn locate_dir(&self, location: &str) -> FsResult<String> {
        if location.is_empty() {
            return Ok(self.root.clone());
        }
        self.locate(location).await
    }

    /// Guard a new name without resolving it.
    fn literal(&self, location: &str) -> FsResult<String> {
        let path = path::normalize(location)?;
        self.guard(&path)?;
        Ok(path)
    }
}

#[async_trait]
impl AdapterOps for GuardedAdapter {
    async fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool> {
        let path = self.literal(path)?;
        let written = self.inner.write(&path, contents, config).await?;
        if written {
            self.resolver.upsert(&path).await?;
        }
        Ok(written)
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let path = self.literal(path)?;
        let written = self.inner.write_stream(&path, stream, config).await?;
        if written {
            self.resolver.upsert(&path).await?;
        }
        Ok(written)
    }

    async fn update(
        &self,
        location: &str,
        contents: &[u8],
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let path = self.locate(location).await?;
        let updated = self.inner.update(&path, contents, config).await?;
        if updated {
            self.resolver.upsert(&path).await?;
        }
        Ok(updated)
    }

    async fn update_stream(
        &self,
        location: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let path = self.locate(location).await?;
        let updated = self.inner.update_stream(&path, stream, config).await?;
        if updated {
            self.resolver.upsert(&path).await?;
        }
        Ok(updated)
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        let from = self.locate(from).await?;
        let to = self.locate(to).await?;
        let moved = self.inner.rename(&from, &to).await?;
        if moved {
            self.resolver.move_path(&from, &to).await?;
        }
        Ok(moved)
    }

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        let from = self.locate(from).await?;
        let to = self.locate(to).await?;
        let copied = self.inner.copy(&from, &to).await?;
        if copied {
            self.resolver.upsert(&to).await?;
        }
        Ok(copied)
    }

    async fn delete(&self, location: &str) -> FsResult<bool> {
        let path = self.locate(location).await?;
        let deleted = self.inner.delete(&path).await?;
        if deleted {
            self.resolver.remove(&path).await?;
        }
        Ok(deleted)
    }

    async fn delete_dir(&self, location: &str) -> FsResult<bool> {
        let path = self.locate(location).await?;
        let deleted = self.inner.delete_dir(&path).await?;
        if deleted {
            self.resolver.remove(&path).await?;
        }
        Ok(deleted)
    }

    async fn create_dir(&self, path: &str, config: &WriteConfig) -> FsResult<bool> {
        let path = self.literal(path)?;
        let created = self.inner.create_dir(&path, config).await?;
        if created {
            self.resolver.upsert(&path).await?;
        }
        Ok(created)
    }

    async fn set_visibility(&self, location: &str, visibility: Visibility) -> FsResult<bool> {
        let path = self.locate(location).await?;
        self.inner.set_visibility(&path, visibility).await
    }

    async fn has(&self, location: &str) -> FsResult<bool> {
        let path = match self.resolve(location).await {
            Ok(path) => path,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        self.guard(&path)?;
        self.inner.has(&path).await
    }

    async fn read(&self, location: &str) -> FsResult<Vec<u8>> {
        let path = self.locate(location).await?;
        self.inner.read(&path).await
    }

    async fn read_stream(&self, location: &str) -> FsResult<ByteStream> {
        let path = self.locate(location).await?;
        self.inner.read_stream(&path).await
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> FsResult<Vec<Metadata>> {
        let path = self.locate_dir(directory).await?;
        self.inner.list_contents(&path, recursive).await
    }

    async fn get_metadata(&self, location: &str) -> FsResult<Metadata> {
        let path = self.locate_dir(location).await?;
        let mut metadata = self.inner.get_metadata(&path).await?;
        if let Some(record) = self.resolver.metadata_for(&path).await? {
            metadata.record = Some(record);
        }
        Ok(metadata)
    }

    async fn get_size(&self, location: &str) -> FsResult<Option<u64>> {
        let path = self.locate(location).await?;
        self.inner.get_size(&path).await
    }

    async fn get_mimetype(&self, location: &str) -> FsResult<Option<String>> {
        let path = self.locate(location).await?;
        self.inner.get_mimetype(&path).await
    }

    async fn get_timestamp(&self, location: &str) -> FsResult<Option<u64>> {
        let path = self.locate(location).await?;
        self.inner.get_timestamp(&path).await
    }

    async fn get_visibility(&self, location: &str) -> FsResult<Option<Visibility>> {
        let path = self.locate(location).await?;
        self.inner.get_visibility(&path).await
    }

    fn cache_keying(&self) -> CacheKeying {
        CacheKeying::Custom(Arc::new(self.clone()))
    }
}

#[async_trait]
impl CacheKeyProvider for GuardedAdapter {
    /// Keys follow the resolved path, so a path and its identifier share an
    /// entry. Locations that do not resolve, or resolve outside the root,
    /// have no key.
    async fn cache_key(&self, location: &str) -> FsResult<Option<String>> {
        match self.locate_dir(location).await {
            Ok(path) => Ok(Some(blake3::hash(path.as_bytes()).to_hex().to_string())),
            Err(FsError::NotFound(_) | FsError::BoundaryViolation(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
