//! # mountfs-kernel
//!
//! Composable virtual filesystem layer.
//!
//! Storage backends sit at the bottom of an adapter chain. A guarded adapter
//! translates file identifiers to paths and keeps every operation inside a
//! root subtree; a cache adapter serves metadata and listings from a
//! [`CacheStore`]. Composed chains are registered by name with a
//! [`MountRouter`] and addressed as `"<name>://<path-or-id>"`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mountfs_kernel::{
//!     CachedAdapter, Filesystem, GuardedAdapter, MemoryBackend, MemoryCacheStore,
//!     MemoryResolver, MountRouter, WriteConfig,
//! };
//!
//! # async fn demo() -> mountfs_kernel::FsResult<()> {
//! let resolver = Arc::new(MemoryResolver::new());
//! let guarded = GuardedAdapter::new(Arc::new(MemoryBackend::new()), resolver, "files")?;
//! let cached = CachedAdapter::new(Arc::new(guarded), Arc::new(MemoryCacheStore::new()), 300);
//!
//! let mut router = MountRouter::new();
//! router.register("files", Filesystem::with_default_plugins(Arc::new(cached)))?;
//! router.write("files://files/a.txt", b"hello", &WriteConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache_store;
pub mod config;
pub mod resolver;
pub mod vfs;

pub use cache_store::{CacheStore, FileCacheStore, MemoryCacheStore, TTL_FOREVER};
pub use config::{ConfigError, MountConfig};
pub use mountfs_types::{FileId, Location, Visibility};
pub use resolver::{IdentifierResolver, MemoryResolver};
pub use vfs::{
    AdapterOps, ByteStream, CacheKeyProvider, CacheKeying, CacheSnapshot, CachedAdapter, EntryKind,
    Filesystem, FsError, FsResult, GuardedAdapter, LocalBackend, MemoryBackend, Metadata,
    MetadataField, MountRouter, Operation, Outcome, PluginOutput, PluginRequest, WriteConfig,
};
