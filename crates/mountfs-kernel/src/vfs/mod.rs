//! Virtual filesystem abstraction.
//!
//! Key components:
//!
//! - [`AdapterOps`] - Core trait every layer of an adapter chain implements
//! - [`GuardedAdapter`] - Resolves identifiers and confines a chain to a root subtree
//! - [`CachedAdapter`] - Serves metadata and listings through a cache store
//! - [`Filesystem`] - A composed chain plus its plugins
//! - [`MountRouter`] - Routes `name://location` addresses to filesystems
//! - [`MemoryBackend`] / [`LocalBackend`] - Storage backends
//!
//! ## Design Decisions
//!
//! - **Decorators, not inheritance**: each layer wraps an
//!   `Arc<dyn AdapterOps>` and exposes the same trait, so layers stack in
//!   any order.
//! - **Mutations report `bool`**: a backend that declines (destination
//!   exists, source missing) returns `Ok(false)`; layers then skip their
//!   side effects.
//! - **Cache keying chosen once**: the cache adapter asks the wrapped layer
//!   for its [`CacheKeying`] at construction.

pub mod backends;
mod cache;
pub(crate) mod error;
mod filesystem;
mod guard;
mod mount;
mod ops;
pub mod path;
mod plugins;
pub(crate) mod types;

pub use backends::{LinkHandling, LocalBackend, MemoryBackend, PermissionMap};
pub use cache::{CacheSnapshot, CachedAdapter, DEFAULT_NAMESPACE};
pub use error::{BoxError, FsError, FsResult};
pub use filesystem::{Filesystem, Operation, Outcome};
pub use guard::GuardedAdapter;
pub use mount::{MountRouter, SCHEME_DELIMITER, split_location};
pub use ops::{AdapterOps, CacheKeyProvider, CacheKeying};
pub use plugins::{
    EmptyDir, GetWithMetadata, ListFiles, ListPaths, ListWith, Plugin, PluginOutput,
    PluginRegistry, PluginRequest, default_plugins,
};
pub use types::{
    ByteStream, EntryKind, ImportantPart, Metadata, MetadataField, RecordInfo, WriteConfig,
};
