//! Cache storage.
//!
//! A [`CacheStore`] is the key/value store behind the cache-through adapter.
//! Values are opaque bytes; expiry is the store's job. Stores are shared
//! between adapters (each adapter prefixes its keys with a namespace), so
//! implementations must be safe for concurrent use.

mod file;
mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use async_trait::async_trait;

use crate::vfs::error::FsResult;

/// TTL value meaning "keep until explicitly deleted".
pub const TTL_FOREVER: u64 = 0;

/// Pluggable cache storage.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns true if a fresh entry exists for the key.
    async fn contains(&self, key: &str) -> FsResult<bool>;

    /// Fetch a fresh entry. Expired entries read as `None`.
    async fn fetch(&self, key: &str) -> FsResult<Option<Vec<u8>>>;

    /// Store an entry. `ttl` is in seconds; [`TTL_FOREVER`] never expires.
    async fn save(&self, key: &str, value: Vec<u8>, ttl: u64) -> FsResult<()>;

    /// Remove an entry. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> FsResult<()>;
}
