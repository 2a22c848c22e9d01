//! Test utilities for adapter chains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use mountfs_types::Visibility;
use parking_lot::Mutex;

use crate::vfs::error::FsResult;
use crate::vfs::ops::{AdapterOps, CacheKeying};
use crate::vfs::types::{ByteStream, Metadata, WriteConfig};

/// Operations a [`SpyAdapter`] counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Op {
    Write,
    WriteStream,
    Update,
    UpdateStream,
    Rename,
    Copy,
    Delete,
    DeleteDir,
    CreateDir,
    SetVisibility,
    Has,
    Read,
    ReadStream,
    ListContents,
    GetMetadata,
    GetSize,
    GetMimetype,
    GetTimestamp,
    GetVisibility,
}

impl Op {
    fn is_mutation(self) -> bool {
        matches!(
            self,
            Op::Write
                | Op::WriteStream
                | Op::Update
                | Op::UpdateStream
                | Op::Rename
                | Op::Copy
                | Op::Delete
                | Op::DeleteDir
                | Op::CreateDir
                | Op::SetVisibility
        )
    }
}

/// Decorator recording every call before delegating.
///
/// Used to verify what reaches a backend, and to make a backend decline
/// mutations without touching it.
pub struct SpyAdapter {
    inner: Arc<dyn AdapterOps>,
    counts: DashMap<Op, usize>,
    locations: Mutex<Vec<(Op, String)>>,
    decline: AtomicBool,
}

impl SpyAdapter {
    pub fn new(inner: Arc<dyn AdapterOps>) -> Self {
        Self {
            inner,
            counts: DashMap::new(),
            locations: Mutex::new(Vec::new()),
            decline: AtomicBool::new(false),
        }
    }

    /// Calls made for one operation.
    pub fn calls(&self, op: Op) -> usize {
        self.counts.get(&op).map(|c| *c).unwrap_or(0)
    }

    /// Calls made for all operations.
    pub fn total_calls(&self) -> usize {
        self.counts.iter().map(|c| *c.value()).sum()
    }

    /// Every `(operation, first location)` seen, in call order.
    pub fn locations(&self) -> Vec<(Op, String)> {
        self.locations.lock().clone()
    }

    /// When set, mutations report `false` without reaching the inner adapter.
    pub fn decline_mutations(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.counts.clear();
        self.locations.lock().clear();
    }

    /// Record a call; returns true if it should be declined.
    fn record(&self, op: Op, location: &str) -> bool {
        *self.counts.entry(op).or_insert(0) += 1;
        self.locations.lock().push((op, location.to_string()));
        op.is_mutation() && self.decline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdapterOps for SpyAdapter {
    async fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool> {
        if self.record(Op::Write, path) {
            return Ok(false);
        }
        self.inner.write(path, contents, config).await
    }

    async fn write_stream(
        &self,
        path: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        if self.record(Op::WriteStream, path) {
            return Ok(false);
        }
        self.inner.write_stream(path, stream, config).await
    }

    async fn update(
        &self,
        location: &str,
        contents: &[u8],
        config: &WriteConfig,
    ) -> FsResult<bool> {
        if self.record(Op::Update, location) {
            return Ok(false);
        }
        self.inner.update(location, contents, config).await
    }

    async fn update_stream(
        &self,
        location: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        if self.record(Op::UpdateStream, location) {
            return Ok(false);
        }
        self.inner.update_stream(location, stream, config).await
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        if self.record(Op::Rename, from) {
            return Ok(false);
        }
        self.inner.rename(from, to).await
    }

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        if self.record(Op::Copy, from) {
            return Ok(false);
        }
        self.inner.copy(from, to).await
    }

    async fn delete(&self, location: &str) -> FsResult<bool> {
        if self.record(Op::Delete, location) {
            return Ok(false);
        }
        self.inner.delete(location).await
    }

    async fn delete_dir(&self, location: &str) -> FsResult<bool> {
        if self.record(Op::DeleteDir, location) {
            return Ok(false);
        }
        self.inner.delete_dir(location).await
    }

    async fn create_dir(&self, path: &str, config: &WriteConfig) -> FsResult<bool> {
        if self.record(Op::CreateDir, path) {
            return Ok(false);
        }
        self.inner.create_dir(path, config).await
    }

    async fn set_visibility(&self, location: &str, visibility: Visibility) -> FsResult<bool> {
        if self.record(Op::SetVisibility, location) {
            return Ok(false);
        }
        self.inner.set_visibility(location, visibility).await
    }

    async fn has(&self, location: &str) -> FsResult<bool> {
        self.record(Op::Has, location);
        self.inner.has(location).await
    }

    async fn read(&self, location: &str) -> FsResult<Vec<u8>> {
        self.record(Op::Read, location);
        self.inner.read(location).await
    }

    async fn read_stream(&self, location: &str) -> FsResult<ByteStream> {
        self.record(Op::ReadStream, location);
        self.inner.read_stream(location).await
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> FsResult<Vec<Metadata>> {
        self.record(Op::ListContents, directory);
        self.inner.list_contents(directory, recursive).await
    }

    async fn get_metadata(&self, location: &str) -> FsResult<Metadata> {
        self.record(Op::GetMetadata, location);
        self.inner.get_metadata(location).await
    }

    async fn get_size(&self, location: &str) -> FsResult<Option<u64>> {
        self.record(Op::GetSize, location);
        self.inner.get_size(location).await
    }

    async fn get_mimetype(&self, location: &str) -> FsResult<Option<String>> {
        self.record(Op::GetMimetype, location);
        self.inner.get_mimetype(location).await
    }

    async fn get_timestamp(&self, location: &str) -> FsResult<Option<u64>> {
        self.record(Op::GetTimestamp, location);
        self.inner.get_timestamp(location).await
    }

    async fn get_visibility(&self, location: &str) -> FsResult<Option<Visibility>> {
        self.record(Op::GetVisibility, location);
        self.inner.get_visibility(location).await
    }

    fn cache_keying(&self) -> CacheKeying {
        self.inner.cache_keying()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    #[tokio::test]
    async fn test_counts_and_declines() {
        let spy = SpyAdapter::new(Arc::new(MemoryBackend::new()));
        let config = WriteConfig::default();

        assert!(spy.write("a.txt", b"x", &config).await.unwrap());
        assert!(spy.has("a.txt").await.unwrap());
        assert_eq!(spy.calls(Op::Write), 1);
        assert_eq!(spy.total_calls(), 2);

        spy.decline_mutations(true);
        assert!(!spy.delete("a.txt").await.unwrap());
        assert!(spy.has("a.txt").await.unwrap());
        assert_eq!(spy.locations().last(), Some(&(Op::Has, "a.txt".to_string())));

        spy.reset();
        assert_eq!(spy.total_calls(), 0);
    }
}
