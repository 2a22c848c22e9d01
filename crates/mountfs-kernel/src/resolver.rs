//! Identifier resolution.
//!
//! An [`IdentifierResolver`] is the record store that maps stable
//! [`FileId`]s to the current path of a file and carries side metadata
//! (content hash, free-form attributes). The guarded adapter consults it to
//! translate identifiers and notifies it of every successful mutation.
//!
//! [`MemoryResolver`] is the in-process implementation used by tests and by
//! configurations that do not bring their own record store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use mountfs_types::FileId;
use parking_lot::RwLock;

use crate::vfs::error::{FsError, FsResult};
use crate::vfs::path;
use crate::vfs::types::{ImportantPart, RecordInfo};

/// Record store capability consumed by the guarded adapter.
#[async_trait]
pub trait IdentifierResolver: Send + Sync {
    /// Current path of an identifier; `NotFound` when it has no record.
    async fn resolve(&self, id: &FileId) -> FsResult<String>;

    /// Register a path, or refresh its record. Idempotent.
    async fn upsert(&self, path: &str) -> FsResult<()>;

    /// Re-key the record at `from` (and everything beneath it) to `to`.
    async fn move_path(&self, from: &str, to: &str) -> FsResult<()>;

    /// Drop the record at `path` and every record nested under it.
    async fn remove(&self, path: &str) -> FsResult<()>;

    /// Enrichment fields for a path, if it has a record.
    async fn metadata_for(&self, path: &str) -> FsResult<Option<RecordInfo>>;
}

#[derive(Debug, Default)]
struct Records {
    by_path: BTreeMap<String, RecordInfo>,
    by_id: HashMap<FileId, String>,
}

impl Records {
    /// Paths equal to `root` or nested under it.
    fn subtree(&self, root: &str) -> Vec<String> {
        self.by_path
            .range(root.to_string()..)
            .map(|(p, _)| p)
            .take_while(|p| p.starts_with(root))
            .filter(|p| path::is_within(p, root))
            .cloned()
            .collect()
    }
}

/// In-memory record store.
///
/// A path gets a fresh UUIDv7 the first time it is upserted and keeps it
/// across renames. Thread-safe via an internal `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    records: RwLock<Records>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier registered for a path.
    pub fn id_of(&self, path: &str) -> Option<FileId> {
        self.records.read().by_path.get(path).map(|r| r.id)
    }

    /// Full record for a path.
    pub fn record(&self, path: &str) -> Option<RecordInfo> {
        self.records.read().by_path.get(path).cloned()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attach a content hash and attributes to an existing record.
    ///
    /// Returns false when the path has no record.
    pub fn annotate(
        &self,
        path: &str,
        hash: Option<String>,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        let mut records = self.records.write();
        match records.by_path.get_mut(path) {
            Some(record) => {
                record.hash = hash;
                record.attributes = attributes;
                true
            }
            None => false,
        }
    }

    /// Set the focal region of an image record.
    pub fn set_important_part(&self, path: &str, part: ImportantPart) -> bool {
        let mut records = self.records.write();
        match records.by_path.get_mut(path) {
            Some(record) => {
                record.important_part = Some(part);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl IdentifierResolver for MemoryResolver {
    async fn resolve(&self, id: &FileId) -> FsResult<String> {
        self.records
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| FsError::not_found(id.to_string()))
    }

    async fn upsert(&self, path: &str) -> FsResult<()> {
        let mut records = self.records.write();
        if records.by_path.contains_key(path) {
            return Ok(());
        }
        let id = FileId::new();
        records.by_path.insert(path.to_string(), RecordInfo::new(id));
        records.by_id.insert(id, path.to_string());
        tracing::trace!(path, id = %id.short(), "registered record");
        Ok(())
    }

    async fn move_path(&self, from: &str, to: &str) -> FsResult<()> {
        let mut records = self.records.write();
        for old in records.subtree(from) {
            let Some(record) = records.by_path.remove(&old) else {
                continue;
            };
            let new = format!("{to}{}", &old[from.len()..]);
            records.by_id.insert(record.id, new.clone());
            if let Some(replaced) = records.by_path.insert(new, record) {
                records.by_id.remove(&replaced.id);
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> FsResult<()> {
        let mut records = self.records.write();
        for old in records.subtree(path) {
            if let Some(record) = records.by_path.remove(&old) {
                records.by_id.remove(&record.id);
            }
        }
        Ok(())
    }

    async fn metadata_for(&self, path: &str) -> FsResult<Option<RecordInfo>> {
        Ok(self.record(path))
    }
}
