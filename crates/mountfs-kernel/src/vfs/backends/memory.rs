//! In-memory filesystem backend.
//!
//! Used for scratch mounts and testing. All data is ephemeral.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use mountfs_types::Visibility;
use parking_lot::RwLock;

use crate::vfs::error::{FsError, FsResult};
use crate::vfs::ops::AdapterOps;
use crate::vfs::path;
use crate::vfs::types::{Metadata, WriteConfig};

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File {
        data: Vec<u8>,
        visibility: Visibility,
        modified: u64,
    },
    Directory {
        visibility: Visibility,
        modified: u64,
    },
}

impl Entry {
    fn directory(visibility: Visibility) -> Self {
        Entry::Directory {
            visibility,
            modified: now(),
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }

    fn to_metadata(&self, path: &str) -> Metadata {
        match self {
            Entry::File {
                data,
                visibility,
                modified,
            } => Metadata::file(path, data.len() as u64)
                .with_timestamp(*modified)
                .with_visibility(*visibility)
                .with_mimetype(
                    mime_guess::from_path(path)
                        .first_or_octet_stream()
                        .essence_str(),
                ),
            Entry::Directory {
                visibility,
                modified,
            } => Metadata::dir(path)
                .with_timestamp(*modified)
                .with_visibility(*visibility),
        }
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// In-memory filesystem backend.
///
/// Thread-safe via internal `RwLock`. Entries are kept in a sorted map keyed
/// by normalized path; the root (`""`) always exists. Parents are created on
/// demand.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(String::new(), Entry::directory(Visibility::Public));
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Ensure all parent directories of `path` exist.
    ///
    /// Returns false if some ancestor is a file.
    fn ensure_parents(entries: &mut BTreeMap<String, Entry>, path: &str) -> bool {
        let mut ancestors = Vec::new();
        let mut current = path::parent(path);
        while let Some(dir) = current {
            ancestors.push(dir);
            current = path::parent(dir);
        }
        for dir in ancestors.into_iter().rev() {
            match entries.get(dir) {
                Some(entry) if entry.is_dir() => {}
                Some(_) => return false,
                None => {
                    entries.insert(dir.to_string(), Entry::directory(Visibility::Public));
                }
            }
        }
        true
    }

    /// Paths strictly beneath `dir`.
    fn descendants(entries: &BTreeMap<String, Entry>, dir: &str) -> Vec<String> {
        entries
            .keys()
            .filter(|k| k.as_str() != dir && path::is_within(k, dir))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AdapterOps for MemoryBackend {
    async fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool> {
        let path = path::normalize(path)?;
        let mut entries = self.entries.write();
        if entries.contains_key(&path) || !Self::ensure_parents(&mut entries, &path) {
            return Ok(false);
        }
        entries.insert(
            path,
            Entry::File {
                data: contents.to_vec(),
                visibility: config.visibility.unwrap_or_default(),
                modified: now(),
            },
        );
        Ok(true)
    }

    async fn update(
        &self,
        location: &str,
        contents: &[u8],
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let path = path::normalize(location)?;
        let mut entries = self.entries.write();
        match entries.get_mut(&path) {
            Some(Entry::File {
                data,
                visibility,
                modified,
            }) => {
                *data = contents.to_vec();
                *modified = now();
                if let Some(v) = config.visibility {
                    *visibility = v;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        let from = path::normalize(from)?;
        let to = path::normalize(to)?;
        let mut entries = self.entries.write();

        if from.is_empty()
            || !entries.contains_key(&from)
            || entries.contains_key(&to)
            || path::is_within(&to, &from)
            || !Self::ensure_parents(&mut entries, &to)
        {
            return Ok(false);
        }

        // Children first, then the entry itself.
        for child in Self::descendants(&entries, &from) {
            if let Some(entry) = entries.remove(&child) {
                entries.insert(format!("{to}{}", &child[from.len()..]), entry);
            }
        }
        if let Some(entry) = entries.remove(&from) {
            entries.insert(to, entry);
        }
        Ok(true)
    }

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        let from = path::normalize(from)?;
        let to = path::normalize(to)?;
        let mut entries = self.entries.write();

        let Some(Entry::File {
            data, visibility, ..
        }) = entries.get(&from).cloned()
        else {
            return Ok(false);
        };
        if entries.contains_key(&to) || !Self::ensure_parents(&mut entries, &to) {
            return Ok(false);
        }
        entries.insert(
            to,
            Entry::File {
                data,
                visibility,
                modified: now(),
            },
        );
        Ok(true)
    }

    async fn delete(&self, location: &str) -> FsResult<bool> {
        let path = path::normalize(location)?;
        let mut entries = self.entries.write();
        match entries.get(&path) {
            Some(Entry::File { .. }) => {
                entries.remove(&path);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_dir(&self, location: &str) -> FsResult<bool> {
        let path = path::normalize(location)?;
        if path.is_empty() {
            return Ok(false);
        }
        let mut entries = self.entries.write();
        if !entries.get(&path).is_some_and(Entry::is_dir) {
            return Ok(false);
        }
        for child in Self::descendants(&entries, &path) {
            entries.remove(&child);
        }
        entries.remove(&path);
        Ok(true)
    }

    async fn create_dir(&self, path: &str, config: &WriteConfig) -> FsResult<bool> {
        let path = path::normalize(path)?;
        let mut entries = self.entries.write();
        match entries.get(&path) {
            Some(entry) => Ok(entry.is_dir()),
            None => {
                if !Self::ensure_parents(&mut entries, &path) {
                    return Ok(false);
                }
                entries.insert(path, Entry::directory(config.visibility.unwrap_or_default()));
                Ok(true)
            }
        }
    }

    async fn set_visibility(&self, location: &str, visibility: Visibility) -> FsResult<bool> {
        let path = path::normalize(location)?;
        let mut entries = self.entries.write();
        match entries.get_mut(&path) {
            Some(Entry::File { visibility: v, .. } | Entry::Directory { visibility: v, .. }) => {
                *v = visibility;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has(&self, location: &str) -> FsResult<bool> {
        let path = path::normalize(location)?;
        Ok(self.entries.read().contains_key(&path))
    }

    async fn read(&self, location: &str) -> FsResult<Vec<u8>> {
        let path = path::normalize(location)?;
        match self.entries.read().get(&path) {
            Some(Entry::File { data, .. }) => Ok(data.clone()),
            Some(Entry::Directory { .. }) => {
                Err(FsError::backend(format!("is a directory: {path}")))
            }
            None => Err(FsError::not_found(path)),
        }
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> FsResult<Vec<Metadata>> {
        let dir = path::normalize(directory)?;
        let entries = self.entries.read();
        match entries.get(&dir) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => {
                return Err(FsError::backend(format!("not a directory: {dir}")));
            }
            None => return Err(FsError::not_found(dir)),
        }

        // BTreeMap iteration keeps the listing sorted by path.
        Ok(entries
            .iter()
            .filter(|(k, _)| {
                if recursive {
                    k.as_str() != dir && path::is_within(k, &dir)
                } else {
                    !k.is_empty() && path::parent(k) == Some(dir.as_str())
                }
            })
            .map(|(k, entry)| entry.to_metadata(k))
            .collect())
    }

    async fn get_metadata(&self, location: &str) -> FsResult<Metadata> {
        let path = path::normalize(location)?;
        self.entries
            .read()
            .get(&path)
            .map(|entry| entry.to_metadata(&path))
            .ok_or_else(|| FsError::not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WriteConfig {
        WriteConfig::default()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let fs = MemoryBackend::new();
        assert!(fs.write("test.txt", b"hello world", &config()).await.unwrap());
        assert_eq!(fs.read("test.txt").await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_write_refuses_existing() {
        let fs = MemoryBackend::new();
        assert!(fs.write("test.txt", b"one", &config()).await.unwrap());
        assert!(!fs.write("test.txt", b"two", &config()).await.unwrap());
        assert_eq!(fs.read("test.txt").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_update_requires_existing() {
        let fs = MemoryBackend::new();
        assert!(!fs.update("test.txt", b"x", &config()).await.unwrap());
        fs.write("test.txt", b"one", &config()).await.unwrap();
        assert!(fs.update("test.txt", b"two", &config()).await.unwrap());
        assert_eq!(fs.read("test.txt").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_create_dir_and_list() {
        let fs = MemoryBackend::new();
        assert!(fs.create_dir("subdir", &config()).await.unwrap());
        fs.write("subdir/file.txt", b"", &config()).await.unwrap();
        fs.write("root.txt", b"", &config()).await.unwrap();

        let root: Vec<_> = fs
            .list_contents("", false)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(root, vec!["root.txt", "subdir"]);

        let sub = fs.list_contents("subdir", false).await.unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].path, "subdir/file.txt");
    }

    #[tokio::test]
    async fn test_recursive_listing() {
        let fs = MemoryBackend::new();
        fs.write("a/x.txt", b"", &config()).await.unwrap();
        fs.write("a/b/y.txt", b"", &config()).await.unwrap();

        let paths: Vec<_> = fs
            .list_contents("a", true)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(paths, vec!["a/b", "a/b/y.txt", "a/x.txt"]);
    }

    #[tokio::test]
    async fn test_delete_file_only() {
        let fs = MemoryBackend::new();
        fs.write("dir/test.txt", b"", &config()).await.unwrap();
        assert!(!fs.delete("dir").await.unwrap());
        assert!(fs.delete("dir/test.txt").await.unwrap());
        assert!(!fs.has("dir/test.txt").await.unwrap());
        assert!(!fs.delete("dir/test.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_dir_is_recursive() {
        let fs = MemoryBackend::new();
        fs.write("nonempty/a/file.txt", b"", &config()).await.unwrap();
        assert!(fs.delete_dir("nonempty").await.unwrap());
        assert!(!fs.has("nonempty/a").await.unwrap());
        assert!(!fs.has("nonempty/a/file.txt").await.unwrap());
        assert!(!fs.delete_dir("").await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_moves_children() {
        let fs = MemoryBackend::new();
        fs.write("old/a.txt", b"content", &config()).await.unwrap();

        assert!(fs.rename("old", "new").await.unwrap());
        assert!(!fs.has("old").await.unwrap());
        assert_eq!(fs.read("new/a.txt").await.unwrap(), b"content");

        fs.write("other.txt", b"", &config()).await.unwrap();
        assert!(!fs.rename("other.txt", "new/a.txt").await.unwrap());
        assert!(!fs.rename("missing", "x").await.unwrap());
        assert!(!fs.rename("new", "new/inner").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy() {
        let fs = MemoryBackend::new();
        fs.write("a.txt", b"content", &config()).await.unwrap();
        assert!(fs.copy("a.txt", "copies/b.txt").await.unwrap());
        assert_eq!(fs.read("copies/b.txt").await.unwrap(), b"content");
        assert!(!fs.copy("a.txt", "copies/b.txt").await.unwrap());
        assert!(!fs.copy("copies", "elsewhere").await.unwrap());
    }

    #[tokio::test]
    async fn test_metadata() {
        let fs = MemoryBackend::new();
        let private = WriteConfig::new().with_visibility(Visibility::Private);
        fs.write("img/logo.png", b"1234", &private).await.unwrap();

        let meta = fs.get_metadata("img/logo.png").await.unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, Some(4));
        assert_eq!(meta.mimetype.as_deref(), Some("image/png"));
        assert_eq!(meta.visibility, Some(Visibility::Private));
        assert!(meta.timestamp.is_some());

        assert!(fs.get_metadata("img").await.unwrap().is_dir());
        assert!(fs.get_metadata("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_set_visibility() {
        let fs = MemoryBackend::new();
        fs.write("a.txt", b"", &config()).await.unwrap();
        assert!(fs.set_visibility("a.txt", Visibility::Private).await.unwrap());
        assert_eq!(
            fs.get_visibility("a.txt").await.unwrap(),
            Some(Visibility::Private)
        );
        assert!(!fs.set_visibility("missing", Visibility::Private).await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_create_parents() {
        let fs = MemoryBackend::new();
        fs.write("a/b/c/file.txt", b"", &config()).await.unwrap();

        assert!(fs.get_metadata("a").await.unwrap().is_dir());
        assert!(fs.get_metadata("a/b").await.unwrap().is_dir());
        assert!(fs.get_metadata("a/b/c").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let fs = MemoryBackend::new();
        fs.write("/a/b/c.txt", b"", &config()).await.unwrap();

        assert!(fs.has("a/b/c.txt").await.unwrap());
        assert!(fs.has("/a/b/c.txt").await.unwrap());
        assert!(fs.has("a/./b/c.txt").await.unwrap());
        assert!(fs.has("a/b/../b/c.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_stream_defaults() {
        use tokio::io::AsyncReadExt;

        let fs = MemoryBackend::new();
        let stream = Box::new(std::io::Cursor::new(b"streamed".to_vec()));
        assert!(fs.write_stream("s.txt", stream, &config()).await.unwrap());

        let mut out = Vec::new();
        fs.read_stream("s.txt")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"streamed");
    }
}
