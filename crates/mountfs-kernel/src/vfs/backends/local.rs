//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use mountfs_types::Visibility;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::vfs::error::{FsError, FsResult};
use crate::vfs::ops::AdapterOps;
use crate::vfs::path;
use crate::vfs::types::{ByteStream, EntryKind, Metadata, WriteConfig};

/// What to do with symbolic links found while listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkHandling {
    /// Leave links out of listings.
    #[default]
    Skip,
    /// Fail the listing.
    Disallow,
}

/// Unix modes used for each visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionMap {
    pub file_public: u32,
    pub file_private: u32,
    pub dir_public: u32,
    pub dir_private: u32,
}

impl Default for PermissionMap {
    fn default() -> Self {
        Self {
            file_public: 0o644,
            file_private: 0o600,
            dir_public: 0o755,
            dir_private: 0o700,
        }
    }
}

impl PermissionMap {
    /// Mode for an entry kind and visibility.
    pub fn mode(&self, kind: EntryKind, visibility: Visibility) -> u32 {
        match (kind, visibility) {
            (EntryKind::File, Visibility::Public) => self.file_public,
            (EntryKind::File, Visibility::Private) => self.file_private,
            (EntryKind::Dir, Visibility::Public) => self.dir_public,
            (EntryKind::Dir, Visibility::Private) => self.dir_private,
        }
    }

    /// Visibility for a mode. Anything but the private mode reads as public.
    pub fn visibility(&self, kind: EntryKind, mode: u32) -> Visibility {
        if mode & 0o777 == self.mode(kind, Visibility::Private) & 0o777 {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/site`, then `read("files/a.txt")` reads `/srv/site/files/a.txt`.
///
/// Path security is enforced: `..` above the root is rejected by
/// normalization, and symlinks resolving outside the root are refused.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    links: LinkHandling,
    permissions: PermissionMap,
}

impl LocalBackend {
    /// Create a local filesystem rooted at the given directory.
    ///
    /// The directory is created if missing and canonicalized, so symlinked
    /// roots (macOS `/tmp` → `/private/tmp`) compare correctly.
    pub fn new(root: impl Into<PathBuf>) -> FsResult<Self> {
        let root: PathBuf = root.into();
        std::fs::create_dir_all(&root)?;
        let root = dunce::canonicalize(&root)?;
        Ok(Self {
            root,
            links: LinkHandling::default(),
            permissions: PermissionMap::default(),
        })
    }

    pub fn with_links(mut self, links: LinkHandling) -> Self {
        self.links = links;
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionMap) -> Self {
        self.permissions = permissions;
        self
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    ///
    /// Returns the normalized relative path alongside the absolute one.
    fn resolve(&self, location: &str) -> FsResult<(String, PathBuf)> {
        let relative = path::normalize(location)?;
        if relative.is_empty() {
            return Ok((relative, self.root.clone()));
        }
        let full = self.root.join(&relative);

        // Canonicalize to catch symlinks pointing out of the root. For new
        // entries, check the nearest existing ancestor instead.
        let mut probe = full.as_path();
        while !probe.exists() {
            match probe.parent() {
                Some(parent) => probe = parent,
                None => break,
            }
        }
        let canonical = dunce::canonicalize(probe).unwrap_or_else(|_| probe.to_path_buf());
        if !canonical.starts_with(&self.root) {
            return Err(FsError::boundary_violation(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }
        Ok((relative, full))
    }

    async fn kind_of(full: &Path) -> Option<std::fs::Metadata> {
        fs::symlink_metadata(full).await.ok()
    }

    async fn ensure_parent(&self, full: &Path) -> FsResult<()> {
        if let Some(parent) = full.parent() {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(self.permissions.dir_public)
                .create(parent)?;
        }
        Ok(())
    }

    async fn apply_visibility(
        &self,
        full: &Path,
        kind: EntryKind,
        visibility: Visibility,
    ) -> FsResult<()> {
        let mode = self.permissions.mode(kind, visibility);
        fs::set_permissions(full, std::fs::Permissions::from_mode(mode)).await?;
        Ok(())
    }

    /// Convert std::fs::Metadata to Metadata.
    fn to_metadata(&self, relative: &str, meta: &std::fs::Metadata) -> Metadata {
        let timestamp = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mode = meta.permissions().mode();

        if meta.is_dir() {
            Metadata::dir(relative)
                .with_timestamp(timestamp)
                .with_visibility(self.permissions.visibility(EntryKind::Dir, mode))
        } else {
            Metadata::file(relative, meta.len())
                .with_timestamp(timestamp)
                .with_visibility(self.permissions.visibility(EntryKind::File, mode))
                .with_mimetype(
                    mime_guess::from_path(relative)
                        .first_or_octet_stream()
                        .essence_str(),
                )
        }
    }

    async fn create_file(&self, full: &Path, config: &WriteConfig) -> FsResult<Option<fs::File>> {
        self.ensure_parent(full).await?;
        let file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(full)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        self.apply_visibility(full, EntryKind::File, config.visibility.unwrap_or_default())
            .await?;
        Ok(Some(file))
    }

    async fn open_existing(&self, full: &Path) -> FsResult<Option<fs::File>> {
        match Self::kind_of(full).await {
            Some(meta) if meta.is_file() => {}
            _ => return Ok(None),
        }
        let file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(full)
            .await?;
        Ok(Some(file))
    }

    async fn walk(&self, relative: &str, full: &Path, recursive: bool) -> FsResult<Vec<Metadata>> {
        let mut listing = Vec::new();
        let mut pending = vec![(relative.to_string(), full.to_path_buf())];

        while let Some((dir_rel, dir_full)) = pending.pop() {
            let mut dir = fs::read_dir(&dir_full).await?;
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child_rel = path::join(&dir_rel, &name);
                let meta = fs::symlink_metadata(entry.path()).await?;

                if meta.file_type().is_symlink() {
                    match self.links {
                        LinkHandling::Skip => continue,
                        LinkHandling::Disallow => {
                            return Err(FsError::backend(format!(
                                "links are not supported: {child_rel}"
                            )));
                        }
                    }
                }

                if recursive && meta.is_dir() {
                    pending.push((child_rel.clone(), entry.path()));
                }
                listing.push(self.to_metadata(&child_rel, &meta));
            }
        }

        listing.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listing)
    }
}

#[async_trait]
impl AdapterOps for LocalBackend {
    async fn write(&self, path: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool> {
        let (_, full) = self.resolve(path)?;
        let Some(mut file) = self.create_file(&full, config).await? else {
            return Ok(false);
        };
        file.write_all(contents).await?;
        file.flush().await?;
        Ok(true)
    }

    async fn write_stream(
        &self,
        path: &str,
        mut stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let (_, full) = self.resolve(path)?;
        let Some(mut file) = self.create_file(&full, config).await? else {
            return Ok(false);
        };
        tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;
        Ok(true)
    }

    async fn update(
        &self,
        location: &str,
        contents: &[u8],
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let (_, full) = self.resolve(location)?;
        let Some(mut file) = self.open_existing(&full).await? else {
            return Ok(false);
        };
        file.write_all(contents).await?;
        file.flush().await?;
        if let Some(visibility) = config.visibility {
            self.apply_visibility(&full, EntryKind::File, visibility).await?;
        }
        Ok(true)
    }

    async fn update_stream(
        &self,
        location: &str,
        mut stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let (_, full) = self.resolve(location)?;
        let Some(mut file) = self.open_existing(&full).await? else {
            return Ok(false);
        };
        tokio::io::copy(&mut stream, &mut file).await?;
        file.flush().await?;
        if let Some(visibility) = config.visibility {
            self.apply_visibility(&full, EntryKind::File, visibility).await?;
        }
        Ok(true)
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        let (from_rel, from_full) = self.resolve(from)?;
        let (to_rel, to_full) = self.resolve(to)?;
        if from_rel.is_empty()
            || path::is_within(&to_rel, &from_rel)
            || Self::kind_of(&from_full).await.is_none()
            || Self::kind_of(&to_full).await.is_some()
        {
            return Ok(false);
        }
        self.ensure_parent(&to_full).await?;
        fs::rename(&from_full, &to_full).await?;
        Ok(true)
    }

    async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        let (_, from_full) = self.resolve(from)?;
        let (_, to_full) = self.resolve(to)?;
        match Self::kind_of(&from_full).await {
            Some(meta) if meta.is_file() => {}
            _ => return Ok(false),
        }
        if Self::kind_of(&to_full).await.is_some() {
            return Ok(false);
        }
        self.ensure_parent(&to_full).await?;
        fs::copy(&from_full, &to_full).await?;
        Ok(true)
    }

    async fn delete(&self, location: &str) -> FsResult<bool> {
        let (_, full) = self.resolve(location)?;
        match Self::kind_of(&full).await {
            Some(meta) if !meta.is_dir() => {
                fs::remove_file(&full).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_dir(&self, location: &str) -> FsResult<bool> {
        let (relative, full) = self.resolve(location)?;
        if relative.is_empty() {
            return Ok(false);
        }
        match Self::kind_of(&full).await {
            Some(meta) if meta.is_dir() => {
                fs::remove_dir_all(&full).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_dir(&self, path: &str, config: &WriteConfig) -> FsResult<bool> {
        let (_, full) = self.resolve(path)?;
        if let Some(meta) = Self::kind_of(&full).await {
            return Ok(meta.is_dir());
        }
        let visibility = config.visibility.unwrap_or_default();
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(self.permissions.mode(EntryKind::Dir, visibility))
            .create(&full)?;
        Ok(true)
    }

    async fn set_visibility(&self, location: &str, visibility: Visibility) -> FsResult<bool> {
        let (_, full) = self.resolve(location)?;
        let Some(meta) = Self::kind_of(&full).await else {
            return Ok(false);
        };
        let kind = if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        self.apply_visibility(&full, kind, visibility).await?;
        Ok(true)
    }

    async fn has(&self, location: &str) -> FsResult<bool> {
        let (_, full) = self.resolve(location)?;
        Ok(Self::kind_of(&full).await.is_some())
    }

    async fn read(&self, location: &str) -> FsResult<Vec<u8>> {
        let (_, full) = self.resolve(location)?;
        Ok(fs::read(&full).await?)
    }

    async fn read_stream(&self, location: &str) -> FsResult<ByteStream> {
        let (_, full) = self.resolve(location)?;
        let file = fs::File::open(&full).await?;
        Ok(Box::new(file))
    }

    async fn list_contents(&self, directory: &str, recursive: bool) -> FsResult<Vec<Metadata>> {
        let (relative, full) = self.resolve(directory)?;
        self.walk(&relative, &full, recursive).await
    }

    async fn get_metadata(&self, location: &str) -> FsResult<Metadata> {
        let (relative, full) = self.resolve(location)?;
        let meta = fs::symlink_metadata(&full).await?;
        Ok(self.to_metadata(&relative, &meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalBackend) {
        let temp = TempDir::new().unwrap();
        let fs = LocalBackend::new(temp.path()).unwrap();
        (temp, fs)
    }

    fn config() -> WriteConfig {
        WriteConfig::default()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (_temp, fs) = setup();
        assert!(fs.write("test.txt", b"hello world", &config()).await.unwrap());
        assert_eq!(fs.read("test.txt").await.unwrap(), b"hello world");
        assert!(!fs.write("test.txt", b"again", &config()).await.unwrap());
    }

    #[tokio::test]
    async fn test_update() {
        let (_temp, fs) = setup();
        assert!(!fs.update("test.txt", b"x", &config()).await.unwrap());
        fs.write("test.txt", b"hello world", &config()).await.unwrap();
        assert!(fs.update("test.txt", b"bye", &config()).await.unwrap());
        assert_eq!(fs.read("test.txt").await.unwrap(), b"bye");
    }

    #[tokio::test]
    async fn test_streams() {
        use tokio::io::AsyncReadExt;

        let (_temp, fs) = setup();
        let stream = Box::new(std::io::Cursor::new(b"streamed".to_vec()));
        assert!(fs.write_stream("nested/s.txt", stream, &config()).await.unwrap());

        let mut out = Vec::new();
        let mut reader = fs.read_stream("nested/s.txt").await.unwrap();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"streamed");
    }

    #[tokio::test]
    async fn test_listing() {
        let (_temp, fs) = setup();
        fs.write("a/x.txt", b"", &config()).await.unwrap();
        fs.write("a/b/y.txt", b"", &config()).await.unwrap();

        let flat: Vec<_> = fs
            .list_contents("a", false)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(flat, vec!["a/b", "a/x.txt"]);

        let deep: Vec<_> = fs
            .list_contents("a", true)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect();
        assert_eq!(deep, vec!["a/b", "a/b/y.txt", "a/x.txt"]);
    }

    #[tokio::test]
    async fn test_rename_copy_delete() {
        let (_temp, fs) = setup();
        fs.write("old.txt", b"content", &config()).await.unwrap();

        assert!(fs.rename("old.txt", "dir/new.txt").await.unwrap());
        assert!(!fs.has("old.txt").await.unwrap());
        assert!(fs.copy("dir/new.txt", "dir/copy.txt").await.unwrap());
        assert!(!fs.copy("dir/new.txt", "dir/copy.txt").await.unwrap());
        assert_eq!(fs.read("dir/copy.txt").await.unwrap(), b"content");

        assert!(fs.delete("dir/copy.txt").await.unwrap());
        assert!(!fs.delete("dir").await.unwrap());
        assert!(fs.delete_dir("dir").await.unwrap());
        assert!(!fs.has("dir/new.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_visibility_maps_to_mode() {
        let (temp, fs) = setup();
        let private = WriteConfig::new().with_visibility(Visibility::Private);
        fs.write("secret.txt", b"", &private).await.unwrap();

        let mode = std::fs::metadata(temp.path().join("secret.txt"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(
            fs.get_visibility("secret.txt").await.unwrap(),
            Some(Visibility::Private)
        );

        assert!(fs.set_visibility("secret.txt", Visibility::Public).await.unwrap());
        assert_eq!(
            fs.get_visibility("secret.txt").await.unwrap(),
            Some(Visibility::Public)
        );
    }

    #[tokio::test]
    async fn test_path_escape_blocked() {
        let (_temp, fs) = setup();
        let result = fs.read("../../../etc/passwd").await;
        assert!(matches!(result, Err(FsError::BoundaryViolation(_))));
    }

    #[tokio::test]
    async fn test_symlink_out_of_root_blocked() {
        let (temp, fs) = setup();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("x.txt"), b"outside").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("escape")).unwrap();

        let result = fs.read("escape/x.txt").await;
        assert!(matches!(result, Err(FsError::BoundaryViolation(_))));
    }

    #[tokio::test]
    async fn test_link_handling() {
        let (temp, fs) = setup();
        fs.write("real.txt", b"", &config()).await.unwrap();
        std::os::unix::fs::symlink(temp.path().join("real.txt"), temp.path().join("alias.txt"))
            .unwrap();

        let listing = fs.list_contents("", false).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].path, "real.txt");

        let strict = fs.clone().with_links(LinkHandling::Disallow);
        assert!(matches!(
            strict.list_contents("", false).await,
            Err(FsError::Backend { .. })
        ));
    }

    #[tokio::test]
    async fn test_metadata() {
        let (_temp, fs) = setup();
        fs.write("docs/readme.txt", b"hello", &config()).await.unwrap();

        let meta = fs.get_metadata("docs/readme.txt").await.unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.size, Some(5));
        assert_eq!(meta.mimetype.as_deref(), Some("text/plain"));
        assert_eq!(meta.visibility, Some(Visibility::Public));

        assert!(fs.get_metadata("docs").await.unwrap().is_dir());
        assert!(fs.get_metadata("").await.unwrap().is_dir());
        assert!(fs.get_metadata("missing").await.unwrap_err().is_not_found());
    }
}
