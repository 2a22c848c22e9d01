//! Mount router with name-based dispatch.
//!
//! Filesystems are registered under unique names and addressed as
//! `"<name>://<path-or-id>"`. The router forwards each call to the named
//! filesystem and returns its result unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use mountfs_types::Visibility;

use super::error::{FsError, FsResult};
use super::filesystem::{Filesystem, Operation, Outcome};
use super::plugins::{PluginOutput, PluginRequest};
use super::types::{ByteStream, Metadata, WriteConfig};

/// Separator between filesystem name and location.
pub const SCHEME_DELIMITER: &str = "://";

/// Split `"<name>://<location>"` on the first delimiter.
pub fn split_location(uri: &str) -> FsResult<(&str, &str)> {
    match uri.split_once(SCHEME_DELIMITER) {
        Some((name, location)) if !name.is_empty() => Ok((name, location)),
        _ => Err(FsError::InvalidLocation(uri.to_string())),
    }
}

/// Routes operations to named filesystems.
#[derive(Default)]
pub struct MountRouter {
    filesystems: HashMap<String, Arc<Filesystem>>,
}

impl std::fmt::Debug for MountRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountRouter")
            .field("filesystems", &self.names())
            .finish()
    }
}

impl MountRouter {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filesystem under `name`.
    pub fn register(&mut self, name: impl Into<String>, fs: Filesystem) -> FsResult<()> {
        self.register_arc(name, Arc::new(fs))
    }

    /// Register a shared filesystem under `name`.
    pub fn register_arc(&mut self, name: impl Into<String>, fs: Arc<Filesystem>) -> FsResult<()> {
        let name = name.into();
        if self.filesystems.contains_key(&name) {
            return Err(FsError::DuplicateName(name));
        }
        tracing::debug!(name = %name, "registered filesystem");
        self.filesystems.insert(name, fs);
        Ok(())
    }

    /// Look up a filesystem.
    pub fn filesystem(&self, name: &str) -> FsResult<&Arc<Filesystem>> {
        self.filesystems
            .get(name)
            .ok_or_else(|| FsError::UnknownFilesystem(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.filesystems.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Forward an operation to the named filesystem.
    #[tracing::instrument(skip(self, op), fields(op = op.name()), name = "MountRouter::dispatch")]
    pub async fn dispatch(&self, name: &str, op: Operation) -> FsResult<Outcome> {
        self.filesystem(name)?.execute(op).await
    }

    /// Filesystem and location addressed by a URI.
    fn route<'a>(&self, uri: &'a str) -> FsResult<(&Arc<Filesystem>, &'a str)> {
        let (name, location) = split_location(uri)?;
        Ok((self.filesystem(name)?, location))
    }

    // ========================================================================
    // URI-addressed operations
    // ========================================================================

    #[tracing::instrument(skip(self, contents, config), name = "MountRouter::write")]
    pub async fn write(&self, uri: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool> {
        let (fs, path) = self.route(uri)?;
        fs.write(path, contents, config).await
    }

    #[tracing::instrument(skip(self, stream, config), name = "MountRouter::write_stream")]
    pub async fn write_stream(
        &self,
        uri: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let (fs, path) = self.route(uri)?;
        fs.write_stream(path, stream, config).await
    }

    #[tracing::instrument(skip(self, contents, config), name = "MountRouter::update")]
    pub async fn update(&self, uri: &str, contents: &[u8], config: &WriteConfig) -> FsResult<bool> {
        let (fs, location) = self.route(uri)?;
        fs.update(location, contents, config).await
    }

    #[tracing::instrument(skip(self, stream, config), name = "MountRouter::update_stream")]
    pub async fn update_stream(
        &self,
        uri: &str,
        stream: ByteStream,
        config: &WriteConfig,
    ) -> FsResult<bool> {
        let (fs, location) = self.route(uri)?;
        fs.update_stream(location, stream, config).await
    }

    /// Move a file. Across filesystems this is read, write, then delete,
    /// and is not atomic.
    #[tracing::instrument(skip(self), name = "MountRouter::rename")]
    pub async fn rename(&self, from: &str, to: &str) -> FsResult<bool> {
        let (from_name, from_location) = split_location(from)?;
        let (to_name, to_location) = split_location(to)?;
        let source = self.filesystem(from_name)?;
        if from_name == to_name {
            return source.rename(from_location, to_location).await;
        }

        let target = self.filesystem(to_name)?;
        if !Self::transfer(source, from_location, target, to_location).await? {
            return Ok(false);
        }
        source.delete(from_location).await
    }

    /// Copy a file, across filesystems if needed.
    #[tracing::instrument(skip(self), name = "MountRouter::copy")]
    pub async fn copy(&self, from: &str, to: &str) -> FsResult<bool> {
        let (from_name, from_location) = split_location(from)?;
        let (to_name, to_location) = split_location(to)?;
        let source = self.filesystem(from_name)?;
        if from_name == to_name {
            return source.copy(from_location, to_location).await;
        }

        let target = self.filesystem(to_name)?;
        Self::transfer(source, from_location, target, to_location).await
    }

    async fn transfer(
        source: &Filesystem,
        from: &str,
        target: &Filesystem,
        to: &str,
    ) -> FsResult<bool> {
        tracing::debug!(from, to, "copying between filesystems");
        let stream = source.read_stream(from).await?;
        target.write_stream(to, stream, &WriteConfig::default()).await
    }

    #[tracing::instrument(skip(self), name = "MountRouter::delete")]
    pub async fn delete(&self, uri: &str) -> FsResult<bool> {
        let (fs, location) = self.route(uri)?;
        fs.delete(location).await
    }

    #[tracing::instrument(skip(self), name = "MountRouter::delete_dir")]
    pub async fn delete_dir(&self, uri: &str) -> FsResult<bool> {
        let (fs, location) = self.route(uri)?;
        fs.delete_dir(location).await
    }

    #[tracing::instrument(skip(self, config), name = "MountRouter::create_dir")]
    pub async fn create_dir(&self, uri: &str, config: &WriteConfig) -> FsResult<bool> {
        let (fs, path) = self.route(uri)?;
        fs.create_dir(path, config).await
    }

    #[tracing::instrument(skip(self), name = "MountRouter::set_visibility")]
    pub async fn set_visibility(&self, uri: &str, visibility: Visibility) -> FsResult<bool> {
        let (fs, location) = self.route(uri)?;
        fs.set_visibility(location, visibility).await
    }

    pub async fn has(&self, uri: &str) -> FsResult<bool> {
        let (fs, location) = self.route(uri)?;
        fs.has(location).await
    }

    pub async fn read(&self, uri: &str) -> FsResult<Vec<u8>> {
        let (fs, location) = self.route(uri)?;
        fs.read(location).await
    }

    pub async fn read_stream(&self, uri: &str) -> FsResult<ByteStream> {
        let (fs, location) = self.route(uri)?;
        fs.read_stream(location).await
    }

    #[tracing::instrument(skip(self), name = "MountRouter::list_contents")]
    pub async fn list_contents(&self, uri: &str, recursive: bool) -> FsResult<Vec<Metadata>> {
        let (fs, directory) = self.route(uri)?;
        fs.list_contents(directory, recursive).await
    }

    pub async fn get_metadata(&self, uri: &str) -> FsResult<Metadata> {
        let (fs, location) = self.route(uri)?;
        fs.get_metadata(location).await
    }

    pub async fn get_size(&self, uri: &str) -> FsResult<Option<u64>> {
        let (fs, location) = self.route(uri)?;
        fs.get_size(location).await
    }

    pub async fn get_mimetype(&self, uri: &str) -> FsResult<Option<String>> {
        let (fs, location) = self.route(uri)?;
        fs.get_mimetype(location).await
    }

    pub async fn get_timestamp(&self, uri: &str) -> FsResult<Option<u64>> {
        let (fs, location) = self.route(uri)?;
        fs.get_timestamp(location).await
    }

    pub async fn get_visibility(&self, uri: &str) -> FsResult<Option<Visibility>> {
        let (fs, location) = self.route(uri)?;
        fs.get_visibility(location).await
    }

    /// Run a plugin on the filesystem addressed by `uri`.
    ///
    /// The URI's location replaces `request.location`.
    #[tracing::instrument(skip(self, request), name = "MountRouter::invoke")]
    pub async fn invoke(
        &self,
        uri: &str,
        plugin: &str,
        mut request: PluginRequest,
    ) -> FsResult<PluginOutput> {
        let (fs, location) = self.route(uri)?;
        request.location = location.to_string();
        fs.invoke(plugin, request).await
    }
}
