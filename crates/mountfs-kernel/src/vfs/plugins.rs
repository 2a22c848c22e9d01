//! Extension operations.
//!
//! A [`Plugin`] is a named operation built only from the base capability set
//! and run against a [`Filesystem`]. Each filesystem carries its own
//! [`PluginRegistry`]; invoking a name it does not know fails with
//! `UnknownOperation`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::{FsError, FsResult};
use super::filesystem::Filesystem;
use super::types::{Metadata, MetadataField};

/// Arguments passed to a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginRequest {
    /// Directory or file the plugin works on (path or identifier).
    pub location: String,
    /// For listing plugins: include every descendant.
    pub recursive: bool,
    /// For metadata plugins: fields to fill in.
    pub fields: Vec<MetadataField>,
}

impl PluginRequest {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = MetadataField>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }
}

/// What a plugin hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginOutput {
    Entries(Vec<Metadata>),
    Paths(Vec<String>),
    Metadata(Metadata),
    Done(bool),
}

/// A named extension operation.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name the plugin is invoked by.
    fn name(&self) -> &'static str;

    async fn handle(&self, fs: &Filesystem, request: PluginRequest) -> FsResult<PluginOutput>;
}

/// Plugins available on one filesystem, by name.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

impl PluginRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in plugins.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for plugin in default_plugins() {
            registry.register(plugin);
        }
        registry
    }

    /// Add a plugin, replacing any plugin of the same name.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    /// Look up a plugin.
    pub fn get(&self, name: &str) -> FsResult<&Arc<dyn Plugin>> {
        self.plugins
            .get(name)
            .ok_or_else(|| FsError::UnknownOperation(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The built-in plugins.
pub fn default_plugins() -> Vec<Arc<dyn Plugin>> {
    vec![
        Arc::new(GetWithMetadata),
        Arc::new(ListFiles),
        Arc::new(ListPaths),
        Arc::new(ListWith),
        Arc::new(EmptyDir),
    ]
}

/// Fill in requested fields the metadata does not carry yet.
async fn fill_fields(fs: &Filesystem, meta: &mut Metadata, fields: &[MetadataField]) -> FsResult<()> {
    for field in fields {
        if meta.has_field(*field) {
            continue;
        }
        match field {
            MetadataField::Size => meta.size = fs.get_size(&meta.path).await?,
            MetadataField::Mimetype => meta.mimetype = fs.get_mimetype(&meta.path).await?,
            MetadataField::Timestamp => meta.timestamp = fs.get_timestamp(&meta.path).await?,
            MetadataField::Visibility => meta.visibility = fs.get_visibility(&meta.path).await?,
        }
    }
    Ok(())
}

/// `listWith`: listing with requested fields filled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListWith;

#[async_trait]
impl Plugin for ListWith {
    fn name(&self) -> &'static str {
        "listWith"
    }

    async fn handle(&self, fs: &Filesystem, request: PluginRequest) -> FsResult<PluginOutput> {
        let mut entries = fs
            .list_contents(&request.location, request.recursive)
            .await?;
        for entry in &mut entries {
            fill_fields(fs, entry, &request.fields).await?;
        }
        Ok(PluginOutput::Entries(entries))
    }
}

/// `listFiles`: listing without directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFiles;

#[async_trait]
impl Plugin for ListFiles {
    fn name(&self) -> &'static str {
        "listFiles"
    }

    async fn handle(&self, fs: &Filesystem, request: PluginRequest) -> FsResult<PluginOutput> {
        let entries = fs
            .list_contents(&request.location, request.recursive)
            .await?;
        Ok(PluginOutput::Entries(
            entries.into_iter().filter(Metadata::is_file).collect(),
        ))
    }
}

/// `listPaths`: listing reduced to paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListPaths;

#[async_trait]
impl Plugin for ListPaths {
    fn name(&self) -> &'static str {
        "listPaths"
    }

    async fn handle(&self, fs: &Filesystem, request: PluginRequest) -> FsResult<PluginOutput> {
        let entries = fs
            .list_contents(&request.location, request.recursive)
            .await?;
        Ok(PluginOutput::Paths(
            entries.into_iter().map(|m| m.path).collect(),
        ))
    }
}

/// `emptyDir`: delete every child of a directory, keeping the directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyDir;

#[async_trait]
impl Plugin for EmptyDir {
    fn name(&self) -> &'static str {
        "emptyDir"
    }

    async fn handle(&self, fs: &Filesystem, request: PluginRequest) -> FsResult<PluginOutput> {
        let mut all = true;
        for entry in fs.list_contents(&request.location, false).await? {
            let deleted = if entry.is_dir() {
                fs.delete_dir(&entry.path).await?
            } else {
                fs.delete(&entry.path).await?
            };
            all &= deleted;
        }
        Ok(PluginOutput::Done(all))
    }
}

/// `getWithMetadata`: metadata of one entry with requested fields filled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetWithMetadata;

#[async_trait]
impl Plugin for GetWithMetadata {
    fn name(&self) -> &'static str {
        "getWithMetadata"
    }

    async fn handle(&self, fs: &Filesystem, request: PluginRequest) -> FsResult<PluginOutput> {
        let mut meta = fs.get_metadata(&request.location).await?;
        fill_fields(fs, &mut meta, &request.fields).await?;
        Ok(PluginOutput::Metadata(meta))
    }
}
