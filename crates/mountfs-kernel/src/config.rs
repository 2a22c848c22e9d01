//! Mount configuration.
//!
//! A [`MountConfig`] describes the cache and every named filesystem in TOML:
//!
//! ```toml
//! [cache]
//! backend = "memory"   # "none" | "memory" | "file"
//! ttl = 300            # seconds, 0 = until invalidated
//!
//! [filesystems.local]
//! backend = "local"
//! path = "/srv/site"
//! links = "skip"
//!
//! [filesystems.files]
//! backend = "local"
//! path = "/srv/site"
//! root = "files"       # guarded: identifiers + root subtree
//! cached = true
//! ```
//!
//! [`MountConfig::build`] turns it into a [`MountRouter`], composing each
//! entry as backend, then optional guard, then optional cache.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache_store::{CacheStore, FileCacheStore, MemoryCacheStore};
use crate::resolver::IdentifierResolver;
use crate::vfs::backends::{LinkHandling, LocalBackend, MemoryBackend, PermissionMap};
use crate::vfs::error::FsError;
use crate::vfs::{AdapterOps, CachedAdapter, Filesystem, GuardedAdapter, MountRouter};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("filesystem '{0}' has a root but no identifier resolver was supplied")]
    MissingResolver(String),
    #[error("filesystem '{0}' uses the local backend but has no path")]
    MissingPath(String),
    #[error("file cache needs a directory")]
    MissingCacheDirectory,
    #[error("cache store: {0}")]
    Cache(#[source] FsError),
    #[error("filesystem '{name}': {source}")]
    Filesystem {
        name: String,
        #[source]
        source: FsError,
    },
}

/// Cache storage selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    None,
    Memory,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Entry lifetime in seconds, 0 for no expiry.
    pub ttl: u64,
    /// Directory for the file cache.
    pub directory: Option<PathBuf>,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Memory,
}

/// One named filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    pub backend: BackendKind,
    /// Root directory of a local backend.
    pub path: Option<PathBuf>,
    pub links: LinkHandling,
    pub permissions: PermissionMap,
    /// Root subtree; setting it wraps the backend in the guarded adapter.
    pub root: Option<String>,
    /// Wrap in the cache-through adapter (ignored when no cache is configured).
    pub cached: bool,
}

/// Whole mount configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub cache: CacheConfig,
    pub filesystems: BTreeMap<String, FilesystemConfig>,
}

impl MountConfig {
    /// Parse TOML text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Compose every filesystem and register it with a new router.
    ///
    /// `resolver` is required when any filesystem sets a root.
    pub async fn build(
        &self,
        resolver: Option<Arc<dyn IdentifierResolver>>,
    ) -> Result<MountRouter, ConfigError> {
        let store = self.cache_store().await?;
        let mut router = MountRouter::new();

        for (name, entry) in &self.filesystems {
            let mut adapter = Self::backend(name, entry)?;

            if let Some(root) = &entry.root {
                let resolver = resolver
                    .clone()
                    .ok_or_else(|| ConfigError::MissingResolver(name.clone()))?;
                let guarded = GuardedAdapter::new(adapter, resolver, root)
                    .map_err(|source| ConfigError::Filesystem {
                        name: name.clone(),
                        source,
                    })?;
                adapter = Arc::new(guarded);
            }

            if entry.cached {
                match &store {
                    Some(store) => {
                        let cached = CachedAdapter::new(adapter, store.clone(), self.cache.ttl)
                            .with_namespace(name.clone());
                        adapter = Arc::new(cached);
                    }
                    None => tracing::warn!(name = %name, "cached filesystem but no cache configured"),
                }
            }

            router
                .register(name.clone(), Filesystem::with_default_plugins(adapter))
                .map_err(|source| ConfigError::Filesystem {
                    name: name.clone(),
                    source,
                })?;
            tracing::info!(name = %name, backend = ?entry.backend, "mounted filesystem");
        }

        Ok(router)
    }

    async fn cache_store(&self) -> Result<Option<Arc<dyn CacheStore>>, ConfigError> {
        let store: Arc<dyn CacheStore> = match self.cache.backend {
            CacheBackend::None => return Ok(None),
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
            CacheBackend::File => {
                let dir = self
                    .cache
                    .directory
                    .as_ref()
                    .ok_or(ConfigError::MissingCacheDirectory)?;
                let store = FileCacheStore::open(dir).await.map_err(ConfigError::Cache)?;
                Arc::new(store)
            }
        };
        Ok(Some(store))
    }

    fn backend(name: &str, entry: &FilesystemConfig) -> Result<Arc<dyn AdapterOps>, ConfigError> {
        let backend: Arc<dyn AdapterOps> = match entry.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::Local => {
                let path = entry
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::MissingPath(name.to_string()))?;
                let local = LocalBackend::new(path)
                    .map_err(|source| ConfigError::Filesystem {
                        name: name.to_string(),
                        source,
                    })?
                    .with_links(entry.links)
                    .with_permissions(entry.permissions);
                Arc::new(local)
            }
        };
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemoryResolver;
    use crate::vfs::WriteConfig;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full() {
        let config = MountConfig::parse(
            r#"
            [cache]
            backend = "memory"
            ttl = 300

            [filesystems.local]
            backend = "local"
            path = "/srv/site"
            links = "disallow"
            permissions = { file_public = 0o664, dir_private = 0o750 }

            [filesystems.files]
            backend = "memory"
            root = "files"
            cached = true
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, CacheBackend::Memory);
        assert_eq!(config.cache.ttl, 300);

        let local = &config.filesystems["local"];
        assert_eq!(local.links, LinkHandling::Disallow);
        assert_eq!(local.permissions.file_public, 0o664);
        assert_eq!(local.permissions.file_private, 0o600);
        assert_eq!(local.permissions.dir_private, 0o750);

        let files = &config.filesystems["files"];
        assert_eq!(files.backend, BackendKind::Memory);
        assert_eq!(files.root.as_deref(), Some("files"));
        assert!(files.cached);
    }

    #[test]
    fn test_parse_rejects_unknown_backend() {
        let err = MountConfig::parse("[cache]\nbackend = \"apc\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_build_requires_resolver_for_root() {
        let config = MountConfig::parse(
            r#"
            [filesystems.files]
            backend = "memory"
            root = "files"
            "#,
        )
        .unwrap();
        let err = config.build(None).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingResolver(name) if name == "files"));
    }

    #[tokio::test]
    async fn test_build_requires_local_path() {
        let config = MountConfig::parse("[filesystems.local]\nbackend = \"local\"\n").unwrap();
        assert!(matches!(
            config.build(None).await.unwrap_err(),
            ConfigError::MissingPath(_)
        ));
    }

    #[tokio::test]
    async fn test_build_composes_chain() {
        let temp = TempDir::new().unwrap();
        let text = format!(
            r#"
            [cache]
            backend = "file"
            directory = "{cache}"

            [filesystems.local]
            path = "{site}"

            [filesystems.files]
            path = "{site}"
            root = "files"
            cached = true
            "#,
            cache = temp.path().join("cache").display(),
            site = temp.path().join("site").display(),
        );
        let config = MountConfig::parse(&text).unwrap();
        let resolver = Arc::new(MemoryResolver::new());
        let router = config.build(Some(resolver.clone())).await.unwrap();
        assert_eq!(router.names(), vec!["files", "local"]);

        let config = WriteConfig::default();
        assert!(router.write("files://files/a.txt", b"hi", &config).await.unwrap());
        let id = resolver.id_of("files/a.txt").unwrap();

        // Same bytes through the unguarded mount and by identifier.
        assert_eq!(router.read("local://files/a.txt").await.unwrap(), b"hi");
        assert_eq!(router.read(&format!("files://{id}")).await.unwrap(), b"hi");

        let err = router
            .write("files://system/x.txt", b"x", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::BoundaryViolation(_)));
    }
}
