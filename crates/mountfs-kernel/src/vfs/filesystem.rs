//! Filesystem instances.
//!
//! A [`Filesystem`] is one composed adapter chain plus the plugins available
//! on it. It dereferences to the chain, so every base operation is called
//! directly on it. [`Operation`] and [`Outcome`] give the same operations a
//! data form for routing.

use std::ops::Deref;
use std::sync::Arc;

use mountfs_types::Visibility;

use super::error::FsResult;
use super::ops::AdapterOps;
use super::plugins::{Plugin, PluginOutput, PluginRegistry, PluginRequest};
use super::types::{ByteStream, Metadata, WriteConfig};

/// A composed adapter chain with its plugins.
#[derive(Clone)]
pub struct Filesystem {
    adapter: Arc<dyn AdapterOps>,
    plugins: PluginRegistry,
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl Filesystem {
    /// A filesystem without plugins.
    pub fn new(adapter: Arc<dyn AdapterOps>) -> Self {
        Self {
            adapter,
            plugins: PluginRegistry::new(),
        }
    }

    /// A filesystem carrying the built-in plugins.
    pub fn with_default_plugins(adapter: Arc<dyn AdapterOps>) -> Self {
        Self {
            adapter,
            plugins: PluginRegistry::with_defaults(),
        }
    }

    /// Add a plugin, replacing any of the same name.
    pub fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.register(plugin);
    }

    /// The outermost adapter of the chain.
    pub fn adapter(&self) -> &Arc<dyn AdapterOps> {
        &self.adapter
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// Run a plugin by name.
    pub async fn invoke(&self, name: &str, request: PluginRequest) -> FsResult<PluginOutput> {
        let plugin = self.plugins.get(name)?.clone();
        tracing::trace!(plugin = name, location = %request.location, "invoking plugin");
        plugin.handle(self, request).await
    }

    /// Run an operation given in data form.
    pub async fn execute(&self, op: Operation) -> FsResult<Outcome> {
        let fs = self.adapter.as_ref();
        Ok(match op {
            Operation::Write {
                path,
                contents,
                config,
            } => Outcome::Done(fs.write(&path, &contents, &config).await?),
            Operation::WriteStream {
                path,
                stream,
                config,
            } => Outcome::Done(fs.write_stream(&path, stream, &config).await?),
            Operation::Update {
                location,
                contents,
                config,
            } => Outcome::Done(fs.update(&location, &contents, &config).await?),
            Operation::UpdateStream {
                location,
                stream,
                config,
            } => Outcome::Done(fs.update_stream(&location, stream, &config).await?),
            Operation::Rename { from, to } => Outcome::Done(fs.rename(&from, &to).await?),
            Operation::Copy { from, to } => Outcome::Done(fs.copy(&from, &to).await?),
            Operation::Delete { location } => Outcome::Done(fs.delete(&location).await?),
            Operation::DeleteDir { location } => Outcome::Done(fs.delete_dir(&location).await?),
            Operation::CreateDir { path, config } => {
                Outcome::Done(fs.create_dir(&path, &config).await?)
            }
            Operation::SetVisibility {
                location,
                visibility,
            } => Outcome::Done(fs.set_visibility(&location, visibility).await?),
            Operation::Has { location } => Outcome::Done(fs.has(&location).await?),
            Operation::Read { location } => Outcome::Bytes(fs.read(&location).await?),
            Operation::ReadStream { location } => Outcome::Stream(fs.read_stream(&location).await?),
            Operation::ListContents {
                directory,
                recursive,
            } => Outcome::Listing(fs.list_contents(&directory, recursive).await?),
            Operation::GetMetadata { location } => {
                Outcome::Metadata(fs.get_metadata(&location).await?)
            }
            Operation::GetSize { location } => Outcome::Size(fs.get_size(&location).await?),
            Operation::GetMimetype { location } => {
                Outcome::Mimetype(fs.get_mimetype(&location).await?)
            }
            Operation::GetTimestamp { location } => {
                Outcome::Timestamp(fs.get_timestamp(&location).await?)
            }
            Operation::GetVisibility { location } => {
                Outcome::Visibility(fs.get_visibility(&location).await?)
            }
        })
    }
}

impl Deref for Filesystem {
    type Target = dyn AdapterOps;

    fn deref(&self) -> &Self::Target {
        self.adapter.as_ref()
    }
}

/// A base operation in data form.
#[derive(strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Write {
        path: String,
        contents: Vec<u8>,
        config: WriteConfig,
    },
    WriteStream {
        path: String,
        stream: ByteStream,
        config: WriteConfig,
    },
    Update {
        location: String,
        contents: Vec<u8>,
        config: WriteConfig,
    },
    UpdateStream {
        location: String,
        stream: ByteStream,
        config: WriteConfig,
    },
    Rename {
        from: String,
        to: String,
    },
    Copy {
        from: String,
        to: String,
    },
    Delete {
        location: String,
    },
    DeleteDir {
        location: String,
    },
    CreateDir {
        path: String,
        config: WriteConfig,
    },
    SetVisibility {
        location: String,
        visibility: Visibility,
    },
    Has {
        location: String,
    },
    Read {
        location: String,
    },
    ReadStream {
        location: String,
    },
    ListContents {
        directory: String,
        recursive: bool,
    },
    GetMetadata {
        location: String,
    },
    GetSize {
        location: String,
    },
    GetMimetype {
        location: String,
    },
    GetTimestamp {
        location: String,
    },
    GetVisibility {
        location: String,
    },
}

impl Operation {
    /// Operation name, for logs.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The first location the operation addresses.
    pub fn location(&self) -> &str {
        match self {
            Operation::Write { path, .. }
            | Operation::WriteStream { path, .. }
            | Operation::CreateDir { path, .. } => path,
            Operation::Rename { from, .. } | Operation::Copy { from, .. } => from,
            Operation::ListContents { directory, .. } => directory,
            Operation::Update { location, .. }
            | Operation::UpdateStream { location, .. }
            | Operation::Delete { location }
            | Operation::DeleteDir { location }
            | Operation::SetVisibility { location, .. }
            | Operation::Has { location }
            | Operation::Read { location }
            | Operation::ReadStream { location }
            | Operation::GetMetadata { location }
            | Operation::GetSize { location }
            | Operation::GetMimetype { location }
            | Operation::GetTimestamp { location }
            | Operation::GetVisibility { location } => location,
        }
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name())
            .field("location", &self.location())
            .finish_non_exhaustive()
    }
}

/// Result of an [`Operation`].
pub enum Outcome {
    /// Mutations and `has`.
    Done(bool),
    Bytes(Vec<u8>),
    Stream(ByteStream),
    Listing(Vec<Metadata>),
    Metadata(Metadata),
    Size(Option<u64>),
    Mimetype(Option<String>),
    Timestamp(Option<u64>),
    Visibility(Option<Visibility>),
}

impl Outcome {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Outcome::Done(done) => Some(*done),
            _ => None,
        }
    }

    pub fn into_listing(self) -> Option<Vec<Metadata>> {
        match self {
            Outcome::Listing(listing) => Some(listing),
            _ => None,
        }
    }

    pub fn into_metadata(self) -> Option<Metadata> {
        match self {
            Outcome::Metadata(metadata) => Some(metadata),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Outcome::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Done(done) => f.debug_tuple("Done").field(done).finish(),
            Outcome::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Outcome::Stream(_) => f.write_str("Stream(..)"),
            Outcome::Listing(listing) => f.debug_tuple("Listing").field(listing).finish(),
            Outcome::Metadata(meta) => f.debug_tuple("Metadata").field(meta).finish(),
            Outcome::Size(size) => f.debug_tuple("Size").field(size).finish(),
            Outcome::Mimetype(mime) => f.debug_tuple("Mimetype").field(mime).finish(),
            Outcome::Timestamp(ts) => f.debug_tuple("Timestamp").field(ts).finish(),
            Outcome::Visibility(v) => f.debug_tuple("Visibility").field(v).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    #[tokio::test]
    async fn test_execute_round() {
        let fs = Filesystem::new(Arc::new(MemoryBackend::new()));
        let written = fs
            .execute(Operation::Write {
                path: "a.txt".into(),
                contents: b"hi".to_vec(),
                config: WriteConfig::default(),
            })
            .await
            .unwrap();
        assert_eq!(written.as_bool(), Some(true));

        let bytes = fs
            .execute(Operation::Read {
                location: "a.txt".into(),
            })
            .await
            .unwrap();
        assert_eq!(bytes.into_bytes().unwrap(), b"hi");

        let listing = fs
            .execute(Operation::ListContents {
                directory: String::new(),
                recursive: false,
            })
            .await
            .unwrap()
            .into_listing()
            .unwrap();
        assert_eq!(listing.len(), 1);
    }

    #[tokio::test]
    async fn test_deref_and_no_plugins() {
        let fs = Filesystem::new(Arc::new(MemoryBackend::new()));
        assert!(fs.create_dir("d", &WriteConfig::default()).await.unwrap());
        assert!(fs.plugins().names().is_empty());
        assert!(fs.invoke("listWith", PluginRequest::new("d")).await.is_err());
    }

    #[test]
    fn test_operation_names() {
        let op = Operation::DeleteDir {
            location: "files/x".into(),
        };
        assert_eq!(op.name(), "delete_dir");
        assert_eq!(op.location(), "files/x");
    }
}
