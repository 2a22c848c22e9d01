//! Core VFS types.
//!
//! Metadata is serde-friendly so cache stores can persist snapshots of it.

use mountfs_types::{FileId, Visibility};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// Readable byte stream handed to `write_stream` / returned by `read_stream`.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
}

/// Metadata of one entry.
///
/// Backends fill what they know; optional fields stay `None` when a backend
/// cannot supply them cheaply (listings, for example, often skip mimetypes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Full normalized path within the filesystem.
    pub path: String,
    /// Entry type.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes (files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modification, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    /// Resolver enrichment, present when the path has a record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordInfo>,
}

impl Metadata {
    /// Metadata for a file.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            size: Some(size),
            timestamp: None,
            visibility: None,
            mimetype: None,
            record: None,
        }
    }

    /// Metadata for a directory.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
            size: None,
            timestamp: None,
            visibility: None,
            mimetype: None,
            record: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Returns true if the given field has a value.
    pub fn has_field(&self, field: MetadataField) -> bool {
        match field {
            MetadataField::Size => self.size.is_some(),
            MetadataField::Mimetype => self.mimetype.is_some(),
            MetadataField::Timestamp => self.timestamp.is_some(),
            MetadataField::Visibility => self.visibility.is_some(),
        }
    }
}

/// Fields supplied by the identifier resolver's record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInfo {
    pub id: FileId,
    /// Content hash as tracked by the record store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Free-form auxiliary attributes (titles, captions, ...).
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important_part: Option<ImportantPart>,
}

impl RecordInfo {
    pub fn new(id: FileId) -> Self {
        Self {
            id,
            hash: None,
            attributes: serde_json::Map::new(),
            important_part: None,
        }
    }
}

/// Focal region of an image, as stored alongside the record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportantPart {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Optional settings for write-like operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Visibility of the new entry (backend default when unset).
    pub visibility: Option<Visibility>,
}

impl WriteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }
}

/// Individually fetchable metadata fields.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetadataField {
    Size,
    Mimetype,
    Timestamp,
    Visibility,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_constructors() {
        let file = Metadata::file("files/a.txt", 12).with_mimetype("text/plain");
        assert!(file.is_file());
        assert_eq!(file.size, Some(12));
        assert!(file.has_field(MetadataField::Mimetype));
        assert!(!file.has_field(MetadataField::Timestamp));

        let dir = Metadata::dir("files/sub");
        assert!(dir.is_dir());
        assert_eq!(dir.size, None);
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = Metadata::dir("files").with_visibility(Visibility::Private);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "dir");
        assert_eq!(json["visibility"], "private");
        assert!(json.get("size").is_none());
    }

    #[test]
    fn test_write_config_builder() {
        let config = WriteConfig::new().with_visibility(Visibility::Private);
        assert_eq!(config.visibility, Some(Visibility::Private));
        assert_eq!(WriteConfig::default().visibility, None);
    }
}
