//! File identifiers and location parsing.
//!
//! A [`FileId`] wraps a UUID (v7 when freshly minted). It is opaque on the
//! wire (16 bytes) and displays as standard hyphenated UUID text. Callers may
//! address a file either by path or by identifier; [`Location::parse`] decides
//! which one a string is.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A stable file identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(uuid::Uuid);

impl FileId {
    /// Create a new time-ordered ID (UUIDv7).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// First 8 hex characters, for log lines only.
    pub fn short(&self) -> String {
        self.0.as_simple().to_string()[..8].to_string()
    }

    /// Full 32-character hex string (no hyphens).
    pub fn to_hex(&self) -> String {
        self.0.as_simple().to_string()
    }

    /// The raw 16 bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Reconstruct from 16 bytes (the binary encoding).
    pub fn from_bytes(b: [u8; 16]) -> Self {
        Self(uuid::Uuid::from_bytes(b))
    }

    /// Try to reconstruct from a byte slice (must be exactly 16 bytes).
    pub fn try_from_slice(b: &[u8]) -> Option<Self> {
        <[u8; 16]>::try_from(b).ok().map(Self::from_bytes)
    }

    /// Parse the textual forms accepted as identifiers.
    ///
    /// Only the 36-char hyphenated form and the 32-char simple hex form are
    /// accepted. Braced and URN forms are rejected so that ordinary file names
    /// are never mistaken for identifiers.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 36 && s.len() != 32 {
            return None;
        }
        uuid::Uuid::try_parse(s).ok().map(Self)
    }

    /// A nil / zero ID, for sentinel values only.
    pub fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    /// Check if this is the nil ID.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for FileId {
    fn from(u: uuid::Uuid) -> Self {
        Self(u)
    }
}

impl From<FileId> for uuid::Uuid {
    fn from(id: FileId) -> uuid::Uuid {
        id.0
    }
}

impl From<[u8; 16]> for FileId {
    fn from(b: [u8; 16]) -> Self {
        Self::from_bytes(b)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.short())
    }
}

// ── Locations ───────────────────────────────────────────────────────────────

/// Where an operation points: a literal path or an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A literal path within one filesystem's namespace.
    Path(String),
    /// An identifier that has to be resolved to a path first.
    Id(FileId),
}

impl Location {
    /// Classify a location string.
    pub fn parse(s: &str) -> Self {
        match FileId::parse(s) {
            Some(id) => Location::Id(id),
            None => Location::Path(s.to_string()),
        }
    }

    /// Returns true if this location is an identifier.
    pub fn is_id(&self) -> bool {
        matches!(self, Location::Id(_))
    }
}

impl From<FileId> for Location {
    fn from(id: FileId) -> Self {
        Location::Id(id)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path(p) => f.write_str(p),
            Location::Id(id) => write!(f, "{id}"),
        }
    }
}
