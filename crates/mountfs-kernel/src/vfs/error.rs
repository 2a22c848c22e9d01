//! Filesystem error types.
//!
//! Callers see the same small set of kinds whichever backend is mounted.
//! Backend-specific detail rides along as the error source.

use std::io;
use thiserror::Error;

/// Boxed backend cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Filesystem error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// Identifier does not resolve, or the backend has no such entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resolved or literal path lies outside the adapter's root subtree.
    #[error("path is outside the root subtree: {0}")]
    BoundaryViolation(String),

    /// A filesystem is already registered under this name.
    #[error("filesystem already registered: {0}")]
    DuplicateName(String),

    /// No filesystem registered under this name.
    #[error("unknown filesystem: {0}")]
    UnknownFilesystem(String),

    /// No plugin registered under this name.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// Location could not be split into `<name>://<path>`.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// Storage or cache layer failure, passed through with its cause.
    #[error("backend failure: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a BoundaryViolation error.
    pub fn boundary_violation(path: impl Into<String>) -> Self {
        Self::BoundaryViolation(path.into())
    }

    /// Create a Backend error without a cause.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a Backend error wrapping a cause.
    pub fn backend_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(e.to_string()),
            _ => Self::Backend {
                message: e.to_string(),
                source: Some(Box::new(e)),
            },
        }
    }
}

impl From<serde_json::Error> for FsError {
    fn from(e: serde_json::Error) -> Self {
        Self::backend_with("cache snapshot encoding", e)
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: FsError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_io_other_keeps_cause() {
        let err: FsError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(matches!(err, FsError::Backend { .. }));
        let cause = err.source().expect("cause attached");
        assert_eq!(cause.to_string(), "nope");
    }
}
