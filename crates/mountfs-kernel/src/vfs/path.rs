//! Path normalization and root-subtree checks.
//!
//! Paths are plain slash-separated strings. Normalization strips leading and
//! trailing slashes, drops `.` segments and collapses `..`; a `..` that would
//! climb above the namespace root is rejected.

use super::error::{FsError, FsResult};

/// Normalize a path string.
pub fn normalize(path: &str) -> FsResult<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(FsError::boundary_violation(path));
                }
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Returns true if `path` equals `root` or lies beneath it.
///
/// Both arguments must already be normalized. An empty root contains
/// everything.
pub fn is_within(path: &str, root: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    match path.strip_prefix(root) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

/// Parent of a normalized path (`""` for top-level entries).
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map(|(p, _)| p).unwrap_or(""))
}

/// Final segment of a normalized path.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path)
}

/// Join a normalized directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/files/a/").unwrap(), "files/a");
        assert_eq!(normalize("files/./a//b").unwrap(), "files/a/b");
        assert_eq!(normalize("files/a/../b").unwrap(), "files/b");
        assert_eq!(normalize("").unwrap(), "");
    }

    #[test]
    fn test_normalize_rejects_escape() {
        assert!(matches!(
            normalize("files/../../etc"),
            Err(FsError::BoundaryViolation(_))
        ));
        assert!(normalize("..").is_err());
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("files", "files"));
        assert!(is_within("files/a.txt", "files"));
        assert!(!is_within("files_private/a.txt", "files"));
        assert!(!is_within("system/config", "files"));
        assert!(is_within("anything", ""));
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent("a/b/c"), Some("a/b"));
        assert_eq!(parent("a"), Some(""));
        assert_eq!(parent(""), None);
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b"), "a/b");
    }
}
