//! Composite store keys.

use std::fmt;
use std::path::{Path, PathBuf};

use super::StoreError;

/// Identifies one logical file by directory path and file name.
///
/// The path is normalised on construction: empty segments are dropped, so
/// `"/docs//v1/"` and `"docs/v1"` address the same file. Path and name are
/// kept apart, so no choice of separator characters can make two distinct
/// files share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    path: String,
    name: String,
}

impl StoreKey {
    /// Builds a validated key.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidKey` - If the name is empty, `.`, `..` or contains `/`,
    ///   or a path segment is `.` or `..`, or either contains a NUL byte
    pub fn new(path: &str, name: &str) -> Result<Self, StoreError> {
        if name.is_empty() || name == "." || name == ".." {
            return Err(invalid(format!("file name {name:?} is not allowed")));
        }
        if name.contains('/') {
            return Err(invalid(format!("file name {name:?} contains '/'")));
        }
        if name.contains('\0') {
            return Err(invalid("NUL byte in file name".to_string()));
        }

        Ok(Self {
            path: normalize_path(path)?,
            name: name.to_string(),
        })
    }

    /// Normalised directory path, without leading or trailing slashes.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// File name within the directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory path segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Location of the directory holding this file under `base`.
    pub fn dir_under(&self, base: &Path) -> PathBuf {
        self.segments().fold(base.to_path_buf(), |dir, s| dir.join(s))
    }

    /// Location of this file under `base`.
    pub fn file_under(&self, base: &Path) -> PathBuf {
        self.dir_under(base).join(&self.name)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.path, self.name)
        }
    }
}

/// Drops empty segments from a `/`-separated directory path.
///
/// # Errors
///
/// - `StoreError::InvalidKey` - If a segment is `.` or `..`, or the path contains a NUL byte
pub(crate) fn normalize_path(path: &str) -> Result<String, StoreError> {
    if path.contains('\0') {
        return Err(invalid("NUL byte in path".to_string()));
    }

    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(invalid(format!(
                "path segment {segment:?} would escape the store"
            )));
        }
        segments.push(segment);
    }

    Ok(segments.join("/"))
}

fn invalid(reason: String) -> StoreError {
    StoreError::InvalidKey { reason }
}
