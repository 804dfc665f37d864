//! Request path resolution against the served media root.

use std::path::{Path, PathBuf};

use crate::error::PathError;
use crate::library::kind::{classify, FileType};

/// The served media tree. Held in canonical form so containment checks
/// survive symlinks.
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

/// A file under the media root, identified by its normalized relative key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPath {
    key: String,
    requested: PathBuf,
    absolute: PathBuf,
}

impl MediaPath {
    /// Normalized `/`-separated path relative to the root; the identity used by
    /// every store and cache.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Absolute on-disk path (canonicalized).
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// The path as requested under the root, before symlinks are followed.
    pub fn requested(&self) -> &Path {
        &self.requested
    }

    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Key of the containing directory ("" for the root itself).
    pub fn parent_key(&self) -> &str {
        match self.key.rfind('/') {
            Some(idx) => &self.key[..idx],
            None => "",
        }
    }

    pub fn file_type(&self) -> Option<FileType> {
        classify(Path::new(&self.key))
    }
}

impl MediaRoot {
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve an already percent-decoded request path to an existing file.
    ///
    /// Any `..` component (on either separator), NUL byte, or a target whose
    /// canonical form lies outside the root is a traversal.
    pub fn resolve(&self, raw: &str) -> Result<MediaPath, PathError> {
        let components = normalize(raw)?;
        if components.is_empty() {
            return Err(PathError::NotFound(raw.to_string()));
        }

        let mut joined = self.root.clone();
        for component in &components {
            joined.push(component);
        }

        let absolute = joined
            .canonicalize()
            .map_err(|_| PathError::NotFound(raw.to_string()))?;
        if !absolute.starts_with(&self.root) {
            tracing::warn!(path = raw, "request resolved outside the media root");
            return Err(PathError::Traversal(raw.to_string()));
        }
        if !absolute.is_file() {
            return Err(PathError::NotFound(raw.to_string()));
        }

        Ok(MediaPath {
            key: components.join("/"),
            requested: joined,
            absolute,
        })
    }
}

/// Split a request path into clean components.
fn normalize(raw: &str) -> Result<Vec<&str>, PathError> {
    if raw.contains('\0') {
        return Err(PathError::Traversal(raw.escape_default().to_string()));
    }

    let mut components = Vec::new();
    for part in raw.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return Err(PathError::Traversal(raw.to_string())),
            // Windows drive prefixes ("C:") would make the join absolute.
            p if p.len() == 2 && p.ends_with(':') => {
                return Err(PathError::Traversal(raw.to_string()))
            }
            p => components.push(p),
        }
    }
    Ok(components)
}
