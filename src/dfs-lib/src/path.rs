use std::fmt;
use std::path::PathBuf;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::fs;

use crate::{DfsError, DfsResult};

/// Distributed filesystem path.
///
/// A path is an immutable forward-slash-delimited sequence of non-empty
/// components. The root directory is the empty sequence and renders as `/`.
/// The slash is the delimiter and the colon is reserved for application use,
/// so neither may appear inside a component.
///
/// The string form always begins with `/` and re-parses to an equal path,
/// which is also how paths are serialized on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    /// The root directory.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Parses a path from its string form.
    ///
    /// The string must begin with `/` and contain no `:`. Empty components
    /// between slashes are dropped, so `//a///b` parses the same as `/a/b`.
    pub fn new(path: &str) -> DfsResult<Self> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(DfsError::InvalidParam(format!(
                "path must begin with a forward slash: {:?}",
                path
            )));
        }

        let mut components = Vec::new();
        for component in path.split('/') {
            if component.is_empty() {
                continue;
            }
            if component.contains(':') {
                return Err(DfsError::InvalidParam(format!(
                    "path component contains a colon: {:?}",
                    component
                )));
            }
            components.push(component.to_string());
        }
        Ok(Self { components })
    }

    /// Returns this path extended by one component.
    pub fn child(&self, component: &str) -> DfsResult<Self> {
        if component.is_empty() || component.contains('/') || component.contains(':') {
            return Err(DfsError::InvalidParam(format!(
                "invalid path component: {:?}",
                component
            )));
        }
        let mut components = self.components.clone();
        components.push(component.to_string());
        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterates over the components in order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.as_str())
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// The parent of this path. The root has no parent.
    pub fn parent(&self) -> DfsResult<Self> {
        if self.is_root() {
            return Err(DfsError::InvalidParam(
                "the root directory has no parent".to_string(),
            ));
        }
        Ok(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// The last component of this path. The root has no last component.
    pub fn last(&self) -> DfsResult<&str> {
        self.components
            .last()
            .map(|c| c.as_str())
            .ok_or_else(|| {
                DfsError::InvalidParam("the root directory has no last component".to_string())
            })
    }

    /// True iff `other`'s component sequence is a prefix of this path's.
    ///
    /// Every path is a subpath of itself, and every path is a subpath of the
    /// root. `/ab` is not a subpath of `/a`.
    pub fn is_subpath(&self, other: &Path) -> bool {
        other.components.len() <= self.components.len()
            && self.components[..other.components.len()] == other.components[..]
    }

    /// Materializes this path under a local filesystem root.
    pub fn to_file(&self, root: &std::path::Path) -> PathBuf {
        let mut out = root.to_path_buf();
        for component in &self.components {
            out.push(component);
        }
        out
    }

    /// Enumerates all files (not directories) under a local directory tree,
    /// one `Path` per file, relative to `directory`.
    pub async fn list(directory: &std::path::Path) -> DfsResult<Vec<Path>> {
        let meta = fs::metadata(directory).await.map_err(|_| {
            DfsError::NotFound(format!(
                "directory does not exist: {}",
                directory.display()
            ))
        })?;
        if !meta.is_dir() {
            return Err(DfsError::InvalidParam(format!(
                "not a directory: {}",
                directory.display()
            )));
        }

        let mut files = Vec::new();
        let mut pending = vec![(directory.to_path_buf(), Path::root())];
        while let Some((dir, rel)) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = rel.child(&name)?;
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), child));
                } else {
                    files.push(child);
                }
            }
        }
        Ok(files)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Path::new(&s).map_err(D::Error::custom)
    }
}
