//! Normalized virtual filesystem paths.

use std::fmt;

/// A normalized path inside a device's virtual filesystem.
///
/// Paths are `/`-separated. Parsing never fails: empty segments and `.` are
/// dropped, and `..` removes the previous component (it cannot climb above
/// the root). The root is the empty path.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StoragePath {
    pub components: Vec<String>,
}

impl StoragePath {
    /// The root directory.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vdev_storage::StoragePath;
    ///
    /// let path = StoragePath::parse("/docs//notes/./today.txt");
    /// assert_eq!(path.len(), 3);
    /// assert_eq!(StoragePath::parse("a/b/"), StoragePath::parse("/a/b"));
    /// assert_eq!(StoragePath::parse("a/../../b"), StoragePath::parse("b"));
    /// ```
    pub fn parse(s: &str) -> Self {
        let mut components: Vec<String> = Vec::new();
        for segment in s.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    components.pop();
                }
                other => components.push(other.to_string()),
            }
        }
        Self { components }
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Same as [`StoragePath::is_root`].
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate over components.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.components.iter()
    }

    /// The last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<StoragePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Append a single child name.
    #[must_use]
    pub fn child(&self, name: &str) -> StoragePath {
        self.join(&StoragePath::parse(name))
    }

    /// Join this path with another.
    #[must_use]
    pub fn join(&self, other: &StoragePath) -> StoragePath {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Self { components }
    }

    /// Check if this path starts with `prefix`.
    pub fn has_prefix(&self, prefix: &StoragePath) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// Render as an absolute path (`/a/b`, root is `/`).
    pub fn to_absolute(&self) -> String {
        format!("/{}", self.components.join("/"))
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_absolute())
    }
}

impl std::ops::Index<usize> for StoragePath {
    type Output = String;

    fn index(&self, i: usize) -> &Self::Output {
        &self.components[i]
    }
}

impl From<&str> for StoragePath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
