//! Read-write layer over a [`PersistedStore`].

use tracing::debug;

use crate::node::{directory_at, directory_at_mut, Node, PersistedStore};
use crate::{
    LayerMode, StorageError, StorageFile, StorageFileMetadata, StorageLayer, StoragePath,
    StorageResponse,
};

/// Default priority of the persisted layer.
pub const PERSISTED_PRIORITY: i32 = 100;

/// The device's writable layer.
///
/// Reads copy bytes out of the tree and writes copy bytes in, so callers
/// never hold references into the shared store.
///
/// # Example
///
/// ```rust
/// use vdev_storage::{PersistedLayer, PersistedStore, StorageLayer, StoragePath};
///
/// let layer = PersistedLayer::new(PersistedStore::new());
/// layer.make_directory(&StoragePath::parse("docs")).unwrap();
/// layer.write(&StoragePath::parse("docs/a.txt"), b"hello").unwrap();
///
/// let file = layer.read(&StoragePath::parse("docs/a.txt")).unwrap();
/// assert_eq!(file.bytes, b"hello");
/// ```
pub struct PersistedLayer {
    name: String,
    priority: i32,
    store: PersistedStore,
}

impl PersistedLayer {
    pub fn new(store: PersistedStore) -> Self {
        Self::with_priority(store, PERSISTED_PRIORITY)
    }

    pub fn with_priority(store: PersistedStore, priority: i32) -> Self {
        Self {
            name: "persisted".to_string(),
            priority,
            store,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn store(&self) -> &PersistedStore {
        &self.store
    }

    fn metadata_for(&self, path: &StoragePath, node: &Node) -> StorageFileMetadata {
        let name = path.file_name().unwrap_or_default();
        match node {
            Node::File(bytes) => StorageFileMetadata::file(name, bytes.len() as u64, &self.name),
            Node::Directory(children) => {
                StorageFileMetadata::directory(name, children.len() as u64, &self.name)
            }
        }
    }

    /// Split a non-root path into (parent, name).
    fn split(path: &StoragePath) -> Option<(StoragePath, &str)> {
        Some((path.parent()?, path.file_name()?))
    }
}

impl StorageLayer for PersistedLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn mode(&self) -> LayerMode {
        LayerMode::ReadWrite
    }

    fn exists(&self, path: &StoragePath) -> bool {
        let Some((parent, name)) = Self::split(path) else {
            return true;
        };
        let tree = self.store.read_tree();
        directory_at(&tree, &parent, StorageError::FileNotFound)
            .map(|dir| dir.contains_key(name))
            .unwrap_or(false)
    }

    fn read(&self, path: &StoragePath) -> StorageResponse<StorageFile> {
        let (parent, name) = Self::split(path).ok_or(StorageError::PathIsNotFile)?;
        let tree = self.store.read_tree();
        let dir = directory_at(&tree, &parent, StorageError::FileNotFound)?;
        match dir.get(name) {
            Some(node @ Node::File(bytes)) => Ok(StorageFile {
                metadata: self.metadata_for(path, node),
                bytes: bytes.clone(),
            }),
            Some(Node::Directory(_)) => Err(StorageError::PathIsNotFile),
            None => Err(StorageError::FileNotFound),
        }
    }

    fn read_metadata(&self, path: &StoragePath) -> StorageResponse<StorageFileMetadata> {
        let tree = self.store.read_tree();
        let Some((parent, name)) = Self::split(path) else {
            return Ok(StorageFileMetadata::directory(
                "",
                tree.len() as u64,
                &self.name,
            ));
        };
        let dir = directory_at(&tree, &parent, StorageError::FileNotFound)?;
        dir.get(name)
            .map(|node| self.metadata_for(path, node))
            .ok_or(StorageError::FileNotFound)
    }

    fn list(&self, path: &StoragePath) -> StorageResponse<Vec<StorageFileMetadata>> {
        let tree = self.store.read_tree();
        let dir = directory_at(&tree, path, StorageError::DirectoryNotFound)?;
        Ok(dir
            .iter()
            .map(|(name, node)| self.metadata_for(&path.child(name), node))
            .collect())
    }

    fn write(&self, path: &StoragePath, bytes: &[u8]) -> StorageResponse<()> {
        let (parent, name) = Self::split(path).ok_or(StorageError::PathIsNotFile)?;
        let mut tree = self.store.write_tree();
        let dir = directory_at_mut(&mut tree, &parent, StorageError::DirectoryNotFound)?;
        match dir.get(name) {
            Some(Node::File(_)) => Err(StorageError::FileAlreadyExists),
            Some(Node::Directory(_)) => Err(StorageError::PathIsNotFile),
            None => {
                debug!(layer = %self.name, path = %path, size = bytes.len(), "write");
                dir.insert(name.to_string(), Node::File(bytes.to_vec()));
                Ok(())
            }
        }
    }

    fn delete(&self, path: &StoragePath, recursive: bool) -> StorageResponse<()> {
        let mut tree = self.store.write_tree();
        let Some((parent, name)) = Self::split(path) else {
            if !recursive && !tree.is_empty() {
                return Err(StorageError::DirectoryNotEmpty);
            }
            debug!(layer = %self.name, "clear");
            tree.clear();
            return Ok(());
        };
        let dir = directory_at_mut(&mut tree, &parent, StorageError::FileNotFound)?;
        match dir.get(name) {
            None => Err(StorageError::FileNotFound),
            Some(Node::Directory(children)) if !recursive && !children.is_empty() => {
                Err(StorageError::DirectoryNotEmpty)
            }
            Some(_) => {
                debug!(layer = %self.name, path = %path, recursive, "delete");
                dir.remove(name);
                Ok(())
            }
        }
    }

    fn make_directory(&self, path: &StoragePath) -> StorageResponse<()> {
        let (parent, name) = Self::split(path).ok_or(StorageError::DirectoryAlreadyExists)?;
        let mut tree = self.store.write_tree();
        let dir = directory_at_mut(&mut tree, &parent, StorageError::DirectoryNotFound)?;
        if dir.contains_key(name) {
            return Err(StorageError::DirectoryAlreadyExists);
        }
        debug!(layer = %self.name, path = %path, "make_directory");
        dir.insert(name.to_string(), Node::empty_directory());
        Ok(())
    }
}
