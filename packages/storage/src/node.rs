//! The persisted file tree.
//!
//! A device's persisted state is a tree of [`Node`]s held in a
//! [`PersistedStore`]. The store is the only state that survives a reload
//! and the only state captured by save/restore.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::{StorageError, StoragePath, StorageResponse};

/// A file or directory in the persisted tree.
///
/// Serialized externally tagged, with file bytes as base64:
/// `{"file": "aGk="}` or `{"directory": {"a": {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    File(#[serde(with = "base64_bytes")] Vec<u8>),
    Directory(BTreeMap<String, Node>),
}

impl Node {
    pub fn empty_directory() -> Self {
        Node::Directory(BTreeMap::new())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Node::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    /// Byte length for files, entry count for directories.
    pub fn size(&self) -> u64 {
        match self {
            Node::File(bytes) => bytes.len() as u64,
            Node::Directory(children) => children.len() as u64,
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// The children of the root directory.
pub type Tree = BTreeMap<String, Node>;

/// Shared, lock-guarded persisted tree.
///
/// Cloning a `PersistedStore` yields another handle to the same tree.
#[derive(Debug, Clone, Default)]
pub struct PersistedStore {
    root: Arc<RwLock<Tree>>,
}

impl PersistedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(tree: Tree) -> Self {
        Self {
            root: Arc::new(RwLock::new(tree)),
        }
    }

    /// Deep copy of the current tree.
    pub fn snapshot(&self) -> Tree {
        self.root.read().clone()
    }

    /// Replace the whole tree, e.g. when restoring a save.
    pub fn replace(&self, tree: Tree) {
        *self.root.write() = tree;
    }

    pub fn clear(&self) {
        self.root.write().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.root.read().is_empty()
    }

    pub(crate) fn read_tree(&self) -> RwLockReadGuard<'_, Tree> {
        self.root.read()
    }

    pub(crate) fn write_tree(&self) -> RwLockWriteGuard<'_, Tree> {
        self.root.write()
    }

    /// Check whether two handles share the same tree.
    pub fn ptr_eq(&self, other: &PersistedStore) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }
}

impl Serialize for PersistedStore {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.read().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PersistedStore {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Tree::deserialize(deserializer).map(PersistedStore::with_tree)
    }
}

/// Look up the directory that holds the children of `path`.
///
/// A prefix component that names a file yields `PathIsNotDirectory`; a
/// missing component yields `missing`.
pub(crate) fn directory_at<'a>(
    tree: &'a Tree,
    path: &StoragePath,
    missing: StorageError,
) -> StorageResponse<&'a Tree> {
    let mut current = tree;
    for component in path.iter() {
        match current.get(component) {
            Some(Node::Directory(children)) => current = children,
            Some(Node::File(_)) => return Err(StorageError::PathIsNotDirectory),
            None => return Err(missing),
        }
    }
    Ok(current)
}

/// Mutable variant of [`directory_at`].
pub(crate) fn directory_at_mut<'a>(
    tree: &'a mut Tree,
    path: &StoragePath,
    missing: StorageError,
) -> StorageResponse<&'a mut Tree> {
    let mut current = tree;
    for component in path.iter() {
        match current.get_mut(component) {
            Some(Node::Directory(children)) => current = children,
            Some(Node::File(_)) => return Err(StorageError::PathIsNotDirectory),
            None => return Err(missing),
        }
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;

    #[test]
    fn node_serializes_with_base64_files() {
        let node = Node::Directory(btree! {
            "hi.txt".to_string() => Node::File(b"hi".to_vec()),
        });
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"directory": {"hi.txt": {"file": "aGk="}}})
        );

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let result: Result<Node, _> = serde_json::from_str(r#"{"file": "***"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn store_handles_share_the_tree() {
        let store = PersistedStore::new();
        let other = store.clone();
        store.replace(btree! { "a".to_string() => Node::empty_directory() });
        assert!(!other.is_empty());
        assert!(store.ptr_eq(&other));
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let store = PersistedStore::new();
        store.replace(btree! { "a".to_string() => Node::File(vec![1]) });
        let snapshot = store.snapshot();
        store.clear();
        assert_eq!(snapshot.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn directory_lookup_reports_file_prefix() {
        let tree = btree! { "f".to_string() => Node::File(vec![]) };
        let err = directory_at(&tree, &StoragePath::parse("f/x"), StorageError::FileNotFound)
            .unwrap_err();
        assert_eq!(err, StorageError::PathIsNotDirectory);

        let err = directory_at(&tree, &StoragePath::parse("g"), StorageError::DirectoryNotFound)
            .unwrap_err();
        assert_eq!(err, StorageError::DirectoryNotFound);
    }

    #[test]
    fn store_round_trips_through_json() {
        let store = PersistedStore::with_tree(btree! {
            "saves".to_string() => Node::Directory(btree! {
                "slot1".to_string() => Node::File(b"level=3".to_vec()),
            }),
        });
        let json = serde_json::to_string(&store).unwrap();
        let back: PersistedStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back.snapshot(), store.snapshot());
    }
}
