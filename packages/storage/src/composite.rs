//! Composite storage: several layers merged into one filesystem.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    CompositeError, StorageError, StorageFile, StorageFileMetadata, StorageLayer, StoragePath,
    StorageResponse,
};

/// An ordered stack of layers presented as one virtual filesystem.
///
/// Layers are consulted in ascending priority order for reads, so a lower
/// priority layer shadows the same path in higher priority layers. Exactly
/// one layer is read-write and it must sort last; every mutation goes to it.
///
/// ```text
/// priority    0  assets     (read-only)   <- consulted first
/// priority   10  stdlib     (read-only)
/// priority  100  persisted  (read-write)  <- receives all writes
/// ```
///
/// Mutations check the whole stack and then delegate under one mutex, so
/// two concurrent writers cannot both pass the existence check.
pub struct CompositeStorage {
    layers: Vec<Box<dyn StorageLayer>>,
    mutation: Mutex<()>,
}

impl std::fmt::Debug for CompositeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeStorage")
            .field("layers", &self.layer_names())
            .finish()
    }
}

impl CompositeStorage {
    /// Build a composite from layers given in any order.
    pub fn new(mut layers: Vec<Box<dyn StorageLayer>>) -> Result<Self, CompositeError> {
        let writable = layers.iter().filter(|l| !l.is_read_only()).count();
        match writable {
            0 => return Err(CompositeError::NoWritableLayer),
            1 => {}
            n => return Err(CompositeError::MultipleWritableLayers(n)),
        }

        // Stable: equal priorities keep their given order.
        layers.sort_by_key(|l| l.priority());

        let (index, writer) = layers
            .iter()
            .enumerate()
            .find(|(_, l)| !l.is_read_only())
            .ok_or(CompositeError::NoWritableLayer)?;
        if let Some(conflicting) = layers
            .iter()
            .enumerate()
            .find(|(i, l)| *i != index && l.priority() >= writer.priority())
            .map(|(_, l)| l)
        {
            return Err(CompositeError::WritableLayerNotLast {
                writable: writer.name().to_string(),
                conflicting: conflicting.name().to_string(),
            });
        }

        debug!(layers = ?layers.iter().map(|l| l.name()).collect::<Vec<_>>(), "composite storage");
        Ok(Self {
            layers,
            mutation: Mutex::new(()),
        })
    }

    /// Layers in read order.
    pub fn layers(&self) -> impl Iterator<Item = &dyn StorageLayer> {
        self.layers.iter().map(|l| l.as_ref())
    }

    pub fn layer_names(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.name().to_string()).collect()
    }

    fn writer(&self) -> &dyn StorageLayer {
        // Construction guarantees the writer sorts last.
        self.layers[self.layers.len() - 1].as_ref()
    }

    pub fn exists(&self, path: &StoragePath) -> bool {
        self.layers.iter().any(|l| l.exists(path))
    }

    fn first_containing(&self, path: &StoragePath) -> Option<&dyn StorageLayer> {
        self.layers
            .iter()
            .find(|l| l.exists(path))
            .map(|l| l.as_ref())
    }

    pub fn read(&self, path: &StoragePath) -> StorageResponse<StorageFile> {
        match self.first_containing(path) {
            Some(layer) => layer.read(path),
            None => Err(StorageError::FileNotFound),
        }
    }

    pub fn read_metadata(&self, path: &StoragePath) -> StorageResponse<StorageFileMetadata> {
        match self.first_containing(path) {
            Some(layer) => layer.read_metadata(path),
            None => Err(StorageError::FileNotFound),
        }
    }

    /// Union of every layer's listing, first occurrence of a name wins.
    pub fn list(&self, path: &StoragePath) -> StorageResponse<Vec<StorageFileMetadata>> {
        let mut any_ok = false;
        let mut seen = BTreeSet::new();
        let mut merged = Vec::new();
        for layer in &self.layers {
            let Ok(entries) = layer.list(path) else {
                continue;
            };
            any_ok = true;
            for entry in entries {
                if seen.insert(entry.name.clone()) {
                    merged.push(entry);
                }
            }
        }
        if any_ok {
            Ok(merged)
        } else {
            Err(StorageError::DirectoryNotFound)
        }
    }

    pub fn write(&self, path: &StoragePath, bytes: &[u8]) -> StorageResponse<()> {
        let _guard = self.mutation.lock();
        if self.exists(path) {
            return Err(StorageError::FileAlreadyExists);
        }
        self.writer().write(path, bytes)
    }

    pub fn make_directory(&self, path: &StoragePath) -> StorageResponse<()> {
        let _guard = self.mutation.lock();
        if self.exists(path) {
            return Err(StorageError::DirectoryAlreadyExists);
        }
        self.writer().make_directory(path)
    }

    pub fn delete(&self, path: &StoragePath, recursive: bool) -> StorageResponse<()> {
        let _guard = self.mutation.lock();
        if !self.exists(path) {
            return Err(StorageError::FileNotFound);
        }
        let writer = self.writer();
        if !writer.exists(path) {
            return Err(StorageError::ReadOnlyLayer);
        }
        writer.delete(path, recursive)
    }

    /// Read a file as UTF-8 text (lossy).
    pub fn read_text(&self, path: &StoragePath) -> StorageResponse<String> {
        self.read(path).map(|file| file.text())
    }

    pub fn write_text(&self, path: &StoragePath, text: &str) -> StorageResponse<()> {
        self.write(path, text.as_bytes())
    }
}
