//! The storage layer trait.

use crate::{LayerMode, StorageFile, StorageFileMetadata, StoragePath, StorageResponse};

/// One backing store of a device's virtual filesystem.
///
/// Layers are shared between the host thread and the device thread, so all
/// operations take `&self` and implementations guard their own state.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn StorageLayer>`.
pub trait StorageLayer: Send + Sync {
    /// Name reported as the origin of entries served by this layer.
    fn name(&self) -> &str;

    /// Lower priorities are consulted first on reads.
    fn priority(&self) -> i32;

    fn mode(&self) -> LayerMode;

    fn exists(&self, path: &StoragePath) -> bool;

    fn read(&self, path: &StoragePath) -> StorageResponse<StorageFile>;

    fn read_metadata(&self, path: &StoragePath) -> StorageResponse<StorageFileMetadata>;

    fn list(&self, path: &StoragePath) -> StorageResponse<Vec<StorageFileMetadata>>;

    /// Create a new file. Existing entries are never overwritten.
    fn write(&self, path: &StoragePath, bytes: &[u8]) -> StorageResponse<()>;

    fn delete(&self, path: &StoragePath, recursive: bool) -> StorageResponse<()>;

    fn make_directory(&self, path: &StoragePath) -> StorageResponse<()>;

    fn is_read_only(&self) -> bool {
        self.mode() == LayerMode::ReadOnly
    }
}

impl<T: StorageLayer + ?Sized> StorageLayer for Box<T> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn priority(&self) -> i32 {
        self.as_ref().priority()
    }

    fn mode(&self) -> LayerMode {
        self.as_ref().mode()
    }

    fn exists(&self, path: &StoragePath) -> bool {
        self.as_ref().exists(path)
    }

    fn read(&self, path: &StoragePath) -> StorageResponse<StorageFile> {
        self.as_ref().read(path)
    }

    fn read_metadata(&self, path: &StoragePath) -> StorageResponse<StorageFileMetadata> {
        self.as_ref().read_metadata(path)
    }

    fn list(&self, path: &StoragePath) -> StorageResponse<Vec<StorageFileMetadata>> {
        self.as_ref().list(path)
    }

    fn write(&self, path: &StoragePath, bytes: &[u8]) -> StorageResponse<()> {
        self.as_ref().write(path, bytes)
    }

    fn delete(&self, path: &StoragePath, recursive: bool) -> StorageResponse<()> {
        self.as_ref().delete(path, recursive)
    }

    fn make_directory(&self, path: &StoragePath) -> StorageResponse<()> {
        self.as_ref().make_directory(path)
    }
}
