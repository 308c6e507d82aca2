//! Read-only layer backed by a [`ContentLoader`].

use std::sync::Arc;

use crate::{
    ContentLoader, LayerMode, StorageError, StorageFile, StorageFileMetadata, StorageLayer,
    StoragePath, StorageResponse,
};

/// Exposes a loader as a storage layer. Every mutation fails with
/// [`StorageError::ReadOnlyLayer`].
pub struct LoaderLayer {
    name: String,
    priority: i32,
    loader: Arc<dyn ContentLoader>,
}

impl LoaderLayer {
    pub fn new(name: impl Into<String>, priority: i32, loader: Arc<dyn ContentLoader>) -> Self {
        Self {
            name: name.into(),
            priority,
            loader,
        }
    }

    pub fn loader(&self) -> &Arc<dyn ContentLoader> {
        &self.loader
    }

    fn relabel(&self, mut metadata: StorageFileMetadata) -> StorageFileMetadata {
        metadata.origin = self.name.clone();
        metadata
    }
}

impl StorageLayer for LoaderLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn mode(&self) -> LayerMode {
        LayerMode::ReadOnly
    }

    fn exists(&self, path: &StoragePath) -> bool {
        self.loader.exists(path)
    }

    fn read(&self, path: &StoragePath) -> StorageResponse<StorageFile> {
        let bytes = self
            .loader
            .read(path)
            .map_err(|_| StorageError::FileNotFound)?;
        let metadata = StorageFileMetadata::file(
            path.file_name().unwrap_or_default(),
            bytes.len() as u64,
            &self.name,
        );
        Ok(StorageFile { metadata, bytes })
    }

    fn read_metadata(&self, path: &StoragePath) -> StorageResponse<StorageFileMetadata> {
        self.loader
            .metadata(path)
            .map(|m| self.relabel(m))
            .map_err(|_| StorageError::FileNotFound)
    }

    fn list(&self, path: &StoragePath) -> StorageResponse<Vec<StorageFileMetadata>> {
        self.loader
            .list(path)
            .map(|entries| entries.into_iter().map(|m| self.relabel(m)).collect())
            .map_err(|_| StorageError::DirectoryNotFound)
    }

    fn write(&self, _path: &StoragePath, _bytes: &[u8]) -> StorageResponse<()> {
        Err(StorageError::ReadOnlyLayer)
    }

    fn delete(&self, _path: &StoragePath, _recursive: bool) -> StorageResponse<()> {
        Err(StorageError::ReadOnlyLayer)
    }

    fn make_directory(&self, _path: &StoragePath) -> StorageResponse<()> {
        Err(StorageError::ReadOnlyLayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryLoader;

    fn layer() -> LoaderLayer {
        let loader = MemoryLoader::new("embedded").with_file("readme.txt", "read me");
        LoaderLayer::new("assets", 0, Arc::new(loader))
    }

    #[test]
    fn reads_delegate_and_relabel() {
        let layer = layer();
        let path = StoragePath::parse("readme.txt");
        assert!(layer.exists(&path));

        let file = layer.read(&path).unwrap();
        assert_eq!(file.text(), "read me");
        assert_eq!(file.metadata.origin, "assets");
        assert_eq!(layer.read_metadata(&path).unwrap().origin, "assets");
        assert_eq!(layer.list(&StoragePath::root()).unwrap()[0].origin, "assets");
    }

    #[test]
    fn loader_errors_are_mapped() {
        let layer = layer();
        assert_eq!(
            layer.read(&StoragePath::parse("missing")),
            Err(StorageError::FileNotFound)
        );
        assert_eq!(
            layer.read_metadata(&StoragePath::parse("missing")),
            Err(StorageError::FileNotFound)
        );
        assert_eq!(
            layer.list(&StoragePath::parse("missing")),
            Err(StorageError::DirectoryNotFound)
        );
    }

    #[test]
    fn mutations_are_rejected() {
        let layer = layer();
        let path = StoragePath::parse("new.txt");
        assert!(layer.is_read_only());
        assert_eq!(layer.write(&path, b"x"), Err(StorageError::ReadOnlyLayer));
        assert_eq!(layer.delete(&path, false), Err(StorageError::ReadOnlyLayer));
        assert_eq!(layer.make_directory(&path), Err(StorageError::ReadOnlyLayer));
    }
}
