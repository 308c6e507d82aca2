//! Content loaders: read-only sources of files.
//!
//! A loader is the thing behind a read-only layer (see
//! [`LoaderLayer`](crate::LoaderLayer)) and behind the script module
//! resolver. Loaders report failures as `std::io::Error`; the layer maps them
//! onto storage error kinds.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::{CompositeStorage, StorageError, StorageFileMetadata, StoragePath};

/// A read-only source of files addressed by [`StoragePath`].
pub trait ContentLoader: Send + Sync {
    /// Name used as the origin of entries served from this loader.
    fn name(&self) -> &str;

    fn exists(&self, path: &StoragePath) -> bool;

    fn read(&self, path: &StoragePath) -> io::Result<Vec<u8>>;

    fn list(&self, path: &StoragePath) -> io::Result<Vec<StorageFileMetadata>>;

    fn metadata(&self, path: &StoragePath) -> io::Result<StorageFileMetadata>;
}

fn not_found(path: &StoragePath) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path} not found"))
}

/// Serves files from a directory on the host filesystem.
pub struct DirectoryLoader {
    name: String,
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &FsPath {
        &self.root
    }

    fn resolve(&self, path: &StoragePath) -> PathBuf {
        let mut full = self.root.clone();
        for component in path.iter() {
            full.push(component);
        }
        full
    }

    fn describe(&self, full: &FsPath, name: &str, meta: &fs::Metadata) -> StorageFileMetadata {
        if meta.is_dir() {
            let entries = fs::read_dir(full).map(|dir| dir.count()).unwrap_or(0) as u64;
            StorageFileMetadata::directory(name, entries, &self.name)
        } else {
            StorageFileMetadata::file(name, meta.len(), &self.name)
        }
    }
}

impl ContentLoader for DirectoryLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &StoragePath) -> bool {
        self.resolve(path).exists()
    }

    fn read(&self, path: &StoragePath) -> io::Result<Vec<u8>> {
        let full = self.resolve(path);
        debug!(loader = %self.name, path = %full.display(), "read");
        fs::read(&full).inspect_err(|e| {
            debug!(loader = %self.name, path = %full.display(), error = %e, "read failed");
        })
    }

    fn list(&self, path: &StoragePath) -> io::Result<Vec<StorageFileMetadata>> {
        let full = self.resolve(path);
        debug!(loader = %self.name, path = %full.display(), "list");
        let mut entries = Vec::new();
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(self.describe(&entry.path(), &name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn metadata(&self, path: &StoragePath) -> io::Result<StorageFileMetadata> {
        let full = self.resolve(path);
        let meta = fs::metadata(&full)?;
        Ok(self.describe(&full, path.file_name().unwrap_or_default(), &meta))
    }
}

/// In-memory files. Directories are implied by file paths.
///
/// ```rust
/// use vdev_storage::{ContentLoader, MemoryLoader, StoragePath};
///
/// let loader = MemoryLoader::new("stdlib").with_file("/lib/math.rhai", "fn sq(x) { x * x }");
/// assert!(loader.exists(&StoragePath::parse("lib")));
/// assert!(loader.exists(&StoragePath::parse("lib/math.rhai")));
/// ```
#[derive(Default)]
pub struct MemoryLoader {
    name: String,
    files: RwLock<BTreeMap<StoragePath, Vec<u8>>>,
}

impl MemoryLoader {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn with_file(self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .write()
            .insert(StoragePath::parse(path), contents.into());
    }

    fn is_directory(files: &BTreeMap<StoragePath, Vec<u8>>, path: &StoragePath) -> bool {
        files
            .keys()
            .any(|file| file.len() > path.len() && file.has_prefix(path))
    }

    /// Immediate children of `dir`: name to (is_file, size).
    fn children(
        files: &BTreeMap<StoragePath, Vec<u8>>,
        dir: &StoragePath,
    ) -> BTreeMap<String, Option<u64>> {
        let mut children: BTreeMap<String, Option<u64>> = BTreeMap::new();
        for (file, bytes) in files.iter() {
            if file.len() <= dir.len() || !file.has_prefix(dir) {
                continue;
            }
            let name = file[dir.len()].clone();
            if file.len() == dir.len() + 1 {
                children.insert(name, Some(bytes.len() as u64));
            } else {
                children.entry(name).or_insert(None);
            }
        }
        children
    }
}

impl ContentLoader for MemoryLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &StoragePath) -> bool {
        let files = self.files.read();
        path.is_root() || files.contains_key(path) || Self::is_directory(&files, path)
    }

    fn read(&self, path: &StoragePath) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn list(&self, path: &StoragePath) -> io::Result<Vec<StorageFileMetadata>> {
        let files = self.files.read();
        if !path.is_root() && !Self::is_directory(&files, path) {
            return Err(not_found(path));
        }
        Ok(Self::children(&files, path)
            .into_iter()
            .map(|(name, size)| match size {
                Some(size) => StorageFileMetadata::file(name, size, &self.name),
                None => {
                    let entries = Self::children(&files, &path.child(&name)).len() as u64;
                    StorageFileMetadata::directory(name, entries, &self.name)
                }
            })
            .collect())
    }

    fn metadata(&self, path: &StoragePath) -> io::Result<StorageFileMetadata> {
        let files = self.files.read();
        let name = path.file_name().unwrap_or_default();
        if let Some(bytes) = files.get(path) {
            return Ok(StorageFileMetadata::file(
                name,
                bytes.len() as u64,
                &self.name,
            ));
        }
        if path.is_root() || Self::is_directory(&files, path) {
            let entries = Self::children(&files, path).len() as u64;
            return Ok(StorageFileMetadata::directory(name, entries, &self.name));
        }
        Err(not_found(path))
    }
}

/// A [`CompositeStorage`] viewed as a loader, so scripts can import modules
/// stored in their own filesystem.
pub struct StorageLoader {
    name: String,
    storage: Arc<CompositeStorage>,
}

impl StorageLoader {
    pub fn new(name: impl Into<String>, storage: Arc<CompositeStorage>) -> Self {
        Self {
            name: name.into(),
            storage,
        }
    }
}

fn to_io(error: StorageError) -> io::Error {
    let kind = match error {
        StorageError::FileNotFound | StorageError::DirectoryNotFound => io::ErrorKind::NotFound,
        StorageError::FileAlreadyExists | StorageError::DirectoryAlreadyExists => {
            io::ErrorKind::AlreadyExists
        }
        StorageError::ReadOnlyLayer => io::ErrorKind::PermissionDenied,
        _ => io::ErrorKind::InvalidInput,
    };
    io::Error::new(kind, error)
}

impl ContentLoader for StorageLoader {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self, path: &StoragePath) -> bool {
        self.storage.exists(path)
    }

    fn read(&self, path: &StoragePath) -> io::Result<Vec<u8>> {
        self.storage
            .read(path)
            .map(|file| file.bytes)
            .map_err(to_io)
    }

    fn list(&self, path: &StoragePath) -> io::Result<Vec<StorageFileMetadata>> {
        self.storage.list(path).map_err(to_io)
    }

    fn metadata(&self, path: &StoragePath) -> io::Result<StorageFileMetadata> {
        self.storage.read_metadata(path).map_err(to_io)
    }
}
