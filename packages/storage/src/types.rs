//! Metadata and file records returned by storage layers.

use serde::{Deserialize, Serialize};

/// Whether a layer accepts mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerMode {
    ReadOnly,
    ReadWrite,
}

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::File => "File",
            FileType::Directory => "Directory",
        }
    }
}

/// Metadata about one entry of the virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFileMetadata {
    /// Entry name (last path component; empty for the root).
    pub name: String,

    pub file_type: FileType,

    /// Size in bytes. Directories report their number of entries.
    pub size: u64,

    /// Name of the layer this entry was served from.
    pub origin: String,
}

impl StorageFileMetadata {
    pub fn file(name: impl Into<String>, size: u64, origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::File,
            size,
            origin: origin.into(),
        }
    }

    pub fn directory(name: impl Into<String>, entries: u64, origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Directory,
            size: entries,
            origin: origin.into(),
        }
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// A file's metadata together with a copy of its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageFile {
    pub metadata: StorageFileMetadata,
    pub bytes: Vec<u8>,
}

impl StorageFile {
    /// Contents as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}
