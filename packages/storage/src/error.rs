//! Error types for the storage layers.

use thiserror::Error;

/// Why a storage operation failed.
///
/// Storage operations never panic and never surface I/O errors directly;
/// every failure is reported as one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum StorageError {
    #[error("file not found")]
    FileNotFound,

    #[error("directory not found")]
    DirectoryNotFound,

    #[error("file already exists")]
    FileAlreadyExists,

    #[error("directory already exists")]
    DirectoryAlreadyExists,

    #[error("directory not empty")]
    DirectoryNotEmpty,

    #[error("path is not a directory")]
    PathIsNotDirectory,

    #[error("path is not a file")]
    PathIsNotFile,

    #[error("layer is read-only")]
    ReadOnlyLayer,
}

impl StorageError {
    /// Stable name of the error kind, as shown to scripts.
    pub fn kind_name(&self) -> &'static str {
        match self {
            StorageError::FileNotFound => "FileNotFound",
            StorageError::DirectoryNotFound => "DirectoryNotFound",
            StorageError::FileAlreadyExists => "FileAlreadyExists",
            StorageError::DirectoryAlreadyExists => "DirectoryAlreadyExists",
            StorageError::DirectoryNotEmpty => "DirectoryNotEmpty",
            StorageError::PathIsNotDirectory => "PathIsNotDirectory",
            StorageError::PathIsNotFile => "PathIsNotFile",
            StorageError::ReadOnlyLayer => "ReadOnlyLayer",
        }
    }
}

/// Result of a storage operation: `Ok(data)` or the failure kind.
pub type StorageResponse<T> = std::result::Result<T, StorageError>;

/// Errors raised when assembling a [`CompositeStorage`](crate::CompositeStorage).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    /// No layer accepts writes.
    #[error("composite storage needs exactly one read-write layer, found none")]
    NoWritableLayer,

    /// More than one layer accepts writes.
    #[error("composite storage needs exactly one read-write layer, found {0}")]
    MultipleWritableLayers(usize),

    /// The read-write layer does not have the highest priority.
    #[error("read-write layer '{writable}' must have the highest priority, but '{conflicting}' sorts after it")]
    WritableLayerNotLast {
        writable: String,
        conflicting: String,
    },
}
