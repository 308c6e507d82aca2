//! vdev storage: the layered virtual filesystem of a device
//!
//! Every device sees one filesystem assembled from several layers:
//! - `LoaderLayer`: read-only content (asset folders, the script stdlib)
//! - `PersistedLayer`: the read-write tree that survives reloads and saves
//! - `CompositeStorage`: the ordered stack that merges them
//!
//! Reads go to the lowest-priority layer that has the path. Writes go to the
//! single read-write layer, and never overwrite anything visible in any
//! layer.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vdev_storage::{
//!     CompositeStorage, LoaderLayer, MemoryLoader, PersistedLayer, PersistedStore, StoragePath,
//! };
//!
//! let assets = MemoryLoader::new("assets").with_file("logo.txt", "vdev");
//! let storage = CompositeStorage::new(vec![
//!     Box::new(PersistedLayer::new(PersistedStore::new())),
//!     Box::new(LoaderLayer::new("assets", 0, Arc::new(assets))),
//! ])
//! .unwrap();
//!
//! storage.write_text(&StoragePath::parse("/notes.txt"), "hi").unwrap();
//! assert_eq!(storage.read_text(&StoragePath::parse("logo.txt")).unwrap(), "vdev");
//! ```

mod composite;
mod error;
mod loader;
mod node;
mod path;
mod persisted;
mod readonly;
mod traits;
mod types;

pub use composite::CompositeStorage;
pub use error::{CompositeError, StorageError, StorageResponse};
pub use loader::{ContentLoader, DirectoryLoader, MemoryLoader, StorageLoader};
pub use node::{Node, PersistedStore, Tree};
pub use path::StoragePath;
pub use persisted::{PersistedLayer, PERSISTED_PRIORITY};
pub use readonly::LoaderLayer;
pub use traits::StorageLayer;
pub use types::{FileType, LayerMode, StorageFile, StorageFileMetadata};
