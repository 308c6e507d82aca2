//! `Storage` module: the device's layered filesystem.
//!
//! Every call except `exists` answers with a response map:
//! `#{success: true, data: ...}` or `#{success: false, error: "FileNotFound"}`.
//! `read` carries the file as `#{metadata, bytes}`.

use std::sync::Arc;

use rhai::{Array, Blob, Dynamic, EvalAltResult, ImmutableString, Map, Module, INT};
use vdev_storage::{
    CompositeStorage, StorageFile, StorageFileMetadata, StorageLoader, StoragePath,
    StorageResponse,
};

use super::{failure, success, BindContext, CapabilityApi};
use crate::resolver::PrioritizedLoader;

/// Priority of the loader that lets scripts import modules from storage.
pub const STORAGE_LOADER_PRIORITY: i32 = 100;

type Response = Result<Map, Box<EvalAltResult>>;

pub struct StorageApi {
    storage: Arc<CompositeStorage>,
}

impl StorageApi {
    pub fn new(storage: Arc<CompositeStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<CompositeStorage> {
        &self.storage
    }

    /// Loader over this module's storage, for the module resolver.
    pub fn loader(&self) -> PrioritizedLoader {
        PrioritizedLoader::new(
            STORAGE_LOADER_PRIORITY,
            Arc::new(StorageLoader::new("storage", self.storage.clone())),
        )
    }
}

fn metadata_map(metadata: StorageFileMetadata) -> Map {
    let mut map = Map::new();
    map.insert("name".into(), metadata.name.into());
    map.insert("type".into(), metadata.file_type.as_str().into());
    map.insert("size".into(), (metadata.size as INT).into());
    map.insert("origin".into(), metadata.origin.into());
    map
}

fn file_map(file: StorageFile) -> Map {
    let mut map = Map::new();
    map.insert("metadata".into(), Dynamic::from(metadata_map(file.metadata)));
    map.insert("bytes".into(), Dynamic::from_blob(file.bytes));
    map
}

fn respond<T>(result: StorageResponse<T>, data: impl FnOnce(T) -> Dynamic) -> Response {
    Ok(match result {
        Ok(value) => success(data(value)),
        Err(error) => failure(error.kind_name()),
    })
}

fn path(s: &str) -> StoragePath {
    StoragePath::parse(s)
}

impl CapabilityApi for StorageApi {
    fn bind(&self, _ctx: &BindContext) -> Module {
        let mut module = Module::new();

        let storage = self.storage.clone();
        module.set_native_fn("exists", move |p: ImmutableString| -> Result<bool, Box<EvalAltResult>> {
            Ok(storage.exists(&path(&p)))
        });

        let storage = self.storage.clone();
        module.set_native_fn("read", move |p: ImmutableString| -> Response {
            respond(storage.read(&path(&p)), |file| Dynamic::from(file_map(file)))
        });

        let storage = self.storage.clone();
        module.set_native_fn("read_text", move |p: ImmutableString| -> Response {
            respond(storage.read_text(&path(&p)), Dynamic::from)
        });

        let storage = self.storage.clone();
        module.set_native_fn("read_metadata", move |p: ImmutableString| -> Response {
            respond(storage.read_metadata(&path(&p)), |m| Dynamic::from(metadata_map(m)))
        });

        let storage = self.storage.clone();
        module.set_native_fn("list", move |p: ImmutableString| -> Response {
            respond(storage.list(&path(&p)), |entries| {
                let array: Array = entries
                    .into_iter()
                    .map(|m| Dynamic::from(metadata_map(m)))
                    .collect();
                Dynamic::from(array)
            })
        });

        let storage = self.storage.clone();
        module.set_native_fn("write", move |p: ImmutableString, bytes: Blob| -> Response {
            respond(storage.write(&path(&p), &bytes), |()| Dynamic::UNIT)
        });

        let storage = self.storage.clone();
        module.set_native_fn("write", move |p: ImmutableString, text: ImmutableString| -> Response {
            respond(storage.write_text(&path(&p), &text), |()| Dynamic::UNIT)
        });

        let storage = self.storage.clone();
        module.set_native_fn("delete", move |p: ImmutableString, recursive: bool| -> Response {
            respond(storage.delete(&path(&p), recursive), |()| Dynamic::UNIT)
        });

        let storage = self.storage.clone();
        module.set_native_fn("delete", move |p: ImmutableString| -> Response {
            respond(storage.delete(&path(&p), false), |()| Dynamic::UNIT)
        });

        let storage = self.storage.clone();
        module.set_native_fn("make_directory", move |p: ImmutableString| -> Response {
            respond(storage.make_directory(&path(&p)), |()| Dynamic::UNIT)
        });

        module
    }
}
