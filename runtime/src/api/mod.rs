//! Capability API modules.
//!
//! Each module is bound into the script engine as a static namespace
//! (`Event::poll()`, `Storage::read(...)`) and may consume device events and
//! contribute a loader to the module resolver.

use std::sync::Arc;

use rhai::{Dynamic, Map};

use crate::resolver::{PrioritizedLoader, ScriptResolver};
use crate::{CancellationToken, DeviceConfig, DeviceEvent, DeviceEventKind, DeviceId, TaskQueue};

pub mod event;
pub mod network;
pub mod render;
pub mod storage;
pub mod system;

pub use event::EventApi;
pub use network::NetworkApi;
pub use render::{DrawCommand, Frame, RenderApi, RenderSink};
pub use storage::StorageApi;
pub use system::SystemApi;

/// Everything a module may capture when it is bound to a fresh engine.
#[derive(Clone)]
pub struct BindContext {
    pub device: DeviceId,
    pub config: Arc<DeviceConfig>,
    /// Token of the engine being built; cancelled on the next reload or stop.
    pub cancel: CancellationToken,
    pub tasks: TaskQueue,
    pub resolver: Arc<ScriptResolver>,
}

/// The behavior behind a capability module.
pub trait CapabilityApi: Send + Sync {
    /// Build the functions exposed under the module's namespace.
    fn bind(&self, ctx: &BindContext) -> rhai::Module;

    /// Handle a device event of a kind the module declared.
    fn receive_event(&self, _event: &DeviceEvent) {}

    /// Drop per-run state. Called on every reload.
    fn reset(&self) {}
}

/// A named capability module as registered with a device.
#[derive(Clone)]
pub struct CapabilityModule {
    pub name: String,
    /// Whether the module is bound into the script's namespace.
    pub exposed: bool,
    pub receivable: Vec<DeviceEventKind>,
    pub loader: Option<PrioritizedLoader>,
    pub api: Arc<dyn CapabilityApi>,
}

impl CapabilityModule {
    pub fn new(name: impl Into<String>, api: Arc<dyn CapabilityApi>) -> Self {
        Self {
            name: name.into(),
            exposed: true,
            receivable: Vec::new(),
            loader: None,
            api,
        }
    }

    #[must_use]
    pub fn receives(mut self, kinds: &[DeviceEventKind]) -> Self {
        self.receivable.extend_from_slice(kinds);
        self
    }

    #[must_use]
    pub fn with_loader(mut self, loader: PrioritizedLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.exposed = false;
        self
    }

    pub fn accepts(&self, kind: DeviceEventKind) -> bool {
        self.receivable.contains(&kind)
    }
}

/// `#{success: true, data: ...}`
pub(crate) fn success(data: Dynamic) -> Map {
    let mut map = Map::new();
    map.insert("success".into(), true.into());
    map.insert("data".into(), data);
    map
}

/// `#{success: false, error: "<Kind>"}`
pub(crate) fn failure(error: &str) -> Map {
    let mut map = Map::new();
    map.insert("success".into(), false.into());
    map.insert("error".into(), error.into());
    map
}
