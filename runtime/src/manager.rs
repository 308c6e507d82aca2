//! Device construction and bookkeeping.
//!
//! Devices are built by named factories and registered with an
//! [`EventRouter`]. The manager is an ordinary value owned by the host; there
//! is no process-wide registry.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use vdev_net::{HttpExecutor, PolicyClient};
use vdev_storage::{
    CompositeStorage, DirectoryLoader, LoaderLayer, PersistedLayer, PersistedStore, StorageLayer,
};

use crate::api::{
    event::FORWARDED, CapabilityModule, EventApi, NetworkApi, RenderApi, RenderSink, StorageApi,
    SystemApi,
};
use crate::device::{Device, DeviceSnapshot};
use crate::error::{Result, RuntimeError};
use crate::resolver::PrioritizedLoader;
use crate::router::EventRouter;
use crate::{DeviceConfig, DeviceEventKind, DeviceId};

/// Priority of a device's own asset folder.
pub const ASSET_PRIORITY: i32 = 0;
/// Priority of the package folder shared by every device.
pub const PACKAGE_PRIORITY: i32 = 5;
/// Priority of the script standard library.
pub const STDLIB_PRIORITY: i32 = 10;

/// Builds devices of one kind.
pub trait DeviceFactory: Send + Sync {
    fn factory_id(&self) -> &str;

    /// Build a device around an existing persisted store. The device is
    /// not started.
    fn create(&self, id: DeviceId, persisted: PersistedStore) -> Result<Arc<Device>>;
}

/// The standard scripted device: layered storage plus the Event, System,
/// Storage, Network and Render modules.
pub struct ScriptDeviceFactory {
    id: String,
    config: Arc<DeviceConfig>,
    executor: Arc<dyn HttpExecutor>,
    sink: Arc<dyn RenderSink>,
}

impl ScriptDeviceFactory {
    pub fn new(
        id: impl Into<String>,
        config: Arc<DeviceConfig>,
        executor: Arc<dyn HttpExecutor>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            executor,
            sink,
        }
    }

    pub fn config(&self) -> &Arc<DeviceConfig> {
        &self.config
    }

    fn package_loader(&self) -> Option<Arc<DirectoryLoader>> {
        let root = self.config.resources.script_root.as_ref()?;
        Some(Arc::new(DirectoryLoader::new("package", root)))
    }

    fn stdlib_loader(&self) -> Option<Arc<DirectoryLoader>> {
        let root = self.config.resources.stdlib_root.as_ref()?;
        Some(Arc::new(DirectoryLoader::new("stdlib", root)))
    }

    fn asset_dir(&self, id: &DeviceId) -> Option<PathBuf> {
        let root = self.config.resources.asset_root.as_ref()?;
        Some(id.components().iter().fold(root.clone(), |dir, c| dir.join(c)))
    }
}

impl DeviceFactory for ScriptDeviceFactory {
    fn factory_id(&self) -> &str {
        &self.id
    }

    fn create(&self, id: DeviceId, persisted: PersistedStore) -> Result<Arc<Device>> {
        let package = self.package_loader();
        let stdlib = self.stdlib_loader();

        let mut layers: Vec<Box<dyn StorageLayer>> =
            vec![Box::new(PersistedLayer::new(persisted.clone()))];
        if let Some(dir) = self.asset_dir(&id) {
            let loader = Arc::new(DirectoryLoader::new("assets", dir));
            layers.push(Box::new(LoaderLayer::new("assets", ASSET_PRIORITY, loader)));
        }
        if let Some(loader) = &package {
            layers.push(Box::new(LoaderLayer::new("package", PACKAGE_PRIORITY, loader.clone())));
        }
        if let Some(loader) = &stdlib {
            layers.push(Box::new(LoaderLayer::new("stdlib", STDLIB_PRIORITY, loader.clone())));
        }
        let storage = Arc::new(CompositeStorage::new(layers)?);

        let mut base_loaders = Vec::new();
        if let Some(loader) = package {
            base_loaders.push(PrioritizedLoader::new(PACKAGE_PRIORITY, loader));
        }
        if let Some(loader) = stdlib {
            base_loaders.push(PrioritizedLoader::new(STDLIB_PRIORITY, loader));
        }

        let storage_api = StorageApi::new(storage);
        let storage_loader = storage_api.loader();
        let client = PolicyClient::new(self.config.network.clone(), self.executor.clone());

        let modules = vec![
            CapabilityModule::new("Event", Arc::new(EventApi::new())).receives(&FORWARDED),
            CapabilityModule::new("System", Arc::new(SystemApi::new())),
            CapabilityModule::new("Storage", Arc::new(storage_api)).with_loader(storage_loader),
            CapabilityModule::new("Network", Arc::new(NetworkApi::new(client))),
            CapabilityModule::new(
                "Render",
                Arc::new(RenderApi::new(id.clone(), self.sink.clone())),
            )
            .receives(&[DeviceEventKind::Render]),
        ];

        Device::new(id, self.config.clone(), modules, base_loaders, persisted)
    }
}

struct ManagedDevice {
    device: Arc<Device>,
    factory_id: String,
}

/// Owns every live device and keeps the router's registrations in sync.
pub struct DeviceManager {
    router: Arc<EventRouter>,
    namespace: DeviceId,
    factories: RwLock<HashMap<String, Arc<dyn DeviceFactory>>>,
    devices: RwLock<BTreeMap<DeviceId, ManagedDevice>>,
}

impl DeviceManager {
    /// Fresh device ids are derived under `namespace`.
    pub fn new(router: Arc<EventRouter>, namespace: &str) -> Self {
        Self {
            router,
            namespace: DeviceId::parse(namespace),
            factories: RwLock::new(HashMap::new()),
            devices: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn register_factory(&self, factory: Arc<dyn DeviceFactory>) {
        self.factories
            .write()
            .insert(factory.factory_id().to_string(), factory);
    }

    fn factory(&self, id: &str) -> Result<Arc<dyn DeviceFactory>> {
        self.factories
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownFactory(id.to_string()))
    }

    fn adopt(&self, device: Arc<Device>, factory_id: &str) {
        self.router.register_device(device.clone());
        self.devices.write().insert(
            device.id().clone(),
            ManagedDevice {
                device,
                factory_id: factory_id.to_string(),
            },
        );
    }

    /// Build a device with a fresh id and an empty store. The device is
    /// registered with the router but not started.
    pub fn create_device(&self, factory_id: &str) -> Result<Arc<Device>> {
        let factory = self.factory(factory_id)?;
        let id = DeviceId::derive(&self.namespace);
        let device = factory.create(id, PersistedStore::new())?;
        self.adopt(device.clone(), factory_id);
        info!(device = %device.id(), factory = factory_id, "device created");
        Ok(device)
    }

    pub fn destroy_device(&self, id: &DeviceId) -> Result<()> {
        let managed = self
            .devices
            .write()
            .remove(id)
            .ok_or_else(|| RuntimeError::DeviceNotFound(id.clone()))?;
        managed.device.stop();
        self.router.unregister_device(id);
        info!(device = %id, "device destroyed");
        Ok(())
    }

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.devices.read().get(id).map(|m| m.device.clone())
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices
            .read()
            .values()
            .map(|m| m.device.clone())
            .collect()
    }

    pub fn save(&self, id: &DeviceId) -> Result<DeviceSnapshot> {
        let devices = self.devices.read();
        let managed = devices
            .get(id)
            .ok_or_else(|| RuntimeError::DeviceNotFound(id.clone()))?;
        Ok(managed.device.snapshot(&managed.factory_id))
    }

    pub fn save_all(&self) -> Vec<DeviceSnapshot> {
        self.devices
            .read()
            .values()
            .map(|m| m.device.snapshot(&m.factory_id))
            .collect()
    }

    /// Bring a saved device back. An existing device with the same id is
    /// stopped, gets its store replaced and is started again; otherwise the
    /// device is rebuilt from the snapshot and started.
    pub fn restore(&self, snapshot: DeviceSnapshot) -> Result<Arc<Device>> {
        if let Some(device) = self.device(&snapshot.device_id) {
            device.stop();
            device.restore(snapshot.persisted_store);
            device.reload()?;
            device.start();
            info!(device = %device.id(), "device restored in place");
            return Ok(device);
        }

        let factory = self.factory(&snapshot.factory_id)?;
        let store = PersistedStore::with_tree(snapshot.persisted_store);
        let device = factory.create(snapshot.device_id, store)?;
        self.adopt(device.clone(), &snapshot.factory_id);
        device.start();
        info!(device = %device.id(), factory = %snapshot.factory_id, "device restored");
        Ok(device)
    }

    /// Stop every device.
    pub fn shutdown(&self) {
        for device in self.devices() {
            device.stop();
        }
    }
}
