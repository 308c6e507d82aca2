//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;
use vdev_net::executor::mock::MockExecutor;
use vdev_net::NetworkPolicy;
use vdev_runtime::{
    Device, DeviceConfig, DeviceId, DeviceManager, EventRouter, Frame, RenderSink,
    ScriptDeviceFactory,
};
use vdev_storage::{CompositeStorage, PersistedLayer, PersistedStore, StoragePath};

pub const FACTORY: &str = "script";

/// Frames presented by devices, in order.
#[derive(Default)]
pub struct FrameLog(pub Mutex<Vec<(DeviceId, Frame)>>);

impl RenderSink for FrameLog {
    fn present(&self, device: &DeviceId, frame: Frame) {
        self.0.lock().push((device.clone(), frame));
    }
}

/// A manager with one script factory whose package folder holds `main.rhai`.
pub struct Harness {
    pub dir: TempDir,
    pub router: Arc<EventRouter>,
    pub manager: DeviceManager,
    pub frames: Arc<FrameLog>,
    pub http: MockExecutor,
}

pub struct Options {
    pub reset_on_fault: bool,
    pub network: NetworkPolicy,
    pub http: MockExecutor,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reset_on_fault: false,
            network: NetworkPolicy::allow_all(),
            http: MockExecutor::new(),
        }
    }
}

impl Harness {
    pub fn new(main: &str) -> Self {
        Self::with_options(main, Options::default())
    }

    pub fn with_options(main: &str, options: Options) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rhai"), main).unwrap();

        let mut config = DeviceConfig::default();
        config.resources.script_root = Some(dir.path().to_path_buf());
        config.engine.reset_script_on_fatal_error = options.reset_on_fault;
        config.network = options.network;

        let router = Arc::new(EventRouter::new());
        let manager = DeviceManager::new(router.clone(), &config.resources.id_namespace);
        let frames = Arc::new(FrameLog::default());
        manager.register_factory(Arc::new(ScriptDeviceFactory::new(
            FACTORY,
            Arc::new(config),
            Arc::new(options.http.clone()),
            frames.clone(),
        )));

        Self {
            dir,
            router,
            manager,
            frames,
            http: options.http,
        }
    }

    pub fn write_script(&self, name: &str, source: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, source).unwrap();
    }

    pub fn package_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn device(&self) -> Arc<Device> {
        self.manager.create_device(FACTORY).unwrap()
    }
}

/// A read-write view over a device's persisted store.
pub fn persisted(store: &PersistedStore) -> CompositeStorage {
    CompositeStorage::new(vec![Box::new(PersistedLayer::new(store.clone()))]).unwrap()
}

pub fn read(device: &Device, path: &str) -> Option<String> {
    persisted(device.persisted())
        .read_text(&StoragePath::parse(path))
        .ok()
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub const WAIT: Duration = Duration::from_secs(5);
