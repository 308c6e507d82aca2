//! Host-side event fan-out.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::device::Device;
use crate::{DeviceEvent, DeviceId, FrameContext};

/// Host code that wants to observe every routed event.
pub trait HostEventHandler: Send + Sync {
    fn handle(&self, event: &DeviceEvent);
}

impl<F> HostEventHandler for F
where
    F: Fn(&DeviceEvent) + Send + Sync,
{
    fn handle(&self, event: &DeviceEvent) {
        self(event)
    }
}

pub type HandlerId = u64;

#[derive(Clone)]
struct Targets {
    devices: Vec<Arc<Device>>,
    handlers: Vec<Arc<dyn HostEventHandler>>,
}

#[derive(Default)]
struct Registry {
    devices: BTreeMap<DeviceId, Arc<Device>>,
    handlers: BTreeMap<HandlerId, Arc<dyn HostEventHandler>>,
    next_handler: HandlerId,
}

/// Routes host occurrences to devices and handlers.
///
/// Routing works off a snapshot of the registry that is rebuilt lazily after
/// any registration change, so firing never holds the registry lock while
/// devices handle the event.
#[derive(Default)]
pub struct EventRouter {
    registry: RwLock<Registry>,
    cache: Mutex<Option<Arc<Targets>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_device(&self, device: Arc<Device>) {
        self.registry
            .write()
            .devices
            .insert(device.id().clone(), device);
        self.invalidate();
    }

    pub fn unregister_device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        let removed = self.registry.write().devices.remove(id);
        self.invalidate();
        removed
    }

    pub fn register_handler(&self, handler: Arc<dyn HostEventHandler>) -> HandlerId {
        let id = {
            let mut registry = self.registry.write();
            registry.next_handler += 1;
            let id = registry.next_handler;
            registry.handlers.insert(id, handler);
            id
        };
        self.invalidate();
        id
    }

    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        let removed = self.registry.write().handlers.remove(&id).is_some();
        self.invalidate();
        removed
    }

    pub fn device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        self.registry.read().devices.get(id).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.registry.read().devices.len()
    }

    fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    fn targets(&self) -> Arc<Targets> {
        let mut cache = self.cache.lock();
        if let Some(targets) = cache.as_ref() {
            return targets.clone();
        }
        let registry = self.registry.read();
        let targets = Arc::new(Targets {
            devices: registry.devices.values().cloned().collect(),
            handlers: registry.handlers.values().cloned().collect(),
        });
        *cache = Some(targets.clone());
        targets
    }

    /// Hand `event` to every handler, then to every device it belongs to.
    /// Returns the number of devices reached.
    pub fn route(&self, event: DeviceEvent) -> usize {
        let targets = self.targets();
        for handler in &targets.handlers {
            handler.handle(&event);
        }
        let mut reached = 0;
        for device in targets.devices.iter().filter(|d| event.belongs_to(d.id())) {
            device.fire(&event);
            reached += 1;
        }
        trace!(event = event.tag(), reached, "event routed");
        reached
    }

    pub fn tick(&self, ticks: u64) -> usize {
        self.route(DeviceEvent::Tick { ticks })
    }

    pub fn render(&self, frame: FrameContext) -> usize {
        self.route(DeviceEvent::Render(frame))
    }

    /// Stop one device, or every device when `device` is `None`.
    pub fn stop(&self, device: Option<DeviceId>) -> usize {
        self.route(DeviceEvent::Stop { device })
    }

    pub fn start(&self, device: Option<DeviceId>) -> usize {
        self.route(DeviceEvent::Start { device })
    }

    pub fn key_pressed(&self, device: DeviceId, key: impl Into<String>) -> usize {
        self.route(DeviceEvent::KeyPressed {
            device,
            key: key.into(),
        })
    }

    pub fn button_held(&self, key: impl Into<String>) -> usize {
        self.route(DeviceEvent::ButtonHeld { key: key.into() })
    }

    pub fn button_unheld(&self, key: impl Into<String>) -> usize {
        self.route(DeviceEvent::ButtonUnheld { key: key.into() })
    }

    pub fn mouse_left_click(&self, device: DeviceId, x: i32, y: i32) -> usize {
        self.route(DeviceEvent::MouseLeftClick { device, x, y })
    }

    pub fn mouse_right_click(&self, device: DeviceId, x: i32, y: i32) -> usize {
        self.route(DeviceEvent::MouseRightClick { device, x, y })
    }

    pub fn mouse_wheel(&self, device: DeviceId, delta: i32) -> usize {
        self.route(DeviceEvent::MouseWheel { device, delta })
    }
}
