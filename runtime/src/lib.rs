//! # vdev runtime
//!
//! A vdev **device** is a sandboxed script program with its own filesystem,
//! network policy and render surface. Each device runs its entry script on a
//! dedicated OS thread and talks to the outside world only through the
//! capability modules bound into its engine:
//!
//! - `Event`: the queue of host events (ticks, frames, input)
//! - `System`: time, randomness, sleeping, timers, module loading
//! - `Storage`: the layered filesystem from `vdev-storage`
//! - `Network`: HTTP through a per-device policy from `vdev-net`
//! - `Render`: draw commands flushed to the host once per frame
//!
//! ## Lifecycle
//!
//! A device is built by a [`DeviceFactory`], registered with the
//! [`EventRouter`] and started. Starting spawns the device thread, which
//! reloads the engine and calls the entry function. A Stop event cancels the
//! running script at its next engine step or blocking call and joins the
//! thread. Script faults either end the thread or restart the script,
//! depending on `engine.reset_script_on_fatal_error`.
//!
//! Scripts drive themselves with a loop:
//!
//! ```rhai
//! fn main() {
//!     loop {
//!         for event in Event::poll() {
//!             if event["type"] == "tick" { System::log(`tick ${event.data[0]}`); }
//!         }
//!         System::sleep(10);
//!     }
//! }
//! ```
//!
//! ## Persistence
//!
//! The persisted store is the only state that survives a reload. The host
//! saves it as a [`DeviceSnapshot`] and hands it back through
//! [`DeviceManager::restore`].

pub mod api;
mod cancel;
mod config;
mod device;
mod error;
mod event;
mod id;
mod manager;
pub mod resolver;
mod router;
mod tasks;

pub use api::{
    CapabilityApi, CapabilityModule, DrawCommand, EventApi, Frame, NetworkApi, RenderApi,
    RenderSink, StorageApi, SystemApi,
};
pub use cancel::CancellationToken;
pub use config::{CanvasConfig, DeviceConfig, EngineConfig, ResourceConfig};
pub use device::{Device, DeviceSnapshot};
pub use error::{Result, RuntimeError};
pub use event::{DeviceEvent, DeviceEventKind, FrameContext};
pub use id::DeviceId;
pub use manager::{DeviceFactory, DeviceManager, ScriptDeviceFactory};
pub use resolver::{PrioritizedLoader, ScriptResolver};
pub use router::{EventRouter, HandlerId, HostEventHandler};
pub use tasks::{TaskId, TaskQueue};
