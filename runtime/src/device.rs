//! The per-device runtime: one script engine, one execution thread.
//!
//! A device owns its capability modules and persisted store. Every reload
//! rebuilds the engine from scratch: new cancellation token, new resolver,
//! fresh module bindings, freshly compiled entry module. Only the persisted
//! store survives a reload. The device thread reloads at the top of every
//! cycle, so each start or restart runs the current entry module against
//! freshly reset modules.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Map, Position, Scope, AST};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vdev_storage::{PersistedStore, Tree};

use crate::api::{BindContext, CapabilityModule};
use crate::error::{Result, RuntimeError};
use crate::resolver::{PrioritizedLoader, ResolverHandle, ScriptResolver};
use crate::{CancellationToken, DeviceConfig, DeviceEvent, DeviceEventKind, DeviceId, TaskQueue};

/// What the host saves for a device and hands back on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device_id: DeviceId,
    pub factory_id: String,
    pub persisted_store: Tree,
}

impl DeviceSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A compiled entry module and the engine it was compiled for.
pub struct EngineHandle {
    engine: Engine,
    ast: AST,
    resolver: Arc<ScriptResolver>,
    scope: Mutex<Scope<'static>>,
    entry_fn: String,
}

impl EngineHandle {
    /// Call the entry function on a copy of the globals. Top-level
    /// variables the run leaves behind are written back when it returns.
    fn invoke(&self) -> std::result::Result<Dynamic, Box<EvalAltResult>> {
        let mut scope = self.scope.lock().clone();
        let options = CallFnOptions::new().rewind_scope(false);
        let result = self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut scope,
            &self.ast,
            &self.entry_fn,
            (),
        );
        let mut globals = self.scope.lock();
        for (name, _, value) in scope.iter() {
            globals.set_value(name.to_string(), value);
        }
        result
    }
}

struct RuntimeState {
    engine: Option<Arc<EngineHandle>>,
    cancel: CancellationToken,
}

pub struct Device {
    id: DeviceId,
    config: Arc<DeviceConfig>,
    modules: Vec<CapabilityModule>,
    base_loaders: Vec<PrioritizedLoader>,
    persisted: PersistedStore,
    tasks: TaskQueue,
    state: Mutex<RuntimeState>,
    thread: Mutex<Option<JoinHandle<()>>>,
    stopping: AtomicBool,
}

/// Whether `err` is the engine being torn down rather than a script fault.
fn is_cancellation(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorTerminated(..) => true,
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => is_cancellation(inner),
        _ => false,
    }
}

impl Device {
    /// Build a device and load its entry module. The device is not started.
    pub fn new(
        id: DeviceId,
        config: Arc<DeviceConfig>,
        modules: Vec<CapabilityModule>,
        base_loaders: Vec<PrioritizedLoader>,
        persisted: PersistedStore,
    ) -> Result<Arc<Self>> {
        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.name.as_str()) {
                return Err(RuntimeError::DuplicateModule(module.name.clone()));
            }
        }

        let device = Arc::new(Self {
            id,
            config,
            modules,
            base_loaders,
            persisted,
            tasks: TaskQueue::new(),
            state: Mutex::new(RuntimeState {
                engine: None,
                cancel: CancellationToken::new(),
            }),
            thread: Mutex::new(None),
            stopping: AtomicBool::new(false),
        });
        device.reload()?;
        Ok(device)
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn config(&self) -> &Arc<DeviceConfig> {
        &self.config
    }

    pub fn persisted(&self) -> &PersistedStore {
        &self.persisted
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name.as_str()).collect()
    }

    /// Rebuild the engine. A running script is cancelled; the device thread
    /// notices and starts over with a reload of its own.
    pub fn reload(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.reload_locked(&mut state).map(drop)
    }

    fn reload_locked(&self, state: &mut RuntimeState) -> Result<Arc<EngineHandle>> {
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.engine = None;
        self.tasks.clear();
        for module in &self.modules {
            module.api.reset();
        }

        let loaders = self
            .base_loaders
            .iter()
            .cloned()
            .chain(self.modules.iter().filter_map(|m| m.loader.clone()))
            .collect();
        let resolver = Arc::new(ScriptResolver::new(
            loaders,
            &self.config.resources.entry_module,
        )?);

        let engine = self.build_engine(&state.cancel, &resolver);
        let ast = resolver.load_entry(&engine)?;

        let handle = Arc::new(EngineHandle {
            engine,
            ast,
            resolver,
            scope: Mutex::new(Scope::new()),
            entry_fn: self.config.resources.entry_function.clone(),
        });
        state.engine = Some(handle.clone());
        info!(device = %self.id, "device reloaded");
        Ok(handle)
    }

    fn build_engine(&self, cancel: &CancellationToken, resolver: &Arc<ScriptResolver>) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_call_levels(self.config.engine.max_call_levels);

        let token = cancel.clone();
        engine.on_progress(move |_| {
            token
                .is_cancelled()
                .then(|| Dynamic::from("cancelled".to_string()))
        });

        let id = self.id.clone();
        engine.on_print(move |text| info!(device = %id, "{text}"));
        let id = self.id.clone();
        engine.on_debug(move |text, source, pos| {
            debug!(device = %id, source = source.unwrap_or_default(), %pos, "{text}")
        });

        engine.set_module_resolver(ResolverHandle(resolver.clone()));

        let ctx = BindContext {
            device: self.id.clone(),
            config: self.config.clone(),
            cancel: cancel.clone(),
            tasks: self.tasks.clone(),
            resolver: resolver.clone(),
        };
        for module in self.modules.iter().filter(|m| m.exposed) {
            engine.register_static_module(module.name.as_str(), module.api.bind(&ctx).into());
        }
        engine
    }

    fn engine(&self) -> Option<Arc<EngineHandle>> {
        self.state.lock().engine.clone()
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn the device thread unless one is already running.
    pub fn start(self: &Arc<Self>) {
        let mut thread = self.thread.lock();
        if let Some(handle) = thread.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        if let Some(finished) = thread.take() {
            if finished.join().is_err() {
                warn!(device = %self.id, "previous device thread panicked");
            }
        }

        self.stopping.store(false, Ordering::SeqCst);
        let device = Arc::clone(self);
        match thread::Builder::new()
            .name(format!("vdev-{}", self.id))
            .spawn(move || device.run())
        {
            Ok(handle) => {
                info!(device = %self.id, "device started");
                *thread = Some(handle);
            }
            Err(e) => error!(device = %self.id, error = %e, "failed to spawn device thread"),
        }
    }

    /// Cancel the running script and wait for the device thread to exit.
    ///
    /// Cancellation is seen at the script's next engine step or cancellable
    /// sleep. A blocking HTTP request is not interrupted, so `stop` can wait
    /// up to the executor's request timeout.
    pub fn stop(&self) {
        let mut thread = self.thread.lock();
        let Some(handle) = thread.take() else {
            return;
        };

        self.stopping.store(true, Ordering::SeqCst);
        self.state.lock().cancel.cancel();

        if handle.thread().id() == thread::current().id() {
            // The thread notices the flag at the top of its loop.
            *thread = Some(handle);
            return;
        }
        if handle.join().is_err() {
            warn!(device = %self.id, "device thread panicked");
        }
        info!(device = %self.id, "device stopped");
    }

    fn run(self: Arc<Self>) {
        loop {
            let handle = {
                let mut state = self.state.lock();
                if self.stopping.load(Ordering::SeqCst) {
                    break;
                }
                match self.reload_locked(&mut state) {
                    Ok(handle) => handle,
                    Err(e) => {
                        error!(device = %self.id, error = %e, "failed to load device script");
                        break;
                    }
                }
            };

            match panic::catch_unwind(AssertUnwindSafe(|| handle.invoke())) {
                Ok(Ok(_)) => {
                    info!(device = %self.id, "script finished");
                    break;
                }
                Ok(Err(e)) if is_cancellation(&e) => {
                    debug!(device = %self.id, "script cancelled");
                }
                Ok(Err(e)) => {
                    error!(device = %self.id, error = %e, "script fault");
                    if !self.config.engine.reset_script_on_fatal_error {
                        break;
                    }
                }
                Err(_) => {
                    error!(device = %self.id, "script panicked");
                    break;
                }
            }
        }
        debug!(device = %self.id, "device thread exiting");
    }

    /// Deliver `event` to the modules that accept it and act on lifecycle
    /// events addressed to this device.
    pub fn fire(self: &Arc<Self>, event: &DeviceEvent) {
        if !event.belongs_to(&self.id) {
            return;
        }
        let kind = event.kind();
        for module in self.modules.iter().filter(|m| m.accepts(kind)) {
            module.api.receive_event(event);
        }
        match kind {
            DeviceEventKind::Stop => self.stop(),
            DeviceEventKind::Start => self.start(),
            _ => {}
        }
    }

    /// A global of the live engine's scope.
    pub fn get(&self, name: &str) -> Option<Dynamic> {
        let handle = self.engine()?;
        let scope = handle.scope.lock();
        scope.get_value::<Dynamic>(name)
    }

    /// Set a global in the live engine's scope. The next reload, including
    /// the one every start begins with, discards it. Returns `false` when no
    /// engine is loaded.
    pub fn set(&self, name: &str, value: Dynamic) -> bool {
        match self.engine() {
            Some(handle) => {
                handle.scope.lock().set_value(name.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Resolve and evaluate a module through the live engine, returning its
    /// exported variables.
    pub fn load_module(&self, name: &str) -> Result<Option<Map>> {
        let Some(handle) = self.engine() else {
            return Ok(None);
        };
        let module = handle
            .resolver
            .import(&handle.engine, None, name, Position::NONE)
            .map_err(|e| match *e {
                EvalAltResult::ErrorModuleNotFound(name, _) => RuntimeError::ModuleNotFound(name),
                other => RuntimeError::Script(other.to_string()),
            })?;
        Ok(Some(
            module
                .iter_var()
                .map(|(name, value)| (name.into(), value.clone()))
                .collect(),
        ))
    }

    /// Run ready tasks on the calling thread.
    pub fn process_tasks(&self) -> usize {
        let Some(handle) = self.engine() else {
            return 0;
        };
        let ran = self.tasks.pump(|callback, args| {
            if let Err(e) = callback.call::<Dynamic>(&handle.engine, &handle.ast, args) {
                warn!(device = %self.id, callback = callback.fn_name(), error = %e, "task failed");
            }
            Ok(())
        });
        ran.unwrap_or(0)
    }

    pub fn snapshot(&self, factory_id: &str) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.id.clone(),
            factory_id: factory_id.to_string(),
            persisted_store: self.persisted.snapshot(),
        }
    }

    /// Replace the persisted store contents. The device is not restarted.
    pub fn restore(&self, tree: Tree) {
        self.persisted.replace(tree);
        debug!(device = %self.id, "persisted store restored");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.state.get_mut().cancel.cancel();
    }
}
