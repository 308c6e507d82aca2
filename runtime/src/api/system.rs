//! `System` module: time, randomness, sleeping, timers and module loading.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhai::{
    Dynamic, EvalAltResult, FnPtr, ImmutableString, Map, Module, NativeCallContext, Position,
    FLOAT, INT,
};
use tracing::info;

use super::{BindContext, CapabilityApi};

/// The error a blocking call raises when its engine is being torn down.
pub(crate) fn terminated() -> Box<EvalAltResult> {
    EvalAltResult::ErrorTerminated("cancelled".into(), Position::NONE).into()
}

pub struct SystemApi {
    rng: Arc<Mutex<StdRng>>,
}

impl Default for SystemApi {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemApi {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic `System::random()`.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}

fn millis(ms: INT) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

impl CapabilityApi for SystemApi {
    fn bind(&self, ctx: &BindContext) -> Module {
        let mut module = Module::new();

        let cancel = ctx.cancel.clone();
        module.set_native_fn("sleep", move |ms: INT| -> Result<(), Box<EvalAltResult>> {
            if ms < 0 {
                return Err(format!("sleep duration must not be negative: {ms}").into());
            }
            if cancel.sleep(millis(ms)) {
                Ok(())
            } else {
                Err(terminated())
            }
        });

        module.set_native_fn("time", || -> Result<INT, Box<EvalAltResult>> {
            Ok(chrono::Utc::now().timestamp_millis())
        });

        let id = ctx.device.to_string();
        module.set_native_fn("id", move || -> Result<ImmutableString, Box<EvalAltResult>> {
            Ok(id.as_str().into())
        });

        let rng = self.rng.clone();
        module.set_native_fn("random", move || -> Result<FLOAT, Box<EvalAltResult>> {
            Ok(rng.lock().gen::<FLOAT>())
        });

        let resolver = ctx.resolver.clone();
        module.set_native_fn(
            "load_module",
            move |ctx: NativeCallContext, name: ImmutableString| -> Result<Map, Box<EvalAltResult>> {
                let module = resolver.import(ctx.engine(), None, &name, Position::NONE)?;
                Ok(module
                    .iter_var()
                    .map(|(name, value)| (name.into(), value.clone()))
                    .collect())
            },
        );

        let tasks = ctx.tasks.clone();
        module.set_native_fn(
            "process_tasks",
            move |ctx: NativeCallContext| -> Result<INT, Box<EvalAltResult>> {
                let count = tasks.pump(|callback, args| {
                    callback
                        .call_within_context::<Dynamic>(&ctx, args)
                        .map(drop)
                })?;
                Ok(count as INT)
            },
        );

        let tasks = ctx.tasks.clone();
        module.set_native_fn(
            "set_timeout",
            move |callback: FnPtr, ms: INT| -> Result<INT, Box<EvalAltResult>> {
                Ok(tasks.schedule(callback, millis(ms), None) as INT)
            },
        );

        let tasks = ctx.tasks.clone();
        module.set_native_fn("clear_timeout", move |id: INT| -> Result<bool, Box<EvalAltResult>> {
            Ok(id >= 0 && tasks.cancel(id as u64))
        });

        let device = ctx.device.clone();
        module.set_native_fn("log", move |message: ImmutableString| -> Result<(), Box<EvalAltResult>> {
            info!(device = %device, "{message}");
            Ok(())
        });

        module
    }
}
