//! `Event` module: the device's inbound event queue.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{Array, Dynamic, EvalAltResult, Map, Module, NativeCallContext, INT};
use tracing::debug;

use super::{BindContext, CapabilityApi};
use crate::{DeviceEvent, DeviceEventKind};

/// Oldest events are dropped once a script stops polling.
pub const MAX_QUEUED_EVENTS: usize = 1024;

/// Kinds the event module forwards to scripts.
pub const FORWARDED: [DeviceEventKind; 8] = [
    DeviceEventKind::Tick,
    DeviceEventKind::Render,
    DeviceEventKind::KeyPressed,
    DeviceEventKind::ButtonHeld,
    DeviceEventKind::ButtonUnheld,
    DeviceEventKind::MouseLeftClick,
    DeviceEventKind::MouseRightClick,
    DeviceEventKind::MouseWheel,
];

#[derive(Default)]
pub struct EventApi {
    queue: Arc<Mutex<VecDeque<Map>>>,
}

impl EventApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Script view of an event: `#{type: "keyPressed", data: ["A"]}`. The
/// payload is positional, in the order the event variant declares it.
pub fn event_to_map(event: &DeviceEvent) -> Map {
    let data: Array = match event {
        DeviceEvent::Tick { ticks } => vec![(*ticks as INT).into()],
        DeviceEvent::Render(frame) => vec![
            (frame.frame as INT).into(),
            INT::from(frame.width).into(),
            INT::from(frame.height).into(),
        ],
        DeviceEvent::Stop { device } | DeviceEvent::Start { device } => vec![match device {
            Some(id) => id.to_string().into(),
            None => Dynamic::UNIT,
        }],
        DeviceEvent::KeyPressed { key, .. }
        | DeviceEvent::ButtonHeld { key }
        | DeviceEvent::ButtonUnheld { key } => vec![key.clone().into()],
        DeviceEvent::MouseLeftClick { x, y, .. } | DeviceEvent::MouseRightClick { x, y, .. } => {
            vec![INT::from(*x).into(), INT::from(*y).into()]
        }
        DeviceEvent::MouseWheel { delta, .. } => vec![INT::from(*delta).into()],
    };

    let mut map = Map::new();
    map.insert("type".into(), event.tag().into());
    map.insert("data".into(), Dynamic::from(data));
    map
}

impl CapabilityApi for EventApi {
    fn bind(&self, ctx: &BindContext) -> Module {
        let mut module = Module::new();

        let queue = self.queue.clone();
        let tasks = ctx.tasks.clone();
        module.set_native_fn(
            "poll",
            move |ctx: NativeCallContext| -> Result<Array, Box<EvalAltResult>> {
                tasks.pump(|callback, args| {
                    callback
                        .call_within_context::<Dynamic>(&ctx, args)
                        .map(drop)
                })?;
                let drained: Array = queue.lock().drain(..).map(Dynamic::from).collect();
                Ok(drained)
            },
        );

        let queue = self.queue.clone();
        module.set_native_fn("pending", move || -> Result<INT, Box<EvalAltResult>> {
            Ok(queue.lock().len() as INT)
        });

        module
    }

    fn receive_event(&self, event: &DeviceEvent) {
        let mut queue = self.queue.lock();
        if queue.len() >= MAX_QUEUED_EVENTS {
            queue.pop_front();
            debug!(event = event.tag(), "event queue full, dropping oldest");
        }
        queue.push_back(event_to_map(event));
    }

    fn reset(&self) {
        self.queue.lock().clear();
    }
}
