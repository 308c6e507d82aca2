//! `Render` module: queues draw commands and hands them to the host once per
//! render frame.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rhai::{EvalAltResult, ImmutableString, Module, INT};
use tracing::debug;
use serde::{Deserialize, Serialize};

use super::{BindContext, CapabilityApi};
use crate::{DeviceEvent, DeviceId};

/// Oldest commands are dropped once a frame holds this many.
pub const MAX_PENDING_COMMANDS: usize = 65_536;

/// Colors are packed `0xRRGGBB`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DrawCommand {
    Clear {
        color: u32,
    },
    Pixel {
        x: i32,
        y: i32,
        color: u32,
    },
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: u32,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        color: u32,
    },
}

/// Everything a script drew between two render events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    pub commands: Vec<DrawCommand>,
}

/// Host side of the render module. Rasterization is up to the sink.
pub trait RenderSink: Send + Sync {
    fn present(&self, device: &DeviceId, frame: Frame);
}

pub struct RenderApi {
    device: DeviceId,
    sink: Arc<dyn RenderSink>,
    pending: Arc<Mutex<VecDeque<DrawCommand>>>,
}

impl RenderApi {
    pub fn new(device: DeviceId, sink: Arc<dyn RenderSink>) -> Self {
        Self {
            device,
            sink,
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

fn coord(v: INT) -> i32 {
    v.clamp(i32::MIN as INT, i32::MAX as INT) as i32
}

fn extent(v: INT) -> u32 {
    v.clamp(0, u32::MAX as INT) as u32
}

fn color(v: INT) -> u32 {
    (v as u32) & 0x00ff_ffff
}

fn push(pending: &Mutex<VecDeque<DrawCommand>>, command: DrawCommand) {
    let mut pending = pending.lock();
    if pending.len() >= MAX_PENDING_COMMANDS {
        pending.pop_front();
        debug!("render buffer full, dropping oldest command");
    }
    pending.push_back(command);
}

type Done = Result<(), Box<EvalAltResult>>;

impl CapabilityApi for RenderApi {
    fn bind(&self, ctx: &BindContext) -> Module {
        let mut module = Module::new();

        let width = INT::from(ctx.config.canvas.width);
        module.set_native_fn("width", move || -> Result<INT, Box<EvalAltResult>> { Ok(width) });
        let height = INT::from(ctx.config.canvas.height);
        module.set_native_fn("height", move || -> Result<INT, Box<EvalAltResult>> {
            Ok(height)
        });

        let pending = self.pending.clone();
        module.set_native_fn("clear", move |c: INT| -> Done {
            let mut pending = pending.lock();
            // Nothing drawn before a clear can be visible.
            pending.clear();
            pending.push_back(DrawCommand::Clear { color: color(c) });
            Ok(())
        });

        let pending = self.pending.clone();
        module.set_native_fn("pixel", move |x: INT, y: INT, c: INT| -> Done {
            push(
                &pending,
                DrawCommand::Pixel {
                    x: coord(x),
                    y: coord(y),
                    color: color(c),
                },
            );
            Ok(())
        });

        let pending = self.pending.clone();
        module.set_native_fn("rect", move |x: INT, y: INT, w: INT, h: INT, c: INT| -> Done {
            push(
                &pending,
                DrawCommand::Rect {
                    x: coord(x),
                    y: coord(y),
                    width: extent(w),
                    height: extent(h),
                    color: color(c),
                },
            );
            Ok(())
        });

        let pending = self.pending.clone();
        module.set_native_fn(
            "text",
            move |x: INT, y: INT, text: ImmutableString, c: INT| -> Done {
                push(
                    &pending,
                    DrawCommand::Text {
                        x: coord(x),
                        y: coord(y),
                        text: text.to_string(),
                        color: color(c),
                    },
                );
                Ok(())
            },
        );

        module
    }

    fn receive_event(&self, event: &DeviceEvent) {
        if let DeviceEvent::Render(context) = event {
            let commands: Vec<DrawCommand> = self.pending.lock().drain(..).collect();
            self.sink.present(
                &self.device,
                Frame {
                    frame: context.frame,
                    width: context.width,
                    height: context.height,
                    commands,
                },
            );
        }
    }

    fn reset(&self) {
        self.pending.lock().clear();
    }
}
