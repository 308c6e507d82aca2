use tracing::debug;
use vdev_runtime::{DeviceId, Frame, RenderSink};

/// Reports presented frames through the log instead of drawing them.
pub struct LogSink;

impl RenderSink for LogSink {
    fn present(&self, device: &DeviceId, frame: Frame) {
        if frame.commands.is_empty() {
            return;
        }
        debug!(
            device = %device,
            frame = frame.frame,
            commands = frame.commands.len(),
            "frame presented"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(json) = serde_json::to_string(&frame.commands) {
                tracing::trace!(device = %device, "{json}");
            }
        }
    }
}
