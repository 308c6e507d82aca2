//! Device events.
//!
//! Host occurrences become [`DeviceEvent`]s. An event is either global
//! (delivered to every device) or addressed to exactly one device.

use serde::{Deserialize, Serialize};

use crate::DeviceId;

/// Kind of a [`DeviceEvent`], used by capability modules to declare which
/// events they consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceEventKind {
    Tick,
    Render,
    Stop,
    Start,
    KeyPressed,
    ButtonHeld,
    ButtonUnheld,
    MouseLeftClick,
    MouseRightClick,
    MouseWheel,
}

impl DeviceEventKind {
    pub const ALL: [DeviceEventKind; 10] = [
        DeviceEventKind::Tick,
        DeviceEventKind::Render,
        DeviceEventKind::Stop,
        DeviceEventKind::Start,
        DeviceEventKind::KeyPressed,
        DeviceEventKind::ButtonHeld,
        DeviceEventKind::ButtonUnheld,
        DeviceEventKind::MouseLeftClick,
        DeviceEventKind::MouseRightClick,
        DeviceEventKind::MouseWheel,
    ];

    /// Name scripts see in the `type` field of polled events.
    pub fn tag(&self) -> &'static str {
        match self {
            DeviceEventKind::Tick => "tick",
            DeviceEventKind::Render => "render",
            DeviceEventKind::Stop => "stop",
            DeviceEventKind::Start => "start",
            DeviceEventKind::KeyPressed => "keyPressed",
            DeviceEventKind::ButtonHeld => "buttonHeld",
            DeviceEventKind::ButtonUnheld => "buttonUnheld",
            DeviceEventKind::MouseLeftClick => "mouseLeftClick",
            DeviceEventKind::MouseRightClick => "mouseRightClick",
            DeviceEventKind::MouseWheel => "mouseWheel",
        }
    }
}

/// Frame being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameContext {
    pub frame: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    Tick { ticks: u64 },
    Render(FrameContext),
    /// Stop one device, or every device when `device` is `None`.
    Stop { device: Option<DeviceId> },
    /// Start one device, or every device when `device` is `None`.
    Start { device: Option<DeviceId> },
    KeyPressed { device: DeviceId, key: String },
    ButtonHeld { key: String },
    ButtonUnheld { key: String },
    MouseLeftClick { device: DeviceId, x: i32, y: i32 },
    MouseRightClick { device: DeviceId, x: i32, y: i32 },
    MouseWheel { device: DeviceId, delta: i32 },
}

impl DeviceEvent {
    pub fn kind(&self) -> DeviceEventKind {
        match self {
            DeviceEvent::Tick { .. } => DeviceEventKind::Tick,
            DeviceEvent::Render(_) => DeviceEventKind::Render,
            DeviceEvent::Stop { .. } => DeviceEventKind::Stop,
            DeviceEvent::Start { .. } => DeviceEventKind::Start,
            DeviceEvent::KeyPressed { .. } => DeviceEventKind::KeyPressed,
            DeviceEvent::ButtonHeld { .. } => DeviceEventKind::ButtonHeld,
            DeviceEvent::ButtonUnheld { .. } => DeviceEventKind::ButtonUnheld,
            DeviceEvent::MouseLeftClick { .. } => DeviceEventKind::MouseLeftClick,
            DeviceEvent::MouseRightClick { .. } => DeviceEventKind::MouseRightClick,
            DeviceEvent::MouseWheel { .. } => DeviceEventKind::MouseWheel,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.kind().tag()
    }

    /// The device this event is addressed to, if any.
    pub fn target(&self) -> Option<&DeviceId> {
        match self {
            DeviceEvent::Tick { .. }
            | DeviceEvent::Render(_)
            | DeviceEvent::ButtonHeld { .. }
            | DeviceEvent::ButtonUnheld { .. } => None,
            DeviceEvent::Stop { device } | DeviceEvent::Start { device } => device.as_ref(),
            DeviceEvent::KeyPressed { device, .. }
            | DeviceEvent::MouseLeftClick { device, .. }
            | DeviceEvent::MouseRightClick { device, .. }
            | DeviceEvent::MouseWheel { device, .. } => Some(device),
        }
    }

    pub fn is_global(&self) -> bool {
        self.target().is_none()
    }

    /// Global events belong to every device; addressed events only to
    /// their target.
    pub fn belongs_to(&self, id: &DeviceId) -> bool {
        self.target().map_or(true, |target| target == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> DeviceId {
        DeviceId::parse(s)
    }

    #[test]
    fn global_events_belong_to_everyone() {
        let events = [
            DeviceEvent::Tick { ticks: 1 },
            DeviceEvent::Render(FrameContext {
                frame: 0,
                width: 1,
                height: 1,
            }),
            DeviceEvent::ButtonHeld { key: "A".into() },
            DeviceEvent::Stop { device: None },
            DeviceEvent::Start { device: None },
        ];
        for event in events {
            assert!(event.is_global(), "{event:?}");
            assert!(event.belongs_to(&id("any/device")));
        }
    }

    #[test]
    fn addressed_events_belong_to_target_only() {
        let events = [
            DeviceEvent::Stop {
                device: Some(id("a")),
            },
            DeviceEvent::KeyPressed {
                device: id("a"),
                key: "x".into(),
            },
            DeviceEvent::MouseLeftClick {
                device: id("a"),
                x: 1,
                y: 2,
            },
            DeviceEvent::MouseWheel {
                device: id("a"),
                delta: -1,
            },
        ];
        for event in events {
            assert!(!event.is_global());
            assert!(event.belongs_to(&id("a")));
            assert!(!event.belongs_to(&id("b")));
        }
    }

    #[test]
    fn script_tags() {
        assert_eq!(DeviceEvent::Tick { ticks: 0 }.tag(), "tick");
        assert_eq!(
            DeviceEvent::MouseRightClick {
                device: id("a"),
                x: 0,
                y: 0
            }
            .tag(),
            "mouseRightClick"
        );
        let tags: Vec<&str> = DeviceEventKind::ALL.iter().map(|k| k.tag()).collect();
        assert_eq!(tags.len(), 10);
        assert!(tags.contains(&"buttonUnheld"));
    }
}
