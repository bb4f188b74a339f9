//! The session message contract.
//!
//! Every message crossing the viewer↔host channel is a variant of
//! [`SessionMessage`]; receivers consume them via exhaustive pattern
//! matching rather than per-name callback registration. Pointer and
//! touch coordinates are normalized percentages of the viewport in
//! `[0, 1]`, so viewer and host may run at different resolutions.

use serde::{Deserialize, Serialize};

use crate::error::CastError;

// ── Modes and buttons ────────────────────────────────────────────

/// How the session was initiated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RemoteControlMode {
    /// An attended session: a person at the host approves it.
    Normal,
    /// A pre-authorized service session with no one at the host.
    Unattended,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

// ── InputEvent ───────────────────────────────────────────────────

/// Everything the viewer fires at the host while streaming.
///
/// Fire-and-forget: no per-event acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum InputEvent {
    MouseMove { percent_x: f64, percent_y: f64 },
    MouseDown { button: MouseButton, percent_x: f64, percent_y: f64 },
    MouseUp { button: MouseButton, percent_x: f64, percent_y: f64 },
    MouseWheel { delta_x: f64, delta_y: f64 },
    KeyDown { key: String },
    KeyUp { key: String },
    KeyPress { key: String },
    TouchDown,
    TouchMove { move_x: f64, move_y: f64 },
    TouchUp,
    Tap { percent_x: f64, percent_y: f64 },
    LongPress,
    CtrlAltDel { service_id: String },
    SelectScreen { index: u32 },
    SharedFileIds { ids: Vec<String> },
    QualityChange { level: u8 },
    LatencyReport { millis: u64 },
}

impl InputEvent {
    /// Whether this event is replayed into the host OS input stream,
    /// as opposed to being consumed by the session itself.
    pub fn is_injected(&self) -> bool {
        !matches!(
            self,
            InputEvent::SelectScreen { .. }
                | InputEvent::SharedFileIds { .. }
                | InputEvent::QualityChange { .. }
                | InputEvent::LatencyReport { .. }
        )
    }
}

// ── CursorInfo ───────────────────────────────────────────────────

/// A host cursor update. Exactly one of three renderings applies,
/// chosen by [`CursorInfo::rendering`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CursorInfo {
    /// Named CSS cursor override (e.g. `"pointer"`); takes precedence.
    pub css_override: Option<String>,
    /// Custom cursor bitmap (PNG bytes); used when non-empty and no
    /// override is set.
    pub image_bytes: Vec<u8>,
    /// Bitmap hotspot in pixels.
    pub hotspot_x: i32,
    pub hotspot_y: i32,
}

/// The resolved rendering of a [`CursorInfo`].
#[derive(Debug, PartialEq)]
pub enum CursorRendering<'a> {
    Named(&'a str),
    Bitmap {
        png: &'a [u8],
        hotspot: (i32, i32),
    },
    Default,
}

impl CursorInfo {
    /// Resolve the precedence order: override, then non-empty bitmap,
    /// then default.
    pub fn rendering(&self) -> CursorRendering<'_> {
        if let Some(css) = self.css_override.as_deref() {
            CursorRendering::Named(css)
        } else if !self.image_bytes.is_empty() {
            CursorRendering::Bitmap {
                png: &self.image_bytes,
                hotspot: (self.hotspot_x, self.hotspot_y),
            }
        } else {
            CursorRendering::Default
        }
    }
}

// ── ViewerMessage ────────────────────────────────────────────────

/// Viewer → host messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ViewerMessage {
    /// Opens the session: sent immediately once the channel is up.
    ScreenCastRequest {
        client_id: String,
        requester_name: String,
        mode: RemoteControlMode,
    },
    /// Any streaming-time event.
    Event(InputEvent),
}

// ── HostMessage ──────────────────────────────────────────────────

/// Host → viewer messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HostMessage {
    /// Available screens and which one is primary.
    ScreenCount { primary_index: u32, count: u32 },
    /// Dimensions of the streamed screen.
    ScreenSize { width: u32, height: u32 },
    /// One encoded dirty region.
    ScreenCapture {
        payload: Vec<u8>,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        /// Capture wall-clock timestamp, unix-epoch milliseconds; the
        /// viewer derives its latency report from this.
        captured_at_ms: u64,
    },
    CursorChange(CursorInfo),
    /// Host is requesting operator approval for the cast.
    RequestingScreenCast,
    /// Host-side capture process is crossing a desktop boundary and
    /// will relaunch.
    SwitchingDesktops,
    /// Host expects the viewer to re-establish the channel shortly.
    Reconnecting,
    /// The relaunched capture process is up under a new identity; the
    /// viewer must reconnect using it.
    RelaunchedScreenCasterReady { new_client_id: String },
    // Terminal messages: the channel stops after any of these.
    ConnectionFailed,
    ViewerRemoved,
    SessionIdNotFound,
    ScreenCasterDisconnected,
}

impl HostMessage {
    /// Whether receiving this message terminates the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HostMessage::ConnectionFailed
                | HostMessage::ViewerRemoved
                | HostMessage::SessionIdNotFound
                | HostMessage::ScreenCasterDisconnected
        )
    }
}

// ── SessionMessage ───────────────────────────────────────────────

/// The single wire envelope carried by the session channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SessionMessage {
    Viewer(ViewerMessage),
    Host(HostMessage),
}

impl SessionMessage {
    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CastError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CastError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl From<ViewerMessage> for SessionMessage {
    fn from(m: ViewerMessage) -> Self {
        SessionMessage::Viewer(m)
    }
}

impl From<HostMessage> for SessionMessage {
    fn from(m: HostMessage) -> Self {
        SessionMessage::Host(m)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_request_roundtrip() {
        let msg = SessionMessage::Viewer(ViewerMessage::ScreenCastRequest {
            client_id: "abc-123".into(),
            requester_name: "jordan".into(),
            mode: RemoteControlMode::Unattended,
        });
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(SessionMessage::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn screen_capture_roundtrip() {
        let msg = SessionMessage::Host(HostMessage::ScreenCapture {
            payload: vec![0xAB; 64],
            left: 10,
            top: 20,
            width: 300,
            height: 200,
            captured_at_ms: 1_724_000_000_000,
        });
        let bytes = msg.to_bytes().unwrap();
        assert_eq!(SessionMessage::from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn input_event_roundtrips() {
        let events = vec![
            InputEvent::MouseMove {
                percent_x: 0.25,
                percent_y: 0.75,
            },
            InputEvent::MouseDown {
                button: MouseButton::Left,
                percent_x: 0.5,
                percent_y: 0.5,
            },
            InputEvent::KeyPress { key: "Enter".into() },
            InputEvent::Tap {
                percent_x: 0.1,
                percent_y: 0.9,
            },
            InputEvent::CtrlAltDel {
                service_id: "svc-9".into(),
            },
            InputEvent::SharedFileIds {
                ids: vec!["f1".into(), "f2".into()],
            },
            InputEvent::LatencyReport { millis: 340 },
        ];
        for event in events {
            let msg = SessionMessage::Viewer(ViewerMessage::Event(event));
            let bytes = msg.to_bytes().unwrap();
            assert_eq!(SessionMessage::from_bytes(&bytes).unwrap(), msg);
        }
    }

    #[test]
    fn injected_vs_session_events() {
        assert!(
            InputEvent::MouseMove {
                percent_x: 0.0,
                percent_y: 0.0
            }
            .is_injected()
        );
        assert!(InputEvent::TouchDown.is_injected());
        assert!(
            InputEvent::CtrlAltDel {
                service_id: String::new()
            }
            .is_injected()
        );
        assert!(!InputEvent::SelectScreen { index: 1 }.is_injected());
        assert!(!InputEvent::QualityChange { level: 3 }.is_injected());
        assert!(!InputEvent::LatencyReport { millis: 10 }.is_injected());
        assert!(!InputEvent::SharedFileIds { ids: vec![] }.is_injected());
    }

    #[test]
    fn cursor_precedence() {
        let named = CursorInfo {
            css_override: Some("pointer".into()),
            image_bytes: vec![1, 2, 3],
            hotspot_x: 4,
            hotspot_y: 5,
        };
        assert_eq!(named.rendering(), CursorRendering::Named("pointer"));

        let bitmap = CursorInfo {
            css_override: None,
            image_bytes: vec![1, 2, 3],
            hotspot_x: 4,
            hotspot_y: 5,
        };
        assert_eq!(
            bitmap.rendering(),
            CursorRendering::Bitmap {
                png: &[1, 2, 3],
                hotspot: (4, 5)
            }
        );

        assert_eq!(CursorInfo::default().rendering(), CursorRendering::Default);
    }

    #[test]
    fn terminal_message_classification() {
        assert!(HostMessage::ConnectionFailed.is_terminal());
        assert!(HostMessage::ViewerRemoved.is_terminal());
        assert!(HostMessage::SessionIdNotFound.is_terminal());
        assert!(HostMessage::ScreenCasterDisconnected.is_terminal());
        assert!(!HostMessage::Reconnecting.is_terminal());
        assert!(!HostMessage::SwitchingDesktops.is_terminal());
        assert!(
            !HostMessage::ScreenSize {
                width: 1,
                height: 1
            }
            .is_terminal()
        );
    }
}
