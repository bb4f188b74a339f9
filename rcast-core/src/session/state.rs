//! Viewer-side session lifecycle state machine.
//!
//! Consolidates the lifecycle into one explicit machine with validated
//! transitions that return `Result` instead of panicking. Drivers log
//! and ignore invalid transitions; they never crash on them.
//!
//! ```text
//! Idle → Connecting → AwaitingAcceptance → Streaming ⇄ Reconnecting
//!                                              │
//!                                              ▼
//!                                            Ended
//! ```
//!
//! Terminal failures (`ConnectionFailed`, `SessionNotFound`,
//! `HostDisconnected`, `RemovedByHost`) are reachable from any
//! non-terminal, non-idle state, and so is `Ended` — the viewer may
//! abort mid-handshake. Nothing is sent or processed after a terminal
//! state is entered.

use std::fmt;
use std::time::Instant;

use crate::error::CastError;
use crate::message::{HostMessage, RemoteControlMode};

// ── TerminalFailure ──────────────────────────────────────────────

/// Why a session ended abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalFailure {
    /// The host denied the request or the transport failed.
    ConnectionFailed,
    /// The requested session id is unknown.
    SessionNotFound,
    /// The host-side caster went away.
    HostDisconnected,
    /// The host operator removed this viewer.
    RemovedByHost,
}

impl TerminalFailure {
    /// Map a terminal host message onto its failure, if it is one.
    pub fn from_message(message: &HostMessage) -> Option<Self> {
        match message {
            HostMessage::ConnectionFailed => Some(Self::ConnectionFailed),
            HostMessage::SessionIdNotFound => Some(Self::SessionNotFound),
            HostMessage::ScreenCasterDisconnected => Some(Self::HostDisconnected),
            HostMessage::ViewerRemoved => Some(Self::RemovedByHost),
            _ => None,
        }
    }

    /// Human-readable status line for the viewer UI.
    pub fn status_message(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "Connection failed or was denied.",
            Self::SessionNotFound => "Session ID not found.",
            Self::HostDisconnected => "The host has disconnected.",
            Self::RemovedByHost => "The session was stopped by your partner.",
        }
    }
}

// ── SessionState ─────────────────────────────────────────────────

/// The current phase of a viewer session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No connection attempt yet. Initial state.
    #[default]
    Idle,
    /// Channel establishment in progress.
    Connecting,
    /// Cast request sent; waiting for the host's first screen message.
    AwaitingAcceptance,
    /// Frames are flowing.
    Streaming {
        /// When streaming (last) started.
        since: Instant,
    },
    /// Host is relaunching its caster; the channel is being replaced.
    Reconnecting,
    /// Viewer closed the session normally. Terminal.
    Ended,
    /// Abnormal termination. Terminal.
    Failed(TerminalFailure),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::AwaitingAcceptance => write!(f, "AwaitingAcceptance"),
            Self::Streaming { .. } => write!(f, "Streaming"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Ended => write!(f, "Ended"),
            Self::Failed(reason) => write!(f, "Failed({reason:?})"),
        }
    }
}

impl SessionState {
    /// Whether the session has reached a state it can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed(_))
    }

    /// Whether frames and input may flow right now.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Idle`, `Reconnecting` (relaunched-caster handshake).
    pub fn begin_connect(&mut self) -> Result<(), CastError> {
        match self {
            Self::Idle | Self::Reconnecting => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot connect: not Idle or Reconnecting",
            )),
        }
    }

    /// Channel is up and the cast request has been sent.
    ///
    /// Valid from: `Connecting`.
    pub fn channel_established(&mut self) -> Result<(), CastError> {
        match self {
            Self::Connecting => {
                *self = Self::AwaitingAcceptance;
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot await acceptance: not Connecting",
            )),
        }
    }

    /// First `ScreenSize`/`ScreenCount` arrived from the host.
    ///
    /// Valid from: `AwaitingAcceptance`.
    pub fn streaming_started(&mut self) -> Result<(), CastError> {
        match self {
            Self::AwaitingAcceptance => {
                *self = Self::Streaming {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot start streaming: not AwaitingAcceptance",
            )),
        }
    }

    /// Host announced a desktop switch / caster relaunch.
    ///
    /// Valid from: `Streaming`.
    pub fn begin_reconnect(&mut self) -> Result<(), CastError> {
        match self {
            Self::Streaming { .. } => {
                *self = Self::Reconnecting;
                Ok(())
            }
            _ => Err(CastError::InvalidTransition(
                "cannot reconnect: not Streaming",
            )),
        }
    }

    /// Viewer closed the session. Aborting mid-handshake ends the
    /// session the same way an active stream does.
    ///
    /// Valid from: any non-terminal state except `Idle`.
    pub fn end(&mut self) -> Result<(), CastError> {
        match self {
            Self::Idle | Self::Ended | Self::Failed(_) => Err(CastError::InvalidTransition(
                "cannot end: session not active",
            )),
            _ => {
                *self = Self::Ended;
                Ok(())
            }
        }
    }

    /// Enter a terminal failure.
    ///
    /// Valid from: any non-terminal state except `Idle`.
    pub fn fail(&mut self, reason: TerminalFailure) -> Result<(), CastError> {
        match self {
            Self::Idle | Self::Ended | Self::Failed(_) => Err(CastError::InvalidTransition(
                "cannot fail: session not active",
            )),
            _ => {
                *self = Self::Failed(reason);
                Ok(())
            }
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// One end-to-end viewer↔host screen-sharing connection.
///
/// Owned by the session driver; the state is mutated only through the
/// transition methods above.
#[derive(Debug, Clone)]
pub struct Session {
    /// Host caster identity; replaced when the caster relaunches.
    pub client_id: String,
    /// Host service identity, used for privileged actions (CtrlAltDel).
    pub service_id: String,
    pub mode: RemoteControlMode,
    pub requester_name: String,
    pub selected_screen_index: u32,
    pub quality_level: u8,
    state: SessionState,
}

impl Session {
    pub fn new(
        client_id: impl Into<String>,
        service_id: impl Into<String>,
        requester_name: impl Into<String>,
        mode: RemoteControlMode,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            service_id: service_id.into(),
            mode,
            requester_name: requester_name.into(),
            selected_screen_index: 0,
            quality_level: crate::frame::quality::MAX_QUALITY_LEVEL,
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Adopt the relaunched caster's identity before reconnecting.
    pub fn adopt_client_id(&mut self, new_client_id: impl Into<String>) {
        self.client_id = new_client_id.into();
    }
}

// ── Tests ────────────────────────────────────────────────────────
