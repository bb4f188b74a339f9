//! # rcast-core
//!
//! The capture-and-transport core of a screen-sharing product.
//!
//! This crate contains:
//! - **Frame pipeline**: `PixelBuffer`, bounding-box diffing with merged
//!   deltas, region encoding, and the per-session `CaptureLoop` with
//!   latency-driven quality control
//! - **Messages**: the typed viewer↔host catalogue (`SessionMessage`)
//! - **Codec / channel**: `CastCodec` framing and the `SessionChannel`
//!   pump over TCP via `tokio_util`
//! - **Session**: the lifecycle state machine and the `ViewerSession` /
//!   `HostSession` drivers
//! - **Error**: `CastError` — typed, `thiserror`-based error hierarchy
//!
//! OS capture, input injection and rendering are external collaborators
//! behind the `source` traits and the viewer event stream.

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod session;
pub mod source;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use channel::{Connector, SessionChannel, SessionSender, TcpConnector};
pub use codec::{CastCodec, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use config::CastConfig;
pub use error::CastError;
pub use frame::{
    CaptureLoop, DirtyRegion, EncodedFrame, FrameEncoder, LatencyController, PixelBuffer,
    PixelFormat,
};
pub use message::{
    CursorInfo, CursorRendering, HostMessage, InputEvent, MouseButton, RemoteControlMode,
    SessionMessage, ViewerMessage,
};
pub use session::{
    HostHandle, HostSession, Session, SessionState, TerminalFailure, ViewerEvent, ViewerHandle,
    ViewerSession,
};
pub use source::{CaptureSource, InputSink};
