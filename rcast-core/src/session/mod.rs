//! Session protocol: lifecycle state machine plus the viewer and host
//! drivers that speak it over a [`crate::channel::SessionChannel`].

pub mod host;
pub mod state;
pub mod viewer;

pub use host::{HostHandle, HostSession};
pub use state::{Session, SessionState, TerminalFailure};
pub use viewer::{ViewerEvent, ViewerHandle, ViewerSession};
