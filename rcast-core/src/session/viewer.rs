//! Viewer-side session driver.
//!
//! Connects, sends the cast request, and consumes host messages by
//! exhaustive match. Decoded frame regions, cursor updates, screen
//! layout and status text are published as [`ViewerEvent`]s for an
//! external renderer; input events flow in through a [`ViewerHandle`]
//! and are forwarded only while streaming.
//!
//! Terminal messages stop the channel immediately: nothing is sent or
//! processed afterwards. A transport drop without a terminal message
//! surfaces as a connection failure rather than hanging silently. When
//! the host relaunches its caster, the session adopts the new client
//! id and replays the connect handshake while the user-visible session
//! survives.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::{Connector, SessionChannel};
use crate::error::CastError;
use crate::frame::diff::DirtyRegion;
use crate::frame::encoder;
use crate::message::{CursorInfo, HostMessage, InputEvent, SessionMessage, ViewerMessage};
use crate::session::state::{Session, TerminalFailure};

// ── ViewerEvent ──────────────────────────────────────────────────

/// What the session surfaces to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    /// Available screens on the host.
    ScreenLayout { primary_index: u32, count: u32 },
    /// Dimensions of the streamed screen (viewport must resize).
    ScreenSize { width: u32, height: u32 },
    /// One decoded dirty region: tightly packed `width * 4`-byte rows
    /// to draw at `(left, top)`.
    FrameRegion {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    },
    CursorChanged(CursorInfo),
    /// Human-readable status line.
    Status(&'static str),
}

// ── ViewerHandle ─────────────────────────────────────────────────

enum ViewerCommand {
    Event(InputEvent),
    End,
}

/// Cloneable handle for feeding input into a running session.
#[derive(Clone)]
pub struct ViewerHandle {
    tx: mpsc::Sender<ViewerCommand>,
}

impl ViewerHandle {
    /// Queue an input event; dropped (with a warning) unless the
    /// session is streaming.
    pub async fn send_event(&self, event: InputEvent) -> Result<(), CastError> {
        self.tx
            .send(ViewerCommand::Event(event))
            .await
            .map_err(|_| CastError::ChannelClosed)
    }

    /// End the session normally.
    pub async fn end(&self) -> Result<(), CastError> {
        self.tx
            .send(ViewerCommand::End)
            .await
            .map_err(|_| CastError::ChannelClosed)
    }
}

// ── ViewerSession ────────────────────────────────────────────────

/// Viewer end of one screen-cast session.
pub struct ViewerSession<C> {
    session: Session,
    connector: C,
    events: mpsc::Sender<ViewerEvent>,
    commands: mpsc::Receiver<ViewerCommand>,
}

/// Where the inner message loop left off.
enum Flow {
    /// Relaunched caster: replace the channel and re-handshake.
    Reconnect,
    /// Terminal host message consumed; session state already failed.
    Terminal,
    /// Transport dropped without a terminal message.
    Dropped,
    /// Viewer asked to end.
    End,
}

impl<C: Connector> ViewerSession<C> {
    pub fn new(
        session: Session,
        connector: C,
    ) -> (Self, ViewerHandle, mpsc::Receiver<ViewerEvent>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (command_tx, command_rx) = mpsc::channel(64);
        (
            Self {
                session,
                connector,
                events: event_tx,
                commands: command_rx,
            },
            ViewerHandle { tx: command_tx },
            event_rx,
        )
    }

    /// Drive the session to a terminal state; returns the final
    /// [`Session`] record for inspection.
    pub async fn run(self) -> Result<Session, CastError> {
        let ViewerSession {
            mut session,
            connector,
            events,
            mut commands,
        } = self;

        loop {
            if let Err(e) = session.state_mut().begin_connect() {
                warn!(error = %e, state = %session.state(), "connect not possible");
                return Ok(session);
            }
            emit(&events, ViewerEvent::Status("Sending connection request...")).await;

            let mut channel = match connector.connect().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "channel establishment failed");
                    fail(&mut session, &events, TerminalFailure::ConnectionFailed).await;
                    return Ok(session);
                }
            };

            let request = ViewerMessage::ScreenCastRequest {
                client_id: session.client_id.clone(),
                requester_name: session.requester_name.clone(),
                mode: session.mode,
            };
            if channel.send(request).await.is_err() {
                fail(&mut session, &events, TerminalFailure::ConnectionFailed).await;
                return Ok(session);
            }
            if let Err(e) = session.state_mut().channel_established() {
                warn!(error = %e, "handshake bookkeeping failed");
            }

            let flow = message_loop(&mut session, &events, &mut commands, &mut channel).await;
            // Dropping the channel stops both pump tasks and guarantees
            // no further messages are sent or processed.
            drop(channel);

            match flow {
                Flow::Reconnect => {
                    info!(client_id = %session.client_id, "reconnecting to relaunched caster");
                    continue;
                }
                Flow::Terminal => return Ok(session),
                Flow::Dropped => {
                    fail(&mut session, &events, TerminalFailure::ConnectionFailed).await;
                    return Ok(session);
                }
                Flow::End => {
                    if let Err(e) = session.state_mut().end() {
                        warn!(error = %e, state = %session.state(), "end requested in inactive state");
                    }
                    return Ok(session);
                }
            }
        }
    }
}

// ── Inner loop ───────────────────────────────────────────────────

async fn message_loop(
    session: &mut Session,
    events: &mpsc::Sender<ViewerEvent>,
    commands: &mut mpsc::Receiver<ViewerCommand>,
    channel: &mut SessionChannel,
) -> Flow {
    loop {
        tokio::select! {
            inbound = channel.recv() => {
                let message = match inbound {
                    Some(SessionMessage::Host(m)) => m,
                    Some(other) => {
                        warn!(?other, "unexpected viewer-bound message");
                        continue;
                    }
                    None => return Flow::Dropped,
                };
                if let Some(flow) = handle_host_message(session, events, channel, message).await {
                    return flow;
                }
            }
            command = commands.recv() => {
                match command {
                    Some(ViewerCommand::Event(event)) => {
                        if !session.state().is_streaming() {
                            warn!(state = %session.state(), "dropping input outside Streaming");
                            continue;
                        }
                        if let InputEvent::SelectScreen { index } = &event {
                            session.selected_screen_index = *index;
                        }
                        if let InputEvent::QualityChange { level } = &event {
                            session.quality_level = *level;
                        }
                        if channel.send(ViewerMessage::Event(event)).await.is_err() {
                            return Flow::Dropped;
                        }
                    }
                    Some(ViewerCommand::End) | None => return Flow::End,
                }
            }
        }
    }
}

/// Exhaustive host-message dispatch. Returns `Some(flow)` when the
/// inner loop must stop.
async fn handle_host_message(
    session: &mut Session,
    events: &mpsc::Sender<ViewerEvent>,
    channel: &SessionChannel,
    message: HostMessage,
) -> Option<Flow> {
    if let Some(reason) = TerminalFailure::from_message(&message) {
        fail(session, events, reason).await;
        return Some(Flow::Terminal);
    }

    match message {
        HostMessage::ScreenCount {
            primary_index,
            count,
        } => {
            mark_streaming(session);
            emit(
                events,
                ViewerEvent::ScreenLayout {
                    primary_index,
                    count,
                },
            )
            .await;
        }
        HostMessage::ScreenSize { width, height } => {
            mark_streaming(session);
            emit(events, ViewerEvent::ScreenSize { width, height }).await;
        }
        HostMessage::ScreenCapture {
            payload,
            left,
            top,
            width,
            height,
            captured_at_ms,
        } => {
            if !session.state().is_streaming() {
                warn!(state = %session.state(), "frame received outside Streaming");
                return None;
            }

            // Report observed delivery latency before doing any work.
            let latency = unix_millis_now().saturating_sub(captured_at_ms);
            if channel
                .send(ViewerMessage::Event(InputEvent::LatencyReport {
                    millis: latency,
                }))
                .await
                .is_err()
            {
                return Some(Flow::Dropped);
            }

            let region = DirtyRegion {
                left,
                top,
                width,
                height,
            };
            match encoder::decode(&payload, &region) {
                Ok(pixels) => {
                    emit(
                        events,
                        ViewerEvent::FrameRegion {
                            left,
                            top,
                            width,
                            height,
                            pixels,
                        },
                    )
                    .await;
                }
                Err(e) => warn!(error = %e, "dropping undecodable frame"),
            }
        }
        HostMessage::CursorChange(cursor) => {
            emit(events, ViewerEvent::CursorChanged(cursor)).await;
        }
        HostMessage::RequestingScreenCast => {
            emit(events, ViewerEvent::Status("Requesting remote control...")).await;
        }
        HostMessage::SwitchingDesktops => {
            emit(events, ViewerEvent::Status("Switching desktops...")).await;
        }
        HostMessage::Reconnecting => {
            if session.state().is_streaming() {
                emit(events, ViewerEvent::Status("Reconnecting...")).await;
            } else {
                warn!(state = %session.state(), "Reconnecting signal outside Streaming");
            }
        }
        HostMessage::RelaunchedScreenCasterReady { new_client_id } => {
            match session.state_mut().begin_reconnect() {
                Ok(()) => {
                    session.adopt_client_id(new_client_id);
                    emit(events, ViewerEvent::Status("Reconnecting...")).await;
                    return Some(Flow::Reconnect);
                }
                Err(e) => warn!(error = %e, "relaunch signal outside Streaming"),
            }
        }
        // Terminal variants were consumed above.
        HostMessage::ConnectionFailed
        | HostMessage::ViewerRemoved
        | HostMessage::SessionIdNotFound
        | HostMessage::ScreenCasterDisconnected => unreachable!("handled as terminal"),
    }
    None
}

/// The first screen message from the host is the acceptance signal.
fn mark_streaming(session: &mut Session) {
    if session.state().is_streaming() {
        return;
    }
    if let Err(e) = session.state_mut().streaming_started() {
        warn!(error = %e, state = %session.state(), "screen message in unexpected state");
    } else {
        debug!("streaming started");
    }
}

async fn fail(session: &mut Session, events: &mpsc::Sender<ViewerEvent>, reason: TerminalFailure) {
    if let Err(e) = session.state_mut().fail(reason) {
        warn!(error = %e, "failure in non-failable state");
        return;
    }
    info!(reason = reason.status_message(), "session terminated");
    emit(events, ViewerEvent::Status(reason.status_message())).await;
}

async fn emit(events: &mpsc::Sender<ViewerEvent>, event: ViewerEvent) {
    // The renderer may be gone; the session outcome does not depend on it.
    let _ = events.send(event).await;
}

fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
