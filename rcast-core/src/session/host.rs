//! Host-side session driver.
//!
//! Accepts (or denies) a viewer's cast request, then runs the paced
//! capture→diff→encode→send loop while routing inbound viewer events:
//! screen selection, quality and latency feedback are consumed here,
//! everything else is forwarded to the input-injection sink.
//!
//! One capture cycle runs to completion before the next; the send into
//! the capacity-1 channel queue is the throttle that bounds in-flight
//! frames on a slow viewer link. Operator actions (removing the viewer,
//! announcing a desktop switch) arrive through a cloneable
//! [`HostHandle`] and are processed by the streaming loop. Tearing the
//! session down drops the capture loop and with it the held previous
//! frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::channel::SessionChannel;
use crate::config::CastConfig;
use crate::error::CastError;
use crate::frame::capture::CaptureLoop;
use crate::frame::encoder::EncodedFrame;
use crate::message::{
    HostMessage, InputEvent, RemoteControlMode, SessionMessage, ViewerMessage,
};
use crate::source::{CaptureSource, InputSink};

// ── HostHandle ───────────────────────────────────────────────────

enum HostCommand {
    RemoveViewer,
    SwitchDesktops { new_client_id: String },
}

/// Cloneable handle for controlling a running [`HostSession`] from
/// another task. Commands are queued and processed by the session's
/// streaming loop.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<HostCommand>,
}

impl HostHandle {
    /// Forcibly remove the viewer: the session sends `ViewerRemoved`
    /// and stops.
    pub async fn remove_viewer(&self) -> Result<(), CastError> {
        self.tx
            .send(HostCommand::RemoveViewer)
            .await
            .map_err(|_| CastError::ChannelClosed)
    }

    /// Announce a desktop-context switch: the capture process is about
    /// to relaunch under `new_client_id` and the viewer must reconnect
    /// to it. The session stops after the announcement.
    pub async fn announce_desktop_switch(
        &self,
        new_client_id: impl Into<String>,
    ) -> Result<(), CastError> {
        self.tx
            .send(HostCommand::SwitchDesktops {
                new_client_id: new_client_id.into(),
            })
            .await
            .map_err(|_| CastError::ChannelClosed)
    }
}

// ── HostSession ──────────────────────────────────────────────────

/// Host end of one screen-cast session.
pub struct HostSession<C, I> {
    channel: SessionChannel,
    source: C,
    sink: I,
    config: CastConfig,
    capture: CaptureLoop,
    running: Arc<AtomicBool>,
    commands_tx: mpsc::Sender<HostCommand>,
    commands: mpsc::Receiver<HostCommand>,
}

impl<C: CaptureSource, I: InputSink> HostSession<C, I> {
    pub fn new(channel: SessionChannel, source: C, sink: I, config: CastConfig) -> Self {
        let capture = CaptureLoop::new(&config);
        let (commands_tx, commands) = mpsc::channel(8);
        Self {
            channel,
            source,
            sink,
            config,
            capture,
            running: Arc::new(AtomicBool::new(false)),
            commands_tx,
            commands,
        }
    }

    /// A cloneable control handle for the session; commands are
    /// processed while [`run`](Self::run) is streaming.
    pub fn handle(&self) -> HostHandle {
        HostHandle {
            tx: self.commands_tx.clone(),
        }
    }

    /// A cloneable handle that stops the session from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Serve the session: handshake, then stream until the viewer goes
    /// away, a [`HostHandle`] command stops it, or
    /// [`stop_handle`](Self::stop_handle) flips.
    pub async fn run(&mut self) -> Result<(), CastError> {
        self.running.store(true, Ordering::SeqCst);

        if !self.handshake().await? {
            return Ok(());
        }
        self.stream().await
    }

    async fn dispatch(&mut self, command: HostCommand) -> Result<(), CastError> {
        match command {
            HostCommand::RemoveViewer => self.remove_viewer().await,
            HostCommand::SwitchDesktops { new_client_id } => {
                self.announce_desktop_switch(new_client_id).await
            }
        }
    }

    /// Terminal message, then stop.
    async fn remove_viewer(&mut self) -> Result<(), CastError> {
        self.channel.send(HostMessage::ViewerRemoved).await?;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Switch announcement sequence, then stop. The relaunched caster
    /// serves the viewer's next connection under its new identity.
    async fn announce_desktop_switch(&mut self, new_client_id: String) -> Result<(), CastError> {
        self.channel.send(HostMessage::SwitchingDesktops).await?;
        self.channel.send(HostMessage::Reconnecting).await?;
        self.channel
            .send(HostMessage::RelaunchedScreenCasterReady { new_client_id })
            .await?;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    // ── Handshake ────────────────────────────────────────────────

    /// Wait for the cast request and apply the accept policy.
    ///
    /// Returns `false` when the request was denied or never arrived.
    async fn handshake(&mut self) -> Result<bool, CastError> {
        let request = match self.channel.recv().await {
            Some(SessionMessage::Viewer(ViewerMessage::ScreenCastRequest {
                client_id,
                requester_name,
                mode,
            })) => (client_id, requester_name, mode),
            Some(other) => {
                warn!(?other, "expected a cast request first");
                self.channel.send(HostMessage::ConnectionFailed).await?;
                return Ok(false);
            }
            None => return Ok(false),
        };

        let (client_id, requester_name, mode) = request;
        info!(%client_id, %requester_name, ?mode, "screen cast requested");
        self.channel.send(HostMessage::RequestingScreenCast).await?;

        let accepted = mode == RemoteControlMode::Unattended || self.config.auto_accept;
        if !accepted {
            info!(%requester_name, "cast request denied");
            self.channel.send(HostMessage::ConnectionFailed).await?;
            return Ok(false);
        }

        let (primary_index, count) = self.source.screen_layout();
        let (width, height) = self.source.screen_size();
        self.channel
            .send(HostMessage::ScreenCount {
                primary_index,
                count,
            })
            .await?;
        self.channel
            .send(HostMessage::ScreenSize { width, height })
            .await?;
        Ok(true)
    }

    // ── Streaming ────────────────────────────────────────────────

    async fn stream(&mut self) -> Result<(), CastError> {
        let mut ticker = tokio::time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {
                    self.capture_tick().await?;
                }
                inbound = self.channel.recv() => {
                    match inbound {
                        Some(message) => self.route(message).await,
                        None => {
                            info!("viewer disconnected");
                            break;
                        }
                    }
                }
                command = self.commands.recv() => {
                    // The sender held by self keeps this channel open,
                    // so recv only yields real commands.
                    if let Some(command) = command {
                        self.dispatch(command).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn capture_tick(&mut self) -> Result<(), CastError> {
        let frame = match self.source.next_frame().await {
            Ok(f) => f,
            Err(e) => {
                // No frame this tick (capture timeout etc.) — skip.
                debug!(error = %e, "capture yielded no frame");
                return Ok(());
            }
        };

        if let Some(encoded) = self.capture.tick(frame) {
            self.send_frame(encoded).await?;
        }

        if let Some(cursor) = self.source.poll_cursor() {
            self.channel.send(HostMessage::CursorChange(cursor)).await?;
        }
        Ok(())
    }

    async fn send_frame(&mut self, encoded: EncodedFrame) -> Result<(), CastError> {
        let EncodedFrame {
            region,
            payload,
            captured_at,
        } = encoded;
        self.channel
            .send(HostMessage::ScreenCapture {
                payload,
                left: region.left,
                top: region.top,
                width: region.width,
                height: region.height,
                captured_at_ms: unix_millis_of(captured_at),
            })
            .await
    }

    async fn route(&mut self, message: SessionMessage) {
        let event = match message {
            SessionMessage::Viewer(ViewerMessage::Event(event)) => event,
            other => {
                warn!(?other, "unexpected message while streaming");
                return;
            }
        };

        match event {
            InputEvent::SelectScreen { index } => match self.source.select_screen(index) {
                Ok((width, height)) => {
                    self.capture.force_full_frame();
                    if let Err(e) = self
                        .channel
                        .send(HostMessage::ScreenSize { width, height })
                        .await
                    {
                        warn!(error = %e, "failed to announce new screen size");
                    }
                }
                Err(e) => warn!(index, error = %e, "screen selection failed"),
            },
            InputEvent::QualityChange { level } => self.capture.set_quality_level(level),
            InputEvent::LatencyReport { millis } => {
                self.capture
                    .record_latency(std::time::Duration::from_millis(millis));
            }
            InputEvent::SharedFileIds { ids } => {
                // File transfer mechanics live outside this core.
                debug!(count = ids.len(), "shared file ids announced");
            }
            injected => {
                if let Err(e) = self.sink.inject(injected).await {
                    warn!(error = %e, "input injection failed");
                }
            }
        }
    }
}

/// Wall-clock unix-epoch milliseconds of a monotonic capture instant.
fn unix_millis_of(captured_at: Instant) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.saturating_sub(captured_at.elapsed()).as_millis() as u64
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn capture_instant_maps_into_the_past() {
        let t = Instant::now();
        std::thread::sleep(Duration::from_millis(5));
        let stamped = unix_millis_of(t);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        assert!(stamped <= now);
        assert!(now - stamped < 1000);
    }
}
