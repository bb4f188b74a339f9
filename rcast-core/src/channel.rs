//! The persistent bidirectional session channel.
//!
//! Wraps a TCP stream in the [`CastCodec`] framing and pumps it with a
//! background reader and writer task, exposing plain `send`/`recv`
//! handles. The outbound queue is capacity-1: a send awaits until the
//! previous message has been handed to the socket writer, which is what
//! bounds in-flight frames and throttles the capture tick on a slow
//! link instead of queueing unboundedly.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::warn;

use crate::codec::CastCodec;
use crate::error::CastError;
use crate::message::SessionMessage;

/// Cloneable outbound handle.
pub type SessionSender = mpsc::Sender<SessionMessage>;

const OUTBOUND_CAPACITY: usize = 1;
const INBOUND_CAPACITY: usize = 64;

/// One end of an established session channel.
///
/// Dropping the channel (or either peer closing the socket) ends both
/// pump tasks; `recv` then yields `None`, which callers that have not
/// seen a terminal message surface as a connection failure.
#[derive(Debug)]
pub struct SessionChannel {
    tx: SessionSender,
    rx: mpsc::Receiver<SessionMessage>,
}

impl SessionChannel {
    /// Wrap an already-connected stream.
    pub fn new(stream: TcpStream) -> Self {
        let (mut net_writer, mut net_reader) = Framed::new(stream, CastCodec).split();

        let (user_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, user_rx) = mpsc::channel(INBOUND_CAPACITY);

        // Writer task: user → network.
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if let Err(e) = net_writer.send(message).await {
                    warn!(error = %e, "session channel write failed");
                    break;
                }
            }
        });

        // Reader task: network → user.
        tokio::spawn(async move {
            while let Some(result) = net_reader.next().await {
                match result {
                    Ok(message) => {
                        if inbound_tx.send(message).await.is_err() {
                            break; // receiver dropped
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "session channel read failed");
                        break;
                    }
                }
            }
        });

        Self {
            tx: user_tx,
            rx: user_rx,
        }
    }

    /// Dial a host and wrap the resulting stream.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, CastError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    /// Queue a message for transmission. Awaits while the previous
    /// message is still in flight.
    pub async fn send(&self, message: impl Into<SessionMessage>) -> Result<(), CastError> {
        self.tx.send(message.into()).await.map_err(CastError::from)
    }

    /// Receive the next inbound message; `None` once the transport is
    /// gone.
    pub async fn recv(&mut self) -> Option<SessionMessage> {
        self.rx.recv().await
    }

    /// A cloneable outbound handle for fire-and-forget senders.
    pub fn sender(&self) -> SessionSender {
        self.tx.clone()
    }
}

// ── Connector ────────────────────────────────────────────────────

/// Channel factory the viewer uses for the initial connection and for
/// reconnecting under a relaunched host identity.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<SessionChannel, CastError>;
}

/// Plain TCP connector.
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<SessionChannel, CastError> {
        SessionChannel::connect(self.addr.as_str()).await
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{HostMessage, InputEvent, ViewerMessage};
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (SessionChannel, SessionChannel) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { SessionChannel::connect(addr).await.unwrap() });
        let (stream, _) = listener.accept().await.unwrap();
        let server = SessionChannel::new(stream);
        (client.await.unwrap(), server)
    }

    #[tokio::test]
    async fn messages_cross_the_channel_in_order() {
        let (viewer, mut host) = connected_pair().await;

        viewer
            .send(ViewerMessage::Event(InputEvent::TouchDown))
            .await
            .unwrap();
        viewer
            .send(ViewerMessage::Event(InputEvent::TouchUp))
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), host.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), host.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            first,
            SessionMessage::Viewer(ViewerMessage::Event(InputEvent::TouchDown))
        );
        assert_eq!(
            second,
            SessionMessage::Viewer(ViewerMessage::Event(InputEvent::TouchUp))
        );
    }

    #[tokio::test]
    async fn outbound_queue_admits_one_in_flight_message() {
        let (viewer, _host) = connected_pair().await;
        let tx = viewer.sender();
        assert_eq!(tx.max_capacity(), 1);

        // Occupy the single slot; the next send must not be admitted
        // until it frees up.
        let permit = tx.reserve().await.unwrap();
        let full = tx.try_send(SessionMessage::Viewer(ViewerMessage::Event(
            InputEvent::TouchDown,
        )));
        assert!(matches!(
            full,
            Err(mpsc::error::TrySendError::Full(_))
        ));

        drop(permit);
        viewer
            .send(ViewerMessage::Event(InputEvent::TouchUp))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn peer_drop_yields_none() {
        let (viewer, mut host) = connected_pair().await;
        drop(viewer);

        let got = tokio::time::timeout(Duration::from_secs(5), host.recv())
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn large_frame_payload_survives_framing() {
        let (viewer, mut host) = connected_pair().await;

        let payload = vec![0x5A; 2 * 1024 * 1024];
        let msg = HostMessage::ScreenCapture {
            payload: payload.clone(),
            left: 0,
            top: 0,
            width: 1024,
            height: 512,
            captured_at_ms: 42,
        };
        host.send(msg.clone()).await.unwrap();

        let mut viewer = viewer;
        let got = tokio::time::timeout(Duration::from_secs(5), viewer.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, SessionMessage::Host(msg));
    }
}
