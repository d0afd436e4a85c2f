//! Bidirectional event transport abstraction.
//!
//! The channel adapter only needs something that can open a full-duplex
//! stream of text frames. Concrete wire protocols implement [`Transport`];
//! [`MemoryTransport`] connects the adapter to an in-process peer, which is
//! what tests and offline demos use.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use palaver_shared::constants::CHANNEL_QUEUE_CAPACITY;
use palaver_shared::protocol::{decode_frame, encode_frame, InboundEvent, OutboundEvent};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Connection closed")]
    Closed,

    #[error("Frame encoding error: {0}")]
    Encoding(String),
}

/// An open connection: frames written to `outbound` go to the remote end,
/// frames from the remote end arrive on `inbound`. `inbound` yielding `None`
/// means the connection dropped.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Perform the connect handshake.
    async fn connect(&self) -> Result<Connection, TransportError>;
}

// ---------------------------------------------------------------------------
// In-process transport
// ---------------------------------------------------------------------------

/// Client side of an in-process transport.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    accept_tx: mpsc::Sender<PeerConnection>,
}

/// Server side of an in-process transport; hands out one
/// [`PeerConnection`] per client connect.
#[derive(Debug)]
pub struct MemoryPeer {
    accept_rx: mpsc::Receiver<PeerConnection>,
}

/// The remote end of one in-process connection. Dropping it drops the
/// connection as seen by the client.
#[derive(Debug)]
pub struct PeerConnection {
    to_client: mpsc::Sender<String>,
    from_client: mpsc::Receiver<String>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let (accept_tx, accept_rx) = mpsc::channel(8);
        (MemoryTransport { accept_tx }, MemoryPeer { accept_rx })
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let (client_tx, client_rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);
        let (peer_tx, peer_rx) = mpsc::channel(CHANNEL_QUEUE_CAPACITY);

        self.accept_tx
            .send(PeerConnection {
                to_client: peer_tx,
                from_client: client_rx,
            })
            .await
            .map_err(|_| TransportError::Refused("in-process peer is gone".into()))?;

        Ok(Connection {
            outbound: client_tx,
            inbound: peer_rx,
        })
    }
}

impl MemoryPeer {
    /// Wait for the next client connection.
    pub async fn accept(&mut self) -> Option<PeerConnection> {
        self.accept_rx.recv().await
    }
}

impl PeerConnection {
    /// Push an event to the client.
    pub async fn send(&self, event: &InboundEvent) -> Result<(), TransportError> {
        let frame = encode_frame(event).map_err(|e| TransportError::Encoding(e.to_string()))?;
        self.send_raw(frame).await
    }

    /// Push a raw text frame to the client.
    pub async fn send_raw(&self, frame: String) -> Result<(), TransportError> {
        self.to_client
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Next event emitted by the client, skipping frames that do not parse.
    /// `None` once the client closed the connection.
    pub async fn recv(&mut self) -> Option<OutboundEvent> {
        while let Some(frame) = self.from_client.recv().await {
            match decode_frame(&frame) {
                Ok(event) => return Some(event),
                Err(e) => warn!(error = %e, "Peer received undecodable frame"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_shared::protocol::{JoinPayload, TypingPayload};

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (transport, mut peer) = MemoryTransport::pair();
        let mut conn = transport.connect().await.unwrap();
        let mut remote = peer.accept().await.unwrap();

        let join = OutboundEvent::Join(JoinPayload {
            user_id: "u1".into(),
            username: "alice".into(),
        });
        conn.outbound
            .send(encode_frame(&join).unwrap())
            .await
            .unwrap();
        assert_eq!(remote.recv().await, Some(join));

        let typing = InboundEvent::TypingStart(TypingPayload {
            username: "bob".into(),
            conversation_id: None,
        });
        remote.send(&typing).await.unwrap();
        let frame = conn.inbound.recv().await.unwrap();
        assert_eq!(decode_frame::<InboundEvent>(&frame).unwrap(), typing);
    }

    #[tokio::test]
    async fn test_connect_refused_without_peer() {
        let (transport, peer) = MemoryTransport::pair();
        drop(peer);
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::Refused(_))
        ));
    }

    #[tokio::test]
    async fn test_dropping_peer_connection_closes_inbound() {
        let (transport, mut peer) = MemoryTransport::pair();
        let mut conn = transport.connect().await.unwrap();
        let remote = peer.accept().await.unwrap();
        drop(remote);
        assert!(conn.inbound.recv().await.is_none());
    }
}
