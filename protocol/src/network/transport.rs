//! The outbound half of a peer connection.
//!
//! The sync loop does not care whether its peer is a TCP socket, a QUIC
//! stream or a channel in the same process. It needs exactly one thing:
//! hand a message over and learn whether that worked.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::message::PeerMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The other end has gone away.
    #[error("peer connection closed")]
    Closed,

    #[error("failed to encode message: {0}")]
    Encode(String),
}

#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send_data(&self, message: PeerMessage) -> Result<(), TransportError>;
}

/// Transport backed by a bounded `mpsc` channel of encoded messages.
///
/// Sending waits for capacity, so a slow receiver applies backpressure to
/// the sync loop instead of growing an unbounded queue.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    sender: mpsc::Sender<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new(sender: mpsc::Sender<Vec<u8>>) -> Self {
        Self { sender }
    }

    /// A transport and the receiving end it feeds.
    pub fn pair(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl PeerTransport for ChannelTransport {
    async fn send_data(&self, message: PeerMessage) -> Result<(), TransportError> {
        let bytes = message
            .to_bytes()
            .map_err(|e| TransportError::Encode(e.to_string()))?;
        self.sender
            .send(bytes)
            .await
            .map_err(|_| TransportError::Closed)
    }
}
