//! Sender-authenticated message transports.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ConnectorError;
use crate::message::Envelope;

/// Carries envelopes to the other side of a trust boundary.
///
/// Implementations set `sender` to the identity of whoever owns the
/// transport, overwriting anything the payload's author put there.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), ConnectorError>;
}

/// In-process transport over a tokio channel, stamping a fixed sender id.
#[derive(Clone)]
pub struct LocalTransport {
    sender_id: String,
    tx: mpsc::Sender<Envelope>,
}

impl LocalTransport {
    /// A transport and the receiving end of its channel.
    pub fn channel(sender_id: impl Into<String>, buffer: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(sender_id, tx), rx)
    }

    /// Another transport into an existing channel, with its own sender id.
    pub fn new(sender_id: impl Into<String>, tx: mpsc::Sender<Envelope>) -> Self {
        Self {
            sender_id: sender_id.into(),
            tx,
        }
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, mut envelope: Envelope) -> Result<(), ConnectorError> {
        envelope.sender.clone_from(&self.sender_id);
        self.tx
            .send(envelope)
            .await
            .map_err(|_| ConnectorError::Transport("receiver dropped".to_string()))
    }
}
