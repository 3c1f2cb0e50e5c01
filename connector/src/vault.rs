//! The vault's approval surface.

use async_trait::async_trait;
use custody_types::CanisterId;
use tokio::sync::{mpsc, oneshot};

use crate::error::ConnectorError;
use crate::message::ConnectionInfo;

/// What the user is asked to approve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionPrompt {
    pub origin: String,
    pub whitelist: Vec<CanisterId>,
    pub host: Option<String>,
}

/// The user's answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Approval {
    Approved(ConnectionInfo),
    Denied(String),
}

/// The UI surface of an unlocked wallet, as seen by the relay.
#[async_trait]
pub trait VaultSurface: Send + Sync {
    /// Bring the surface up. [`ConnectorError::VaultNotReady`] means try again
    /// shortly; anything else is final.
    async fn wake(&self) -> Result<(), ConnectorError>;

    /// Ask the user. Resolves when they answer, which may be never.
    async fn request_connection(&self, prompt: ConnectionPrompt) -> Result<Approval, ConnectorError>;
}

/// A prompt waiting for the UI task's answer.
#[derive(Debug)]
pub struct PendingApproval {
    pub prompt: ConnectionPrompt,
    responder: oneshot::Sender<Approval>,
}

impl PendingApproval {
    pub fn approve(self, info: ConnectionInfo) {
        self.answer(Approval::Approved(info));
    }

    pub fn deny(self, reason: impl Into<String>) {
        self.answer(Approval::Denied(reason.into()));
    }

    fn answer(self, approval: Approval) {
        if self.responder.send(approval).is_err() {
            tracing::debug!(origin = %self.prompt.origin, "approval arrived after the request settled");
        }
    }
}

/// Forwards prompts to a UI task over a channel.
#[derive(Clone)]
pub struct ChannelVault {
    tx: mpsc::Sender<PendingApproval>,
}

impl ChannelVault {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<PendingApproval>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl VaultSurface for ChannelVault {
    async fn wake(&self) -> Result<(), ConnectorError> {
        if self.tx.is_closed() {
            Err(ConnectorError::VaultNotReady)
        } else {
            Ok(())
        }
    }

    async fn request_connection(&self, prompt: ConnectionPrompt) -> Result<Approval, ConnectorError> {
        let (responder, answer) = oneshot::channel();
        self.tx
            .send(PendingApproval { prompt, responder })
            .await
            .map_err(|_| ConnectorError::VaultUnavailable)?;
        answer.await.map_err(|_| ConnectorError::VaultUnavailable)
    }
}
