//! Requester side of the connection protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use custody_types::{AccountIdentifier, Principal};
use tokio::sync::{mpsc, oneshot};

use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::message::{
    ConnectRequest, ConnectionInfo, CorrelationId, Envelope, Payload, Request, Response,
};
use crate::transport::Transport;

/// Sends requests for one origin and matches replies by correlation id.
///
/// Each request races its timeout; a reply arriving after the timeout, or for
/// an id that already settled, is dropped. Replies are accepted only from the
/// trusted extension id.
pub struct ConnectorBridge {
    config: ConnectorConfig,
    origin: String,
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<Response>>>,
    connection: Mutex<Option<ConnectionInfo>>,
}

impl ConnectorBridge {
    pub fn new(config: ConnectorConfig, origin: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            origin: origin.into(),
            transport,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            connection: Mutex::new(None),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The connection from the last successful `connect`, if still held.
    pub fn connection(&self) -> Option<ConnectionInfo> {
        self.lock_connection().clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.connection().map(|c| c.principal_id)
    }

    pub fn account_id(&self) -> Option<AccountIdentifier> {
        self.connection().map(|c| c.account_id)
    }

    /// Ask the wallet for a connection covering `request.whitelist`.
    pub async fn connect(&self, request: ConnectRequest) -> Result<ConnectionInfo, ConnectorError> {
        request.canister_ids()?;
        let timeout = self.config.timeout_for(request.timeout_ms);

        match self.call(Request::Connect(request), timeout).await? {
            Response::Connected(info) => {
                tracing::info!(origin = %self.origin, principal = %info.principal_id, "connected");
                *self.lock_connection() = Some(info.clone());
                Ok(info)
            }
            Response::Error(body) => Err(body.into()),
            Response::Status(_) => Err(ConnectorError::Malformed(
                "status reply to a connect request".to_string(),
            )),
        }
    }

    /// Ask the relay whether this origin is still approved.
    pub async fn is_connected(&self) -> Result<bool, ConnectorError> {
        match self.call(Request::IsConnected, self.config.default_timeout()).await? {
            Response::Status(status) => {
                if !status.connected {
                    *self.lock_connection() = None;
                }
                Ok(status.connected)
            }
            Response::Error(body) => Err(body.into()),
            Response::Connected(_) => Err(ConnectorError::Malformed(
                "connect reply to a status request".to_string(),
            )),
        }
    }

    /// Forget the connection locally and tell the relay. Idempotent; the
    /// relay's reply is not awaited.
    pub async fn disconnect(&self) {
        if self.lock_connection().take().is_some() {
            tracing::info!(origin = %self.origin, "disconnected");
        }
        let envelope = Envelope::request(self.next_correlation_id(), self.origin.clone(), Request::Disconnect);
        if let Err(e) = self.transport.send(envelope).await {
            tracing::debug!(error = %e, "disconnect notice not delivered");
        }
    }

    /// Route an inbound reply to its waiting request. Returns whether it was
    /// accepted.
    pub fn deliver(&self, envelope: Envelope) -> bool {
        if envelope.sender != self.config.trusted_extension_id {
            tracing::warn!(sender = %envelope.sender, "dropping reply from untrusted sender");
            return false;
        }
        let Payload::Response(response) = envelope.payload else {
            tracing::debug!(correlation_id = envelope.correlation_id, "dropping non-response envelope");
            return false;
        };
        let Some(waiter) = self.lock_pending().remove(&envelope.correlation_id) else {
            tracing::debug!(correlation_id = envelope.correlation_id, "dropping stale or duplicate reply");
            return false;
        };
        waiter.send(response).is_ok()
    }

    /// Deliver every envelope from `inbox` until it closes.
    pub async fn listen(self: Arc<Self>, mut inbox: mpsc::Receiver<Envelope>) {
        while let Some(envelope) = inbox.recv().await {
            self.deliver(envelope);
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.lock_pending().len()
    }

    async fn call(&self, request: Request, timeout: Duration) -> Result<Response, ConnectorError> {
        let id = self.next_correlation_id();
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id, tx);

        let envelope = Envelope::request(id, self.origin.clone(), request);
        if let Err(e) = self.transport.send(envelope).await {
            self.lock_pending().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ConnectorError::Disconnected),
            Err(_) => {
                self.lock_pending().remove(&id);
                tracing::warn!(origin = %self.origin, correlation_id = id, ?timeout, "request timed out");
                Err(ConnectorError::TimedOut)
            }
        }
    }

    fn next_correlation_id(&self) -> CorrelationId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<Response>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_connection(&self) -> MutexGuard<'_, Option<ConnectionInfo>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
