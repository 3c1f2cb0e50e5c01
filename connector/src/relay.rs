//! The privileged relay between requesters and the vault.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use custody_types::CanisterId;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::message::{
    ConnectRequest, ConnectionInfo, CorrelationId, Envelope, ErrorCode, Payload, Request, Response,
};
use crate::state::{RejectReason, RequestState};
use crate::transport::Transport;
use crate::vault::{Approval, ConnectionPrompt, VaultSurface};

/// Requests are tracked per sender so one sender cannot settle another's ids.
type RequestKey = (String, CorrelationId);

/// Live requests plus a bounded memory of settled ones, oldest first.
#[derive(Default)]
struct RequestLog {
    states: HashMap<RequestKey, RequestState>,
    settled: VecDeque<(Instant, RequestKey)>,
}

impl RequestLog {
    /// Forget settled ids older than `retention`, and the oldest beyond `max`.
    fn prune(&mut self, now: Instant, retention: Duration, max: usize) {
        while let Some((settled_at, key)) = self.settled.front() {
            let expired = now.saturating_duration_since(*settled_at) >= retention;
            if !expired && self.settled.len() <= max {
                break;
            }
            self.states.remove(key);
            self.settled.pop_front();
        }
    }
}

struct ApprovedOrigin {
    whitelist: Vec<CanisterId>,
    info: ConnectionInfo,
}

/// Validates inbound requests, wakes the vault and answers requesters.
///
/// Envelopes from any sender other than the trusted extension are rejected
/// without reaching the vault and without a reply, and are not tracked. Each
/// (sender, correlation id) pair settles exactly once; later envelopes with a
/// known id are ignored while the settled id is still remembered.
pub struct Relay {
    config: ConnectorConfig,
    vault: Arc<dyn VaultSurface>,
    requests: Mutex<RequestLog>,
    approved: Mutex<HashMap<String, ApprovedOrigin>>,
}

impl Relay {
    pub fn new(config: ConnectorConfig, vault: Arc<dyn VaultSurface>) -> Self {
        Self {
            config,
            vault,
            requests: Mutex::new(RequestLog::default()),
            approved: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, sender: &str, correlation_id: CorrelationId) -> Option<RequestState> {
        self.lock_requests()
            .states
            .get(&(sender.to_string(), correlation_id))
            .cloned()
    }

    /// Requests currently in flight or remembered as settled.
    pub fn tracked_requests(&self) -> usize {
        self.lock_requests().states.len()
    }

    pub fn is_approved(&self, origin: &str) -> bool {
        self.lock_approved().contains_key(origin)
    }

    pub fn connection(&self, origin: &str) -> Option<ConnectionInfo> {
        self.lock_approved().get(origin).map(|a| a.info.clone())
    }

    /// Forget every approved origin, e.g. when the wallet locks.
    pub fn revoke_all(&self) {
        let mut approved = self.lock_approved();
        tracing::info!(origins = approved.len(), "revoking all connections");
        approved.clear();
    }

    /// Receive envelopes until the inbox closes, answering each on `outbound`.
    /// Every envelope is handled on its own task.
    pub async fn serve(self: Arc<Self>, mut inbox: mpsc::Receiver<Envelope>, outbound: Arc<dyn Transport>) {
        while let Some(envelope) = inbox.recv().await {
            let relay = self.clone();
            let outbound = outbound.clone();
            tokio::spawn(async move {
                if let Some(reply) = relay.handle(envelope).await {
                    if let Err(e) = outbound.send(reply).await {
                        tracing::warn!(error = %e, "failed to deliver reply");
                    }
                }
            });
        }
        tracing::debug!("relay inbox closed");
    }

    /// Handle one envelope, returning the reply to send, if any.
    pub async fn handle(&self, envelope: Envelope) -> Option<Envelope> {
        let Payload::Request(request) = &envelope.payload else {
            tracing::debug!(correlation_id = envelope.correlation_id, "ignoring non-request envelope");
            return None;
        };
        if envelope.sender != self.config.trusted_extension_id {
            tracing::warn!(
                sender = %envelope.sender,
                origin = %envelope.origin,
                "rejecting untrusted sender"
            );
            return None;
        }
        let key = (envelope.sender.clone(), envelope.correlation_id);
        if !self.begin(&key) {
            tracing::debug!(
                sender = %envelope.sender,
                correlation_id = envelope.correlation_id,
                "ignoring duplicate or settled request"
            );
            return None;
        }
        self.advance(&key, RequestState::Relayed);

        let response = match request.clone() {
            Request::IsConnected => {
                self.settle(&key, RequestState::Resolved);
                Response::status(self.is_approved(&envelope.origin))
            }
            Request::Disconnect => {
                if self.lock_approved().remove(&envelope.origin).is_some() {
                    tracing::info!(origin = %envelope.origin, "origin disconnected");
                }
                self.settle(&key, RequestState::Resolved);
                Response::status(false)
            }
            Request::Connect(connect) => self.connect(&key, &envelope.origin, connect).await,
        };
        Some(envelope.reply(response))
    }

    async fn connect(&self, key: &RequestKey, origin: &str, request: ConnectRequest) -> Response {
        let deadline = Instant::now() + self.config.timeout_for(request.timeout_ms);

        let whitelist = match request.canister_ids() {
            Ok(whitelist) => whitelist,
            Err(e) => {
                tracing::warn!(origin, error = %e, "invalid whitelist");
                self.settle(key, RequestState::Rejected(RejectReason::Malformed(e.to_string())));
                return Response::error(ErrorCode::Malformed, e.to_string());
            }
        };

        if let Some(info) = self.covered_by_approval(origin, &whitelist) {
            self.settle(key, RequestState::Resolved);
            return Response::Connected(info);
        }

        self.advance(key, RequestState::AwaitingUser);
        let prompt = ConnectionPrompt {
            origin: origin.to_string(),
            whitelist: whitelist.clone(),
            host: request.host,
        };

        match tokio::time::timeout_at(deadline, self.ask_vault(prompt)).await {
            Ok(Ok(Approval::Approved(info))) => {
                tracing::info!(origin, principal = %info.principal_id, "connection approved");
                self.lock_approved().insert(
                    origin.to_string(),
                    ApprovedOrigin {
                        whitelist,
                        info: info.clone(),
                    },
                );
                self.settle(key, RequestState::Resolved);
                Response::Connected(info)
            }
            Ok(Ok(Approval::Denied(reason))) => {
                tracing::info!(origin, %reason, "connection denied");
                self.settle(key, RequestState::Rejected(RejectReason::UserRejected(reason.clone())));
                Response::error(ErrorCode::Rejected, reason)
            }
            Ok(Err(e)) => {
                tracing::warn!(origin, error = %e, "vault unavailable");
                self.settle(key, RequestState::Rejected(RejectReason::VaultUnavailable));
                Response::error(ErrorCode::VaultUnavailable, e.to_string())
            }
            Err(_) => {
                tracing::warn!(origin, "connection request timed out");
                self.settle(key, RequestState::TimedOut);
                Response::error(ErrorCode::TimedOut, "request timed out")
            }
        }
    }

    fn covered_by_approval(&self, origin: &str, whitelist: &[CanisterId]) -> Option<ConnectionInfo> {
        let approved = self.lock_approved();
        let existing = approved.get(origin)?;
        whitelist
            .iter()
            .all(|canister| existing.whitelist.contains(canister))
            .then(|| existing.info.clone())
    }

    async fn ask_vault(&self, prompt: ConnectionPrompt) -> Result<Approval, ConnectorError> {
        self.wake_vault().await?;
        self.vault.request_connection(prompt).await
    }

    /// Wake the vault, retrying a bounded number of times while it reports
    /// not ready. The caller's deadline still bounds the whole loop.
    async fn wake_vault(&self) -> Result<(), ConnectorError> {
        let attempts = self.config.wake_attempts.max(1);
        for attempt in 1..=attempts {
            match self.vault.wake().await {
                Ok(()) => return Ok(()),
                Err(ConnectorError::VaultNotReady) if attempt < attempts => {
                    tracing::debug!(attempt, "vault not ready, retrying");
                    tokio::time::sleep(self.config.wake_delay()).await;
                }
                Err(ConnectorError::VaultNotReady) => break,
                Err(e) => return Err(e),
            }
        }
        Err(ConnectorError::VaultUnavailable)
    }

    /// Start tracking `key`. False if it is already known.
    fn begin(&self, key: &RequestKey) -> bool {
        let mut requests = self.lock_requests();
        requests.prune(
            Instant::now(),
            self.config.settled_retention(),
            self.config.max_settled,
        );
        if requests.states.contains_key(key) {
            return false;
        }
        requests.states.insert(key.clone(), RequestState::Requested);
        true
    }

    fn advance(&self, key: &RequestKey, next: RequestState) {
        if let Some(state) = self.lock_requests().states.get_mut(key) {
            if !state.is_settled() {
                *state = next;
            }
        }
    }

    fn settle(&self, key: &RequestKey, outcome: RequestState) {
        let mut requests = self.lock_requests();
        match requests.states.get_mut(key) {
            Some(state) if state.is_settled() => {
                tracing::debug!(correlation_id = key.1, %state, "request already settled");
            }
            Some(state) => {
                *state = outcome;
                let now = Instant::now();
                requests.settled.push_back((now, key.clone()));
                requests.prune(now, self.config.settled_retention(), self.config.max_settled);
            }
            None => tracing::debug!(correlation_id = key.1, "settling unknown request"),
        }
    }

    fn lock_requests(&self) -> MutexGuard<'_, RequestLog> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_approved(&self) -> MutexGuard<'_, HashMap<String, ApprovedOrigin>> {
        self.approved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
