//! Nullable agent connector.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use custody_crypto::SessionIdentity;
use custody_types::Principal;
use custody_wallet_core::{Agent, AgentConnector, RemoteError};

/// An agent that only remembers who it was connected for.
#[derive(Debug)]
pub struct NullAgent {
    principal: Principal,
    host: String,
}

impl NullAgent {
    pub fn new(principal: Principal, host: impl Into<String>) -> Self {
        Self {
            principal,
            host: host.into(),
        }
    }
}

impl Agent for NullAgent {
    fn principal(&self) -> &Principal {
        &self.principal
    }

    fn host(&self) -> &str {
        &self.host
    }
}

/// How [`NullAgentConnector::connect`] behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectMode {
    Succeed,
    Fail(RemoteError),
    /// Never resolve. Lets callers exercise their connect timeout.
    Hang,
}

pub struct NullAgentConnector {
    mode: Mutex<ConnectMode>,
    connects: AtomicUsize,
}

impl NullAgentConnector {
    pub fn new() -> Self {
        Self::with_mode(ConnectMode::Succeed)
    }

    pub fn unreachable() -> Self {
        Self::with_mode(ConnectMode::Fail(RemoteError::Unreachable("null network".into())))
    }

    pub fn hanging() -> Self {
        Self::with_mode(ConnectMode::Hang)
    }

    pub fn with_mode(mode: ConnectMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn set_mode(&self, mode: ConnectMode) {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    /// Number of connect attempts so far, including failed ones.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Default for NullAgentConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentConnector for NullAgentConnector {
    async fn connect(
        &self,
        identity: Arc<SessionIdentity>,
        host: &str,
    ) -> Result<Arc<dyn Agent>, RemoteError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match mode {
            ConnectMode::Succeed => Ok(Arc::new(NullAgent::new(identity.principal().clone(), host))),
            ConnectMode::Fail(error) => Err(error),
            ConnectMode::Hang => std::future::pending().await,
        }
    }
}
