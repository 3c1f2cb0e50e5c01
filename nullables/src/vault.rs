//! Nullable vault surface.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use custody_connector::{Approval, ConnectionInfo, ConnectionPrompt, ConnectorError, VaultSurface};

/// How the simulated user answers connection prompts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VaultBehavior {
    /// Wake succeeds, the prompt is never answered.
    Silent,
    Approve(ConnectionInfo),
    Deny(String),
    /// The prompt is dropped before anyone answers it.
    Unavailable,
}

pub struct NullVault {
    behavior: Mutex<VaultBehavior>,
    not_ready: AtomicU32,
    wakes: AtomicUsize,
    prompts: Mutex<Vec<ConnectionPrompt>>,
}

impl NullVault {
    pub fn new(behavior: VaultBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            not_ready: AtomicU32::new(0),
            wakes: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        Self::new(VaultBehavior::Silent)
    }

    pub fn approving(info: ConnectionInfo) -> Self {
        Self::new(VaultBehavior::Approve(info))
    }

    pub fn denying(reason: impl Into<String>) -> Self {
        Self::new(VaultBehavior::Deny(reason.into()))
    }

    /// Report not-ready for the next `wakes` wake calls.
    pub fn not_ready_for(self, wakes: u32) -> Self {
        self.not_ready.store(wakes, Ordering::SeqCst);
        self
    }

    pub fn set_behavior(&self, behavior: VaultBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    pub fn wakes(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }

    /// Prompts shown to the user so far.
    pub fn prompts(&self) -> Vec<ConnectionPrompt> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl VaultSurface for NullVault {
    async fn wake(&self) -> Result<(), ConnectorError> {
        self.wakes.fetch_add(1, Ordering::SeqCst);
        let still_sleeping = self
            .not_ready
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if still_sleeping {
            Err(ConnectorError::VaultNotReady)
        } else {
            Ok(())
        }
    }

    async fn request_connection(&self, prompt: ConnectionPrompt) -> Result<Approval, ConnectorError> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt);
        let behavior = self.behavior.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match behavior {
            VaultBehavior::Silent => std::future::pending().await,
            VaultBehavior::Approve(info) => Ok(Approval::Approved(info)),
            VaultBehavior::Deny(reason) => Ok(Approval::Denied(reason)),
            VaultBehavior::Unavailable => Err(ConnectorError::VaultUnavailable),
        }
    }
}
