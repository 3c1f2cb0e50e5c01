//! Nullable transport: records envelopes instead of sending them.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use custody_connector::{ConnectorError, Envelope, Transport};

pub struct NullTransport {
    sender_id: String,
    sent: Mutex<Vec<Envelope>>,
}

impl NullTransport {
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every envelope sent so far, sender id stamped.
    pub fn sent(&self) -> Vec<Envelope> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<Envelope> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Envelope>> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for NullTransport {
    async fn send(&self, mut envelope: Envelope) -> Result<(), ConnectorError> {
        envelope.sender = self.sender_id.clone();
        self.lock().push(envelope);
        Ok(())
    }
}
