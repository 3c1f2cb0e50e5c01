//! HTTP agent connector.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use custody_crypto::SessionIdentity;
use custody_types::Principal;

use crate::error::WalletError;
use crate::remote::{Agent, AgentConnector, RemoteError};

/// An agent whose host answered the status probe.
#[derive(Debug)]
pub struct HttpAgent {
    host: String,
    principal: Principal,
}

impl Agent for HttpAgent {
    fn principal(&self) -> &Principal {
        &self.principal
    }

    fn host(&self) -> &str {
        &self.host
    }
}

/// Connects agents by probing the host's `/api/v2/status` endpoint.
#[derive(Clone)]
pub struct HttpAgentConnector {
    http: reqwest::Client,
}

impl HttpAgentConnector {
    pub fn new(timeout: Duration) -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unsupported(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http })
    }

    fn status_url(host: &str) -> String {
        format!("{}/api/v2/status", host.trim_end_matches('/'))
    }
}

#[async_trait]
impl AgentConnector for HttpAgentConnector {
    async fn connect(
        &self,
        identity: Arc<SessionIdentity>,
        host: &str,
    ) -> Result<Arc<dyn Agent>, RemoteError> {
        let url = Self::status_url(host);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| RemoteError::Unreachable(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(RemoteError::Rejected(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        tracing::info!(host, principal = %identity.principal(), "agent connected");
        Ok(Arc::new(HttpAgent {
            host: host.to_string(),
            principal: identity.principal().clone(),
        }))
    }
}
