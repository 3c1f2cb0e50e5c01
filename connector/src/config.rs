//! Connector configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Sender id of the extension instance allowed to talk to the relay.
    #[serde(default = "default_trusted_extension_id")]
    pub trusted_extension_id: String,

    /// Timeout for requests that do not carry their own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// How many times the relay tries to wake the vault surface.
    #[serde(default = "default_wake_attempts")]
    pub wake_attempts: u32,

    /// Pause between wake attempts.
    #[serde(default = "default_wake_delay_ms")]
    pub wake_delay_ms: u64,

    /// How long the relay remembers a settled correlation id to drop duplicates.
    #[serde(default = "default_settled_retention_ms")]
    pub settled_retention_ms: u64,

    /// Upper bound on remembered settled ids; the oldest are forgotten first.
    #[serde(default = "default_max_settled")]
    pub max_settled: usize,
}

fn default_trusted_extension_id() -> String {
    "custody-extension".to_string()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_wake_attempts() -> u32 {
    5
}

fn default_wake_delay_ms() -> u64 {
    100
}

fn default_settled_retention_ms() -> u64 {
    60_000
}

fn default_max_settled() -> usize {
    1024
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            trusted_extension_id: default_trusted_extension_id(),
            default_timeout_ms: default_timeout_ms(),
            wake_attempts: default_wake_attempts(),
            wake_delay_ms: default_wake_delay_ms(),
            settled_retention_ms: default_settled_retention_ms(),
            max_settled: default_max_settled(),
        }
    }
}

impl ConnectorConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn wake_delay(&self) -> Duration {
        Duration::from_millis(self.wake_delay_ms)
    }

    pub fn settled_retention(&self) -> Duration {
        Duration::from_millis(self.settled_retention_ms)
    }

    /// The request's own timeout if given, else the default.
    pub fn timeout_for(&self, requested_ms: Option<u64>) -> Duration {
        requested_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.default_timeout())
    }
}
