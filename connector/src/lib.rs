//! Connection protocol between an untrusted requester, the privileged relay
//! and the wallet vault.
//!
//! ```text
//! Requester --(ConnectorBridge)--> Transport --> Relay --> VaultSurface
//!     ^                                            |
//!     +------------------ Transport <--------------+
//! ```
//!
//! Every envelope carries the sender id stamped by its transport. The relay
//! only acts on envelopes from the trusted extension id, and the bridge only
//! accepts responses from it.

pub mod bridge;
pub mod config;
pub mod error;
pub mod message;
pub mod relay;
pub mod state;
pub mod transport;
pub mod vault;

pub use bridge::ConnectorBridge;
pub use config::ConnectorConfig;
pub use error::ConnectorError;
pub use message::{
    ConnectRequest, ConnectionInfo, CorrelationId, Envelope, ErrorBody, ErrorCode, Payload,
    Request, Response,
};
pub use relay::Relay;
pub use state::{RejectReason, RequestState};
pub use transport::{LocalTransport, Transport};
pub use vault::{Approval, ChannelVault, ConnectionPrompt, PendingApproval, VaultSurface};
