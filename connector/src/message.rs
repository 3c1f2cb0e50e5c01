//! Wire messages.
//!
//! Requests are tagged by `type`:
//!
//! ```json
//! {"type": "CONNECT", "whitelist": ["ryjl3-tyaaa-aaaaa-aaaba-cai"], "timeoutMs": 500}
//! ```
//!
//! Responses are either a success body or `{"error": "..."}`.

use custody_types::{AccountIdentifier, CanisterId, Principal, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

pub type CorrelationId = u64;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// Canister ids the requester wants to call on the user's behalf.
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ConnectRequest {
    /// Parse every whitelist entry as a canister id.
    pub fn canister_ids(&self) -> Result<Vec<CanisterId>, ValidationError> {
        self.whitelist
            .iter()
            .map(|text| Principal::parse_canister(text))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Connect(ConnectRequest),
    IsConnected,
    Disconnect,
}

/// What a successful connection hands back to the requester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub principal_id: Principal,
    pub account_id: AccountIdentifier,
}

impl ConnectionInfo {
    pub fn for_principal(principal: Principal) -> Self {
        let account_id = AccountIdentifier::from_principal(&principal);
        Self {
            principal_id: principal,
            account_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Malformed,
    Rejected,
    TimedOut,
    VaultUnavailable,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub connected: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Connected(ConnectionInfo),
    Status(StatusBody),
    Error(ErrorBody),
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorBody {
            error: message.into(),
            code: Some(code),
        })
    }

    pub fn status(connected: bool) -> Self {
        Self::Status(StatusBody { connected })
    }
}

impl From<ErrorBody> for ConnectorError {
    fn from(body: ErrorBody) -> Self {
        match body.code {
            Some(ErrorCode::Unauthorized) => Self::Unauthorized(body.error),
            Some(ErrorCode::Malformed) => Self::Malformed(body.error),
            Some(ErrorCode::TimedOut) => Self::TimedOut,
            Some(ErrorCode::VaultUnavailable) => Self::VaultUnavailable,
            Some(ErrorCode::Rejected) | None => Self::Rejected(body.error),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Request(Request),
    Response(Response),
}

/// One message on a transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub correlation_id: CorrelationId,
    /// Stamped by the transport that carried the envelope. Never trusted
    /// from the payload's author.
    #[serde(default)]
    pub sender: String,
    pub origin: String,
    pub payload: Payload,
}

impl Envelope {
    pub fn request(correlation_id: CorrelationId, origin: impl Into<String>, request: Request) -> Self {
        Self {
            correlation_id,
            sender: String::new(),
            origin: origin.into(),
            payload: Payload::Request(request),
        }
    }

    /// A response to `self`, addressed back to the same correlation id and origin.
    pub fn reply(&self, response: Response) -> Self {
        Self {
            correlation_id: self.correlation_id,
            sender: String::new(),
            origin: self.origin.clone(),
            payload: Payload::Response(response),
        }
    }

    pub fn to_json(&self) -> Result<String, ConnectorError> {
        serde_json::to_string(self).map_err(|e| ConnectorError::Malformed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ConnectorError> {
        serde_json::from_str(json).map_err(|e| ConnectorError::Malformed(e.to_string()))
    }
}
