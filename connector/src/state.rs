//! Per-request lifecycle.

use std::fmt;

/// Why a request was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    Unauthorized,
    Malformed(String),
    UserRejected(String),
    VaultUnavailable,
}

/// `Requested -> Relayed -> AwaitingUser -> {Resolved | Rejected | TimedOut}`.
///
/// The last three are terminal: once a request settles it never changes again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestState {
    Requested,
    Relayed,
    AwaitingUser,
    Resolved,
    Rejected(RejectReason),
    TimedOut,
}

impl RequestState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected(_) | Self::TimedOut)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::Relayed => f.write_str("relayed"),
            Self::AwaitingUser => f.write_str("awaiting user"),
            Self::Resolved => f.write_str("resolved"),
            Self::Rejected(reason) => write!(f, "rejected ({reason:?})"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}
