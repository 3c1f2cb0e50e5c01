//! Nullable collaborators for deterministic testing.
//!
//! Every remote or external boundary of the wallet core has a double here
//! that:
//! - answers immediately from in-memory state (or hangs, when asked to)
//! - can be told to fail for specific inputs
//! - counts the calls it receives, for assertions
//!
//! None of them touch the filesystem or the network.

pub mod agent;
pub mod ledger;
pub mod store;
pub mod transport;
pub mod vault;

pub use agent::{ConnectMode, NullAgent, NullAgentConnector};
pub use ledger::{NullActorFactory, NullLedgerActor, NullNftLedger};
pub use store::MemoryBlobStore;
pub use transport::NullTransport;
pub use vault::{NullVault, VaultBehavior};
