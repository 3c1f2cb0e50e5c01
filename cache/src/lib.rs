//! Get-or-create caches shared by the wallet and connector.
//!
//! Three disciplines:
//! - [`TtlCache`]: payloads expire after a per-call TTL and are recreated on the next access
//! - [`LazyCache`]: at most one instance per id for the lifetime of the cache
//! - [`BlobCache`]: binary content persisted across sessions through a [`BlobStore`]
//!
//! The in-memory caches are single-flight per id: concurrent callers for the
//! same id wait on one factory invocation, callers for other ids are not blocked.

pub mod blob;
pub mod config;
pub mod error;
pub mod keys;
pub mod lazy;
pub mod lmdb;
pub mod ttl;

pub use blob::{Blob, BlobCache, BlobStore, BLOB_FORMAT_VERSION};
pub use config::CacheConfig;
pub use error::CacheError;
pub use lazy::LazyCache;
pub use lmdb::LmdbBlobStore;
pub use ttl::{CacheEntry, TtlCache};
