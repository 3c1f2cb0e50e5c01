//! Durable blob cache.

use std::sync::Arc;

use custody_types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Frame format version written with every blob.
pub const BLOB_FORMAT_VERSION: u32 = 1;

/// Synchronous key/value backend for persisted blobs.
pub trait BlobStore: Send + Sync {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), CacheError>;
    /// `Ok(None)` when nothing is stored under `id`.
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, CacheError>;
    /// Returns whether anything was removed.
    fn delete(&self, id: &str) -> Result<bool, CacheError>;
}

/// A blob as loaded back from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub content: Vec<u8>,
    pub saved_at: Timestamp,
}

#[derive(Serialize, Deserialize)]
struct StoredBlob {
    version: u32,
    saved_at: Timestamp,
    content: Vec<u8>,
}

/// Async facade over a [`BlobStore`]. Store calls run on the blocking pool.
#[derive(Clone)]
pub struct BlobCache {
    store: Arc<dyn BlobStore>,
}

impl BlobCache {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, id: &str, content: Vec<u8>) -> Result<(), CacheError> {
        let frame = StoredBlob {
            version: BLOB_FORMAT_VERSION,
            saved_at: Timestamp::now(),
            content,
        };
        let bytes = bincode::serialize(&frame).map_err(|_| CacheError::Encode(id.to_string()))?;
        let size = bytes.len();
        self.blocking(id, move |store, id| store.put(id, &bytes))
            .await?;
        tracing::debug!(id, size, "blob saved");
        Ok(())
    }

    /// Load the blob under `id`.
    ///
    /// `Ok(None)` means nothing is stored; `Err(CacheError::Decode)` means
    /// something is stored but cannot be read.
    pub async fn load(&self, id: &str) -> Result<Option<Blob>, CacheError> {
        let Some(bytes) = self.blocking(id, |store, id| store.get(id)).await? else {
            return Ok(None);
        };
        let frame: StoredBlob = bincode::deserialize(&bytes).map_err(|e| CacheError::Decode {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        if frame.version != BLOB_FORMAT_VERSION {
            return Err(CacheError::Decode {
                id: id.to_string(),
                reason: format!("unsupported frame version {}", frame.version),
            });
        }
        Ok(Some(Blob {
            content: frame.content,
            saved_at: frame.saved_at,
        }))
    }

    pub async fn remove(&self, id: &str) -> Result<bool, CacheError> {
        self.blocking(id, |store, id| store.delete(id)).await
    }

    async fn blocking<T, F>(&self, id: &str, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn BlobStore, &str) -> Result<T, CacheError> + Send + 'static,
    {
        let store = self.store.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || op(store.as_ref(), &id))
            .await
            .map_err(|e| CacheError::Backend(format!("blob task failed: {e}")))?
    }
}
