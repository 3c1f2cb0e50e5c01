//! In-memory blob store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use custody_cache::{BlobStore, CacheError};

/// A [`BlobStore`] backed by a map. Contents vanish with the value.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the raw bytes under `id`, bypassing blob framing.
    pub fn put_raw(&self, id: &str, bytes: Vec<u8>) {
        self.lock().insert(id.to_string(), bytes);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), CacheError> {
        self.lock().insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.lock().get(id).cloned())
    }

    fn delete(&self, id: &str) -> Result<bool, CacheError> {
        Ok(self.lock().remove(id).is_some())
    }
}
