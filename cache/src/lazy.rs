//! Lazy singleton cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;

/// At most one instance per id, created on first use and shared afterwards.
///
/// Concurrent callers for the same id during creation wait for the single
/// factory invocation. A failed creation is not cached: the next caller runs
/// its own factory.
pub struct LazyCache<V> {
    cells: Mutex<HashMap<String, Arc<OnceCell<V>>>>,
}

impl<V: Clone> LazyCache<V> {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get<F, Fut>(&self, id: &str, factory: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.cell(id).get_or_init(factory).await.clone()
    }

    pub async fn get_or_try_init<F, Fut, E>(&self, id: &str, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.cell(id).get_or_try_init(factory).await.cloned()
    }

    /// The instance for `id` if it has been created.
    pub fn get_existing(&self, id: &str) -> Option<V> {
        self.lock_cells().get(id).and_then(|cell| cell.get().cloned())
    }

    /// Evict `id`, returning the instance if one had been created.
    pub fn remove(&self, id: &str) -> Option<V> {
        self.lock_cells()
            .remove(id)
            .and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.lock_cells()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, id: &str) -> Arc<OnceCell<V>> {
        self.lock_cells().entry(id.to_string()).or_default().clone()
    }

    fn lock_cells(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<V>>>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for LazyCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
