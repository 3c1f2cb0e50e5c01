//! Time-to-live cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// A cached payload and its freshness window.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub payload: V,
    pub created_at: Instant,
    pub ttl_deadline: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.ttl_deadline
    }
}

/// One id's entry. `stale` is set by invalidation while a creation holds the
/// lock; the next caller to take the lock discards whatever it finds.
struct Slot<V> {
    entry: tokio::sync::Mutex<Option<CacheEntry<V>>>,
    stale: AtomicBool,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            entry: tokio::sync::Mutex::new(None),
            stale: AtomicBool::new(false),
        }
    }
}

/// Payloads keyed by id, recreated once their TTL passes.
///
/// Each id has its own async lock, held across the factory call, so creation
/// is single-flight per id. Factories that produce nothing (`None`, `Err`, or
/// a payload rejected by the caller's predicate) leave the id uncached and
/// the next access retries.
pub struct TtlCache<V> {
    slots: Mutex<HashMap<String, Arc<Slot<V>>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the fresh payload for `id`, or create one with `factory`.
    pub async fn get<F, Fut>(&self, id: &str, ttl: Duration, factory: F) -> Option<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<V>>,
    {
        self.try_get(id, ttl, move || async move { factory().await.ok_or(()) })
            .await
            .ok()
    }

    /// Fallible form of [`get`](Self::get). Errors are returned to this
    /// caller only; they are never cached.
    pub async fn try_get<F, Fut, E>(&self, id: &str, ttl: Duration, factory: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.try_get_where(id, ttl, |_| true, factory).await
    }

    /// Like [`try_get`](Self::try_get), but a created payload is stored only
    /// when `keep` accepts it. A rejected payload is still returned.
    pub async fn try_get_where<K, F, Fut, E>(
        &self,
        id: &str,
        ttl: Duration,
        keep: K,
        factory: F,
    ) -> Result<V, E>
    where
        K: FnOnce(&V) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(id);
        let mut entry = slot.entry.lock().await;

        if slot.stale.swap(false, Ordering::SeqCst) {
            *entry = None;
        }
        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(Instant::now()) {
                return Ok(cached.payload.clone());
            }
        }

        let result = factory().await;
        match &result {
            Ok(payload) if keep(payload) => {
                let created_at = Instant::now();
                *entry = Some(CacheEntry {
                    payload: payload.clone(),
                    created_at,
                    ttl_deadline: created_at + ttl,
                });
            }
            _ => {
                tracing::debug!(id, "cache factory produced nothing, entry left empty");
                *entry = None;
            }
        }
        let empty = entry.is_none();
        drop(entry);
        if empty {
            self.prune(id, &slot);
        }
        result
    }

    /// The current entry for `id`, fresh or not, without creating one.
    /// Returns `None` while a creation for `id` is in flight.
    pub fn peek(&self, id: &str) -> Option<CacheEntry<V>> {
        let slot = self.lock_slots().get(id).cloned()?;
        if slot.stale.load(Ordering::SeqCst) {
            return None;
        }
        let entry = slot.entry.try_lock().ok()?;
        entry.clone()
    }

    /// Drop the entry for `id`; the next access recreates it. A creation
    /// already in flight finishes, and its result is discarded afterwards.
    pub fn invalidate(&self, id: &str) {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(id) {
            if Self::discard(slot) {
                slots.remove(id);
            }
        }
    }

    pub fn clear(&self) {
        self.lock_slots().retain(|_, slot| !Self::discard(slot));
    }

    /// Number of ids currently holding an entry, fresh or stale.
    pub fn len(&self) -> usize {
        self.lock_slots()
            .values()
            .filter(|slot| {
                !slot.stale.load(Ordering::SeqCst)
                    && slot.entry.try_lock().map(|e| e.is_some()).unwrap_or(false)
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark `slot` stale. Returns true when nobody else holds the slot, so
    /// the caller may remove it from the map.
    fn discard(slot: &Arc<Slot<V>>) -> bool {
        if Arc::strong_count(slot) == 1 {
            return true;
        }
        slot.stale.store(true, Ordering::SeqCst);
        false
    }

    /// Remove an empty slot once no other caller is waiting on it. Callers
    /// clone slots under the map lock, so the count cannot grow meanwhile.
    fn prune(&self, id: &str, slot: &Arc<Slot<V>>) {
        let mut slots = self.lock_slots();
        let unused = slots.get(id).is_some_and(|s| Arc::ptr_eq(s, slot))
            && Arc::strong_count(slot) == 2
            && slot.entry.try_lock().map(|e| e.is_none()).unwrap_or(false);
        if unused {
            slots.remove(id);
        }
    }

    fn slot(&self, id: &str) -> Arc<Slot<V>> {
        self.lock_slots().entry(id.to_string()).or_default().clone()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Slot<V>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock_slots().len()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
