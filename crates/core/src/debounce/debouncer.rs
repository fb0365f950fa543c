//! Trailing-edge, resettable debouncer keyed by an arbitrary value.
//!
//! Each key owns at most one pending timer. Scheduling again for a key aborts
//! the previous timer and starts a new one carrying the newest callback, so a
//! burst collapses into a single call made `window` after the last schedule.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

struct PendingCall {
    generation: u64,
    handle: JoinHandle<()>,
}

type PendingMap<K> = Arc<Mutex<HashMap<K, PendingCall>>>;

fn lock<K>(pending: &PendingMap<K>) -> MutexGuard<'_, HashMap<K, PendingCall>> {
    // Callbacks never run under this lock, so poisoning cannot leave a
    // half-updated map behind.
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Must be used from within a tokio runtime.
pub struct Debouncer<K> {
    pending: PendingMap<K>,
    next_generation: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Schedules `f` to run once `window` has elapsed without another
    /// `schedule` for the same key. A newer call replaces the pending one.
    pub fn schedule<F>(&self, key: K, f: F, window: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut pending = lock(&self.pending);

        let timers = Arc::clone(&self.pending);
        let timer_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let still_current = {
                let mut timers = lock(&timers);
                match timers.get(&timer_key) {
                    Some(call) if call.generation == generation => {
                        timers.remove(&timer_key);
                        true
                    }
                    _ => false,
                }
            };
            if still_current {
                f();
            }
        });

        if let Some(previous) = pending.insert(key, PendingCall { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Drops the pending call for `key` without running it.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.pending).remove(key) {
            Some(call) => {
                call.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Drops every pending call.
    pub fn cancel_all(&self) {
        for (_, call) in lock(&self.pending).drain() {
            call.handle.abort();
        }
    }
}

impl<K> Default for Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, call) in lock(&self.pending).drain() {
            call.handle.abort();
        }
    }
}
