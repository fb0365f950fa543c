//! The cache reconciler: single authority for what the rendering layer sees.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use super::kind_cache::{EntrySource, KindCache};
use crate::events::ChangeEvent;
use crate::models::{AnyModel, Model, ModelKind, TypedModel};
use crate::window::WindowId;

/// Notification handed to rendering-layer listeners after a cache mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange {
    Upserted { kind: ModelKind, id: String },
    Deleted { kind: ModelKind, id: String },
    /// The whole kind was rebuilt or torn down; re-read everything.
    Reset { kind: ModelKind },
}

impl CacheChange {
    pub fn kind(&self) -> ModelKind {
        match self {
            CacheChange::Upserted { kind, .. }
            | CacheChange::Deleted { kind, .. }
            | CacheChange::Reset { kind } => *kind,
        }
    }
}

/// What an apply call did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Replaced,
    /// The value was rewritten but matched what the cache already showed
    /// (an echo of this window's own write); listeners were not notified.
    Unchanged,
    /// An optimistic value older than the event-confirmed one was ignored.
    Superseded,
    Removed,
    /// Delete of an entry that was not cached.
    Absent,
}

impl ApplyOutcome {
    pub fn is_visible_change(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Inserted | ApplyOutcome::Replaced | ApplyOutcome::Removed
        )
    }
}

pub type ChangeListener = Arc<dyn Fn(&CacheChange) + Send + Sync>;

/// Handle returned by [`CacheReconciler::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    kind: ModelKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }
}

/// Owns every per-kind cache of one window.
///
/// All cache structures sit behind one lock, so notifications spanning several
/// kinds (the generic deletion channel) are serialized with per-kind updates.
/// Listeners are invoked after the lock is released and may read freely.
pub struct CacheReconciler {
    window_id: WindowId,
    caches: RwLock<HashMap<ModelKind, KindCache>>,
    listeners: RwLock<HashMap<ModelKind, Vec<(u64, ChangeListener)>>>,
    next_listener_id: AtomicU64,
    next_refetch_ticket: AtomicU64,
}

/// An open refetch; see [`CacheReconciler::begin_refetch`].
pub struct RefetchGuard<'a> {
    reconciler: &'a CacheReconciler,
    kinds: Vec<ModelKind>,
    ticket: u64,
}

impl Drop for RefetchGuard<'_> {
    fn drop(&mut self) {
        let mut caches = self.reconciler.caches_mut();
        for kind in &self.kinds {
            if let Some(cache) = caches.get_mut(kind) {
                cache.end_refetch(self.ticket);
            }
        }
    }
}

impl CacheReconciler {
    pub fn new(window_id: WindowId) -> Self {
        Self {
            window_id,
            caches: RwLock::new(HashMap::new()),
            listeners: RwLock::new(HashMap::new()),
            next_listener_id: AtomicU64::new(1),
            next_refetch_ticket: AtomicU64::new(1),
        }
    }

    pub fn window_id(&self) -> &WindowId {
        &self.window_id
    }

    fn caches(&self) -> RwLockReadGuard<'_, HashMap<ModelKind, KindCache>> {
        self.caches.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn caches_mut(&self) -> RwLockWriteGuard<'_, HashMap<ModelKind, KindCache>> {
        self.caches.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` as the current value for its (kind, id).
    ///
    /// The value is always written. When `origin_window_id` is this window and
    /// the cache already holds an equal value, the write is an echo of the
    /// optimistic update and listeners are not notified again.
    pub fn apply_upsert(&self, value: AnyModel, origin_window_id: Option<&str>) -> ApplyOutcome {
        let kind = value.kind();
        let id = value.id().to_string();

        let outcome = {
            let mut caches = self.caches_mut();
            let cache = caches.entry(kind).or_default();
            let is_echo = self.window_id.is_origin_of(origin_window_id)
                && cache.get(&id).is_some_and(|entry| entry.value == value);

            cache.note_change(&id);
            match cache.upsert(value, EntrySource::Event) {
                _ if is_echo => ApplyOutcome::Unchanged,
                Some(_) => ApplyOutcome::Replaced,
                None => ApplyOutcome::Inserted,
            }
        };

        debug!(
            "[{}] upsert {} {} from {:?}: {:?}",
            self.window_id, kind, id, origin_window_id, outcome
        );
        if outcome.is_visible_change() {
            self.notify(&CacheChange::Upserted { kind, id });
        }
        outcome
    }

    /// Applies the value returned by this window's own successful write.
    ///
    /// The entry stays provisional until the matching event confirms it. A
    /// value older than one already delivered by an event is ignored, so a
    /// late write response never rolls the cache back.
    pub fn apply_optimistic(&self, value: AnyModel) -> ApplyOutcome {
        let kind = value.kind();
        let id = value.id().to_string();

        let outcome = {
            let mut caches = self.caches_mut();
            let cache = caches.entry(kind).or_default();
            let existing = cache
                .get(&id)
                .map(|entry| (entry.value == value, entry.source, entry.value.updated_at()));
            match existing {
                Some((true, _, _)) => ApplyOutcome::Unchanged,
                Some((_, source, confirmed_at))
                    if source != EntrySource::Optimistic && confirmed_at > value.updated_at() =>
                {
                    ApplyOutcome::Superseded
                }
                existing => {
                    cache.note_change(&id);
                    cache.upsert(value, EntrySource::Optimistic);
                    if existing.is_some() {
                        ApplyOutcome::Replaced
                    } else {
                        ApplyOutcome::Inserted
                    }
                }
            }
        };

        debug!("[{}] optimistic {} {}: {:?}", self.window_id, kind, id, outcome);
        if outcome.is_visible_change() {
            self.notify(&CacheChange::Upserted { kind, id });
        }
        outcome
    }

    /// Removes (kind, id) and its group index membership. Idempotent.
    pub fn apply_delete(&self, kind: ModelKind, id: &str) -> ApplyOutcome {
        let removed = {
            let mut caches = self.caches_mut();
            let cache = caches.entry(kind).or_default();
            // Recorded even when absent: a refetch snapshot may still hold it.
            cache.note_change(id);
            cache.remove(id).is_some()
        };

        if !removed {
            debug!("[{}] delete {} {}: not cached", self.window_id, kind, id);
            return ApplyOutcome::Absent;
        }

        debug!("[{}] delete {} {}", self.window_id, kind, id);
        self.notify(&CacheChange::Deleted {
            kind,
            id: id.to_string(),
        });
        ApplyOutcome::Removed
    }

    /// Applies a decoded backend event.
    pub fn apply_event(&self, event: ChangeEvent) -> ApplyOutcome {
        match event {
            ChangeEvent::Upsert {
                value,
                origin_window_id,
            } => self.apply_upsert(value, origin_window_id.as_deref()),
            ChangeEvent::Delete { target, .. } => self.apply_delete(target.model, &target.id),
        }
    }

    /// Opens a refetch of `kinds`. Until the returned guard is dropped, every
    /// change applied to those kinds survives a later [`replace_kind`] with
    /// a snapshot taken after this call.
    ///
    /// [`replace_kind`]: CacheReconciler::replace_kind
    pub fn begin_refetch(&self, kinds: &[ModelKind]) -> RefetchGuard<'_> {
        let ticket = self.next_refetch_ticket.fetch_add(1, Ordering::Relaxed);
        let mut caches = self.caches_mut();
        for kind in kinds {
            caches.entry(*kind).or_default().begin_refetch(ticket);
        }
        RefetchGuard {
            reconciler: self,
            kinds: kinds.to_vec(),
            ticket,
        }
    }

    /// Rebuilds `kind` from a full refetch. Entries changed while a refetch
    /// of `kind` was open keep their current state; everything else is
    /// replaced by `values`.
    pub fn replace_kind(&self, kind: ModelKind, values: Vec<AnyModel>) {
        let count = {
            let mut caches = self.caches_mut();
            let cache = caches.entry(kind).or_default();
            cache.rebuild(
                values.into_iter().filter(|v| v.kind() == kind).collect(),
                EntrySource::Refetch,
            );
            cache.len()
        };
        debug!("[{}] rebuilt {} with {} entries", self.window_id, kind, count);
        self.notify(&CacheChange::Reset { kind });
    }

    /// Tears down every cache, e.g. after losing the backend context.
    pub fn clear(&self) {
        let kinds: Vec<ModelKind> = self.caches_mut().drain().map(|(kind, _)| kind).collect();
        for kind in kinds {
            self.notify(&CacheChange::Reset { kind });
        }
    }

    pub fn read(&self, kind: ModelKind, id: &str) -> Option<AnyModel> {
        self.caches()
            .get(&kind)
            .and_then(|cache| cache.get(id))
            .map(|entry| entry.value.clone())
    }

    pub fn read_as<T: TypedModel>(&self, id: &str) -> Option<T> {
        self.read(T::KIND, id).and_then(|value| T::try_from(value).ok())
    }

    /// Members of `group_key` for a grouped kind, in first-insertion order.
    pub fn read_group(&self, kind: ModelKind, group_key: &str) -> Vec<AnyModel> {
        self.caches()
            .get(&kind)
            .map(|cache| cache.group(group_key))
            .unwrap_or_default()
    }

    pub fn read_group_as<T: TypedModel>(&self, group_key: &str) -> Vec<T> {
        self.read_group(T::KIND, group_key)
            .into_iter()
            .filter_map(|value| T::try_from(value).ok())
            .collect()
    }

    /// Every cached value of `kind`, ordered by id.
    pub fn read_all(&self, kind: ModelKind) -> Vec<AnyModel> {
        self.caches()
            .get(&kind)
            .map(|cache| cache.all())
            .unwrap_or_default()
    }

    pub fn read_all_as<T: TypedModel>(&self) -> Vec<T> {
        self.read_all(T::KIND)
            .into_iter()
            .filter_map(|value| T::try_from(value).ok())
            .collect()
    }

    pub fn source(&self, kind: ModelKind, id: &str) -> Option<EntrySource> {
        self.caches()
            .get(&kind)
            .and_then(|cache| cache.get(id))
            .map(|entry| entry.source)
    }

    /// True while the entry only reflects this window's write response.
    pub fn is_provisional(&self, kind: ModelKind, id: &str) -> bool {
        self.source(kind, id) == Some(EntrySource::Optimistic)
    }

    pub fn len(&self, kind: ModelKind) -> usize {
        self.caches().get(&kind).map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.caches().values().all(|cache| cache.is_empty())
    }

    /// Registers `listener` for every change affecting `kind`.
    pub fn subscribe<F>(&self, kind: ModelKind, listener: F) -> Subscription
    where
        F: Fn(&CacheChange) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription { kind, id }
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(registered) = listeners.get_mut(&subscription.kind) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|(id, _)| *id != subscription.id);
        before != registered.len()
    }

    fn notify(&self, change: &CacheChange) {
        let listeners: Vec<ChangeListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&change.kind())
            .map(|registered| registered.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in listeners {
            listener(change);
        }
    }
}
