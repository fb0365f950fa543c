//! Routes decoded events into the reconciler, through the debouncer where
//! the category asks for it, and rebuilds kinds after a stream gap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use log::{debug, info};

use super::SyncConfig;
use crate::cache::CacheReconciler;
use crate::debounce::Debouncer;
use crate::errors::{Error, Result};
use crate::events::{ChangeAction, ChangeEvent, EventCategory};
use crate::models::ModelKind;
use crate::store::{EntityStoreClient, ListFilter};

pub(crate) type DebounceKey = (ModelKind, String);

pub(crate) struct ChangeHandler {
    reconciler: Arc<CacheReconciler>,
    store: Arc<dyn EntityStoreClient>,
    debouncer: Debouncer<DebounceKey>,
    config: SyncConfig,
    stale: AtomicBool,
}

impl ChangeHandler {
    pub fn new(
        reconciler: Arc<CacheReconciler>,
        store: Arc<dyn EntityStoreClient>,
        config: SyncConfig,
    ) -> Self {
        Self {
            reconciler,
            store,
            debouncer: Debouncer::new(),
            config,
            stale: AtomicBool::new(false),
        }
    }

    pub fn handle(&self, category: EventCategory, event: ChangeEvent) {
        let key = (event.kind(), event.id().to_string());

        match event.action() {
            ChangeAction::Delete => {
                // A delayed upsert must not resurrect the entity.
                if self.debouncer.cancel(&key) {
                    debug!("Dropped pending update for deleted {} {}", key.0, key.1);
                }
                self.reconciler.apply_event(event);
            }
            ChangeAction::Upsert if self.config.is_debounced(category) => {
                let reconciler = Arc::clone(&self.reconciler);
                self.debouncer.schedule(
                    key,
                    move || {
                        reconciler.apply_event(event);
                    },
                    self.config.debounce,
                );
            }
            ChangeAction::Upsert => {
                self.reconciler.apply_event(event);
            }
        }
    }

    /// Drops the pending call for a (kind, id) the window just deleted itself.
    pub fn forget(&self, kind: ModelKind, id: &str) {
        self.debouncer.cancel(&(kind, id.to_string()));
    }

    /// Refetches `kinds` and rebuilds their caches. Events applied while the
    /// lists are in flight are newer than the snapshot and survive the rebuild.
    pub async fn resync(&self, kinds: &[ModelKind]) -> Result<()> {
        let _refetch = self.reconciler.begin_refetch(kinds);
        let store = &self.store;
        let fetched = try_join_all(kinds.iter().map(|&kind| async move {
            let values = store.list(kind, &ListFilter::All).await?;
            Ok::<_, Error>((kind, values))
        }))
        .await?;

        for (kind, values) in fetched {
            info!(
                "[{}] Refetched {} {} entries",
                self.reconciler.window_id(),
                values.len(),
                kind
            );
            self.reconciler.replace_kind(kind, values);
        }
        Ok(())
    }

    /// Drops every pending debounced update and tears the cache down.
    pub fn reset(&self) {
        self.debouncer.cancel_all();
        self.reconciler.clear();
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    pub fn clear_stale(&self) {
        self.stale.store(false, Ordering::SeqCst);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }
}
