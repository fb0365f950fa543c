//! Window-local read caches.
//!
//! The [`CacheReconciler`] exclusively owns every per-kind cache. Other
//! components read through its accessors and inject changes through its
//! apply operations; nothing else mutates cache state.

mod kind_cache;
mod reconciler;


pub use kind_cache::EntrySource;
pub use reconciler::{
    ApplyOutcome, CacheChange, CacheReconciler, ChangeListener, RefetchGuard, Subscription,
};
