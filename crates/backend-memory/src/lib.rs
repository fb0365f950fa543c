//! In-process backend for winsync.
//!
//! This crate stands in for the process that owns the entities. It keeps
//! every entity in memory, answers the request/response calls of
//! `winsync-core`'s [`EntityStoreClient`](winsync_core::store::EntityStoreClient)
//! and publishes one change event per mutation on a shared
//! [`EventBus`](winsync_core::events::EventBus).
//!
//! ```text
//!  window A          window B
//!  SyncEngine        SyncEngine
//!      │  ▲              │  ▲
//!  calls│  │events   calls│  │events
//!      ▼  │              ▼  │
//!  ┌─────────────────────────────┐
//!  │  MemoryBackend (this crate) │
//!  └─────────────────────────────┘
//! ```

pub mod backend;
pub mod errors;
pub mod records;

pub use backend::MemoryBackend;
pub use errors::BackendError;

// Re-export from winsync-core for convenience
pub use winsync_core::errors::{Error, Result};
