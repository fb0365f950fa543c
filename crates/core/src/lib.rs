//! Winsync Core - cross-window cache synchronization.
//!
//! Every window of the desktop client keeps a local read cache of the
//! entities owned by a single backend process. The backend is the only
//! writer; windows learn about every change, their own included, from a
//! broadcast stream of change events. This crate keeps each window's cache
//! consistent with that stream. It is transport-agnostic and defines traits
//! that the backend adapter implements.

pub mod cache;
pub mod constants;
pub mod debounce;
pub mod errors;
pub mod events;
pub mod http_requests;
pub mod http_responses;
pub mod key_values;
pub mod models;
pub mod store;
pub mod sync;
pub mod window;
pub mod workspaces;

// Re-export the types every consumer touches
pub use models::{AnyModel, Model, ModelKind, TypedModel};
pub use sync::{SyncConfig, SyncEngine};
pub use window::WindowId;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
