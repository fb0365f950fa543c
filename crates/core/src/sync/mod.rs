//! Synchronization engine: wires the backend change stream into a window's
//! cache and routes the window's own writes through the store.

mod config;
mod engine;
mod handler;
mod subscriber;


pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use subscriber::EventSubscriber;
