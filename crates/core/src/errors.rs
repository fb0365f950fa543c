//! Core error types for window cache synchronization.
//!
//! Errors are local to a window: nothing here is ever propagated to another
//! window's cache. Transport-specific failures are converted to these types by
//! the crate implementing the store and channel traits.

use thiserror::Error;

use crate::models::ModelKind;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the synchronization layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to decode change event: {0}")]
    Decode(#[from] DecodeError),

    #[error("Event channel error: {0}")]
    Channel(String),

    #[error("Input validation failed: {0}")]
    Validation(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Errors returned by the authoritative store for a request/response call.
///
/// A write that fails with any of these never touches the local cache.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed entity does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ModelKind, id: String },

    /// The backend refused the mutation (missing parent, bad fields, ...).
    #[error("Mutation rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached or is shutting down.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: ModelKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Errors raised while turning a raw channel envelope into a typed change event.
///
/// These are always non-fatal: the receive loop logs and drops the event.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unknown event channel '{0}'")]
    UnknownChannel(String),

    #[error("Malformed payload on '{channel}': {source}")]
    Payload {
        channel: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Channel '{channel}' carried a {found} payload, expected {expected}")]
    UnexpectedKind {
        channel: String,
        expected: ModelKind,
        found: ModelKind,
    },
}
