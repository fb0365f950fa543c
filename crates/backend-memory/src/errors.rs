//! Backend-specific error types.
//!
//! These are internal to the backend and are converted to the
//! transport-agnostic [`StoreError`] before being returned to a window.

use thiserror::Error;
use winsync_core::errors::{Error, StoreError};
use winsync_core::ModelKind;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ModelKind, id: String },

    #[error("{kind} references missing {parent} '{parent_id}'")]
    MissingParent {
        kind: ModelKind,
        parent: ModelKind,
        parent_id: String,
    },

    #[error("Invalid fields: {0}")]
    InvalidFields(String),

    #[error("Record does not match its kind: {0}")]
    Record(#[from] serde_json::Error),
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound { kind, id } => Error::Store(StoreError::not_found(kind, id)),
            BackendError::MissingParent { .. } | BackendError::InvalidFields(_) => {
                Error::Store(StoreError::rejected(err.to_string()))
            }
            BackendError::Record(e) => Error::Store(StoreError::rejected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parent_is_a_rejection() {
        let err: Error = BackendError::MissingParent {
            kind: ModelKind::HttpRequest,
            parent: ModelKind::Workspace,
            parent_id: "wk_1".to_string(),
        }
        .into();

        match err {
            Error::Store(StoreError::Rejected(message)) => {
                assert!(message.contains("wk_1"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_not_found_keeps_kind_and_id() {
        let err: Error = BackendError::NotFound {
            kind: ModelKind::Workspace,
            id: "wk_9".to_string(),
        }
        .into();

        assert!(matches!(
            err,
            Error::Store(StoreError::NotFound { kind: ModelKind::Workspace, ref id }) if id == "wk_9"
        ));
    }
}
