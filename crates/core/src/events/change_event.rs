//! Typed change notifications.

use serde::{Deserialize, Serialize};

use crate::models::{AnyModel, DeletedModelRef, Model, ModelKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Upsert,
    Delete,
}

/// One entity's change, as published by the backend.
///
/// An upsert always carries the full current value; a delete carries only the
/// identity of the removed entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Upsert {
        value: AnyModel,
        origin_window_id: Option<String>,
    },
    Delete {
        target: DeletedModelRef,
        origin_window_id: Option<String>,
    },
}

impl ChangeEvent {
    /// Creates an upsert whose origin is the value's `updatedBy` marker.
    pub fn upsert(value: AnyModel) -> Self {
        let origin_window_id = value.updated_by().map(str::to_string);
        Self::Upsert {
            value,
            origin_window_id,
        }
    }

    pub fn delete(target: DeletedModelRef) -> Self {
        let origin_window_id = target.updated_by.clone();
        Self::Delete {
            target,
            origin_window_id,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ChangeEvent::Upsert { value, .. } => value.kind(),
            ChangeEvent::Delete { target, .. } => target.model,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::Upsert { value, .. } => value.id(),
            ChangeEvent::Delete { target, .. } => &target.id,
        }
    }

    pub fn action(&self) -> ChangeAction {
        match self {
            ChangeEvent::Upsert { .. } => ChangeAction::Upsert,
            ChangeEvent::Delete { .. } => ChangeAction::Delete,
        }
    }

    pub fn origin_window_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::Upsert {
                origin_window_id, ..
            }
            | ChangeEvent::Delete {
                origin_window_id, ..
            } => origin_window_id.as_deref(),
        }
    }
}
