//! Key-value domain models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Model, ModelKind};

/// A namespaced setting. `value` holds a JSON-encoded document.
///
/// A JSON `null` value means the field was cleared; the cache stores it like
/// any other value and typed reads fall back to the caller's default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValue {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
    pub namespace: String,
    pub key: String,
    pub value: String,
}

impl Model for KeyValue {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ModelKind {
        ModelKind::KeyValue
    }

    fn group_key(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }
}

/// Fields sent to the backend to upsert a key-value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetKeyValue {
    pub namespace: String,
    pub key: String,
    pub value: String,
}
