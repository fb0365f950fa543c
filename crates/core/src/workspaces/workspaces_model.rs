//! Workspace domain models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Model, ModelKind};

/// Domain model representing a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Workspace {
    pub id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
    pub name: String,
    pub description: String,
}

impl Model for Workspace {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Workspace
    }

    fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }
}

/// Input model for creating a new workspace.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkspace {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}
