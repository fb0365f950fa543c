//! HTTP request domain models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::constants::SORT_PRIORITY_STEP;
use crate::models::{Model, ModelKind};

/// A single request header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRequestHeader {
    pub enabled: bool,
    pub name: String,
    pub value: String,
}

/// Domain model representing a stored HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRequest {
    pub id: String,
    pub workspace_id: String,
    pub folder_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
    pub name: String,
    pub url: String,
    pub method: String,
    pub body: Option<String>,
    pub body_type: Option<String>,
    pub headers: Vec<HttpRequestHeader>,
    pub sort_priority: f64,
}

impl Model for HttpRequest {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ModelKind {
        ModelKind::HttpRequest
    }

    fn group_key(&self) -> Option<&str> {
        Some(&self.workspace_id)
    }

    fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }
}

/// Input model for creating a new request inside a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewHttpRequest {
    pub workspace_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    pub sort_priority: f64,
}

/// Sort priority for a request appended after `siblings`.
///
/// Leaves a fixed gap so later drag-reordering can slot between neighbours.
pub fn next_sort_priority(siblings: &[HttpRequest]) -> f64 {
    siblings
        .iter()
        .map(|r| r.sort_priority)
        .reduce(f64::max)
        .map_or(SORT_PRIORITY_STEP, |max| max + SORT_PRIORITY_STEP)
}
