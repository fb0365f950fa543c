//! HTTP response domain models.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::{Model, ModelKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpResponseHeader {
    pub name: String,
    pub value: String,
}

/// Domain model representing a response recorded for a request.
///
/// Responses are updated repeatedly while a request is in flight, so every
/// update is delivered to the cache rather than being debounced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpResponse {
    pub id: String,
    pub request_id: String,
    pub workspace_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
    pub elapsed: i64,
    pub status: i64,
    pub status_reason: Option<String>,
    pub url: String,
    pub body_path: Option<String>,
    pub headers: Vec<HttpResponseHeader>,
    pub error: Option<String>,
}

impl Model for HttpResponse {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ModelKind {
        ModelKind::HttpResponse
    }

    fn group_key(&self) -> Option<&str> {
        Some(&self.request_id)
    }

    fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }
}
