//! Client trait for the backend that owns the authoritative store.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;
use crate::models::{AnyModel, ModelKind};
use crate::window::WindowId;

/// Which entities a `list` call returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListFilter {
    #[default]
    All,
    /// Members of one group, e.g. the requests of a workspace.
    Group(String),
}

/// Typed CRUD calls against the backend.
///
/// Each mutating call is one round trip. On success the backend publishes the
/// matching change event to every window, the caller included, stamping
/// `origin` as the entity's `updatedBy`.
#[async_trait]
pub trait EntityStoreClient: Send + Sync {
    /// Create an entity from a JSON object of fields.
    async fn create(&self, kind: ModelKind, fields: Value, origin: &WindowId) -> Result<AnyModel>;

    /// Merge a JSON object patch into an existing entity.
    async fn update(
        &self,
        kind: ModelKind,
        id: &str,
        patch: Value,
        origin: &WindowId,
    ) -> Result<AnyModel>;

    async fn delete(&self, kind: ModelKind, id: &str, origin: &WindowId) -> Result<()>;

    async fn list(&self, kind: ModelKind, filter: &ListFilter) -> Result<Vec<AnyModel>>;
}
