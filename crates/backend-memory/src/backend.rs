//! The in-memory entity store.
//!
//! Every mutation is applied and published under the table write lock, so
//! change events go out in exactly the order the mutations were applied.
//! Publishing never blocks: broadcast sends only enqueue.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use winsync_core::events::{EventBus, EventCategory, EventChannel, EventEnvelope};
use winsync_core::http_responses::HttpResponse;
use winsync_core::models::DeletedModelRef;
use winsync_core::store::{EntityStoreClient, ListFilter};
use winsync_core::{AnyModel, Model, ModelKind, Result, WindowId};

use crate::errors::BackendError;
use crate::records::{as_fields, build_record, generate_id, key_value_record_id, required_str};

type Table = BTreeMap<String, AnyModel>;
type TablesGuard<'a> = RwLockWriteGuard<'a, HashMap<ModelKind, Table>>;

/// A change to publish while the mutation still holds the table lock.
enum Published {
    Upserted(AnyModel),
    Deleted(DeletedModelRef),
}

pub struct MemoryBackend {
    tables: RwLock<HashMap<ModelKind, Table>>,
    bus: EventBus,
}

impl MemoryBackend {
    pub fn new(event_capacity: usize) -> Self {
        MemoryBackend {
            tables: RwLock::new(HashMap::new()),
            bus: EventBus::new(event_capacity),
        }
    }

    fn tables(&self) -> RwLockReadGuard<'_, HashMap<ModelKind, Table>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn tables_mut(&self) -> TablesGuard<'_> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, kind: ModelKind, id: &str) -> Option<AnyModel> {
        self.tables().get(&kind).and_then(|t| t.get(id)).cloned()
    }

    pub fn count(&self, kind: ModelKind) -> usize {
        self.tables().get(&kind).map_or(0, Table::len)
    }

    /// Records a response for `request_id` on behalf of the backend itself
    /// (no originating window), as when a request finishes sending.
    pub fn record_response(&self, request_id: &str, fields: Value) -> Result<HttpResponse> {
        let mut fields = as_fields(fields)?;
        fields.insert("requestId".to_string(), Value::String(request_id.to_string()));

        let record = {
            let mut tables = self.tables_mut();
            let record = insert_new(&mut tables, ModelKind::HttpResponse, fields, None)?;
            self.publish(&tables, vec![Published::Upserted(record.clone())]);
            record
        };

        match record {
            AnyModel::HttpResponse(response) => Ok(response),
            other => Err(winsync_core::Error::Unexpected(format!(
                "Recorded a {} instead of a response",
                other.kind()
            ))),
        }
    }

    /// Updates a response in place on behalf of the backend, e.g. while the
    /// body is still streaming in.
    pub fn update_response(&self, id: &str, patch: Value) -> Result<AnyModel> {
        let patch = as_fields(patch)?;
        let mut tables = self.tables_mut();
        let record = update_existing(&mut tables, ModelKind::HttpResponse, id, patch, None)?;
        self.publish(&tables, vec![Published::Upserted(record.clone())]);
        Ok(record)
    }

    /// Deletes all but the `keep` newest responses of `request_id`.
    /// Returns how many were deleted.
    pub fn prune_responses(&self, request_id: &str, keep: usize) -> Result<usize> {
        let mut tables = self.tables_mut();
        let table = tables.entry(ModelKind::HttpResponse).or_default();

        let mut responses: Vec<(NaiveDateTime, String)> = table
            .values()
            .filter(|m| m.group_key() == Some(request_id))
            .map(|m| (created_at(m), m.id().to_string()))
            .collect();
        responses.sort_by(|a, b| b.cmp(a));

        let published: Vec<Published> = responses
            .into_iter()
            .skip(keep)
            .filter_map(|(_, id)| table.remove(&id))
            .map(|removed| Published::Deleted(DeletedModelRef::from(&removed)))
            .collect();

        let pruned = published.len();
        if pruned > 0 {
            info!("Pruned {} responses of request {}", pruned, request_id);
        }
        self.publish(&tables, published);
        Ok(pruned)
    }

    /// Simulates losing the backend context: every window's change stream
    /// ends. Stored entities are kept.
    pub fn disconnect(&self) {
        warn!("Disconnecting every change stream");
        self.bus.close();
    }

    /// Takes the write guard so events can only be sent by the mutation
    /// that produced them, before any other writer gets in.
    fn publish(&self, _tables: &TablesGuard<'_>, changes: Vec<Published>) {
        for change in changes {
            let envelope = match change {
                Published::Upserted(model) => serde_json::to_value(&model).map(|payload| {
                    EventEnvelope::new(EventCategory::for_upsert(model.kind()).channel_name(), payload)
                }),
                Published::Deleted(target) => serde_json::to_value(&target).map(|payload| {
                    EventEnvelope::new(EventCategory::DeletedModel.channel_name(), payload)
                }),
            };
            match envelope {
                Ok(envelope) => {
                    let listeners = self.bus.publish(envelope);
                    debug!("Published change to {} listeners", listeners);
                }
                Err(e) => warn!("Failed to encode change event: {}", e),
            }
        }
    }
}

fn created_at(model: &AnyModel) -> NaiveDateTime {
    match model {
        AnyModel::Workspace(m) => m.created_at,
        AnyModel::HttpRequest(m) => m.created_at,
        AnyModel::HttpResponse(m) => m.created_at,
        AnyModel::KeyValue(m) => m.created_at,
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn find<'a>(
    tables: &'a HashMap<ModelKind, Table>,
    kind: ModelKind,
    id: &str,
) -> std::result::Result<&'a AnyModel, BackendError> {
    tables
        .get(&kind)
        .and_then(|t| t.get(id))
        .ok_or_else(|| BackendError::NotFound {
            kind,
            id: id.to_string(),
        })
}

/// Checks parent references and fills fields derived from the parent.
fn resolve_parent(
    tables: &HashMap<ModelKind, Table>,
    kind: ModelKind,
    fields: &mut Map<String, Value>,
) -> std::result::Result<(), BackendError> {
    let (parent, field) = match kind {
        ModelKind::HttpRequest => (ModelKind::Workspace, "workspaceId"),
        ModelKind::HttpResponse => (ModelKind::HttpRequest, "requestId"),
        ModelKind::Workspace | ModelKind::KeyValue => return Ok(()),
    };
    let parent_id = required_str(fields, field)?.to_string();
    let Ok(parent_record) = find(tables, parent, &parent_id) else {
        return Err(BackendError::MissingParent {
            kind,
            parent,
            parent_id,
        });
    };

    if let AnyModel::HttpRequest(request) = parent_record {
        fields.insert(
            "workspaceId".to_string(),
            Value::String(request.workspace_id.clone()),
        );
    }
    Ok(())
}

fn insert_new(
    tables: &mut HashMap<ModelKind, Table>,
    kind: ModelKind,
    mut fields: Map<String, Value>,
    origin: Option<&str>,
) -> std::result::Result<AnyModel, BackendError> {
    if kind == ModelKind::KeyValue {
        let id = key_value_record_id(&fields)?;
        if find(tables, kind, &id).is_ok() {
            return update_existing(tables, kind, &id, fields, origin);
        }
        let created = now();
        return store(tables, build_record(kind, &id, created, None, fields, created, origin)?);
    }

    resolve_parent(tables, kind, &mut fields)?;
    let created = now();
    let record = build_record(kind, &generate_id(kind), created, None, fields, created, origin)?;
    store(tables, record)
}

fn update_existing(
    tables: &mut HashMap<ModelKind, Table>,
    kind: ModelKind,
    id: &str,
    mut patch: Map<String, Value>,
    origin: Option<&str>,
) -> std::result::Result<AnyModel, BackendError> {
    let existing = find(tables, kind, id)?.clone();
    if let AnyModel::KeyValue(kv) = &existing {
        // The id is derived from these two.
        for (field, current) in [("namespace", &kv.namespace), ("key", &kv.key)] {
            if patch
                .get(field)
                .is_some_and(|value| value.as_str() != Some(current.as_str()))
            {
                return Err(BackendError::InvalidFields(format!(
                    "key-value '{}' cannot change its '{}'",
                    id, field
                )));
            }
        }
    }
    if patch.contains_key("workspaceId") || patch.contains_key("requestId") {
        let mut merged = as_fields(serde_json::to_value(&existing)?)?;
        merged.extend(patch);
        resolve_parent(tables, kind, &mut merged)?;
        patch = merged;
    }

    let record = build_record(kind, id, created_at(&existing), Some(&existing), patch, now(), origin)?;
    store(tables, record)
}

fn store(
    tables: &mut HashMap<ModelKind, Table>,
    record: AnyModel,
) -> std::result::Result<AnyModel, BackendError> {
    tables
        .entry(record.kind())
        .or_default()
        .insert(record.id().to_string(), record.clone());
    Ok(record)
}

/// Removes (kind, id) and everything that belongs to it, children first.
fn remove_cascade(
    tables: &mut HashMap<ModelKind, Table>,
    kind: ModelKind,
    id: &str,
    removed: &mut Vec<AnyModel>,
) {
    let child_kind = match kind {
        ModelKind::Workspace => Some(ModelKind::HttpRequest),
        ModelKind::HttpRequest => Some(ModelKind::HttpResponse),
        ModelKind::HttpResponse | ModelKind::KeyValue => None,
    };
    if let Some(child_kind) = child_kind {
        let children: Vec<String> = tables
            .get(&child_kind)
            .map(|t| {
                t.values()
                    .filter(|m| m.group_key() == Some(id))
                    .map(|m| m.id().to_string())
                    .collect()
            })
            .unwrap_or_default();
        for child in children {
            remove_cascade(tables, child_kind, &child, removed);
        }
    }

    if let Some(record) = tables.get_mut(&kind).and_then(|t| t.remove(id)) {
        removed.push(record);
    }
}

#[async_trait]
impl EntityStoreClient for MemoryBackend {
    async fn create(&self, kind: ModelKind, fields: Value, origin: &WindowId) -> Result<AnyModel> {
        let fields = as_fields(fields)?;
        let mut tables = self.tables_mut();
        let record = insert_new(&mut tables, kind, fields, Some(origin.as_str()))?;
        debug!("[{}] created {} {}", origin, kind, record.id());
        self.publish(&tables, vec![Published::Upserted(record.clone())]);
        Ok(record)
    }

    async fn update(
        &self,
        kind: ModelKind,
        id: &str,
        patch: Value,
        origin: &WindowId,
    ) -> Result<AnyModel> {
        let patch = as_fields(patch)?;
        let mut tables = self.tables_mut();
        let record = update_existing(&mut tables, kind, id, patch, Some(origin.as_str()))?;
        debug!("[{}] updated {} {}", origin, kind, id);
        self.publish(&tables, vec![Published::Upserted(record.clone())]);
        Ok(record)
    }

    async fn delete(&self, kind: ModelKind, id: &str, origin: &WindowId) -> Result<()> {
        let mut tables = self.tables_mut();
        find(&tables, kind, id)?;
        let mut removed = Vec::new();
        remove_cascade(&mut tables, kind, id, &mut removed);

        debug!(
            "[{}] deleted {} {} ({} records)",
            origin,
            kind,
            id,
            removed.len()
        );
        let published = removed
            .iter()
            .map(|record| {
                let mut target = DeletedModelRef::from(record);
                target.updated_by = Some(origin.to_string());
                Published::Deleted(target)
            })
            .collect();
        self.publish(&tables, published);
        Ok(())
    }

    async fn list(&self, kind: ModelKind, filter: &ListFilter) -> Result<Vec<AnyModel>> {
        let tables = self.tables();
        let Some(table) = tables.get(&kind) else {
            return Ok(Vec::new());
        };
        Ok(table
            .values()
            .filter(|m| match filter {
                ListFilter::All => true,
                ListFilter::Group(group) => m.group_key() == Some(group.as_str()),
            })
            .cloned()
            .collect())
    }
}

impl EventChannel for MemoryBackend {
    fn listen(&self, channel: &str) -> Result<broadcast::Receiver<EventEnvelope>> {
        self.bus.listen(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use winsync_core::errors::{Error, StoreError};

    fn window() -> WindowId {
        WindowId::new("main_0")
    }

    async fn workspace(backend: &MemoryBackend) -> String {
        backend
            .create(ModelKind::Workspace, json!({"name": "API"}), &window())
            .await
            .unwrap()
            .id()
            .to_string()
    }

    async fn request(backend: &MemoryBackend, workspace_id: &str) -> String {
        backend
            .create(
                ModelKind::HttpRequest,
                json!({"workspaceId": workspace_id, "name": "List"}),
                &window(),
            )
            .await
            .unwrap()
            .id()
            .to_string()
    }

    #[tokio::test]
    async fn test_create_stamps_origin_and_publishes() {
        let backend = MemoryBackend::new(16);
        let mut rx = backend.listen("updated_workspace").unwrap();

        let created = backend
            .create(ModelKind::Workspace, json!({"name": "API"}), &window())
            .await
            .unwrap();

        assert!(created.id().starts_with("wk_"));
        assert_eq!(created.updated_by(), Some("main_0"));
        let envelope = rx.try_recv().unwrap();
        assert_eq!(envelope.event, "updated_workspace");
        assert_eq!(envelope.payload["id"], json!(created.id()));
        assert_eq!(envelope.payload["updatedBy"], json!("main_0"));
    }

    #[tokio::test]
    async fn test_request_requires_existing_workspace() {
        let backend = MemoryBackend::new(16);
        let mut rx = backend.listen("updated_request").unwrap();

        let result = backend
            .create(
                ModelKind::HttpRequest,
                json!({"workspaceId": "wk_missing", "name": "Orphan"}),
                &window(),
            )
            .await;

        assert!(matches!(result, Err(Error::Store(StoreError::Rejected(_)))));
        assert_eq!(backend.count(ModelKind::HttpRequest), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_key_value_create_is_upsert() {
        let backend = MemoryBackend::new(16);
        let fields = json!({"namespace": "app", "key": "theme", "value": "\"dark\""});
        let first = backend
            .create(ModelKind::KeyValue, fields, &window())
            .await
            .unwrap();
        let second = backend
            .create(
                ModelKind::KeyValue,
                json!({"namespace": "app", "key": "theme", "value": "\"light\""}),
                &WindowId::new("main_1"),
            )
            .await
            .unwrap();

        assert_eq!(first.id(), "app::theme");
        assert_eq!(second.id(), "app::theme");
        assert_eq!(backend.count(ModelKind::KeyValue), 1);
        assert_eq!(created_at(&first), created_at(&second));
        assert_eq!(second.updated_by(), Some("main_1"));
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let backend = MemoryBackend::new(16);
        let result = backend
            .update(ModelKind::Workspace, "wk_nope", json!({"name": "x"}), &window())
            .await;
        assert!(matches!(
            result,
            Err(Error::Store(StoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_response_inherits_workspace_of_request() {
        let backend = MemoryBackend::new(16);
        let ws = workspace(&backend).await;
        let rq = request(&backend, &ws).await;

        let response = backend
            .record_response(&rq, json!({"status": 200}))
            .unwrap();

        assert_eq!(response.workspace_id, ws);
        assert_eq!(response.request_id, rq);
        assert_eq!(response.updated_by, None);
    }

    #[tokio::test]
    async fn test_delete_cascades_children_first() {
        let backend = MemoryBackend::new(16);
        let ws = workspace(&backend).await;
        let rq = request(&backend, &ws).await;
        backend.record_response(&rq, json!({"status": 200})).unwrap();
        let mut rx = backend.listen("deleted_model").unwrap();

        backend
            .delete(ModelKind::Workspace, &ws, &window())
            .await
            .unwrap();

        let models: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.payload["model"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(models, vec!["http_response", "http_request", "workspace"]);
        assert_eq!(backend.count(ModelKind::HttpRequest), 0);
        assert_eq!(backend.count(ModelKind::HttpResponse), 0);
    }

    #[tokio::test]
    async fn test_list_filters_by_group() {
        let backend = MemoryBackend::new(16);
        let ws_a = workspace(&backend).await;
        let ws_b = workspace(&backend).await;
        request(&backend, &ws_a).await;
        request(&backend, &ws_a).await;
        request(&backend, &ws_b).await;

        let in_a = backend
            .list(ModelKind::HttpRequest, &ListFilter::Group(ws_a))
            .await
            .unwrap();
        let all = backend
            .list(ModelKind::HttpRequest, &ListFilter::All)
            .await
            .unwrap();

        assert_eq!(in_a.len(), 2);
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_key_value_update_cannot_change_its_address() {
        let backend = MemoryBackend::new(16);
        let fields = json!({"namespace": "app", "key": "theme", "value": "\"dark\""});
        backend
            .create(ModelKind::KeyValue, fields, &window())
            .await
            .unwrap();
        let mut rx = backend.listen("updated_key_value").unwrap();

        for patch in [json!({"key": "font"}), json!({"namespace": "other"})] {
            let result = backend
                .update(ModelKind::KeyValue, "app::theme", patch, &window())
                .await;
            assert!(matches!(result, Err(Error::Store(StoreError::Rejected(_)))));
        }
        let same = backend
            .update(
                ModelKind::KeyValue,
                "app::theme",
                json!({"key": "theme", "value": "\"light\""}),
                &window(),
            )
            .await
            .unwrap();

        assert_eq!(same.id(), "app::theme");
        match backend.get(ModelKind::KeyValue, "app::theme") {
            Some(AnyModel::KeyValue(kv)) => {
                assert_eq!(kv.key, "theme");
                assert_eq!(kv.value, "\"light\"");
            }
            other => panic!("unexpected record: {:?}", other),
        }
        assert_eq!(std::iter::from_fn(|| rx.try_recv().ok()).count(), 1);
    }

    #[test]
    fn test_concurrent_writers_publish_in_mutation_order() {
        let runtime = || {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
        };
        let backend = MemoryBackend::new(4096);
        let ws = runtime().block_on(workspace(&backend));
        let mut rx = backend.listen("updated_workspace").unwrap();

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let backend = &backend;
                let ws = ws.as_str();
                scope.spawn(move || {
                    let origin = WindowId::new(format!("main_{}", writer));
                    runtime().block_on(async {
                        for n in 0..50 {
                            backend
                                .update(
                                    ModelKind::Workspace,
                                    ws,
                                    json!({"name": format!("{}-{}", writer, n)}),
                                    &origin,
                                )
                                .await
                                .unwrap();
                        }
                    });
                });
            }
        });

        let envelopes: Vec<EventEnvelope> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(envelopes.len(), 8 * 50);
        let stored = backend.get(ModelKind::Workspace, &ws).unwrap();
        assert_eq!(
            envelopes.last().unwrap().payload,
            serde_json::to_value(&stored).unwrap()
        );
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let backend = MemoryBackend::new(16);
        let ws = workspace(&backend).await;
        let rq = request(&backend, &ws).await;
        let mut ids = Vec::new();
        for status in [200, 201, 202] {
            ids.push(backend.record_response(&rq, json!({"status": status})).unwrap().id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        assert_eq!(backend.prune_responses(&rq, 1).unwrap(), 2);
        assert_eq!(backend.count(ModelKind::HttpResponse), 1);
        assert!(backend.get(ModelKind::HttpResponse, &ids[2]).is_some());
        assert_eq!(backend.prune_responses(&rq, 1).unwrap(), 0);
    }
}
