//! Composition root for one window.
//!
//! Wires the event subscriber into the reconciler (through the debouncer where
//! configured), and routes this window's writes through the store client
//! followed by an optimistic cache update.

use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::handler::ChangeHandler;
use super::{EventSubscriber, SyncConfig};
use crate::cache::CacheReconciler;
use crate::constants::DEFAULT_KEY_VALUE_NAMESPACE;
use crate::errors::{Error, Result};
use crate::events::EventChannel;
use crate::http_requests::{next_sort_priority, HttpRequest, NewHttpRequest};
use crate::http_responses::HttpResponse;
use crate::key_values::{
    build_key_value_key, extract_key_value_or, is_valid_key_value_namespace, key_value_id,
    KeyValue, SetKeyValue,
};
use crate::models::{AnyModel, Model, ModelKind, TypedModel};
use crate::store::EntityStoreClient;
use crate::window::WindowId;
use crate::workspaces::{NewWorkspace, Workspace};

fn into_typed<T: TypedModel>(model: AnyModel) -> Result<T> {
    let found = model.kind();
    T::try_from(model).map_err(|_| {
        Error::Unexpected(format!(
            "Store returned a {} where a {} was expected",
            found,
            T::KIND
        ))
    })
}

/// One window's synchronization engine.
///
/// Constructed at window bootstrap and passed by reference to every consumer;
/// the rendering layer reads through [`SyncEngine::reconciler`] and writes
/// through the engine's write calls.
pub struct SyncEngine {
    window_id: WindowId,
    store: Arc<dyn EntityStoreClient>,
    reconciler: Arc<CacheReconciler>,
    handler: Arc<ChangeHandler>,
    subscriber: Mutex<Option<EventSubscriber>>,
}

impl SyncEngine {
    /// Subscribes to every change category, then loads every kind.
    pub async fn start(
        window_id: WindowId,
        store: Arc<dyn EntityStoreClient>,
        channel: &dyn EventChannel,
        config: SyncConfig,
    ) -> Result<Self> {
        let reconciler = Arc::new(CacheReconciler::new(window_id.clone()));
        let handler = Arc::new(ChangeHandler::new(
            Arc::clone(&reconciler),
            Arc::clone(&store),
            config,
        ));
        let subscriber = EventSubscriber::spawn(channel, Arc::clone(&handler))?;

        let engine = Self {
            window_id,
            store,
            reconciler,
            handler,
            subscriber: Mutex::new(Some(subscriber)),
        };
        engine.resync(&ModelKind::ALL).await?;
        info!("[{}] Sync engine started", engine.window_id);
        Ok(engine)
    }

    pub fn window_id(&self) -> &WindowId {
        &self.window_id
    }

    pub fn reconciler(&self) -> &Arc<CacheReconciler> {
        &self.reconciler
    }

    /// True once the change stream was lost; reads may be out of date.
    pub fn is_stale(&self) -> bool {
        self.handler.is_stale()
    }

    /// Refetches `kinds` and rebuilds their caches.
    pub async fn resync(&self, kinds: &[ModelKind]) -> Result<()> {
        self.handler.resync(kinds).await
    }

    /// Rebuilds the window after losing its backend context: drops the old
    /// subscriptions and the whole cache, resubscribes, then refetches.
    pub async fn reconnect(&self, channel: &dyn EventChannel) -> Result<()> {
        warn!("[{}] Reconnecting, rebuilding cache", self.window_id);
        self.stop_subscriber();
        self.handler.reset();

        let subscriber = EventSubscriber::spawn(channel, Arc::clone(&self.handler))?;
        *self.subscriber.lock().unwrap_or_else(PoisonError::into_inner) = Some(subscriber);

        self.handler.clear_stale();
        self.resync(&ModelKind::ALL).await
    }

    /// Stops the receive loops and drops pending debounced updates.
    pub fn shutdown(&self) {
        self.stop_subscriber();
        self.handler.reset();
        info!("[{}] Sync engine stopped", self.window_id);
    }

    fn stop_subscriber(&self) {
        if let Some(mut subscriber) = self
            .subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscriber.shutdown();
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates an entity. The cache is only touched once the store succeeded.
    pub async fn create(&self, kind: ModelKind, fields: Value) -> Result<AnyModel> {
        let created = self.store.create(kind, fields, &self.window_id).await?;
        self.reconciler.apply_optimistic(created.clone());
        Ok(created)
    }

    pub async fn update(&self, kind: ModelKind, id: &str, patch: Value) -> Result<AnyModel> {
        let updated = self.store.update(kind, id, patch, &self.window_id).await?;
        self.reconciler.apply_optimistic(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&self, kind: ModelKind, id: &str) -> Result<()> {
        self.store.delete(kind, id, &self.window_id).await?;
        self.handler.forget(kind, id);
        self.reconciler.apply_delete(kind, id);
        Ok(())
    }

    pub async fn create_workspace(&self, workspace: NewWorkspace) -> Result<Workspace> {
        let created = self
            .create(ModelKind::Workspace, serde_json::to_value(workspace)?)
            .await?;
        into_typed(created)
    }

    /// Creates a request at the end of its workspace's list.
    pub async fn create_request(&self, workspace_id: &str, name: &str) -> Result<HttpRequest> {
        if workspace_id.is_empty() {
            return Err(Error::Validation(
                "Cannot create a request without a workspace".to_string(),
            ));
        }

        let siblings = self.requests(workspace_id);
        let request = NewHttpRequest {
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            sort_priority: next_sort_priority(&siblings),
            ..Default::default()
        };
        let created = self
            .create(ModelKind::HttpRequest, serde_json::to_value(request)?)
            .await?;
        into_typed(created)
    }

    /// Stores `value` as JSON under `(namespace, key parts)`.
    ///
    /// The store treats key-value creation as an upsert on `(namespace, key)`.
    pub async fn set_key_value<T: Serialize + ?Sized>(
        &self,
        namespace: Option<&str>,
        key: &[&str],
        value: &T,
    ) -> Result<KeyValue> {
        let namespace = namespace.unwrap_or(DEFAULT_KEY_VALUE_NAMESPACE);
        if !is_valid_key_value_namespace(namespace) {
            return Err(Error::Validation(format!(
                "Invalid key-value namespace '{}'",
                namespace
            )));
        }
        let fields = serde_json::to_value(SetKeyValue {
            namespace: namespace.to_string(),
            key: build_key_value_key(key),
            value: serde_json::to_string(value)?,
        })?;

        let written = self.create(ModelKind::KeyValue, fields).await?;
        into_typed(written)
    }

    /// Deletes every cached response of `request_id`. Returns how many were deleted.
    pub async fn delete_all_responses(&self, request_id: &str) -> Result<usize> {
        let responses = self.responses(request_id);
        for response in &responses {
            self.delete(ModelKind::HttpResponse, &response.id).await?;
        }
        Ok(responses.len())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Decoded key-value from the cache, or `fallback` when absent or unreadable.
    pub fn get_key_value<T: DeserializeOwned>(
        &self,
        namespace: Option<&str>,
        key: &[&str],
        fallback: T,
    ) -> T {
        let namespace = namespace.unwrap_or(DEFAULT_KEY_VALUE_NAMESPACE);
        let id = key_value_id(namespace, &build_key_value_key(key));
        let kv = self.reconciler.read_as::<KeyValue>(&id);
        extract_key_value_or(kv.as_ref(), fallback)
    }

    pub fn workspaces(&self) -> Vec<Workspace> {
        self.reconciler.read_all_as()
    }

    pub fn requests(&self, workspace_id: &str) -> Vec<HttpRequest> {
        self.reconciler.read_group_as(workspace_id)
    }

    pub fn responses(&self, request_id: &str) -> Vec<HttpResponse> {
        self.reconciler.read_group_as(request_id)
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.stop_subscriber();
    }
}
