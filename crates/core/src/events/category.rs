//! Named backend channels and the decoding of their payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ChangeEvent;
use crate::errors::DecodeError;
use crate::models::{AnyModel, DeletedModelRef, Model, ModelKind};

/// Envelope delivered on every backend channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Channel name, e.g. `updated_workspace`.
    pub event: String,
    pub payload: Value,
}

impl EventEnvelope {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// A category of change notification, each published on its own channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    UpdatedWorkspace,
    UpdatedRequest,
    UpdatedResponse,
    UpdatedKeyValue,
    DeletedModel,
}

impl EventCategory {
    pub const ALL: [EventCategory; 5] = [
        EventCategory::UpdatedWorkspace,
        EventCategory::UpdatedRequest,
        EventCategory::UpdatedResponse,
        EventCategory::UpdatedKeyValue,
        EventCategory::DeletedModel,
    ];

    pub fn channel_name(&self) -> &'static str {
        match self {
            EventCategory::UpdatedWorkspace => "updated_workspace",
            EventCategory::UpdatedRequest => "updated_request",
            EventCategory::UpdatedResponse => "updated_response",
            EventCategory::UpdatedKeyValue => "updated_key_value",
            EventCategory::DeletedModel => "deleted_model",
        }
    }

    pub fn from_channel(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.channel_name() == name)
    }

    /// Channel an upsert of `kind` is published on.
    pub fn for_upsert(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Workspace => EventCategory::UpdatedWorkspace,
            ModelKind::HttpRequest => EventCategory::UpdatedRequest,
            ModelKind::HttpResponse => EventCategory::UpdatedResponse,
            ModelKind::KeyValue => EventCategory::UpdatedKeyValue,
        }
    }

    /// Kinds whose cache entries this category can touch.
    pub fn kinds(&self) -> &'static [ModelKind] {
        match self {
            EventCategory::UpdatedWorkspace => &[ModelKind::Workspace],
            EventCategory::UpdatedRequest => &[ModelKind::HttpRequest],
            EventCategory::UpdatedResponse => &[ModelKind::HttpResponse],
            EventCategory::UpdatedKeyValue => &[ModelKind::KeyValue],
            EventCategory::DeletedModel => &ModelKind::ALL,
        }
    }

    /// Decodes a payload received on this category's channel.
    pub fn decode(&self, payload: &Value) -> Result<ChangeEvent, DecodeError> {
        let channel = self.channel_name();
        let malformed = |source| DecodeError::Payload {
            channel: channel.to_string(),
            source,
        };

        match self {
            EventCategory::DeletedModel => {
                let target = DeletedModelRef::deserialize(payload).map_err(malformed)?;
                Ok(ChangeEvent::delete(target))
            }
            _ => {
                let value = AnyModel::deserialize(payload).map_err(malformed)?;
                let expected = self.kinds()[0];
                if value.kind() != expected {
                    return Err(DecodeError::UnexpectedKind {
                        channel: channel.to_string(),
                        expected,
                        found: value.kind(),
                    });
                }
                Ok(ChangeEvent::upsert(value))
            }
        }
    }
}

/// Decodes an envelope into its category and typed event.
pub fn decode_envelope(envelope: &EventEnvelope) -> Result<(EventCategory, ChangeEvent), DecodeError> {
    let category = EventCategory::from_channel(&envelope.event)
        .ok_or_else(|| DecodeError::UnknownChannel(envelope.event.clone()))?;
    let event = category.decode(&envelope.payload)?;
    Ok((category, event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChangeAction;
    use serde_json::json;

    #[test]
    fn test_decode_workspace_update_takes_origin_from_payload() {
        let envelope = EventEnvelope::new(
            "updated_workspace",
            json!({"model": "workspace", "id": "wk_1", "name": "B", "updatedBy": "main_1"}),
        );
        let (category, event) = decode_envelope(&envelope).unwrap();
        assert_eq!(category, EventCategory::UpdatedWorkspace);
        assert_eq!(event.action(), ChangeAction::Upsert);
        assert_eq!(event.kind(), ModelKind::Workspace);
        assert_eq!(event.id(), "wk_1");
        assert_eq!(event.origin_window_id(), Some("main_1"));
    }

    #[test]
    fn test_decode_deleted_model_accepts_full_model() {
        let payload = json!({
            "model": "http_response",
            "id": "rs_1",
            "requestId": "rq_1",
            "status": 200
        });
        let event = EventCategory::DeletedModel.decode(&payload).unwrap();
        assert_eq!(event.action(), ChangeAction::Delete);
        assert_eq!(event.kind(), ModelKind::HttpResponse);
        assert_eq!(event.origin_window_id(), None);
    }

    #[test]
    fn test_decode_rejects_kind_mismatch() {
        let payload = json!({"model": "key_value", "id": "app::theme"});
        let err = EventCategory::UpdatedWorkspace.decode(&payload).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedKind { .. }));
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let err = EventCategory::UpdatedResponse
            .decode(&json!({"model": "http_response", "status": "two hundred"}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));

        let err = EventCategory::DeletedModel.decode(&json!("wk_1")).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }

    #[test]
    fn test_unknown_channel() {
        let err = decode_envelope(&EventEnvelope::new("zoom", json!(1))).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownChannel(name) if name == "zoom"));
    }

    #[test]
    fn test_every_kind_has_an_update_channel() {
        for kind in ModelKind::ALL {
            let category = EventCategory::for_upsert(kind);
            assert_eq!(category.kinds(), &[kind]);
            assert_eq!(
                EventCategory::from_channel(category.channel_name()),
                Some(category)
            );
        }
    }
}
