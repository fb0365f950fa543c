//! Building stored records from caller-supplied JSON fields.

use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};
use uuid::Uuid;
use winsync_core::key_values::{is_valid_key_value_namespace, key_value_id};
use winsync_core::{AnyModel, ModelKind};

use crate::errors::BackendError;

/// Fields the backend owns. Values supplied by callers are ignored.
const SERVER_FIELDS: [&str; 5] = ["model", "id", "createdAt", "updatedAt", "updatedBy"];

fn id_prefix(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Workspace => "wk",
        ModelKind::HttpRequest => "rq",
        ModelKind::HttpResponse => "rs",
        ModelKind::KeyValue => "kv",
    }
}

/// Fresh id for a new entity, e.g. `rq_3f2a9c...`.
pub fn generate_id(kind: ModelKind) -> String {
    format!("{}_{}", id_prefix(kind), Uuid::new_v4().simple())
}

/// Id a key-value is stored under. Key-values are addressed by
/// `(namespace, key)`, so writing the same pair twice hits the same record.
pub fn key_value_record_id(fields: &Map<String, Value>) -> Result<String, BackendError> {
    let namespace = required_str(fields, "namespace")?;
    let key = required_str(fields, "key")?;
    if !is_valid_key_value_namespace(namespace) {
        return Err(BackendError::InvalidFields(format!(
            "namespace '{}' would make the id ambiguous",
            namespace
        )));
    }
    Ok(key_value_id(namespace, key))
}

pub fn required_str<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a str, BackendError> {
    match fields.get(name).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(BackendError::InvalidFields(format!(
            "'{}' is required",
            name
        ))),
    }
}

/// Field object of a create/update call.
pub fn as_fields(value: Value) -> Result<Map<String, Value>, BackendError> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(BackendError::InvalidFields(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Builds the stored record: `base` overlaid with caller `fields`, then
/// stamped with server-owned identity and audit fields.
pub fn build_record(
    kind: ModelKind,
    id: &str,
    created_at: NaiveDateTime,
    base: Option<&AnyModel>,
    fields: Map<String, Value>,
    now: NaiveDateTime,
    origin: Option<&str>,
) -> Result<AnyModel, BackendError> {
    let mut record = match base {
        Some(existing) => as_fields(serde_json::to_value(existing)?)?,
        None => Map::new(),
    };
    for (name, value) in fields {
        if !SERVER_FIELDS.contains(&name.as_str()) {
            record.insert(name, value);
        }
    }
    record.insert("model".to_string(), json!(kind));
    record.insert("id".to_string(), json!(id));
    record.insert("createdAt".to_string(), json!(created_at));
    record.insert("updatedAt".to_string(), json!(now));
    record.insert("updatedBy".to_string(), json!(origin));

    Ok(serde_json::from_value(Value::Object(record))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use winsync_core::Model;

    fn at(secs: i64) -> NaiveDateTime {
        DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    #[test]
    fn test_generated_ids_are_prefixed_and_unique() {
        let a = generate_id(ModelKind::HttpRequest);
        let b = generate_id(ModelKind::HttpRequest);
        assert!(a.starts_with("rq_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_caller_cannot_override_server_fields() {
        let fields = as_fields(json!({
            "name": "Mine",
            "id": "forged",
            "updatedBy": "someone_else",
        }))
        .unwrap();

        let record = build_record(
            ModelKind::Workspace,
            "wk_1",
            at(10),
            None,
            fields,
            at(20),
            Some("main_0"),
        )
        .unwrap();

        assert_eq!(record.id(), "wk_1");
        assert_eq!(record.updated_by(), Some("main_0"));
        assert_eq!(record.updated_at(), at(20));
    }

    #[test]
    fn test_patch_keeps_unmentioned_fields() {
        let base = build_record(
            ModelKind::HttpRequest,
            "rq_1",
            at(10),
            None,
            as_fields(json!({"workspaceId": "wk_1", "name": "List", "url": "/items"})).unwrap(),
            at(10),
            None,
        )
        .unwrap();

        let patched = build_record(
            ModelKind::HttpRequest,
            "rq_1",
            at(10),
            Some(&base),
            as_fields(json!({"name": "List all"})).unwrap(),
            at(30),
            Some("main_1"),
        )
        .unwrap();

        match patched {
            AnyModel::HttpRequest(request) => {
                assert_eq!(request.name, "List all");
                assert_eq!(request.url, "/items");
                assert_eq!(request.created_at, at(10));
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_key_value_id_requires_namespace_and_key() {
        let fields = as_fields(json!({"namespace": "app", "key": "theme"})).unwrap();
        assert_eq!(key_value_record_id(&fields).unwrap(), "app::theme");

        let missing = as_fields(json!({"namespace": "app"})).unwrap();
        assert!(matches!(
            key_value_record_id(&missing),
            Err(BackendError::InvalidFields(_))
        ));
    }

    #[test]
    fn test_key_value_namespace_cannot_hold_separator() {
        let nested_key = as_fields(json!({"namespace": "a", "key": "b::c"})).unwrap();
        assert_eq!(key_value_record_id(&nested_key).unwrap(), "a::b::c");

        let nested_namespace = as_fields(json!({"namespace": "a::b", "key": "c"})).unwrap();
        assert!(matches!(
            key_value_record_id(&nested_namespace),
            Err(BackendError::InvalidFields(_))
        ));
    }

    #[test]
    fn test_non_object_fields_are_rejected() {
        assert!(as_fields(json!([1, 2])).is_err());
    }

    #[test]
    fn test_mistyped_field_is_rejected() {
        let fields = as_fields(json!({"requestId": "rq_1", "status": "teapot"})).unwrap();
        let result = build_record(
            ModelKind::HttpResponse,
            "rs_1",
            at(1),
            None,
            fields,
            at(1),
            None,
        );
        assert!(matches!(result, Err(BackendError::Record(_))));
    }
}
