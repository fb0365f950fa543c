//! Helpers for addressing and decoding key-values.

use serde::de::DeserializeOwned;

use super::KeyValue;
use crate::constants::KEY_VALUE_KEY_SEPARATOR;

/// Joins multi-part keys, e.g. `["sidebar", "width"]` -> `sidebar::width`.
pub fn build_key_value_key<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(KEY_VALUE_KEY_SEPARATOR)
}

/// Cache id of the key-value stored under `(namespace, key)`.
///
/// Only unambiguous for namespaces accepted by [`is_valid_key_value_namespace`].
pub fn key_value_id(namespace: &str, key: &str) -> String {
    format!("{}{}{}", namespace, KEY_VALUE_KEY_SEPARATOR, key)
}

/// Ids split at their first separator, so a namespace may neither contain
/// one nor end in a partial one. Keys are free to contain separators.
pub fn is_valid_key_value_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && !namespace.contains(KEY_VALUE_KEY_SEPARATOR)
        && !namespace.ends_with(':')
}

/// Decodes the stored JSON document. Returns `None` for absent or undecodable values.
pub fn extract_key_value<T: DeserializeOwned>(kv: Option<&KeyValue>) -> Option<T> {
    let kv = kv?;
    match serde_json::from_str(&kv.value) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Ignoring undecodable key-value {}: {}", kv.id, e);
            None
        }
    }
}

pub fn extract_key_value_or<T: DeserializeOwned>(kv: Option<&KeyValue>, fallback: T) -> T {
    extract_key_value(kv).unwrap_or(fallback)
}
