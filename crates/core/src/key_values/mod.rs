//! Key-values module - namespaced settings persisted by the backend.

mod key_values_model;
mod key_values_store;

pub use key_values_model::{KeyValue, SetKeyValue};
pub use key_values_store::{
    build_key_value_key, extract_key_value, extract_key_value_or, is_valid_key_value_namespace,
    key_value_id,
};
