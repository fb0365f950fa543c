/// Trailing debounce window applied to bursty update channels
pub const UPDATE_DEBOUNCE_MILLIS: u64 = 500;

/// Namespace used for key-values when the caller does not name one
pub const DEFAULT_KEY_VALUE_NAMESPACE: &str = "app";

/// Separator joining multi-part key-value keys and namespaced ids
pub const KEY_VALUE_KEY_SEPARATOR: &str = "::";

/// Gap left between consecutive request sort priorities
pub const SORT_PRIORITY_STEP: f64 = 1000.0;
