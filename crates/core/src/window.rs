//! Window identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, opaque label of one UI window, assigned at window bootstrap.
///
/// The backend stamps it onto every entity a window writes (`updatedBy`), which
/// is how a window recognises its own writes coming back as events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `origin` names this window.
    pub fn is_origin_of(&self, origin: Option<&str>) -> bool {
        origin == Some(self.0.as_str())
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowId {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for WindowId {
    fn from(label: String) -> Self {
        Self(label)
    }
}
