use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Discriminator for every entity kind held in a window cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Workspace,
    HttpRequest,
    HttpResponse,
    KeyValue,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Workspace,
        ModelKind::HttpRequest,
        ModelKind::HttpResponse,
        ModelKind::KeyValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Workspace => "workspace",
            ModelKind::HttpRequest => "http_request",
            ModelKind::HttpResponse => "http_response",
            ModelKind::KeyValue => "key_value",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown model kind '{}'", s)))
    }
}
