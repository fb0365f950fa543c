use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{Model, ModelKind, TypedModel};
use crate::http_requests::HttpRequest;
use crate::http_responses::HttpResponse;
use crate::key_values::KeyValue;
use crate::workspaces::Workspace;

/// Any cacheable entity, tagged on the wire by its `model` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum AnyModel {
    Workspace(Workspace),
    HttpRequest(HttpRequest),
    HttpResponse(HttpResponse),
    KeyValue(KeyValue),
}

macro_rules! any_model_variants {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        impl AnyModel {
            fn as_model(&self) -> &dyn Model {
                match self {
                    $(AnyModel::$variant(inner) => inner,)+
                }
            }
        }

        $(
            impl TypedModel for $ty {
                const KIND: ModelKind = ModelKind::$variant;
            }

            impl From<$ty> for AnyModel {
                fn from(value: $ty) -> Self {
                    AnyModel::$variant(value)
                }
            }

            impl TryFrom<AnyModel> for $ty {
                type Error = AnyModel;

                fn try_from(value: AnyModel) -> std::result::Result<Self, Self::Error> {
                    match value {
                        AnyModel::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

any_model_variants! {
    Workspace(Workspace),
    HttpRequest(HttpRequest),
    HttpResponse(HttpResponse),
    KeyValue(KeyValue),
}

impl Model for AnyModel {
    fn id(&self) -> &str {
        self.as_model().id()
    }

    fn kind(&self) -> ModelKind {
        self.as_model().kind()
    }

    fn group_key(&self) -> Option<&str> {
        self.as_model().group_key()
    }

    fn updated_at(&self) -> NaiveDateTime {
        self.as_model().updated_at()
    }

    fn updated_by(&self) -> Option<&str> {
        self.as_model().updated_by()
    }
}

/// Minimal identity carried by a deletion notification.
///
/// The backend may send the full deleted model; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedModelRef {
    pub model: ModelKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl DeletedModelRef {
    pub fn new(model: ModelKind, id: impl Into<String>) -> Self {
        Self {
            model,
            id: id.into(),
            updated_by: None,
        }
    }
}

impl From<&AnyModel> for DeletedModelRef {
    fn from(value: &AnyModel) -> Self {
        Self {
            model: value.kind(),
            id: value.id().to_string(),
            updated_by: value.updated_by().map(str::to_string),
        }
    }
}
