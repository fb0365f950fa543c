//! The capability set every cached entity exposes.

use chrono::NaiveDateTime;

use super::ModelKind;

/// Identity and grouping accessors used by the cache layer.
pub trait Model {
    /// Stable id, unique within the model's kind.
    fn id(&self) -> &str;

    fn kind(&self) -> ModelKind;

    /// Secondary index key for grouped list reads, if the kind is grouped.
    fn group_key(&self) -> Option<&str> {
        None
    }

    /// Last-write timestamp assigned by the backend.
    fn updated_at(&self) -> NaiveDateTime;

    /// Label of the window whose write produced this value.
    fn updated_by(&self) -> Option<&str>;
}

/// A concrete model type with a fixed kind, convertible to and from [`super::AnyModel`].
pub trait TypedModel: Model + Into<super::AnyModel> + TryFrom<super::AnyModel> {
    const KIND: ModelKind;
}
