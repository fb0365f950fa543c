//! Model capability set shared by every cached entity kind.
//!
//! The reconciler only ever talks to [`Model`]; adding a kind means adding a
//! [`ModelKind`] variant, a model struct and an [`AnyModel`] variant.

mod any_model;
mod model_kind;
mod model_traits;

pub use any_model::{AnyModel, DeletedModelRef};
pub use model_kind::ModelKind;
pub use model_traits::{Model, TypedModel};
