//! Workspaces module - the flat, ungrouped top-level entity.

mod workspaces_model;

pub use workspaces_model::{NewWorkspace, Workspace};
