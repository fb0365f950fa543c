//! Request/response access to the authoritative entity store.

mod store_traits;

pub use store_traits::{EntityStoreClient, ListFilter};
