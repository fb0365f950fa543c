//! HTTP requests module - requests are grouped by their workspace.

mod http_requests_model;

pub use http_requests_model::{next_sort_priority, HttpRequest, HttpRequestHeader, NewHttpRequest};
