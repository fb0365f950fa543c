//! HTTP responses module - responses are grouped by the request that produced them.

mod http_responses_model;

pub use http_responses_model::{HttpResponse, HttpResponseHeader};
