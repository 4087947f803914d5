// src/fetch/mod.rs
// =============================================================================
// This module turns a crawl request into a Response.
//
// - http: the GET itself, with redirects surfaced instead of followed
// - html: link and asset extraction from a page body
// - response: the serializable result handed to the crawl callback
// =============================================================================

mod html;
mod http;
mod response;

pub use html::extract;
pub use http::{build_client, default_client_builder, fetch, DEFAULT_TIMEOUT};
pub use response::{Asset, Link, Response};
