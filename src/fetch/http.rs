// src/fetch/http.rs
// =============================================================================
// This module fetches a single page over HTTP.
//
// Key functionality:
// - Makes one GET request per crawl request
// - Never follows redirects itself: a 3xx answer becomes a Response that
//   names the redirect target, and the crawler queues that target like any
//   other URL
// - 200 responses are parsed into links and assets
// - Any other status is an error for that URL
//
// Rust concepts:
// - async/await: For network I/O
// - Result<T, E> and ?: errors flow back to the caller unchanged
// - match guards: picking out the redirect status codes
// =============================================================================

use std::time::Duration;

use reqwest::header::LOCATION;
use reqwest::{redirect, Client, ClientBuilder, StatusCode};
use tracing::debug;

use super::response::Response;
use crate::crawl::Request;
use crate::error::FetchError;

/// Timeout used when the caller does not configure their own client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// The default client configuration: a request timeout and our user agent
//
// Example:
//   let client = build_client(default_client_builder().timeout(Duration::from_secs(30)))?;
pub fn default_client_builder() -> ClientBuilder {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
}

/// Builds the HTTP client used for crawling.
///
/// Whatever the builder was configured with, redirects are turned off so the
/// crawler sees every 3xx response.
pub fn build_client(builder: ClientBuilder) -> Result<Client, reqwest::Error> {
    builder.redirect(redirect::Policy::none()).build()
}

// Statuses that carry a Location to follow
// (304 Not Modified is a 3xx but has no target)
fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Fetches the page for a request.
///
/// Parameters:
///   client: HTTP client built with [`build_client`]
///   req: the request to fetch
///
/// Returns:
///   Ok(Response) for 200 (with links and assets) and for redirects (with
///   the redirect target)
///   Err(FetchError) for transport failures and every other status
pub async fn fetch(client: &Client, req: &Request) -> Result<Response, FetchError> {
    let uri = req.url();
    debug!(url = %uri, depth = req.depth(), redirects = req.redirects(), "GET");

    // Send the GET request
    // The client never follows redirects, so this is exactly one round trip
    let http_res = client.get(uri.clone()).send().await?;
    let status = http_res.status();
    debug!(url = %uri, status = status.as_u16(), "response");

    // Decide what to do based on the status code
    match status {
        // Success: fall through and read the body
        StatusCode::OK => {}
        status if is_redirect(status) => {
            // The body is dropped unread when http_res goes out of scope
            let redirect_to = match http_res.headers().get(LOCATION) {
                Some(value) => {
                    let location = String::from_utf8_lossy(value.as_bytes()).into_owned();
                    let target = uri.join(location.trim()).map_err(|source| {
                        FetchError::InvalidLocation {
                            location: location.clone(),
                            source,
                        }
                    })?;
                    Some(target.to_string())
                }
                None => None,
            };
            return Ok(Response::redirect(uri, redirect_to));
        }
        // Everything else (404, 500, 204, ...) is an error for this URL
        status => {
            return Err(FetchError::Status {
                status,
                url: uri.to_string(),
            })
        }
    }

    // The client may have normalized the URL; links resolve against the URL
    // it actually reached.
    let final_url = http_res.url().clone();
    let body = http_res.text().await.map_err(FetchError::Body)?;

    let mut res = Response::from_page(&final_url, &body);
    if final_url != *uri {
        res.original_url = Some(uri.to_string());
    }
    Ok(res)
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why turn off redirects in the client?
//    - reqwest follows redirects by default and only shows the final page
//    - The crawler wants every hop, so it can report redirects and apply
//      its own checks (visited, host lists) to each target
//
// 2. What is a match guard?
//    - `status if is_redirect(status) => ...` only matches when the
//      condition after `if` is true
//
// 3. What does `?` do on `send().await?`?
//    - It returns the reqwest::Error early, converted into
//      FetchError::Transport by the #[from] attribute on that variant
//
// 4. Why String::from_utf8_lossy for the Location header?
//    - Header values are bytes and may not be valid UTF-8
//    - Lossy conversion replaces bad bytes instead of failing
// -----------------------------------------------------------------------------
