// src/error.rs
// =============================================================================
// Error types for every layer of the crawler.
//
// - QueueError: raised by the task queue (including misuse of the queue)
// - ExtractError: raised by Response::read when the base URL is invalid
// - FetchError: per-URL failures, handed to the crawl callback
// - CrawlError: terminal result of a whole crawl
//
// Only CrawlError ends a crawl. FetchError values are reported to the
// callback, which decides whether the crawl goes on.
// =============================================================================

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by a [`crate::crawl::Queue`].
#[derive(Debug, Error)]
pub enum QueueError {
    /// The crawl was cancelled while pushing or waiting for work.
    #[error("queue operation cancelled")]
    Cancelled,

    /// All work has been completed and the queue no longer accepts requests.
    #[error("cannot push {url}: queue is closed after completion")]
    Closed { url: String },

    /// The request already ran its completion hook.
    #[error("cannot push {url}: request was already finished")]
    AlreadyFinished { url: String },

    /// The request is still in flight in a queue.
    #[error("cannot push {url}: request is already queued")]
    AlreadyQueued { url: String },
}

/// Errors from the HTML extraction step.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid base URL '{url}': {source}")]
    InvalidBase {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Why a single URL could not be crawled.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or timeout failure, passed through untouched.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The server answered with something other than 200 or a redirect.
    #[error("{status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("invalid redirect location '{location}': {source}")]
    InvalidLocation {
        location: String,
        #[source]
        source: url::ParseError,
    },
}

/// Terminal result of a crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid start URL '{url}': {source}")]
    InvalidStartUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Queue(QueueError),

    #[error("crawl cancelled")]
    Cancelled,

    /// The callback returned an error, which stops the crawl.
    #[error("crawl aborted: {0}")]
    Aborted(anyhow::Error),
}

impl CrawlError {
    /// Returns true if the crawl ended because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CrawlError::Cancelled)
    }
}

impl From<QueueError> for CrawlError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Cancelled => CrawlError::Cancelled,
            other => CrawlError::Queue(other),
        }
    }
}
