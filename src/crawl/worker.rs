// src/crawl/worker.rs
// =============================================================================
// The worker runs the breadth-first crawl loop.
//
// For every request popped from the queue:
// 1. Stop if the crawl was cancelled
// 2. Pop the next request; an empty pop means the crawl is complete
// 3. Run the fetch gates; a denied request is finished and skipped
// 4. Fetch the page (cancellation aborts the HTTP request)
// 5. Hand the result to the callback, which may skip the page's links or
//    abort the whole crawl
// 6. Queue the redirect target and every link, then finish the request
//
// A request is finished only after its children are queued, so the queue
// never sees zero work in flight while a page is still producing more.
// =============================================================================

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::check_fetch::CheckFetchStack;
use super::queue::Queue;
use super::request::Request;
use crate::error::{CrawlError, FetchError};
use crate::fetch::{fetch, Response};

/// What the crawl callback wants done with a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visit {
    /// Queue the page's redirect target and links.
    #[default]
    Follow,
    /// Keep crawling, but do not queue anything found on this page.
    Skip,
}

/// Processes requests from a queue one at a time.
pub struct Worker<F> {
    client: Client,
    check_fetch: CheckFetchStack,
    max_depth: Option<usize>,
    callback: F,
}

impl<F> Worker<F>
where
    F: FnMut(&str, Result<&Response, &FetchError>) -> anyhow::Result<Visit> + Send,
{
    /// Creates a worker.
    ///
    /// `client` must not follow redirects (see [`crate::fetch::build_client`]).
    /// The callback runs once per fetched URL with either the response or
    /// the fetch error.
    pub fn new(client: Client, callback: F) -> Self {
        Self {
            client,
            check_fetch: CheckFetchStack::new(),
            max_depth: None,
            callback,
        }
    }

    pub fn with_check_fetch(mut self, check_fetch: CheckFetchStack) -> Self {
        self.check_fetch = check_fetch;
        self
    }

    /// Pages at this depth are fetched but their links are not queued.
    /// `None` means no limit.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Runs until the queue is exhausted, the crawl is cancelled or the
    /// callback returns an error.
    pub async fn run(&mut self, cancel: &CancellationToken, queue: &dyn Queue) -> Result<(), CrawlError> {
        loop {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            let Some(mut req) = queue.pop().await? else {
                debug!("no more requests");
                return Ok(());
            };

            if !self.check_fetch.allows(&req) {
                debug!(url = %req.url(), "fetch denied");
                req.finish();
                continue;
            }

            // Race the fetch against cancellation so a slow server can't
            // hold up shutdown
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CrawlError::Cancelled),
                result = fetch(&self.client, &req) => result,
            };
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            // The callback sees errors too, and decides whether to go on
            let url = req.url().to_string();
            match (self.callback)(&url, result.as_ref()) {
                Ok(Visit::Follow) => {}
                Ok(Visit::Skip) => {
                    debug!(url = %url, "skipping links");
                    req.finish();
                    continue;
                }
                Err(err) => {
                    req.finish();
                    return Err(CrawlError::Aborted(err));
                }
            }

            // A failed fetch has nothing to follow
            let res = match result {
                Ok(res) => res,
                Err(_) => {
                    req.finish();
                    continue;
                }
            };

            if let Some(max_depth) = self.max_depth {
                if req.depth() >= max_depth {
                    debug!(url = %url, depth = req.depth(), "max depth reached");
                    req.finish();
                    continue;
                }
            }

            // Children first, then finish: the queue must never see zero
            // work in flight while this page still has links to add
            enqueue_children(queue, &req, &res).await;
            req.finish();
        }
    }
}

// Queues the redirect target (same depth) and every link (one level deeper).
async fn enqueue_children(queue: &dyn Queue, req: &Request, res: &Response) {
    if let Some(target) = &res.redirect_to {
        enqueue(queue, target, |href| req.follow_redirect(href)).await;
    }
    for link in &res.links {
        enqueue(queue, &link.url, |href| req.follow_link(href)).await;
    }
}

// Builds and queues one follow-up request
//
// Parameters:
//   queue: where the request goes
//   href: absolute URL of the redirect target or link
//   build: follow_link or follow_redirect on the parent request
//
// Failures are logged and skipped; one bad link never stops a crawl
async fn enqueue<B>(queue: &dyn Queue, href: &str, build: B)
where
    B: FnOnce(&str) -> Result<Request, url::ParseError>,
{
    if href.is_empty() {
        return;
    }
    let next = match build(href) {
        Ok(next) => next,
        Err(err) => {
            debug!(url = href, error = %err, "dropping malformed URL");
            return;
        }
    };
    if let Err(err) = queue.push(next).await {
        warn!(url = href, error = %err, "failed to queue request");
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is `let ... else`?
//    - `let Some(req) = ... else { return ... };` binds req if the pattern
//      matches, otherwise runs the else block, which must leave the loop
//
// 2. What does tokio::select! with `biased;` do?
//    - Waits on several futures and runs the branch of the first one ready
//    - `biased;` checks branches top to bottom, so cancellation wins a tie
//    - The losing future (the HTTP request) is dropped, which aborts it
//
// 3. Why is the callback a generic F and not a Box<dyn FnMut>?
//    - The compiler generates a worker per callback type, so closures
//      that borrow local variables (like a Vec of results) just work
//
// 4. Why call finish() on every path?
//    - The queue counts requests until they are finished
//    - Forgetting one would keep the crawl from ever completing
//    - As a backstop, dropping a request finishes it too
// -----------------------------------------------------------------------------
