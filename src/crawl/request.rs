// src/crawl/request.rs
// =============================================================================
// A Request is one unit of crawl work: a URL plus the bookkeeping needed to
// walk the web graph breadth-first.
//
// Two independent counters travel with every request:
// - depth: hops along links from the start URL
// - redirects: hops along redirects since the last followed link
//
// A redirect keeps the depth and bumps the redirect count. A link bumps the
// depth and resets the redirect count.
//
// Queues attach a completion hook when they accept a request. finish() runs
// that hook once, which is how the queue knows the work is done.
// =============================================================================

use std::fmt;
use url::Url;

/// Callback run once when a queued request has been fully processed.
pub type FinishHook = Box<dyn FnOnce() + Send>;

/// A URL waiting to be crawled.
pub struct Request {
    url: Url,
    depth: usize,
    redirects: usize,
    finished: bool,
    on_finish: Option<FinishHook>,
}

impl Request {
    /// Builds a request for an absolute URL.
    ///
    /// The fragment is stripped and an empty path becomes "/", so
    /// `https://example.com#top` and `https://example.com/` are the same
    /// request.
    pub fn new(uri: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(uri.trim())?;
        Ok(Self::from_url(url))
    }

    fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        if url.path().is_empty() {
            url.set_path("/");
        }
        Self {
            url,
            depth: 0,
            redirects: 0,
            finished: false,
            on_finish: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn redirects(&self) -> usize {
        self.redirects
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Follow-up request for a link found on this page.
    pub fn follow_link(&self, href: &str) -> Result<Self, url::ParseError> {
        let mut next = Self::new(href)?;
        next.depth = self.depth + 1;
        next.redirects = 0;
        Ok(next)
    }

    /// Follow-up request for the target of a redirect response.
    pub fn follow_redirect(&self, location: &str) -> Result<Self, url::ParseError> {
        let mut next = Self::new(location)?;
        next.depth = self.depth;
        next.redirects = self.redirects + 1;
        Ok(next)
    }

    /// Marks the request as done and runs the completion hook.
    ///
    /// Calling it again does nothing: the hook only ever runs once.
    pub fn finish(&mut self) {
        self.finished = true;
        if let Some(hook) = self.on_finish.take() {
            hook();
        }
    }

    pub(crate) fn has_hook(&self) -> bool {
        self.on_finish.is_some()
    }

    pub(crate) fn set_hook(&mut self, hook: FinishHook) {
        self.on_finish = Some(hook);
    }

    /// Removes the completion hook without running it.
    pub(crate) fn take_hook(&mut self) -> Option<FinishHook> {
        self.on_finish.take()
    }
}

// Dropping a request that a queue is still counting would leave the queue
// waiting forever, so an unfinished request finishes itself on drop.
impl Drop for Request {
    fn drop(&mut self) {
        if self.on_finish.is_some() {
            self.finish();
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("url", &self.url.as_str())
            .field("depth", &self.depth)
            .field("redirects", &self.redirects)
            .field("finished", &self.finished)
            .field("queued", &self.on_finish.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_new_strips_fragment_and_adds_path() {
        let req = Request::new("https://example.com#top").unwrap();
        assert_eq!(req.url().as_str(), "https://example.com/");

        let req = Request::new("https://example.com/docs/page#section").unwrap();
        assert_eq!(req.url().as_str(), "https://example.com/docs/page");
    }

    #[test]
    fn test_new_rejects_relative_url() {
        assert!(Request::new("/just/a/path").is_err());
        assert!(Request::new("").is_err());
    }

    #[test]
    fn test_link_and_redirect_counters() {
        let start = Request::new("https://example.com/").unwrap();

        let redirected = start.follow_redirect("https://example.com/home").unwrap();
        assert_eq!(redirected.depth(), 0);
        assert_eq!(redirected.redirects(), 1);

        let again = redirected.follow_redirect("https://example.com/home/").unwrap();
        assert_eq!(again.depth(), 0);
        assert_eq!(again.redirects(), 2);

        let linked = again.follow_link("https://example.com/about").unwrap();
        assert_eq!(linked.depth(), 1);
        assert_eq!(linked.redirects(), 0);
    }

    #[test]
    fn test_finish_runs_hook_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut req = Request::new("https://example.com/").unwrap();
        let counter = calls.clone();
        req.set_hook(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        req.finish();
        req.finish();
        drop(req);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_finishes_queued_request() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut req = Request::new("https://example.com/").unwrap();
        let counter = calls.clone();
        req.set_hook(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        drop(req);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
