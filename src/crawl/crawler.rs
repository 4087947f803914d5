// src/crawl/crawler.rs
// =============================================================================
// The crawl runner: the entry point for crawling a site.
//
// How it works:
// 1. CrawlerBuilder collects the options and validates them up front
// 2. crawl() seeds an in-memory queue with the start URL
// 3. A visit-once gate is always added, so link cycles cannot loop forever
// 4. A Worker drains the queue and its result is returned to the caller
//
// Example:
//   let crawler = Crawler::builder().max_depth(2).build()?;
//   crawler.crawl("https://example.com", |url, res| {
//       println!("{} -> {}", url, res.is_ok());
//       Ok(Visit::Follow)
//   }).await?;
// =============================================================================

use reqwest::{Client, ClientBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::check_fetch::{AllowedHosts, CheckFetch, CheckFetchStack, ExcludedHosts, MaxDepth, VisitOnce};
use super::queue::{InMemoryQueue, Queue};
use super::request::Request;
use super::worker::{Visit, Worker};
use crate::error::{CrawlError, FetchError};
use crate::fetch::{build_client, default_client_builder, Response};

/// Options for a [`Crawler`].
#[derive(Default)]
pub struct CrawlerBuilder {
    max_depth: i64,
    allowed_hosts: Vec<String>,
    excluded_hosts: Vec<String>,
    checks: CheckFetchStack,
    client: Option<ClientBuilder>,
}

impl CrawlerBuilder {
    /// How many links deep to follow from the start URL. 0 means unlimited.
    /// Negative values make [`CrawlerBuilder::build`] fail.
    pub fn max_depth(mut self, depth: i64) -> Self {
        self.max_depth = depth;
        self
    }

    /// Only crawl these hosts (`host` or `host:port`).
    pub fn allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts.extend(hosts.into_iter().map(Into::into));
        self
    }

    /// Never crawl these hosts (`host` or `host:port`).
    pub fn excluded_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_hosts.extend(hosts.into_iter().map(Into::into));
        self
    }

    /// Adds a gate that runs before each fetch. Gates run in the order added,
    /// after the built-in depth and host gates.
    pub fn check_fetch(mut self, check: impl CheckFetch + 'static) -> Self {
        self.checks.push(check);
        self
    }

    /// Replaces the default HTTP client configuration (timeouts, proxies,
    /// TLS). Redirect following is always switched off.
    pub fn http_client(mut self, builder: ClientBuilder) -> Self {
        self.client = Some(builder);
        self
    }

    pub fn build(self) -> Result<Crawler, CrawlError> {
        let max_depth = match usize::try_from(self.max_depth) {
            Ok(0) => None,
            Ok(depth) => Some(depth),
            Err(_) => {
                return Err(CrawlError::InvalidConfig(format!(
                    "max depth must be greater or equal than zero, was {}",
                    self.max_depth
                )))
            }
        };

        let client = build_client(self.client.unwrap_or_else(default_client_builder))
            .map_err(CrawlError::Client)?;

        // Cheapest gates first
        let mut check_fetch = CheckFetchStack::new();
        if let Some(depth) = max_depth {
            check_fetch.push(MaxDepth(depth));
        }
        if !self.excluded_hosts.is_empty() {
            check_fetch.push(ExcludedHosts::new(self.excluded_hosts));
        }
        if !self.allowed_hosts.is_empty() {
            check_fetch.push(AllowedHosts::new(self.allowed_hosts));
        }
        if !self.checks.is_empty() {
            check_fetch.push(self.checks);
        }

        Ok(Crawler {
            client,
            max_depth,
            check_fetch,
        })
    }
}

/// Crawls a site breadth-first from a start URL.
pub struct Crawler {
    client: Client,
    max_depth: Option<usize>,
    check_fetch: CheckFetchStack,
}

impl Crawler {
    pub fn builder() -> CrawlerBuilder {
        CrawlerBuilder::default()
    }

    /// A crawler with default options.
    pub fn new() -> Result<Self, CrawlError> {
        Self::builder().build()
    }

    /// Fetches every page reachable from `start_url`, calling `callback`
    /// for each fetched URL with the response or the fetch error.
    ///
    /// Returns an error if the crawl could not start or was stopped early:
    /// an invalid start URL, a callback error, or cancellation.
    pub async fn crawl<F>(&self, start_url: &str, callback: F) -> Result<(), CrawlError>
    where
        F: FnMut(&str, Result<&Response, &FetchError>) -> anyhow::Result<Visit> + Send,
    {
        self.crawl_with_cancellation(start_url, CancellationToken::new(), callback)
            .await
    }

    /// Like [`Crawler::crawl`], stopping with [`CrawlError::Cancelled`] once
    /// `cancel` fires.
    pub async fn crawl_with_cancellation<F>(
        &self,
        start_url: &str,
        cancel: CancellationToken,
        callback: F,
    ) -> Result<(), CrawlError>
    where
        F: FnMut(&str, Result<&Response, &FetchError>) -> anyhow::Result<Visit> + Send,
    {
        let req = Request::new(start_url).map_err(|source| CrawlError::InvalidStartUrl {
            url: start_url.to_string(),
            source,
        })?;

        // Cancelling our own child token on the way out stops the queue task
        // without touching the caller's token.
        let cancel = cancel.child_token();
        let _stop_queue = cancel.clone().drop_guard();

        let queue = InMemoryQueue::new(cancel.clone());
        queue.push(req).await?;

        let mut check_fetch = self.check_fetch.clone();
        check_fetch.push(VisitOnce::new());

        let mut worker = Worker::new(self.client.clone(), callback)
            .with_check_fetch(check_fetch)
            .with_max_depth(self.max_depth);

        info!(url = start_url, max_depth = ?self.max_depth, "starting crawl");
        let result = worker.run(&cancel, &queue).await;
        match &result {
            Ok(()) => info!(url = start_url, "crawl complete"),
            Err(err) => warn!(url = start_url, error = %err, "crawl stopped"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SITE: &[(&str, &str)] = &[
        ("/", include_str!("../../testdata/site/home.html")),
        ("/depth-one.html", include_str!("../../testdata/site/depth-one.html")),
        ("/depth-two.html", include_str!("../../testdata/site/depth-two.html")),
        ("/depth-three.html", include_str!("../../testdata/site/depth-three.html")),
        ("/depth-four.html", include_str!("../../testdata/site/depth-four.html")),
        ("/start-cycle.html", include_str!("../../testdata/site/start-cycle.html")),
        ("/intermediate-cycle.html", include_str!("../../testdata/site/intermediate-cycle.html")),
        ("/loop-cycle.html", include_str!("../../testdata/site/loop-cycle.html")),
    ];

    // Serves the test site; every page must be fetched at most once.
    async fn site() -> MockServer {
        let server = MockServer::start().await;
        for (route, body) in SITE {
            Mock::given(method("GET"))
                .and(path(*route))
                .respond_with(ResponseTemplate::new(200).set_body_raw(*body, "text/html"))
                .expect(0..=1)
                .mount(&server)
                .await;
        }
        server
    }

    #[derive(Debug, PartialEq)]
    struct Page {
        url: String,
        links: usize,
        assets: usize,
        failed: bool,
    }

    fn ok(url: String, links: usize, assets: usize) -> Page {
        Page {
            url,
            links,
            assets,
            failed: false,
        }
    }

    fn failed(url: String) -> Page {
        Page {
            url,
            links: 0,
            assets: 0,
            failed: true,
        }
    }

    async fn crawl_pages(crawler: &Crawler, start: &str) -> Vec<Page> {
        let mut pages = Vec::new();
        crawler
            .crawl(start, |url, res| {
                pages.push(match res {
                    Ok(res) => ok(url.to_string(), res.links.len(), res.assets.len()),
                    Err(_) => failed(url.to_string()),
                });
                Ok(Visit::Follow)
            })
            .await
            .unwrap();
        pages
    }

    #[tokio::test]
    async fn test_crawl_breadth_first() {
        let server = site().await;
        let base = server.uri();

        let pages = crawl_pages(&Crawler::new().unwrap(), &format!("{}/depth-one.html", base)).await;

        assert_eq!(
            pages,
            vec![
                ok(format!("{}/depth-one.html", base), 1, 0),
                ok(format!("{}/depth-two.html", base), 2, 0),
                ok(format!("{}/depth-three.html", base), 1, 0),
                ok(format!("{}/", base), 2, 3),
                ok(format!("{}/depth-four.html", base), 1, 0),
                failed(format!("{}/missing.html", base)),
            ]
        );
    }

    #[tokio::test]
    async fn test_avoid_visiting_twice() {
        let server = site().await;
        let base = server.uri();

        let pages = crawl_pages(&Crawler::new().unwrap(), &format!("{}/start-cycle.html", base)).await;

        assert_eq!(
            pages,
            vec![
                ok(format!("{}/start-cycle.html", base), 2, 0),
                ok(format!("{}/intermediate-cycle.html", base), 1, 0),
                ok(format!("{}/loop-cycle.html", base), 1, 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_max_depth() {
        let server = site().await;
        let crawler = Crawler::builder().max_depth(1).build().unwrap();

        let pages = crawl_pages(&crawler, &format!("{}/depth-one.html", server.uri())).await;

        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn test_negative_max_depth_is_rejected() {
        let err = Crawler::builder().max_depth(-1).build().err().unwrap();
        assert!(matches!(err, CrawlError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_check_fetch() {
        let server = site().await;
        let crawler = Crawler::builder()
            .check_fetch(|req: &Request| req.url().path() == "/depth-one.html")
            .build()
            .unwrap();

        let pages = crawl_pages(&crawler, &format!("{}/depth-one.html", server.uri())).await;

        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn test_host_filters() {
        let server = site().await;
        let start = format!("{}/depth-one.html", server.uri());
        let host = start
            .trim_start_matches("http://")
            .trim_end_matches("/depth-one.html")
            .to_string();

        let excluded = Crawler::builder().excluded_hosts([host.clone()]).build().unwrap();
        assert!(crawl_pages(&excluded, &start).await.is_empty());

        let elsewhere = Crawler::builder().allowed_hosts(["example.com"]).build().unwrap();
        assert!(crawl_pages(&elsewhere, &start).await.is_empty());

        let allowed = Crawler::builder()
            .allowed_hosts([host])
            .max_depth(1)
            .build()
            .unwrap();
        assert_eq!(crawl_pages(&allowed, &start).await.len(), 2);
    }

    #[tokio::test]
    async fn test_stop_crawl() {
        let server = site().await;
        let crawler = Crawler::new().unwrap();

        let mut calls = 0;
        let err = crawler
            .crawl(&format!("{}/depth-one.html", server.uri()), |_url, _res| {
                calls += 1;
                Err(anyhow::anyhow!("failed"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 1);
        match err {
            CrawlError::Aborted(inner) => assert_eq!(inner.to_string(), "failed"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_skip_url() {
        let server = site().await;
        let crawler = Crawler::new().unwrap();

        let mut calls = 0;
        crawler
            .crawl(&format!("{}/depth-one.html", server.uri()), |_url, _res| {
                calls += 1;
                Ok(Visit::Skip)
            })
            .await
            .unwrap();

        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_crawl_missing_start_page() {
        let server = site().await;
        let crawler = Crawler::new().unwrap();

        let mut errors = 0;
        crawler
            .crawl(&format!("{}/non-existent", server.uri()), |_url, res| {
                assert!(res.is_err());
                errors += 1;
                Ok(Visit::Follow)
            })
            .await
            .unwrap();

        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn test_invalid_start_url() {
        let crawler = Crawler::new().unwrap();

        let mut calls = 0;
        let err = crawler
            .crawl("not a url", |_url, _res| {
                calls += 1;
                Ok(Visit::Follow)
            })
            .await
            .unwrap_err();

        assert_eq!(calls, 0);
        assert!(matches!(err, CrawlError::InvalidStartUrl { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = site().await;
        let crawler = Crawler::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = crawler
            .crawl_with_cancellation(&server.uri(), cancel, |_url, _res| Ok(Visit::Follow))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_from_callback() {
        let server = site().await;
        let crawler = Crawler::new().unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let visited = Arc::new(Mutex::new(Vec::new()));
        let record = visited.clone();
        let err = crawler
            .crawl_with_cancellation(&format!("{}/depth-one.html", server.uri()), cancel, move |url, _res| {
                record.lock().unwrap().push(url.to_string());
                trigger.cancel();
                Ok(Visit::Follow)
            })
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(visited.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_redirect_is_followed_once() {
        let server = site().await;
        Mock::given(method("GET"))
            .and(path("/old-home"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/depth-three.html"))
            .mount(&server)
            .await;
        let crawler = Crawler::builder().max_depth(1).build().unwrap();

        let pages = crawl_pages(&crawler, &format!("{}/old-home", server.uri())).await;

        // The redirect keeps depth 0, so its target's links are still followed
        assert_eq!(
            pages,
            vec![
                ok(format!("{}/old-home", server.uri()), 0, 0),
                ok(format!("{}/depth-three.html", server.uri()), 1, 0),
                ok(format!("{}/depth-four.html", server.uri()), 1, 0),
            ]
        );
    }
}
