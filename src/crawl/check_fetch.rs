// src/crawl/check_fetch.rs
// =============================================================================
// Fetch gates: checks a request must pass before the crawler fetches it.
//
// Every gate answers allow/deny for one request. A CheckFetchStack runs its
// gates in order and stops at the first deny, so cheap gates should be
// registered first.
//
// Built-in gates:
// - VisitOnce: each URL is fetched at most once per crawl
// - MaxDepth: deny requests deeper than a ceiling
// - AllowedHosts / ExcludedHosts: exact match on the URL's host[:port]
//
// Any closure `Fn(&Request) -> bool` is a gate too.
// =============================================================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;
use url::Url;

use super::request::Request;

/// Decides whether a request should be fetched.
pub trait CheckFetch: Send + Sync {
    fn check_fetch(&self, req: &Request) -> bool;
}

impl<F> CheckFetch for F
where
    F: Fn(&Request) -> bool + Send + Sync,
{
    fn check_fetch(&self, req: &Request) -> bool {
        self(req)
    }
}

/// Ordered list of gates that must all pass. An empty stack allows everything.
///
/// Cloning is cheap and shares the gates, including any state they keep.
#[derive(Clone, Default)]
pub struct CheckFetchStack {
    checks: Vec<Arc<dyn CheckFetch>>,
}

impl CheckFetchStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, check: impl CheckFetch + 'static) {
        self.checks.push(Arc::new(check));
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// True if every gate allows the request.
    pub fn allows(&self, req: &Request) -> bool {
        self.checks.iter().all(|check| check.check_fetch(req))
    }
}

impl CheckFetch for CheckFetchStack {
    fn check_fetch(&self, req: &Request) -> bool {
        self.allows(req)
    }
}

/// Admits each URL once. The first request for a URL passes, later ones are
/// denied.
#[derive(Debug, Default)]
pub struct VisitOnce {
    seen: Mutex<HashSet<String>>,
}

impl VisitOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of URLs admitted so far.
    pub fn visited(&self) -> usize {
        match self.seen.lock() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl CheckFetch for VisitOnce {
    fn check_fetch(&self, req: &Request) -> bool {
        // The set only ever grows, so a poisoned lock still holds valid data.
        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        let first = seen.insert(req.url().as_str().to_string());
        if !first {
            debug!(url = %req.url(), "already visited");
        }
        first
    }
}

/// Denies requests whose depth is above the ceiling.
#[derive(Debug, Clone, Copy)]
pub struct MaxDepth(pub usize);

impl CheckFetch for MaxDepth {
    fn check_fetch(&self, req: &Request) -> bool {
        req.depth() <= self.0
    }
}

/// Only allows requests to the listed hosts. An empty list allows every host.
#[derive(Debug, Clone, Default)]
pub struct AllowedHosts {
    hosts: HashSet<String>,
}

impl AllowedHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: normalize_hosts(hosts),
        }
    }
}

impl CheckFetch for AllowedHosts {
    fn check_fetch(&self, req: &Request) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        let allowed = listed(&self.hosts, req.url());
        if !allowed {
            debug!(url = %req.url(), "not included");
        }
        allowed
    }
}

/// Denies requests to any of the listed hosts.
#[derive(Debug, Clone, Default)]
pub struct ExcludedHosts {
    hosts: HashSet<String>,
}

impl ExcludedHosts {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: normalize_hosts(hosts),
        }
    }
}

impl CheckFetch for ExcludedHosts {
    fn check_fetch(&self, req: &Request) -> bool {
        let excluded = listed(&self.hosts, req.url());
        if excluded {
            debug!(url = %req.url(), "excluded");
        }
        !excluded
    }
}

/// The `host[:port]` part of a URL, as written in host lists.
pub fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

// URL parsing drops a port equal to the scheme's default, so
// "http://example.com:80/" and "http://example.com/" are the same URL. A list
// entry matches either spelling: "example.com" or "example.com:80".
fn listed(hosts: &HashSet<String>, url: &Url) -> bool {
    if hosts.contains(&authority(url)) {
        return true;
    }
    match (url.port(), url.port_or_known_default()) {
        (None, Some(port)) => hosts.contains(&format!("{}:{}", url.host_str().unwrap_or_default(), port)),
        _ => false,
    }
}

fn normalize_hosts<I, S>(hosts: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    hosts
        .into_iter()
        .map(Into::into)
        .map(|host| host.trim().to_ascii_lowercase())
        .filter(|host| !host.is_empty())
        .collect()
}
