// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling starting from a URL
// - Redirects are queued as their own requests, one hop at a time
// - Fetch gates (visit once, depth, host lists, custom closures)
// - Cancellation at any point, including mid-request
//
// Layout:
// - request: one unit of work (URL, depth, redirect count, completion hook)
// - check_fetch: gates evaluated before each fetch
// - queue: the task queue with completion tracking
// - worker: the crawl loop
// - crawler: builder and entry points
// =============================================================================

mod check_fetch;
mod crawler;
mod queue;
mod request;
mod worker;

pub use check_fetch::{authority, AllowedHosts, CheckFetch, CheckFetchStack, ExcludedHosts, MaxDepth, VisitOnce};
pub use crawler::{Crawler, CrawlerBuilder};
pub use queue::{InMemoryQueue, Queue};
pub use request::{FinishHook, Request};
pub use worker::{Visit, Worker};
