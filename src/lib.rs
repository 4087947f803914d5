// src/lib.rs
// =============================================================================
// resource-crawler: a breadth-first web crawler that reports, for every page
// it fetches, the links and static assets the page references.
//
// Example:
//   use resource_crawler::{Crawler, Visit};
//
//   let crawler = Crawler::builder().max_depth(2).build()?;
//   crawler.crawl("https://example.com", |url, res| {
//       if let Ok(page) = res {
//           println!("{}: {} assets", url, page.assets.len());
//       }
//       Ok(Visit::Follow)
//   }).await?;
// =============================================================================

pub mod crawl;
pub mod error;
pub mod fetch;

pub use crawl::{CheckFetch, Crawler, CrawlerBuilder, Request, Visit};
pub use error::{CrawlError, ExtractError, FetchError, QueueError};
pub use fetch::{Asset, Link, Response};
