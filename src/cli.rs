// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API: the struct below is the whole interface, and clap
// generates the parser, --help and --version from it.
//
// Example:
//   resource-crawler https://example.com --max-depth 2 --output pages.json
// =============================================================================

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "resource-crawler",
    version,
    about = "Crawl a website and list the links and static assets of every page",
    long_about = "resource-crawler crawls a website breadth-first from a start URL and prints, \
                  for every page it fetched, the pages it links to and the assets \
                  (stylesheets, scripts, images, media) it loads, as JSON."
)]
pub struct Cli {
    /// URL to start crawling from
    #[arg(value_name = "START_URL")]
    pub start_url: String,

    /// How many links deep to crawl from the start URL (0 = unlimited)
    ///
    /// Negative values are accepted here so the crawler can reject them with
    /// a proper error.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub max_depth: i64,

    /// Hosts to crawl, comma separated (default: the start URL's host)
    #[arg(long, value_delimiter = ',')]
    pub include_hosts: Vec<String>,

    /// Hosts never to crawl, comma separated
    #[arg(long, value_delimiter = ',')]
    pub exclude_hosts: Vec<String>,

    /// Print JSON on a single line instead of tab-indented
    #[arg(long)]
    pub compact: bool,

    /// Don't print progress to stderr
    #[arg(long, conflicts_with = "verbose")]
    pub silent: bool,

    /// Print every request to stderr
    #[arg(long, short)]
    pub verbose: bool,

    /// Write the JSON to this file instead of stdout
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5, value_name = "SECS")]
    pub timeout: u64,
}
