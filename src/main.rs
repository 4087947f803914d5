// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Set up logging on stderr
// 3. Crawl the site, collecting every page that was fetched
// 4. Write the pages as JSON to stdout or the output file
// 5. Exit with proper code (0 = success, 2 = error)
//
// Pages that fail to fetch are logged and left out of the output; they never
// stop the crawl. Ctrl-C stops the crawl and exits with an error.
// =============================================================================

mod cli;
mod logging;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use cli::Cli;
use logging::{init_logging, Verbosity};
use resource_crawler::crawl::authority;
use resource_crawler::fetch::default_client_builder;
use resource_crawler::{Crawler, Response, Visit};

/// What gets written out at the end of a crawl.
#[derive(Debug, Default, Serialize)]
struct CrawlOutput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pages: Vec<Response>,
}

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(Verbosity::from_flags(cli.silent, cli.verbose))?;

    let crawler = build_crawler(&cli)?;

    // Open the output before crawling so a bad path fails fast
    let mut output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let mut result = CrawlOutput::default();
    crawler
        .crawl_with_cancellation(&cli.start_url, cancel, |url, res| {
            match res {
                Ok(page) => result.pages.push(page.clone()),
                Err(err) => warn!(url, "error: {}", err),
            }
            Ok(Visit::Follow)
        })
        .await?;

    info!(pages = result.pages.len(), "crawl finished");
    write_output(&mut output, &result, !cli.compact)?;
    output.flush()?;
    Ok(())
}

fn build_crawler(cli: &Cli) -> Result<Crawler> {
    // Stay on the start URL's host unless told otherwise. An unparsable start
    // URL is left for the crawler to report.
    let include_hosts = if cli.include_hosts.is_empty() {
        Url::parse(cli.start_url.trim())
            .map(|url| vec![authority(&url)])
            .unwrap_or_default()
    } else {
        cli.include_hosts.clone()
    };

    let crawler = Crawler::builder()
        .max_depth(cli.max_depth)
        .allowed_hosts(include_hosts)
        .excluded_hosts(cli.exclude_hosts.iter().cloned())
        .http_client(default_client_builder().timeout(Duration::from_secs(cli.timeout)))
        .build()?;
    Ok(crawler)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupted, stopping crawl");
            cancel.cancel();
        }
        Err(err) => warn!(error = %err, "cannot listen for Ctrl-C"),
    }
}

// Writes the result as JSON followed by a newline, tab-indented unless
// `indent` is false.
fn write_output<W: Write + ?Sized>(out: &mut W, result: &CrawlOutput, indent: bool) -> Result<()> {
    if indent {
        let mut ser = Serializer::with_formatter(&mut *out, PrettyFormatter::with_indent(b"\t"));
        result.serialize(&mut ser)?;
    } else {
        serde_json::to_writer(&mut *out, result)?;
    }
    writeln!(out)?;
    Ok(())
}
