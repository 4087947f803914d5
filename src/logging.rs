// src/logging.rs
// =============================================================================
// Logging setup for the command-line tool.
//
// The library only emits `tracing` events; this installs the subscriber that
// prints them. Everything goes to stderr so the JSON on stdout stays clean.
// RUST_LOG still works and is combined with the level picked here.
// =============================================================================

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// How chatty the tool is on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Silent,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(silent: bool, verbose: bool) -> Self {
        match (silent, verbose) {
            (true, _) => Verbosity::Silent,
            (false, true) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        }
    }

    fn filter(self) -> Result<EnvFilter> {
        let filter = match self {
            Verbosity::Silent => return Ok(EnvFilter::new("off")),
            Verbosity::Normal => EnvFilter::from_default_env().add_directive("resource_crawler=info".parse()?),
            Verbosity::Verbose => EnvFilter::from_default_env().add_directive("resource_crawler=debug".parse()?),
        };
        Ok(filter.add_directive("warn".parse()?))
    }
}

/// Initialize the logging system
pub fn init_logging(verbosity: Verbosity) -> Result<()> {
    let fmt_layer = fmt::layer().with_target(verbosity == Verbosity::Verbose).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(verbosity.filter()?)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
