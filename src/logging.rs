//! Logging configuration using tracing
//!
//! Logs go to stderr; stdout belongs to the bot's relayed output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    fn filter(self) -> EnvFilter {
        match self {
            Verbosity::Verbose => EnvFilter::new("debug"),
            Verbosity::Quiet => EnvFilter::new("warn"),
            Verbosity::Normal => {
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
            }
        }
    }
}

/// Initialize the logging system
pub fn init(verbosity: Verbosity, json: bool) -> anyhow::Result<()> {
    let filter = verbosity.filter();

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
