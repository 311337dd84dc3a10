//! botctl - build-on-demand launcher for the trading bot CLI
//!
//! Resolves the project root from `BOT_PATH`, builds `<root>/bin/bot` with
//! the Go toolchain when it is missing, and runs it:
//! - captured (`botctl exec`, portfolio and checkpoint commands)
//! - streamed live (`botctl stream`, `botctl run`, `botctl backtest`)

mod bot;
mod cli;
mod config;
mod host;
mod logging;

use clap::Parser;
use cli::{categorize_error, exit_codes, Cli};
use config::LauncherConfig;
use host::Launcher;
use logging::Verbosity;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = logging::init(Verbosity::from_flags(cli.verbose, cli.quiet), cli.json_output) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    if cli.no_dotenv {
        tracing::debug!("Skipping .env loading");
    } else {
        config::load_dotenv();
    }

    let config = match LauncherConfig::load(&cli.overrides()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return exit_codes::CONFIG_ERROR;
        }
    };

    let launcher = Launcher::new(config);
    match cli::dispatch(cli.command, &launcher) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            categorize_error(&e)
        }
    }
}
