//! Command-line interface for botctl

pub mod bot;
pub mod launch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::bot::BotCommandError;
use crate::config::{ConfigError, ConfigOverrides};
use crate::host::{EnvOverrides, LaunchError, Launcher};

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    // 2 is clap's usage error
    pub const CONFIG_ERROR: i32 = 3;
    pub const BUILD_FAILURE: i32 = 4;
    pub const CHILD_FAILURE: i32 = 5;
    pub const INVALID_ARGUMENTS: i32 = 6;

    /// Exit code to propagate for a child's exit code.
    /// Signal deaths follow the shell convention of 128 + signal.
    pub fn from_child(code: i32) -> i32 {
        if code < 0 {
            128 + code.saturating_neg()
        } else {
            code
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "botctl",
    version,
    about = "Build the trading bot on demand and run it",
    long_about = "Builds <root>/bin/bot from the Go sources when it is missing, then runs it \
                  with the project root as working directory, either capturing its output or \
                  streaming it live."
)]
pub struct Cli {
    /// Project root (defaults to $BOT_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Binary name under <root>/bin (defaults to $BOT_BINARY or "bot")
    #[arg(long, global = true, value_name = "NAME")]
    pub binary_name: Option<String>,

    /// Go package to build (defaults to $BOT_ENTRY_POINT or "./cmd/bot")
    #[arg(long, global = true, value_name = "PACKAGE")]
    pub entry_point: Option<String>,

    /// Toolchain program used to build (defaults to $BOT_TOOLCHAIN or "go")
    #[arg(long, global = true, value_name = "PROGRAM")]
    pub toolchain: Option<String>,

    /// Skip loading a .env file
    #[arg(long, global = true)]
    pub no_dotenv: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_output: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root: self.root.clone(),
            binary_name: self.binary_name.clone(),
            entry_point: self.entry_point.clone(),
            toolchain: self.toolchain.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the bot binary if it is missing
    Build,

    /// Show the resolved root, binary and toolchain
    Status(launch::StatusArgs),

    /// Run the bot to completion and print its captured output
    Exec(launch::ExecArgs),

    /// Run the bot, relaying its combined output live
    Stream(launch::StreamArgs),

    /// Create or delete portfolios
    #[command(subcommand)]
    Portfolio(bot::PortfolioCommand),

    /// Create or delete strategy checkpoints
    #[command(subcommand)]
    Checkpoint(bot::CheckpointCommand),

    /// Run a portfolio live with a strategy and checkpoint
    Run(bot::RunArgs),

    /// Backtest a portfolio with a strategy and checkpoint over a period
    Backtest(bot::BacktestArgs),
}

/// Run a parsed command, returning the process exit code
pub fn dispatch(command: Commands, launcher: &Launcher) -> anyhow::Result<i32> {
    match command {
        Commands::Build => launch::build(launcher),
        Commands::Status(args) => launch::status(args, launcher),
        Commands::Exec(args) => launch::exec(args, launcher),
        Commands::Stream(args) => launch::stream(args, launcher),
        Commands::Portfolio(cmd) => bot::portfolio(cmd, launcher),
        Commands::Checkpoint(cmd) => bot::checkpoint(cmd, launcher),
        Commands::Run(args) => bot::run(args, launcher),
        Commands::Backtest(args) => bot::backtest(args, launcher),
    }
}

/// Collect `-e KEY=VALUE` pairs; later pairs win
pub(crate) fn env_overrides(pairs: Vec<(String, String)>) -> EnvOverrides {
    pairs.into_iter().collect()
}

/// Categorize an error into the appropriate exit code
pub fn categorize_error(e: &anyhow::Error) -> i32 {
    for cause in e.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return exit_codes::CONFIG_ERROR;
        }
        if cause.downcast_ref::<BotCommandError>().is_some() {
            return exit_codes::INVALID_ARGUMENTS;
        }
        if let Some(err) = cause.downcast_ref::<LaunchError>() {
            return match err {
                LaunchError::BuildFailure { .. } | LaunchError::MissingArtifact { .. } => {
                    exit_codes::BUILD_FAILURE
                }
                LaunchError::ChildProcessFailure { .. } => exit_codes::CHILD_FAILURE,
                LaunchError::Spawn { .. } | LaunchError::Io(_) => exit_codes::UNEXPECTED_FAILURE,
            };
        }
    }
    exit_codes::UNEXPECTED_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exec_keeps_hyphenated_bot_args() {
        let cli = Cli::try_parse_from([
            "botctl", "exec", "--check", "-e", "MODE=paper", "--", "create", "portfolio", "--name",
            "P", "--cash", "1000",
        ])
        .unwrap();

        match cli.command {
            Commands::Exec(args) => {
                assert!(args.check);
                assert_eq!(args.env, vec![("MODE".to_string(), "paper".to_string())]);
                assert_eq!(
                    args.args,
                    vec!["create", "portfolio", "--name", "P", "--cash", "1000"]
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_env_pair_is_rejected() {
        assert!(Cli::try_parse_from(["botctl", "stream", "-e", "NOEQUALS", "--", "run"]).is_err());
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "botctl", "build", "--root", "/srv/bot", "--toolchain", "go1.24", "--no-dotenv",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.root, Some(PathBuf::from("/srv/bot")));
        assert_eq!(overrides.toolchain.as_deref(), Some("go1.24"));
        assert!(overrides.binary_name.is_none());
        assert!(cli.no_dotenv);
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let err = Cli::try_parse_from(["botctl", "-v", "-q", "build"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        let cli = Cli::try_parse_from(["botctl", "build", "--quiet"]).unwrap();
        assert!(cli.quiet && !cli.verbose);
    }

    #[test]
    fn test_env_overrides_later_pairs_win() {
        let env = env_overrides(vec![
            ("KEY".to_string(), "first".to_string()),
            ("KEY".to_string(), "second".to_string()),
        ]);
        assert_eq!(env.get("KEY").map(String::as_str), Some("second"));
    }

    #[test]
    fn test_categorize_error() {
        let err = anyhow::Error::new(ConfigError::MissingRoot {
            var: "BOT_PATH".to_string(),
        });
        assert_eq!(categorize_error(&err), exit_codes::CONFIG_ERROR);

        let err = anyhow::Error::new(LaunchError::ChildProcessFailure {
            program: "bot".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: String::new(),
        })
        .context("portfolio create failed");
        assert_eq!(categorize_error(&err), exit_codes::CHILD_FAILURE);

        let err: anyhow::Error = Err::<(), _>(BotCommandError::Empty("portfolio"))
            .context("invalid arguments")
            .unwrap_err();
        assert_eq!(categorize_error(&err), exit_codes::INVALID_ARGUMENTS);

        assert_eq!(
            categorize_error(&anyhow::anyhow!("something else")),
            exit_codes::UNEXPECTED_FAILURE
        );
    }

    #[test]
    fn test_child_exit_code_mapping() {
        assert_eq!(exit_codes::from_child(0), 0);
        assert_eq!(exit_codes::from_child(3), 3);
        assert_eq!(exit_codes::from_child(-9), 137);
    }
}
