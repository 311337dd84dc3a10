//! Typed bot commands: portfolios, checkpoints, live runs and backtests

use anyhow::Context;
use clap::{Args, Subcommand};

use super::launch::{print_captured, print_failure_output};
use super::{env_overrides, exit_codes};
use crate::bot::{Attribute, BotCommand};
use crate::host::env::parse_env_pair;
use crate::host::{Launcher, Outcome};

#[derive(Debug, Subcommand)]
pub enum PortfolioCommand {
    /// Create a new portfolio
    Create {
        /// Portfolio name
        #[arg(short, long)]
        name: String,
        /// Starting cash
        #[arg(short, long)]
        cash: f64,
    },
    /// Delete a portfolio and its result CSVs
    Delete {
        /// Portfolio name
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum CheckpointCommand {
    /// Create a new checkpoint
    Create {
        /// Checkpoint id
        #[arg(long)]
        id: String,
        /// Checkpoint attributes, e.g. asset=AAPL
        #[arg(value_name = "KEY=VALUE", value_parser = Attribute::parse)]
        attributes: Vec<Attribute>,
    },
    /// Delete a checkpoint
    Delete {
        /// Checkpoint id
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Portfolio name
    #[arg(short, long)]
    pub portfolio: String,

    /// Strategy name
    #[arg(short, long)]
    pub strategy: String,

    /// Checkpoint label or id
    #[arg(short, long)]
    pub checkpoint: String,

    /// Extra environment for the bot
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct BacktestArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Start of the period (RFC 3339)
    #[arg(long)]
    pub start: String,

    /// End of the period (RFC 3339)
    #[arg(long)]
    pub end: String,
}

impl From<PortfolioCommand> for BotCommand {
    fn from(cmd: PortfolioCommand) -> Self {
        match cmd {
            PortfolioCommand::Create { name, cash } => BotCommand::CreatePortfolio { name, cash },
            PortfolioCommand::Delete { name } => BotCommand::DeletePortfolio { name },
        }
    }
}

impl From<CheckpointCommand> for BotCommand {
    fn from(cmd: CheckpointCommand) -> Self {
        match cmd {
            CheckpointCommand::Create { id, attributes } => {
                BotCommand::CreateCheckpoint { id, attributes }
            }
            CheckpointCommand::Delete { id } => BotCommand::DeleteCheckpoint { id },
        }
    }
}

pub fn portfolio(cmd: PortfolioCommand, launcher: &Launcher) -> anyhow::Result<i32> {
    execute(cmd.into(), Vec::new(), launcher)
}

pub fn checkpoint(cmd: CheckpointCommand, launcher: &Launcher) -> anyhow::Result<i32> {
    execute(cmd.into(), Vec::new(), launcher)
}

pub fn run(args: RunArgs, launcher: &Launcher) -> anyhow::Result<i32> {
    let SessionArgs {
        portfolio,
        strategy,
        checkpoint,
        env,
    } = args.session;
    let cmd = BotCommand::Run {
        portfolio,
        strategy,
        checkpoint,
    };
    execute(cmd, env, launcher)
}

pub fn backtest(args: BacktestArgs, launcher: &Launcher) -> anyhow::Result<i32> {
    let SessionArgs {
        portfolio,
        strategy,
        checkpoint,
        env,
    } = args.session;
    let cmd = BotCommand::Backtest {
        portfolio,
        strategy,
        checkpoint,
        start: args.start,
        end: args.end,
    };
    execute(cmd, env, launcher)
}

fn execute(
    cmd: BotCommand,
    env: Vec<(String, String)>,
    launcher: &Launcher,
) -> anyhow::Result<i32> {
    let invocation = cmd
        .into_invocation()
        .context("Invalid bot arguments")?
        .with_envs(env_overrides(env));

    let outcome = match launcher.invoke(&invocation) {
        Ok(outcome) => outcome,
        Err(e) => {
            print_failure_output(&e);
            return Err(e.into());
        }
    };

    match &outcome {
        Outcome::Captured(output) => print_captured(output),
        Outcome::Streamed(code) if *code != 0 => {
            tracing::warn!("Bot exited with code {}", code)
        }
        Outcome::Streamed(_) => {}
    }
    Ok(exit_codes::from_child(outcome.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_portfolio_create_parses() {
        let cli = Cli::try_parse_from([
            "botctl", "portfolio", "create", "--name", "PyPortfolio", "--cash", "1000",
        ])
        .unwrap();

        let Commands::Portfolio(cmd) = cli.command else {
            panic!("expected portfolio command");
        };
        assert_eq!(
            BotCommand::from(cmd),
            BotCommand::CreatePortfolio {
                name: "PyPortfolio".to_string(),
                cash: 1000.0,
            }
        );
    }

    #[test]
    fn test_checkpoint_attributes_parse() {
        let cli = Cli::try_parse_from([
            "botctl", "checkpoint", "create", "--id", "cp1", "asset=AAPL", "window=20",
        ])
        .unwrap();

        let Commands::Checkpoint(cmd) = cli.command else {
            panic!("expected checkpoint command");
        };
        let args = BotCommand::from(cmd).to_args();
        assert_eq!(
            args,
            vec!["create", "checkpoint", "--id", "cp1", "--", "--asset", "AAPL", "--window", "20"]
        );
    }

    #[test]
    fn test_malformed_attribute_rejected_by_parser() {
        let parsed =
            Cli::try_parse_from(["botctl", "checkpoint", "create", "--id", "cp1", "asset"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_backtest_parses_short_session_flags() {
        let cli = Cli::try_parse_from([
            "botctl",
            "backtest",
            "-p",
            "P",
            "-s",
            "momentum",
            "-c",
            "cp1",
            "--start",
            "2024-01-02T14:30:00Z",
            "--end",
            "2024-02-02T21:00:00Z",
            "-e",
            "FINNHUB_API_KEY=x",
        ])
        .unwrap();

        let Commands::Backtest(args) = cli.command else {
            panic!("expected backtest command");
        };
        assert_eq!(args.session.portfolio, "P");
        assert_eq!(args.session.strategy, "momentum");
        assert_eq!(args.session.checkpoint, "cp1");
        assert_eq!(args.session.env.len(), 1);
        assert_eq!(args.end, "2024-02-02T21:00:00Z");
    }
}
