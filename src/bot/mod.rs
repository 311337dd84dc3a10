//! Bot command vocabulary
//!
//! Typed forms of the trading bot's subcommands. Each one validates its
//! fields and renders the argument vector the bot expects, so callers never
//! hand-assemble flags.

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

use crate::host::{Invocation, Mode};

/// Rejected bot arguments
#[derive(Debug, Error, PartialEq)]
pub enum BotCommandError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("cash must be a non-negative amount, got {0}")]
    InvalidCash(f64),

    #[error("invalid checkpoint attribute '{0}': expected key=value")]
    InvalidAttribute(String),

    #[error("invalid {field} time '{value}': {reason}")]
    InvalidTime {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("backtest start {start} is not before end {end}")]
    EmptyPeriod { start: String, end: String },
}

/// A checkpoint attribute, rendered as `--key value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    /// Parse `key=value`
    pub fn parse(s: &str) -> Result<Self, BotCommandError> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() && !key.starts_with('-') => Ok(Self {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(BotCommandError::InvalidAttribute(s.to_string())),
        }
    }
}

/// Subcommands understood by the bot binary
#[derive(Debug, Clone, PartialEq)]
pub enum BotCommand {
    CreatePortfolio {
        name: String,
        cash: f64,
    },
    CreateCheckpoint {
        id: String,
        attributes: Vec<Attribute>,
    },
    DeletePortfolio {
        name: String,
    },
    DeleteCheckpoint {
        id: String,
    },
    Run {
        portfolio: String,
        strategy: String,
        checkpoint: String,
    },
    Backtest {
        portfolio: String,
        strategy: String,
        checkpoint: String,
        start: String,
        end: String,
    },
}

impl BotCommand {
    /// Check fields before anything is built or launched
    pub fn validate(&self) -> Result<(), BotCommandError> {
        match self {
            BotCommand::CreatePortfolio { name, cash } => {
                require("portfolio name", name)?;
                if !cash.is_finite() || *cash < 0.0 {
                    return Err(BotCommandError::InvalidCash(*cash));
                }
            }
            BotCommand::CreateCheckpoint { id, attributes } => {
                require("checkpoint id", id)?;
                for attr in attributes {
                    if attr.key.is_empty() || attr.key.starts_with('-') {
                        return Err(BotCommandError::InvalidAttribute(format!(
                            "{}={}",
                            attr.key, attr.value
                        )));
                    }
                }
            }
            BotCommand::DeletePortfolio { name } => require("portfolio name", name)?,
            BotCommand::DeleteCheckpoint { id } => require("checkpoint id", id)?,
            BotCommand::Run {
                portfolio,
                strategy,
                checkpoint,
            } => {
                require("portfolio", portfolio)?;
                require("strategy", strategy)?;
                require("checkpoint", checkpoint)?;
            }
            BotCommand::Backtest {
                portfolio,
                strategy,
                checkpoint,
                start,
                end,
            } => {
                require("portfolio", portfolio)?;
                require("strategy", strategy)?;
                require("checkpoint", checkpoint)?;
                let from = parse_time("start", start)?;
                let to = parse_time("end", end)?;
                if from >= to {
                    return Err(BotCommandError::EmptyPeriod {
                        start: start.clone(),
                        end: end.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Argument vector passed to the bot
    pub fn to_args(&self) -> Vec<String> {
        match self {
            BotCommand::CreatePortfolio { name, cash } => {
                let mut args = words(&["create", "portfolio"]);
                push_flag(&mut args, "name", name);
                push_flag(&mut args, "cash", &cash.to_string());
                args
            }
            BotCommand::CreateCheckpoint { id, attributes } => {
                let mut args = words(&["create", "checkpoint"]);
                push_flag(&mut args, "id", id);
                if !attributes.is_empty() {
                    args.push("--".to_string());
                    for attr in attributes {
                        push_flag(&mut args, &attr.key, &attr.value);
                    }
                }
                args
            }
            BotCommand::DeletePortfolio { name } => {
                let mut args = words(&["delete", "portfolio"]);
                push_flag(&mut args, "name", name);
                args
            }
            BotCommand::DeleteCheckpoint { id } => {
                let mut args = words(&["delete", "checkpoint"]);
                push_flag(&mut args, "id", id);
                args
            }
            BotCommand::Run {
                portfolio,
                strategy,
                checkpoint,
            } => {
                let mut args = words(&["run"]);
                push_flag(&mut args, "portfolio", portfolio);
                push_flag(&mut args, "strategy", strategy);
                push_flag(&mut args, "checkpoint", checkpoint);
                args
            }
            BotCommand::Backtest {
                portfolio,
                strategy,
                checkpoint,
                start,
                end,
            } => {
                let mut args = words(&["backtest"]);
                push_flag(&mut args, "portfolio", portfolio);
                push_flag(&mut args, "strategy", strategy);
                push_flag(&mut args, "checkpoint", checkpoint);
                push_flag(&mut args, "start", start);
                push_flag(&mut args, "end", end);
                args
            }
        }
    }

    /// Sessions run until the bot decides to stop, so their output is streamed
    pub fn is_long_running(&self) -> bool {
        matches!(self, BotCommand::Run { .. } | BotCommand::Backtest { .. })
    }

    pub fn default_mode(&self) -> Mode {
        if self.is_long_running() {
            Mode::Stream
        } else {
            Mode::Capture { check: true }
        }
    }

    /// Validate and turn into an invocation with the default mode
    pub fn into_invocation(self) -> Result<Invocation, BotCommandError> {
        self.validate()?;
        let invocation = match self.default_mode() {
            Mode::Stream => Invocation::streamed(self.to_args()),
            Mode::Capture { check: true } => Invocation::captured(self.to_args()).checked(),
            Mode::Capture { check: false } => Invocation::captured(self.to_args()),
        };
        Ok(invocation)
    }
}

fn words(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn push_flag(args: &mut Vec<String>, name: &str, value: &str) {
    args.push(format!("--{}", name));
    args.push(value.to_string());
}

fn require(field: &'static str, value: &str) -> Result<(), BotCommandError> {
    if value.trim().is_empty() {
        Err(BotCommandError::Empty(field))
    } else {
        Ok(())
    }
}

fn parse_time(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, BotCommandError> {
    DateTime::parse_from_rfc3339(value).map_err(|e| BotCommandError::InvalidTime {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
