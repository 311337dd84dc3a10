//! Host module for building and launching the bot binary

pub mod env;
pub mod launcher;

pub use env::EnvOverrides;
pub use launcher::{CapturedOutput, Invocation, LaunchError, Launcher, Mode, Outcome};
