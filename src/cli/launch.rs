//! `build`, `status`, `exec` and `stream` commands

use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use clap::Args;
use serde::Serialize;

use super::{env_overrides, exit_codes};
use crate::host::env::parse_env_pair;
use crate::host::{CapturedOutput, LaunchError, Launcher};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Fail when the bot exits non-zero
    #[arg(long)]
    pub check: bool,

    /// Print exit code and captured output as JSON
    #[arg(long)]
    pub json: bool,

    /// Extra environment for the bot
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Arguments passed to the bot
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    /// Extra environment for the bot
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Arguments passed to the bot
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Snapshot reported by `botctl status`
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub root: PathBuf,
    pub binary: PathBuf,
    pub built: bool,
    pub build_command: String,
    pub toolchain: Option<PathBuf>,
    pub toolchain_version: Option<String>,
}

impl StatusReport {
    pub fn collect(launcher: &Launcher) -> Self {
        let config = launcher.config();
        let binary = launcher.binary_path();
        let toolchain = which::which(&config.build.program).ok();
        let toolchain_version = toolchain.as_ref().and_then(|path| detect_version(path));

        Self {
            root: config.root.clone(),
            built: binary.exists(),
            binary,
            build_command: config.build.display(),
            toolchain,
            toolchain_version,
        }
    }
}

/// Ask the toolchain for its version (`go version`)
fn detect_version(toolchain: &std::path::Path) -> Option<String> {
    let output = Command::new(toolchain).arg("version").output().ok()?;

    if output.status.success() {
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!text.is_empty()).then_some(text)
    } else {
        None
    }
}

pub fn build(launcher: &Launcher) -> anyhow::Result<i32> {
    let built = launcher
        .ensure_built()
        .context("Failed to build the bot binary")?;

    let binary = launcher.binary_path();
    if built {
        println!("Built {}", binary.display());
    } else {
        println!("{} is already built", binary.display());
    }
    Ok(exit_codes::SUCCESS)
}

pub fn status(args: StatusArgs, launcher: &Launcher) -> anyhow::Result<i32> {
    let report = StatusReport::collect(launcher);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(exit_codes::SUCCESS);
    }

    println!("Root:       {}", report.root.display());
    println!(
        "Binary:     {} ({})",
        report.binary.display(),
        if report.built { "built" } else { "not built" }
    );
    println!("Build:      {}", report.build_command);
    match (&report.toolchain, &report.toolchain_version) {
        (Some(path), Some(version)) => println!("Toolchain:  {} ({})", path.display(), version),
        (Some(path), None) => println!("Toolchain:  {}", path.display()),
        (None, _) => println!("Toolchain:  not found in PATH"),
    }
    Ok(exit_codes::SUCCESS)
}

pub fn exec(args: ExecArgs, launcher: &Launcher) -> anyhow::Result<i32> {
    let env = env_overrides(args.env);

    let output = match launcher.run_captured(&args.args, &env, args.check) {
        Ok(output) => output,
        Err(e) => {
            print_failure_output(&e);
            return Err(e.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_captured(&output);
    }
    Ok(exit_codes::from_child(output.exit_code))
}

pub fn stream(args: StreamArgs, launcher: &Launcher) -> anyhow::Result<i32> {
    let env = env_overrides(args.env);
    let code = launcher.run_streamed(&args.args, &env)?;
    Ok(exit_codes::from_child(code))
}

pub(crate) fn print_captured(output: &CapturedOutput) {
    print!("{}", output.stdout);
    eprint!("{}", output.stderr);
}

/// Show what a checked run captured before it failed
pub(crate) fn print_failure_output(e: &LaunchError) {
    if let LaunchError::ChildProcessFailure { stdout, stderr, .. } = e {
        print!("{}", stdout);
        eprint!("{}", stderr);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{BuildCommand, LauncherConfig};

    #[test]
    fn test_status_report_for_unbuilt_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let launcher = Launcher::new(LauncherConfig::with_root(
            &root,
            BuildCommand::new("sh").arg("-c").arg("exit 1"),
        ));

        let report = StatusReport::collect(&launcher);
        assert_eq!(report.root, root);
        assert!(!report.built);
        assert!(report.binary.ends_with("bin/bot"));
        assert_eq!(report.build_command, "sh -c exit 1");
        assert!(report.toolchain.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["built"], serde_json::Value::Bool(false));
    }
}
