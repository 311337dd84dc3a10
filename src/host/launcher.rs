//! Bot launcher
//!
//! Builds the bot binary on demand and runs it as a child process, either
//! to completion with captured output or with stdout and stderr combined
//! and relayed line by line. Everything here blocks the calling thread.
//!
//! The built binary acts as an unlocked cache: two launchers racing the
//! build step may both run the build command.

use std::ffi::OsStr;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use serde::Serialize;
use thiserror::Error;

use super::env::{self, EnvOverrides};
use crate::config::{BuildCommand, LauncherConfig};

/// Launcher errors
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("build command `{command}` failed ({status})")]
    BuildFailure { command: String, status: ExitStatus },

    #[error("build command `{command}` succeeded but {} was not produced", .path.display())]
    MissingArtifact { command: String, path: PathBuf },

    #[error("{program} exited with code {exit_code}")]
    ChildProcessFailure {
        program: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// How the child's output is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Buffer stdout and stderr; fail on non-zero exit when `check` is set
    Capture { check: bool },
    /// Relay combined output live; only the exit code comes back
    Stream,
}

/// A single request to run the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub env: EnvOverrides,
    pub mode: Mode,
}

impl Invocation {
    pub fn captured<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            env: EnvOverrides::new(),
            mode: Mode::Capture { check: false },
        }
    }

    pub fn streamed<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: Mode::Stream,
            ..Self::captured(args)
        }
    }

    /// Fail on non-zero exit. No effect in stream mode.
    pub fn checked(mut self) -> Self {
        if let Mode::Capture { .. } = self.mode {
            self.mode = Mode::Capture { check: true };
        }
        self
    }

    pub fn with_envs(mut self, env: EnvOverrides) -> Self {
        self.env.extend(env);
        self
    }
}

/// Result of a captured run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of any invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Captured(CapturedOutput),
    Streamed(i32),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Captured(output) => output.exit_code,
            Outcome::Streamed(code) => *code,
        }
    }
}

/// Build `binary_path` with `build` unless it already exists.
///
/// Returns `true` when the build command ran.
pub fn ensure_built(
    binary_path: &Path,
    build: &BuildCommand,
    working_dir: &Path,
) -> Result<bool, LaunchError> {
    if binary_path.exists() {
        tracing::debug!("Binary present at {}", binary_path.display());
        return Ok(false);
    }

    if let Some(parent) = binary_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let shown = binary_path.strip_prefix(working_dir).unwrap_or(binary_path);
    println!("Building {} CLI -> {} …", build.program, shown.display());
    tracing::info!(command = %build.display(), cwd = %working_dir.display(), "Building binary");

    let status = Command::new(&build.program)
        .args(&build.args)
        .current_dir(working_dir)
        .status()
        .map_err(|source| LaunchError::Spawn {
            program: build.program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(LaunchError::BuildFailure {
            command: build.display(),
            status,
        });
    }

    if !binary_path.exists() {
        return Err(LaunchError::MissingArtifact {
            command: build.display(),
            path: binary_path.to_path_buf(),
        });
    }

    Ok(true)
}

/// Exit code of a finished child; signals map to their negated number
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

/// Launcher for the bot binary under a configured root
#[derive(Debug, Clone)]
pub struct Launcher {
    config: LauncherConfig,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn binary_path(&self) -> PathBuf {
        self.config.binary_path()
    }

    /// Build the binary if it is missing
    pub fn ensure_built(&self) -> Result<bool, LaunchError> {
        ensure_built(&self.binary_path(), &self.config.build, &self.config.root)
    }

    /// Run an invocation according to its mode
    pub fn invoke(&self, invocation: &Invocation) -> Result<Outcome, LaunchError> {
        match invocation.mode {
            Mode::Capture { check } => self
                .run_captured(&invocation.args, &invocation.env, check)
                .map(Outcome::Captured),
            Mode::Stream => self
                .run_streamed(&invocation.args, &invocation.env)
                .map(Outcome::Streamed),
        }
    }

    /// Run to completion, buffering stdout and stderr
    pub fn run_captured<S: AsRef<OsStr>>(
        &self,
        args: &[S],
        env: &EnvOverrides,
        check: bool,
    ) -> Result<CapturedOutput, LaunchError> {
        self.ensure_built()?;

        let mut cmd = self.command(args, env);
        cmd.stdin(Stdio::inherit());

        let output = cmd.output().map_err(|source| self.spawn_error(source))?;
        let captured = CapturedOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(exit_code = captured.exit_code, "Captured run finished");

        if check && !captured.success() {
            return Err(LaunchError::ChildProcessFailure {
                program: self.binary_path().display().to_string(),
                exit_code: captured.exit_code,
                stdout: captured.stdout,
                stderr: captured.stderr,
            });
        }

        Ok(captured)
    }

    /// Run to completion, relaying combined output to stdout
    pub fn run_streamed<S: AsRef<OsStr>>(
        &self,
        args: &[S],
        env: &EnvOverrides,
    ) -> Result<i32, LaunchError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.run_streamed_to(args, env, &mut out)
    }

    /// Run to completion, relaying combined output to `out` line by line
    pub fn run_streamed_to<S, W>(
        &self,
        args: &[S],
        env: &EnvOverrides,
        out: &mut W,
    ) -> Result<i32, LaunchError>
    where
        S: AsRef<OsStr>,
        W: Write,
    {
        self.ensure_built()?;

        let (reader, writer) = io::pipe()?;
        let mut cmd = self.command(args, env);
        cmd.stdin(Stdio::inherit())
            .stdout(writer.try_clone()?)
            .stderr(writer);

        let mut child = cmd.spawn().map_err(|source| self.spawn_error(source))?;
        // The command still holds write ends of the pipe; EOF needs them closed.
        drop(cmd);

        let relayed = relay_lines(reader, out);
        let status = child.wait()?;
        relayed?;

        let code = exit_code(status);
        tracing::debug!(exit_code = code, "Streamed run finished");
        Ok(code)
    }

    fn command<S: AsRef<OsStr>>(&self, args: &[S], overlay: &EnvOverrides) -> Command {
        let binary = self.binary_path();
        let vars = env::child_overrides(
            overlay,
            &self.config.root_env_var,
            &self.config.root,
            |key| std::env::var_os(key),
        );

        tracing::info!(
            binary = %binary.display(),
            args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
            env = ?env::redacted(overlay),
            "Launching bot"
        );

        let mut cmd = Command::new(&binary);
        cmd.args(args)
            .current_dir(&self.config.root)
            .envs(vars);
        cmd
    }

    fn spawn_error(&self, source: io::Error) -> LaunchError {
        LaunchError::Spawn {
            program: self.binary_path().display().to_string(),
            source,
        }
    }
}

fn relay_lines<R: io::Read, W: Write>(reader: R, out: &mut W) -> io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        out.write_all(&line)?;
        out.flush()?;
    }
}
