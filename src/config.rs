//! Launcher configuration
//!
//! The project root is resolved once at startup and handed to the launcher
//! as an explicit value. Everything else (binary name, toolchain, entry
//! point) has a default that matches the trading bot's repository layout.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable naming the project root
pub const ROOT_ENV_VAR: &str = "BOT_PATH";

pub const BINARY_ENV_VAR: &str = "BOT_BINARY";
pub const ENTRY_POINT_ENV_VAR: &str = "BOT_ENTRY_POINT";
pub const TOOLCHAIN_ENV_VAR: &str = "BOT_TOOLCHAIN";

/// Directory under the root that holds built binaries
pub const BIN_DIR_NAME: &str = "bin";

pub const DEFAULT_BINARY_NAME: &str = "bot";
pub const DEFAULT_ENTRY_POINT: &str = "./cmd/bot";
pub const DEFAULT_TOOLCHAIN: &str = "go";

const DOTENV_FILE_NAME: &str = ".env";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not set; point it at the trading bot project root")]
    MissingRoot { var: String },

    #[error("project root {} cannot be resolved: {source}", .path.display())]
    UnresolvableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project root {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}

/// Command used to produce the binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<OsString>,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// `<toolchain> build -o <output> <entry_point>`
    pub fn go(toolchain: &str, output: &Path, entry_point: &str) -> Self {
        Self::new(toolchain)
            .arg("build")
            .arg("-o")
            .arg(output)
            .arg(entry_point)
    }

    /// Human-readable rendering for logs and error messages
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Values supplied on the command line. Each falls back to its environment
/// variable, then to the default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    pub binary_name: Option<String>,
    pub entry_point: Option<String>,
    pub toolchain: Option<String>,
}

/// Resolved launcher configuration, immutable for the process lifetime
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Canonical project root; working directory for builds and runs
    pub root: PathBuf,
    pub binary_name: String,
    /// Variable guaranteed present in every child's environment
    pub root_env_var: String,
    pub build: BuildCommand,
}

impl LauncherConfig {
    /// Load from overrides and the process environment
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        Self::load_with(overrides, |key| std::env::var_os(key))
    }

    /// Load using `lookup` for environment access
    pub fn load_with<F>(overrides: &ConfigOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let raw_root = match &overrides.root {
            Some(root) => root.clone(),
            None => lookup(ROOT_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| ConfigError::MissingRoot {
                    var: ROOT_ENV_VAR.to_string(),
                })?,
        };

        let root = resolve_root(&raw_root)?;
        let setting = |value: &Option<String>, var: &str, default: &str| -> String {
            value
                .clone()
                .or_else(|| lookup(var).and_then(|v| v.into_string().ok()))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let binary_name = setting(&overrides.binary_name, BINARY_ENV_VAR, DEFAULT_BINARY_NAME);
        let entry_point = setting(&overrides.entry_point, ENTRY_POINT_ENV_VAR, DEFAULT_ENTRY_POINT);
        let toolchain = setting(&overrides.toolchain, TOOLCHAIN_ENV_VAR, DEFAULT_TOOLCHAIN);

        let binary_path = root.join(BIN_DIR_NAME).join(&binary_name);
        let build = BuildCommand::go(&toolchain, &binary_path, &entry_point);

        tracing::debug!(
            root = %root.display(),
            binary = %binary_name,
            "Loaded launcher configuration"
        );

        Ok(Self {
            root,
            binary_name,
            root_env_var: ROOT_ENV_VAR.to_string(),
            build,
        })
    }

    /// Build a configuration directly
    #[cfg(test)]
    pub fn with_root(root: impl Into<PathBuf>, build: BuildCommand) -> Self {
        Self {
            root: root.into(),
            binary_name: DEFAULT_BINARY_NAME.to_string(),
            root_env_var: ROOT_ENV_VAR.to_string(),
            build,
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR_NAME)
    }

    pub fn binary_path(&self) -> PathBuf {
        self.bin_dir().join(&self.binary_name)
    }
}

fn resolve_root(path: &Path) -> Result<PathBuf, ConfigError> {
    let resolved = path
        .canonicalize()
        .map_err(|source| ConfigError::UnresolvableRoot {
            path: path.to_path_buf(),
            source,
        })?;

    if !resolved.is_dir() {
        return Err(ConfigError::NotADirectory(resolved));
    }

    Ok(resolved)
}

/// Load a `.env` file from the current directory or one of its parents.
///
/// Values override variables already present. A missing file is normal and
/// only logged at debug level.
pub fn load_dotenv() -> Option<PathBuf> {
    let found = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_dotenv(&cwd));
    match found {
        Some(path) => load_dotenv_from(&path),
        None => {
            tracing::debug!("No .env file found, using inherited environment");
            None
        }
    }
}

/// Load `path` as a `.env` file, overriding existing variables.
///
/// A malformed or unreadable file is logged as a warning and otherwise ignored.
pub fn load_dotenv_from(path: &Path) -> Option<PathBuf> {
    match dotenvy::from_path_override(path) {
        Ok(()) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Some(path.to_path_buf())
        }
        Err(e) if e.not_found() => {
            tracing::debug!("No .env file at {}", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Ignoring unreadable .env file {}: {}", path.display(), e);
            None
        }
    }
}

/// Nearest `.env` file in `start` or its ancestors
fn find_dotenv(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DOTENV_FILE_NAME))
        .find(|candidate| candidate.is_file())
}
