//! Child environment construction
//!
//! A child inherits the launcher's environment. The caller's overlay is
//! applied on top of it through `Command::env`, so key comparison follows
//! the platform (case-insensitive on Windows). The root variable is added
//! last, and only when nothing supplied it.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::sync::OnceLock;

use regex_lite::Regex;

/// Caller-supplied environment overrides
pub type EnvOverrides = BTreeMap<String, String>;

/// Variables to set on top of the inherited environment.
///
/// `inherited` looks up a variable in the environment the child inherits.
pub fn child_overrides<F>(
    overlay: &EnvOverrides,
    root_var: &str,
    root: &Path,
    inherited: F,
) -> Vec<(OsString, OsString)>
where
    F: Fn(&str) -> Option<OsString>,
{
    let mut vars: Vec<(OsString, OsString)> = overlay
        .iter()
        .map(|(k, v)| (OsString::from(k), OsString::from(v)))
        .collect();

    let supplied = overlay.keys().any(|k| same_key(k, root_var));
    if !supplied && inherited(root_var).is_none() {
        vars.push((OsString::from(root_var), root.as_os_str().to_os_string()));
    }
    vars
}

#[cfg(windows)]
fn same_key(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(not(windows))]
fn same_key(a: &str, b: &str) -> bool {
    a == b
}

/// Parse a `KEY=VALUE` pair as given on the command line
pub fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn secret_key_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)(key|secret|token|password|passwd|credential)")
            .expect("Invalid secret regex")
    })
}

/// Whether an environment key probably holds a credential
pub fn is_sensitive_key(key: &str) -> bool {
    secret_key_regex().is_match(key)
}

/// Render overrides for logging with credential values hidden
pub fn redacted(overlay: &EnvOverrides) -> Vec<String> {
    overlay
        .iter()
        .map(|(k, v)| {
            if is_sensitive_key(k) {
                format!("{}=[REDACTED]", k)
            } else {
                format!("{}={}", k, v)
            }
        })
        .collect()
}
