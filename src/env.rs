//! Variables, working directory and output routing for child processes.

use crate::config::OutputMode;
use std::collections::BTreeMap;
use std::env as stdenv;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// What `--exec` and `--foreach` children start with.
///
/// Children inherit the process environment. Each `--env KEY=VALUE` stage
/// records an override that applies to every child started after it;
/// `--stdout` and `--stderr` likewise reroute the streams of later children.
#[derive(Debug, Clone)]
pub struct Environment {
    overrides: BTreeMap<String, String>,
    working_dir: PathBuf,
    stdout: OutputMode,
    stderr: OutputMode,
}

impl Environment {
    /// Inherit everything, running children in the current directory.
    pub fn new() -> Self {
        Self::in_dir(stdenv::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    pub fn in_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            overrides: BTreeMap::new(),
            working_dir: working_dir.into(),
            stdout: OutputMode::Process,
            stderr: OutputMode::Print,
        }
    }

    /// Value a child would see for `key`.
    pub fn var(&self, key: &str) -> Option<OsString> {
        match self.overrides.get(key) {
            Some(value) => Some(value.into()),
            None => stdenv::var_os(key),
        }
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// Variables set by `--env`, in key order.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn stdout_mode(&self) -> &OutputMode {
        &self.stdout
    }

    pub fn stderr_mode(&self) -> &OutputMode {
        &self.stderr
    }

    pub fn set_stdout_mode(&mut self, mode: OutputMode) {
        self.stdout = mode;
    }

    pub fn set_stderr_mode(&mut self, mode: OutputMode) {
        self.stderr = mode;
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
