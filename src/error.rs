//! Error taxonomy for pipeline construction and stage execution.

use crate::command::ExitCode;
use crate::value::ItemCount;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Broad classification of a [`StageError`].
///
/// The engine applies the error policy uniformly to every kind; the kind only
/// decides the diagnostic prefix and the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown flag, missing or malformed flag value.
    Argument,
    /// The operation is not available on the detected platform.
    PlatformCapability,
    /// I/O failure while reading, writing or querying the filesystem.
    Filesystem,
    /// Malformed glob or regular expression.
    Pattern,
    /// A stage received input it cannot accept, e.g. the wrong item count.
    PolicyViolation,
    /// A child process failed to start or exited with a non-zero status.
    Command,
}

impl ErrorKind {
    /// Process exit code reported for an unrecovered failure of this kind.
    pub fn exit_code(self) -> ExitCode {
        match self {
            ErrorKind::Argument => 2,
            ErrorKind::Filesystem => 3,
            ErrorKind::Pattern => 4,
            ErrorKind::PolicyViolation => 5,
            ErrorKind::PlatformCapability => 6,
            ErrorKind::Command => 7,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Argument => "argument",
            ErrorKind::PlatformCapability => "platform-capability",
            ErrorKind::Filesystem => "filesystem",
            ErrorKind::Pattern => "pattern",
            ErrorKind::PolicyViolation => "policy",
            ErrorKind::Command => "command",
        };
        f.write_str(name)
    }
}

/// Errors raised while building or running a pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("no commands given, run with --help for usage")]
    NoCommands,

    #[error("unknown argument '{0}'")]
    UnknownArgument(String),

    #[error("{flag} expects {expected}")]
    MissingValue { flag: String, expected: String },

    #[error("invalid value for {flag}: {reason}")]
    InvalidValue { flag: String, reason: String },

    #[error("{operation} is not supported on {platform}: {reason}")]
    Unsupported {
        operation: &'static str,
        platform: String,
        reason: String,
    },

    #[error("cannot {action} '{}': {source}", .path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),

    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("expected {expected} item(s), got {actual}")]
    ItemCount { expected: ItemCount, actual: usize },

    #[error("{0}")]
    Policy(String),

    #[error("command '{command}' failed: {reason}")]
    Command { command: String, reason: String },
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::NoCommands
            | StageError::UnknownArgument(_)
            | StageError::MissingValue { .. }
            | StageError::InvalidValue { .. } => ErrorKind::Argument,
            StageError::Unsupported { .. } => ErrorKind::PlatformCapability,
            StageError::Filesystem { .. } | StageError::Output(_) => ErrorKind::Filesystem,
            StageError::Pattern { .. } => ErrorKind::Pattern,
            StageError::ItemCount { .. } | StageError::Policy(_) => ErrorKind::PolicyViolation,
            StageError::Command { .. } => ErrorKind::Command,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        self.kind().exit_code()
    }

    /// Shorthand for wrapping an [`io::Error`] raised while touching `path`.
    pub fn fs(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StageError::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }

    /// Malformed pattern. Multi-line parser messages are folded onto one line.
    pub fn pattern(pattern: &str, reason: impl fmt::Display) -> Self {
        let reason = reason
            .to_string()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        StageError::Pattern {
            pattern: pattern.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_have_distinct_non_zero_exit_codes() {
        let kinds = [
            ErrorKind::Argument,
            ErrorKind::PlatformCapability,
            ErrorKind::Filesystem,
            ErrorKind::Pattern,
            ErrorKind::PolicyViolation,
            ErrorKind::Command,
        ];
        let mut codes: Vec<ExitCode> = kinds.iter().map(|k| k.exit_code()).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn test_filesystem_error_message_names_path() {
        let err = StageError::fs(
            "write",
            "/tmp/out.txt",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert_eq!(err.to_string(), "cannot write '/tmp/out.txt': denied");
    }

    #[test]
    fn test_pattern_reason_is_single_line() {
        let err = StageError::pattern("(", "regex parse error:\n    (\n    ^\nerror: unclosed group");
        assert_eq!(
            err.to_string(),
            "invalid pattern '(': regex parse error: ( ^ error: unclosed group"
        );
    }

    #[test]
    fn test_item_count_is_policy_violation() {
        let err = StageError::ItemCount {
            expected: ItemCount::Exactly(1),
            actual: 3,
        };
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);
        assert_eq!(err.to_string(), "expected exactly 1 item(s), got 3");
    }
}
