//! Per-invocation configuration.

use std::path::PathBuf;
use std::str::FromStr;

/// Flag that sets the [`ErrorPolicy`]. It is consumed by the parser and
/// never becomes a pipeline stage.
pub const STOP_ON_ERROR_FLAG: &str = "--stoponerror";

/// How the engine reacts to a failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// Abort on the first failure (default). When false, a failing stage
    /// leaves an empty working value behind and the pipeline continues.
    pub stop_on_error: bool,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            stop_on_error: true,
        }
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Self {
                stop_on_error: true,
            }),
            "false" => Ok(Self {
                stop_on_error: false,
            }),
            other => Err(format!("expected 'true' or 'false', got '{}'", other)),
        }
    }
}

/// Where a child process stream goes, set by `--stdout` and `--stderr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Captured and appended to the working value.
    Process,
    /// Passed through to our own stream.
    Print,
    /// Discarded.
    Ignore,
    /// Written to a file, replacing its content.
    Write(PathBuf),
}

impl FromStr for OutputMode {
    type Err = String;

    /// `process`, `print` or `ignore`; anything else is a file path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err("expected process, print, ignore or a file path".to_string()),
            "process" => Ok(OutputMode::Process),
            "print" => Ok(OutputMode::Print),
            "ignore" => Ok(OutputMode::Ignore),
            path => Ok(OutputMode::Write(PathBuf::from(path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stops_on_error() {
        assert!(ErrorPolicy::default().stop_on_error);
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trimmed() {
        assert!(!" FALSE ".parse::<ErrorPolicy>().unwrap().stop_on_error);
        assert!("True".parse::<ErrorPolicy>().unwrap().stop_on_error);
        assert!("maybe".parse::<ErrorPolicy>().is_err());
    }

    #[test]
    fn test_output_mode_keywords_and_paths() {
        assert_eq!("process".parse::<OutputMode>().unwrap(), OutputMode::Process);
        assert_eq!("print".parse::<OutputMode>().unwrap(), OutputMode::Print);
        assert_eq!("ignore".parse::<OutputMode>().unwrap(), OutputMode::Ignore);
        assert_eq!(
            "logs/build.txt".parse::<OutputMode>().unwrap(),
            OutputMode::Write(PathBuf::from("logs/build.txt"))
        );
        assert!("".parse::<OutputMode>().is_err());
    }
}
