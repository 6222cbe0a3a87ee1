//! Stages that append items to the working value.

use super::text::compile;
use crate::command::{StageContext, StageOp};
use crate::error::StageError;
use crate::external::ExternalCommand;
use crate::platform::{EnvFlavor, PlatformInfo};
use crate::registry::Arity;
use crate::value::WorkingValue;
use argh::FromArgs;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(FromArgs, Debug)]
/// Append a literal value.
pub struct In {
    #[argh(positional)]
    /// the value; embedded newlines produce one item per line.
    pub value: String,
}

impl StageOp for In {
    const FLAG: &'static str = "--in";
    const SHORT: Option<&'static str> = Some("-i");
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "VALUE";
    const SUMMARY: &'static str = "Append VALUE to the working value";

    fn apply(
        self,
        mut value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        value.push_text(&self.value);
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the lines of a file.
pub struct ReadFile {
    #[argh(positional)]
    /// file to read.
    pub path: PathBuf,
}

impl StageOp for ReadFile {
    const FLAG: &'static str = "--read";
    const SHORT: Option<&'static str> = Some("-r");
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "PATH";
    const SUMMARY: &'static str = "Append every line of the file at PATH";

    fn apply(
        self,
        mut value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let content =
            fs::read_to_string(&self.path).map_err(|e| StageError::fs("read", &self.path, e))?;
        let before = value.len();
        for line in content.lines() {
            value.push(line);
        }
        debug!(path = %self.path.display(), lines = value.len() - before, "read file");
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the platform display name.
pub struct Platform {}

impl StageOp for Platform {
    const FLAG: &'static str = "--platform";
    const SHORT: Option<&'static str> = Some("-p");
    const SUMMARY: &'static str = "Append the platform name (Windows, Linux, MacOS, Unix)";

    fn apply(
        self,
        mut value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        value.push(ctx.platform.name());
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the lower-case platform identifier.
pub struct PlatformId {}

impl StageOp for PlatformId {
    const FLAG: &'static str = "--platform-id";
    const SUMMARY: &'static str = "Append the lower-case platform identifier";

    fn apply(
        self,
        mut value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        value.push(ctx.platform.lower_id());
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the native executable suffix.
pub struct PlatformExec {}

impl StageOp for PlatformExec {
    const FLAG: &'static str = "--platform-exec";
    const SUMMARY: &'static str = "Append the executable suffix (.exe on Windows, empty elsewhere)";

    fn apply(
        self,
        mut value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        value.push(ctx.platform.exec_suffix());
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the command that opens a path with its default handler.
pub struct PlatformOpen {}

impl StageOp for PlatformOpen {
    const FLAG: &'static str = "--platform-open";
    const SUMMARY: &'static str = "Append the command opening a file with its default handler";

    fn apply(
        self,
        mut value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        value.push(ctx.platform.open_command());
        Ok(value)
    }
}

/// Fail unless running under the given emulation layer.
fn require_flavor(
    platform: &PlatformInfo,
    flavor: EnvFlavor,
    operation: &'static str,
) -> Result<(), StageError> {
    if platform.flavor() == flavor {
        return Ok(());
    }
    Err(StageError::Unsupported {
        operation,
        platform: platform.name().to_string(),
        reason: format!("not running under {:?}", flavor),
    })
}

/// Run a version tool and pull the `version` group out of its first matching line.
fn tool_version(
    ctx: &StageContext<'_>,
    program: &str,
    args: &[&str],
    pattern: &str,
) -> Result<String, StageError> {
    let re = compile(pattern)?;
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let listing = ExternalCommand::new(program, args.clone()).quiet_output(&*ctx.env)?;
    version_in(&listing, &re).ok_or_else(|| StageError::Command {
        command: format!("{} {}", program, args.join(" ")),
        reason: "no version in output".to_string(),
    })
}

fn version_in(listing: &str, re: &regex::Regex) -> Option<String> {
    listing
        .lines()
        .find_map(|line| re.captures(line)?.name("version"))
        .map(|m| m.as_str().to_string())
}

const CYGWIN_VERSION: &str = r"^cygwin[ \t]+(?P<version>[0-9.-]+)[ \t]+";
const MINGW_VERSION: &str = r"^mingw-get version[ \t]+(?P<version>[0-9a-z.-]+)";

#[derive(FromArgs, Debug)]
/// Append the installed Cygwin version.
pub struct CygwinVersion {}

impl StageOp for CygwinVersion {
    const FLAG: &'static str = "--cygwin";
    const SHORT: Option<&'static str> = Some("-c");
    const SUMMARY: &'static str = "Append the Cygwin version (Cygwin only)";

    fn apply(
        self,
        mut value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        require_flavor(ctx.platform, EnvFlavor::Cygwin, "--cygwin")?;
        value.push(tool_version(ctx, "cygcheck", &["-c", "cygwin"], CYGWIN_VERSION)?);
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the installed MSYS2 toolchain version.
pub struct MingwVersion {}

impl StageOp for MingwVersion {
    const FLAG: &'static str = "--mingw";
    const SHORT: Option<&'static str> = Some("-m");
    const SUMMARY: &'static str = "Append the MSYS2/MinGW version (MSYS2 only)";

    fn apply(
        self,
        mut value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        require_flavor(ctx.platform, EnvFlavor::Msys2, "--mingw")?;
        value.push(tool_version(ctx, "mingw-get", &["--version"], MINGW_VERSION)?);
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the current Unix time in seconds.
pub struct Timestamp {}

impl StageOp for Timestamp {
    const FLAG: &'static str = "--timestamp";
    const SUMMARY: &'static str = "Append the current Unix time in seconds";

    fn apply(
        self,
        mut value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        value.push(Utc::now().timestamp().to_string());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stages::testing::{Harness, linux, windows};
    use tempfile::tempdir;

    #[test]
    fn test_in_accumulates_in_order() {
        let mut h = Harness::new(linux());
        let value = In { value: "a".into() }.apply(WorkingValue::new(), &mut h.ctx()).unwrap();
        let value = In { value: "b\nc".into() }.apply(value, &mut h.ctx()).unwrap();
        assert_eq!(value.items(), ["a", "b", "c"]);
    }

    #[test]
    fn test_in_keeps_backslashes() {
        let mut h = Harness::new(linux());
        let value = In {
            value: r"C:\tools\bin".into(),
        }
        .apply(WorkingValue::new(), &mut h.ctx())
        .unwrap();
        assert_eq!(value.items(), [r"C:\tools\bin"]);
    }

    #[test]
    fn test_read_file_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.txt");
        fs::write(&path, "one\r\ntwo\n").unwrap();

        let mut h = Harness::new(linux());
        let value = ReadFile { path }.apply(WorkingValue::new(), &mut h.ctx()).unwrap();
        assert_eq!(value.items(), ["one", "two"]);
    }

    #[test]
    fn test_read_empty_file_adds_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();

        let mut h = Harness::new(linux());
        let value = ReadFile { path }.apply(WorkingValue::new(), &mut h.ctx()).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_read_missing_file_is_filesystem_error() {
        let dir = tempdir().unwrap();
        let mut h = Harness::new(linux());
        let err = ReadFile {
            path: dir.path().join("absent"),
        }
        .apply(WorkingValue::new(), &mut h.ctx())
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Filesystem);
    }

    #[test]
    fn test_platform_queries_use_context() {
        let mut h = Harness::new(windows(EnvFlavor::Native));
        let mut value = WorkingValue::new();
        value = Platform {}.apply(value, &mut h.ctx()).unwrap();
        value = PlatformId {}.apply(value, &mut h.ctx()).unwrap();
        value = PlatformExec {}.apply(value, &mut h.ctx()).unwrap();
        value = PlatformOpen {}.apply(value, &mut h.ctx()).unwrap();
        assert_eq!(value.items(), ["Windows", "windows", ".exe", "start \"\""]);
    }

    #[test]
    fn test_timestamp_is_numeric() {
        let mut h = Harness::new(linux());
        let value = Timestamp {}.apply(WorkingValue::new(), &mut h.ctx()).unwrap();
        let secs: i64 = value.items()[0].parse().unwrap();
        assert!(secs > 1_600_000_000);
    }

    #[test]
    fn test_version_tools_need_their_flavor() {
        let mut h = Harness::new(linux());
        let err = CygwinVersion {}.apply(WorkingValue::new(), &mut h.ctx()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlatformCapability);
        assert_eq!(err.exit_code(), 6);

        let mut h = Harness::new(windows(EnvFlavor::Cygwin));
        let err = MingwVersion {}.apply(WorkingValue::new(), &mut h.ctx()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlatformCapability);
    }

    #[test]
    fn test_version_extraction() {
        let cygcheck = "Cygwin Package Information\nPackage              Version        Status\ncygwin               3.4.9-1        OK\n";
        let re = compile(CYGWIN_VERSION).unwrap();
        assert_eq!(version_in(cygcheck, &re).as_deref(), Some("3.4.9-1"));

        let re = compile(MINGW_VERSION).unwrap();
        assert_eq!(
            version_in("mingw-get version 0.6.3-pre1\nCopyright", &re).as_deref(),
            Some("0.6.3-pre1")
        );
        assert_eq!(version_in("unrelated output", &re), None);
    }
}
