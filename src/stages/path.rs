//! Path and path-list conversions between native and shell conventions.

use crate::command::{StageContext, StageOp};
use crate::error::StageError;
use crate::platform::{EnvFlavor, PlatformInfo};
use crate::value::WorkingValue;
use argh::FromArgs;

fn is_separator(c: char, windows: bool) -> bool {
    c == '/' || (windows && c == '\\')
}

/// Split a leading `X:` drive off a Windows path.
fn split_drive(path: &str, windows: bool) -> (&str, &str) {
    let bytes = path.as_bytes();
    if windows && bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        path.split_at(2)
    } else {
        ("", path)
    }
}

pub(crate) fn dirname(path: &str, windows: bool) -> String {
    let (drive, rest) = split_drive(path, windows);
    match rest.rfind(|c| is_separator(c, windows)) {
        None => drive.to_string(),
        Some(i) => {
            let head = &rest[..=i];
            let trimmed = head.trim_end_matches(|c| is_separator(c, windows));
            let head = if trimmed.is_empty() { head } else { trimmed };
            format!("{}{}", drive, head)
        }
    }
}

pub(crate) fn basename(path: &str, windows: bool) -> &str {
    let (_, rest) = split_drive(path, windows);
    match rest.rfind(|c| is_separator(c, windows)) {
        Some(i) => &rest[i + 1..],
        None => rest,
    }
}

/// Collapse repeated `/` and drop a trailing one, keeping roots and a UNC prefix.
fn normalize_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    if path.starts_with("//") {
        out.push('/');
    }
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        out.push(c);
    }
    if out.ends_with('/') && !is_root(&out) {
        out.pop();
    }
    out
}

fn is_root(path: &str) -> bool {
    match path {
        "/" | "//" => true,
        _ => {
            let bytes = path.as_bytes();
            bytes.len() == 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
        }
    }
}

/// `C:/rest` → (`C`, `rest`), for any single drive letter.
fn drive_path(path: &str) -> Option<(char, &str)> {
    let mut chars = path.chars();
    let drive = chars.next().filter(char::is_ascii_alphabetic)?;
    let rest = chars.as_str().strip_prefix(':')?;
    match rest {
        "" => Some((drive, "")),
        _ => rest.strip_prefix('/').map(|tail| (drive, tail)),
    }
}

/// `/<letter>` or `/<letter>/rest` below `prefix` → (`letter`, `rest`).
fn mounted_drive<'a>(path: &'a str, prefix: &str) -> Option<(char, &'a str)> {
    let rest = path.strip_prefix(prefix)?;
    let mut chars = rest.chars();
    let drive = chars.next().filter(char::is_ascii_alphabetic)?;
    let tail = chars.as_str();
    match tail {
        "" => Some((drive, "")),
        _ => tail.strip_prefix('/').map(|tail| (drive, tail)),
    }
}

/// Native path → form usable in PATH-like variables of the build shell.
pub fn to_env_path(path: &str, platform: &PlatformInfo) -> String {
    if !platform.is_windows() {
        return path.to_string();
    }
    let slashed = path.trim().replace('\\', "/");
    let converted = match (drive_path(&slashed), platform.flavor()) {
        (Some((drive, rest)), EnvFlavor::Cygwin) => {
            Some(format!("/cygdrive/{}/{}", drive.to_ascii_lowercase(), rest))
        }
        (Some((drive, rest)), EnvFlavor::Msys2) => {
            Some(format!("/{}/{}", drive.to_ascii_lowercase(), rest))
        }
        _ => None,
    };
    normalize_slashes(converted.as_deref().unwrap_or(&slashed))
}

/// Shell path → native Windows path with backslashes and an upper-case drive.
pub fn to_platform_path(path: &str, platform: &PlatformInfo) -> String {
    if !platform.is_windows() {
        return path.to_string();
    }
    let slashed = path.trim().replace('\\', "/");
    let mounted = match platform.flavor() {
        EnvFlavor::Cygwin => mounted_drive(&slashed, "/cygdrive/"),
        EnvFlavor::Msys2 => mounted_drive(&slashed, "/"),
        EnvFlavor::Native => None,
    };
    let native = mounted
        .or_else(|| drive_path(&slashed))
        .map(|(drive, rest)| format!("{}:/{}", drive.to_ascii_uppercase(), rest));
    normalize_slashes(native.as_deref().unwrap_or(&slashed)).replace('/', "\\")
}

#[derive(FromArgs, Debug)]
/// Replace every item by its parent directory.
pub struct Dirname {}

impl StageOp for Dirname {
    const FLAG: &'static str = "--dirname";
    const SUMMARY: &'static str = "Replace every path by its directory part";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let windows = ctx.platform.is_windows();
        Ok(value.map_items(|item| dirname(item.trim(), windows)))
    }
}

#[derive(FromArgs, Debug)]
/// Replace every item by its final component.
pub struct Basename {}

impl StageOp for Basename {
    const FLAG: &'static str = "--basename";
    const SUMMARY: &'static str = "Replace every path by its final component";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let windows = ctx.platform.is_windows();
        Ok(value.map_items(|item| basename(item.trim(), windows).to_string()))
    }
}

#[derive(FromArgs, Debug)]
/// Convert native paths to the build shell's form.
pub struct EnvPath {}

impl StageOp for EnvPath {
    const FLAG: &'static str = "--env-path";
    const SUMMARY: &'static str = "Convert native paths for use in PATH-like variables";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value.map_items(|item| to_env_path(&item, ctx.platform)))
    }
}

#[derive(FromArgs, Debug)]
/// Convert shell paths to native paths.
pub struct PlatformPath {}

impl StageOp for PlatformPath {
    const FLAG: &'static str = "--platform-path";
    const SUMMARY: &'static str = "Convert paths to the native form (C:\\dir on Windows)";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value.map_items(|item| to_platform_path(&item, ctx.platform)))
    }
}

#[derive(FromArgs, Debug)]
/// Join items into one native list.
pub struct ShellList {}

impl StageOp for ShellList {
    const FLAG: &'static str = "--shell-list";
    const SUMMARY: &'static str = "Join items with the native list separator (; or :)";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        if value.is_empty() {
            return Ok(value);
        }
        let separator = ctx.platform.list_separator();
        let mut parts = Vec::with_capacity(value.len());
        for item in value {
            if !item.contains(separator) {
                parts.push(item);
            } else if separator == ';' {
                parts.push(format!("\"{}\"", item));
            } else {
                return Err(StageError::Policy(format!(
                    "'{}' contains the list separator '{}'",
                    item, separator
                )));
            }
        }
        let joiner = separator.to_string();
        Ok(WorkingValue::single(parts.join(joiner.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stages::testing::{Harness, linux, windows};

    #[test]
    fn test_dirname_basename_posix() {
        assert_eq!(dirname("/usr/lib/libc.so", false), "/usr/lib");
        assert_eq!(dirname("/usr", false), "/");
        assert_eq!(dirname("file", false), "");
        assert_eq!(dirname("a//b", false), "a");
        assert_eq!(basename("/usr/lib/libc.so", false), "libc.so");
        assert_eq!(basename("dir/", false), "");
        assert_eq!(basename(r"a\b", false), r"a\b");
    }

    #[test]
    fn test_dirname_basename_windows() {
        assert_eq!(dirname(r"C:\tools\bin\gcc.exe", true), r"C:\tools\bin");
        assert_eq!(dirname(r"C:\gcc.exe", true), r"C:\");
        assert_eq!(dirname("C:gcc.exe", true), "C:");
        assert_eq!(basename(r"C:\tools/bin\gcc.exe", true), "gcc.exe");
        assert_eq!(basename("C:gcc.exe", true), "gcc.exe");
    }

    #[test]
    fn test_env_path_per_flavor() {
        let path = r"C:\Program Files\tool\";
        assert_eq!(
            to_env_path(path, &windows(EnvFlavor::Cygwin)),
            "/cygdrive/c/Program Files/tool"
        );
        assert_eq!(
            to_env_path(path, &windows(EnvFlavor::Msys2)),
            "/c/Program Files/tool"
        );
        assert_eq!(
            to_env_path(path, &windows(EnvFlavor::Native)),
            "C:/Program Files/tool"
        );
        assert_eq!(to_env_path(path, &linux()), path);
    }

    #[test]
    fn test_env_path_keeps_roots_and_unc() {
        let native = windows(EnvFlavor::Native);
        assert_eq!(to_env_path(r"C:\", &native), "C:/");
        assert_eq!(to_env_path(r"\\server\share\\dir", &native), "//server/share/dir");
        assert_eq!(to_env_path("/", &native), "/");
    }

    #[test]
    fn test_platform_path_per_flavor() {
        assert_eq!(
            to_platform_path("/cygdrive/c/tools/bin", &windows(EnvFlavor::Cygwin)),
            r"C:\tools\bin"
        );
        assert_eq!(
            to_platform_path("/d/src//x/", &windows(EnvFlavor::Msys2)),
            r"D:\src\x"
        );
        assert_eq!(
            to_platform_path("c:/tools", &windows(EnvFlavor::Native)),
            r"C:\tools"
        );
        assert_eq!(to_platform_path("/usr/bin", &linux()), "/usr/bin");
    }

    #[test]
    fn test_platform_path_is_idempotent() {
        let inputs = [
            "/cygdrive/c/tools/bin",
            "/c/Users/dev",
            r"C:\already\native",
            "relative/dir/",
            r"\\server\share",
            "",
        ];
        for flavor in [EnvFlavor::Native, EnvFlavor::Cygwin, EnvFlavor::Msys2] {
            let platform = windows(flavor);
            for input in inputs {
                let once = to_platform_path(input, &platform);
                assert_eq!(to_platform_path(&once, &platform), once, "{:?} {}", flavor, input);
            }
        }
        let once = to_platform_path("/tmp/x", &linux());
        assert_eq!(to_platform_path(&once, &linux()), once);
    }

    #[test]
    fn test_env_path_round_trips_through_platform_path() {
        for flavor in [EnvFlavor::Cygwin, EnvFlavor::Msys2] {
            let platform = windows(flavor);
            let env = to_env_path(r"C:\tools\bin", &platform);
            assert_eq!(to_platform_path(&env, &platform), r"C:\tools\bin");
        }
    }

    #[test]
    fn test_shell_list_native_windows_quotes() {
        let mut h = Harness::new(windows(EnvFlavor::Native));
        let out = ShellList {}
            .apply(WorkingValue::from_items(["C:\\a", "x;y"]), &mut h.ctx())
            .unwrap();
        assert_eq!(out.items(), ["C:\\a;\"x;y\""]);
    }

    #[test]
    fn test_shell_list_posix() {
        let mut h = Harness::new(windows(EnvFlavor::Msys2));
        let out = ShellList {}
            .apply(WorkingValue::from_items(["/c/a", "/c/b"]), &mut h.ctx())
            .unwrap();
        assert_eq!(out.items(), ["/c/a:/c/b"]);

        let mut h = Harness::new(linux());
        let err = ShellList {}
            .apply(WorkingValue::from_items(["a:b"]), &mut h.ctx())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PolicyViolation);

        let out = ShellList {}.apply(WorkingValue::new(), &mut h.ctx()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_dirname_stage_uses_platform() {
        let mut h = Harness::new(windows(EnvFlavor::Native));
        let out = Dirname {}
            .apply(WorkingValue::from_items([r" C:\a\b.txt "]), &mut h.ctx())
            .unwrap();
        assert_eq!(out.items(), [r"C:\a"]);
    }
}
