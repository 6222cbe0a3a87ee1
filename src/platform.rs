//! Host platform detection.
//!
//! [`PlatformInfo`] is computed once at startup and handed to every stage
//! that needs it, so tests can run stages against a fabricated platform.

use crate::error::StageError;
use std::env::consts::OS;
use std::path::Path;

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Linux,
    MacOs,
    /// Any other POSIX-like system (BSDs, illumos, ...).
    Unix,
}

/// POSIX emulation layer a Windows build may be running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFlavor {
    Native,
    Cygwin,
    Msys2,
}

/// Conventions of the platform the utility runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    family: OsFamily,
    flavor: EnvFlavor,
}

impl PlatformInfo {
    pub fn new(family: OsFamily, flavor: EnvFlavor) -> Self {
        // Emulation layers only exist on Windows.
        let flavor = if family == OsFamily::Windows {
            flavor
        } else {
            EnvFlavor::Native
        };
        Self { family, flavor }
    }

    /// Classify the running host.
    ///
    /// Fails only when the OS is neither Windows nor POSIX-like.
    pub fn detect() -> Result<Self, StageError> {
        let family = classify_os(OS, cfg!(unix)).ok_or_else(|| StageError::Unsupported {
            operation: "platform detection",
            platform: OS.to_string(),
            reason: "operating system is neither Windows nor POSIX-like".to_string(),
        })?;
        let flavor = if family == OsFamily::Windows {
            detect_flavor(
                OS,
                |key| std::env::var(key).ok(),
                |dir| Path::new(dir).is_dir(),
            )
        } else {
            EnvFlavor::Native
        };
        Ok(Self::new(family, flavor))
    }

    pub fn family(&self) -> OsFamily {
        self.family
    }

    pub fn flavor(&self) -> EnvFlavor {
        self.flavor
    }

    pub fn is_windows(&self) -> bool {
        self.family == OsFamily::Windows
    }

    /// Canonical display name.
    pub fn name(&self) -> &'static str {
        match self.family {
            OsFamily::Windows => "Windows",
            OsFamily::Linux => "Linux",
            OsFamily::MacOs => "MacOS",
            OsFamily::Unix => "Unix",
        }
    }

    /// Lower-case identifier for conditionals in build scripts.
    pub fn lower_id(&self) -> &'static str {
        match self.family {
            OsFamily::Windows => "windows",
            OsFamily::Linux => "linux",
            OsFamily::MacOs => "macos",
            OsFamily::Unix => "unix",
        }
    }

    /// Suffix of native executables.
    pub fn exec_suffix(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }

    /// Command that opens a path with its default handler.
    pub fn open_command(&self) -> &'static str {
        match self.family {
            OsFamily::Windows => "start \"\"",
            OsFamily::MacOs => "open",
            OsFamily::Linux | OsFamily::Unix => "xdg-open",
        }
    }

    /// Line terminator used for files written by the utility.
    pub fn line_separator(&self) -> &'static str {
        if self.is_windows() { "\r\n" } else { "\n" }
    }

    /// Separator of PATH-like lists in the shell the build runs under.
    pub fn list_separator(&self) -> char {
        if self.is_windows() && self.flavor == EnvFlavor::Native {
            ';'
        } else {
            ':'
        }
    }
}

fn classify_os(os: &str, is_unix: bool) -> Option<OsFamily> {
    match os {
        "windows" | "cygwin" => Some(OsFamily::Windows),
        "linux" | "android" => Some(OsFamily::Linux),
        "macos" | "ios" => Some(OsFamily::MacOs),
        _ if is_unix => Some(OsFamily::Unix),
        _ => None,
    }
}

fn detect_flavor<V, D>(os: &str, var: V, dir_exists: D) -> EnvFlavor
where
    V: Fn(&str) -> Option<String>,
    D: Fn(&str) -> bool,
{
    if os == "cygwin" || dir_exists("/cygdrive") {
        return EnvFlavor::Cygwin;
    }
    let msys_var = var("MSYS").is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if var("MSYSTEM").is_some() || msys_var || dir_exists("/mingw64") || dir_exists("/mingw32") {
        return EnvFlavor::Msys2;
    }
    EnvFlavor::Native
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_matches_host() {
        let info = PlatformInfo::detect().unwrap();
        assert_eq!(info.is_windows(), cfg!(windows));
        #[cfg(target_os = "linux")]
        assert_eq!(info.name(), "Linux");
        #[cfg(target_os = "macos")]
        assert_eq!(info.name(), "MacOS");
    }

    #[test]
    fn test_classify_os() {
        assert_eq!(classify_os("windows", false), Some(OsFamily::Windows));
        assert_eq!(classify_os("cygwin", true), Some(OsFamily::Windows));
        assert_eq!(classify_os("linux", true), Some(OsFamily::Linux));
        assert_eq!(classify_os("macos", true), Some(OsFamily::MacOs));
        assert_eq!(classify_os("freebsd", true), Some(OsFamily::Unix));
        assert_eq!(classify_os("uefi", false), None);
    }

    #[test]
    fn test_detect_flavor() {
        let no_vars = |_: &str| None;
        let no_dirs = |_: &str| false;
        assert_eq!(detect_flavor("windows", no_vars, no_dirs), EnvFlavor::Native);
        assert_eq!(detect_flavor("cygwin", no_vars, no_dirs), EnvFlavor::Cygwin);
        assert_eq!(
            detect_flavor("windows", no_vars, |d: &str| d == "/cygdrive"),
            EnvFlavor::Cygwin
        );
        assert_eq!(
            detect_flavor(
                "windows",
                |k: &str| (k == "MSYSTEM").then(|| "MINGW64".to_string()),
                no_dirs
            ),
            EnvFlavor::Msys2
        );
        assert_eq!(
            detect_flavor(
                "windows",
                |k: &str| (k == "MSYS").then(|| "TRUE".to_string()),
                no_dirs
            ),
            EnvFlavor::Msys2
        );
    }

    #[test]
    fn test_windows_conventions() {
        let info = PlatformInfo::new(OsFamily::Windows, EnvFlavor::Native);
        assert_eq!(info.name(), "Windows");
        assert_eq!(info.lower_id(), "windows");
        assert_eq!(info.exec_suffix(), ".exe");
        assert_eq!(info.open_command(), "start \"\"");
        assert_eq!(info.line_separator(), "\r\n");
        assert_eq!(info.list_separator(), ';');

        let msys = PlatformInfo::new(OsFamily::Windows, EnvFlavor::Msys2);
        assert_eq!(msys.list_separator(), ':');
    }

    #[test]
    fn test_posix_conventions() {
        let linux = PlatformInfo::new(OsFamily::Linux, EnvFlavor::Cygwin);
        assert_eq!(linux.flavor(), EnvFlavor::Native);
        assert_eq!(linux.exec_suffix(), "");
        assert_eq!(linux.open_command(), "xdg-open");
        assert_eq!(linux.line_separator(), "\n");
        assert_eq!(linux.list_separator(), ':');

        let mac = PlatformInfo::new(OsFamily::MacOs, EnvFlavor::Native);
        assert_eq!(mac.lower_id(), "macos");
        assert_eq!(mac.open_command(), "open");
    }
}
