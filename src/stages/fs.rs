//! Filesystem queries and side effects.

use crate::command::{StageContext, StageOp};
use crate::error::StageError;
use crate::platform::PlatformInfo;
use crate::registry::Arity;
use crate::value::{ItemCount, WorkingValue};
use argh::FromArgs;
use filetime::FileTime;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Expand `pattern`, skipping entries that cannot be read.
fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>, StageError> {
    let paths = glob::glob(pattern).map_err(|e| StageError::pattern(pattern, e))?;
    Ok(paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(pattern, error = %e, "skipping unreadable glob entry");
                None
            }
        })
        .collect())
}

#[derive(FromArgs, Debug)]
/// Expand glob patterns.
pub struct Glob {}

impl StageOp for Glob {
    const FLAG: &'static str = "--glob";
    const SUMMARY: &'static str = "Replace every pattern by the paths it matches";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let mut result = WorkingValue::new();
        for pattern in value.items().iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            let paths = glob_paths(pattern)?;
            debug!(pattern, matches = paths.len(), "expanded glob");
            for path in paths {
                result.push(path.to_string_lossy());
            }
        }
        Ok(result)
    }
}

fn path_exists(item: &str) -> bool {
    if Path::new(item).exists() {
        return true;
    }
    // Not a literal path; an unparsable pattern simply matches nothing.
    glob::glob(item).is_ok_and(|mut paths| paths.any(|p| p.is_ok()))
}

#[derive(FromArgs, Debug)]
/// Check that every item exists.
pub struct Exists {}

impl StageOp for Exists {
    const FLAG: &'static str = "--exists";
    const SUMMARY: &'static str = "Replace the items by 'true' if all exist, else by nothing";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let all_exist = !value.is_empty() && value.items().iter().all(|item| path_exists(item.trim()));
        Ok(if all_exist {
            WorkingValue::single("true")
        } else {
            WorkingValue::new()
        })
    }
}

/// Kind of filesystem entry `--print-valid` keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    All,
    Dir,
    File,
    Symlink,
}

impl Validity {
    fn check(self, path: &Path) -> bool {
        match self {
            Validity::All => path.exists(),
            Validity::Dir => path.is_dir(),
            Validity::File => path.is_file(),
            Validity::Symlink => path.is_symlink(),
        }
    }
}

impl FromStr for Validity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut validity = Validity::All;
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            validity = match token {
                "all" => Validity::All,
                "dir" => Validity::Dir,
                "file" => Validity::File,
                "symlink" => Validity::Symlink,
                other => return Err(format!("unknown filter flag '{}'", other)),
            };
        }
        Ok(validity)
    }
}

#[derive(FromArgs, Debug)]
/// Keep items naming existing entries.
pub struct PrintValid {
    #[argh(positional)]
    /// one of all, dir, file or symlink.
    pub validity: Validity,
}

impl StageOp for PrintValid {
    const FLAG: &'static str = "--print-valid";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "FLAGS";
    const SUMMARY: &'static str = "Keep items that exist as all|dir|file|symlink";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        Ok(value
            .into_iter()
            .filter(|item| self.validity.check(Path::new(item.trim())))
            .collect())
    }
}

#[derive(FromArgs, Debug)]
/// Create files or bump their modification time.
pub struct Touch {}

impl StageOp for Touch {
    const FLAG: &'static str = "--touch";
    const SUMMARY: &'static str = "Create every item as a file or update its modification time";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        for item in value.items().iter().map(|i| i.trim()).filter(|i| !i.is_empty()) {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(item)
                .map_err(|e| StageError::fs("touch", item, e))?;
            filetime::set_file_mtime(item, FileTime::now())
                .map_err(|e| StageError::fs("touch", item, e))?;
        }
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Point a symbolic link at the single item.
pub struct Symlink {
    #[argh(positional)]
    /// path of the link to create or replace.
    pub link: PathBuf,
}

impl StageOp for Symlink {
    const FLAG: &'static str = "--symlink";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "LINK";
    const SUMMARY: &'static str = "Create or replace LINK pointing at the (single) item";
    const ITEMS: ItemCount = ItemCount::Exactly(1);

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let target = Path::new(value.items()[0].trim());
        let link = self.link.as_path();

        match fs::symlink_metadata(link) {
            Ok(meta) if meta.is_dir() => {
                return Err(StageError::fs(
                    "replace",
                    link,
                    io::Error::other("refusing to replace a directory"),
                ));
            }
            Ok(meta) => {
                remove_link(link, &meta).map_err(|e| StageError::fs("replace", link, e))?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StageError::fs("inspect", link, e)),
        }

        create_symlink(target, link).map_err(|e| symlink_error(e, link, ctx.platform))?;
        debug!(link = %link.display(), target = %target.display(), "created symlink");
        Ok(value)
    }
}

fn symlink_error(e: io::Error, link: &Path, platform: &PlatformInfo) -> StageError {
    if lacks_symlink_support(&e) {
        StageError::Unsupported {
            operation: "symlink",
            platform: platform.name().to_string(),
            reason: e.to_string(),
        }
    } else {
        StageError::fs("create symlink", link, e)
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = match link.parent() {
        Some(parent) => parent.join(target),
        None => target.to_path_buf(),
    };
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not available",
    ))
}

#[cfg(windows)]
fn lacks_symlink_support(e: &io::Error) -> bool {
    const ERROR_PRIVILEGE_NOT_HELD: i32 = 1314;
    e.raw_os_error() == Some(ERROR_PRIVILEGE_NOT_HELD)
        || matches!(
            e.kind(),
            io::ErrorKind::PermissionDenied | io::ErrorKind::Unsupported
        )
}

#[cfg(not(windows))]
fn lacks_symlink_support(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::Unsupported
}

#[cfg(windows)]
fn remove_link(link: &Path, meta: &fs::Metadata) -> io::Result<()> {
    // Directory symlinks are directories to the Windows API.
    if meta.is_symlink() && link.is_dir() {
        fs::remove_dir(link)
    } else {
        fs::remove_file(link)
    }
}

#[cfg(not(windows))]
fn remove_link(link: &Path, _meta: &fs::Metadata) -> io::Result<()> {
    fs::remove_file(link)
}

#[derive(FromArgs, Debug)]
/// Create a directory and its parents.
pub struct EnsureDir {
    #[argh(positional)]
    /// directory to create.
    pub path: PathBuf,
}

impl StageOp for EnsureDir {
    const FLAG: &'static str = "--ensure-dir";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "PATH";
    const SUMMARY: &'static str = "Create directory PATH and its parents";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        fs::create_dir_all(&self.path).map_err(|e| StageError::fs("create directory", &self.path, e))?;
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Create every item as a directory.
pub struct EnsureDirs {}

impl StageOp for EnsureDirs {
    const FLAG: &'static str = "--ensure-dirs";
    const SUMMARY: &'static str = "Create every item as a directory";

    fn apply(
        self,
        value: WorkingValue,
        _ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        for item in value.items().iter().map(|i| i.trim()).filter(|i| !i.is_empty()) {
            fs::create_dir_all(item).map_err(|e| StageError::fs("create directory", item, e))?;
        }
        Ok(value)
    }
}
