//! Output sinks. Standard output only ever receives `--print` and `--help`.

use crate::command::{StageContext, StageOp};
use crate::error::StageError;
use crate::registry::{Arity, help_text};
use crate::value::WorkingValue;
use argh::FromArgs;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::debug;

fn ensure_parent_dir(path: &Path) -> Result<(), StageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| StageError::fs("create directory", parent, e)),
        _ => Ok(()),
    }
}

#[derive(FromArgs, Debug)]
/// Print the working value.
pub struct Print {}

impl StageOp for Print {
    const FLAG: &'static str = "--print";
    const SUMMARY: &'static str = "Print every item on its own line to standard output";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        ctx.stdout
            .write_all(value.render("\n").as_bytes())
            .map_err(StageError::Output)?;
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Write the working value to a file.
pub struct Out {
    #[argh(positional)]
    /// file to create or truncate.
    pub path: String,
}

impl StageOp for Out {
    const FLAG: &'static str = "--out";
    const SHORT: Option<&'static str> = Some("-o");
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "PATH";
    const SUMMARY: &'static str = "Write the items to PATH, replacing its content";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let path = Path::new(&self.path);
        ensure_parent_dir(path)?;
        let content = value.render(ctx.platform.line_separator());
        fs::write(path, &content).map_err(|e| StageError::fs("write", path, e))?;
        debug!(path = %path.display(), bytes = content.len(), "wrote file");
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Append the working value to a file.
pub struct Append {
    #[argh(positional)]
    /// file to append to; created when missing.
    pub path: String,
}

impl StageOp for Append {
    const FLAG: &'static str = "--append";
    const SHORT: Option<&'static str> = Some("-a");
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "PATH";
    const SUMMARY: &'static str = "Append the items to PATH";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        if value.is_empty() {
            return Ok(value);
        }
        let path = Path::new(&self.path);
        ensure_parent_dir(path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StageError::fs("open", path, e))?;
        file.write_all(value.render(ctx.platform.line_separator()).as_bytes())
            .map_err(|e| StageError::fs("append to", path, e))?;
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Print usage.
pub struct Help {}

impl StageOp for Help {
    const FLAG: &'static str = "--help";
    const SHORT: Option<&'static str> = Some("-h");
    const SUMMARY: &'static str = "Show this help";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        ctx.stdout
            .write_all(help_text(env!("CARGO_PKG_NAME")).as_bytes())
            .map_err(StageError::Output)?;
        Ok(value)
    }
}
