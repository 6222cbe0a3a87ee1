use crate::env::Environment;
use crate::error::StageError;
use crate::platform::PlatformInfo;
use crate::registry::Arity;
use crate::stages::Stage;
use crate::value::{ItemCount, WorkingValue};
use argh::{EarlyExit, FromArgs};
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Everything a stage may consult besides the working value.
pub struct StageContext<'a> {
    /// Detected (or, in tests, fabricated) platform conventions.
    pub platform: &'a PlatformInfo,
    /// Environment for child processes; `--env` mutates it.
    pub env: &'a mut Environment,
    /// Standard output. Only printing stages write here.
    pub stdout: &'a mut dyn Write,
}

/// One pipeline operation, bound to the flag that selects it.
///
/// Parameters are parsed with [`argh`] (`FromArgs`) from the values that follow
/// the flag on the command line. Executing consumes the stage: a pipeline runs once.
pub trait StageOp: FromArgs + Into<Stage> {
    /// Long flag, e.g. `--lower`.
    const FLAG: &'static str;
    /// Optional short alias, e.g. `-l`.
    const SHORT: Option<&'static str> = None;
    /// How many command-line values the flag consumes.
    const ARITY: Arity = Arity::None;
    /// Parameter names shown in the usage text.
    const PARAMS: &'static str = "";
    /// One-line description shown in the usage text.
    const SUMMARY: &'static str;
    /// Item counts the stage accepts; checked by the engine before `apply`.
    const ITEMS: ItemCount = ItemCount::Any;

    /// Transform the working value, possibly with a side effect.
    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError>;
}

/// Parse the values following `flag` into the stage `T`.
///
/// Values are passed after `--` so ones that look like flags (`-3`, `--x`)
/// reach the stage verbatim.
pub(crate) fn parse_stage<T: StageOp>(flag: &str, params: &[String]) -> Result<Stage, StageError> {
    let mut args: Vec<&str> = Vec::with_capacity(params.len() + 1);
    if !params.is_empty() {
        args.push("--");
    }
    args.extend(params.iter().map(String::as_str));

    match T::from_args(&[flag], &args) {
        Ok(op) => Ok(op.into()),
        Err(EarlyExit { output, .. }) => Err(StageError::InvalidValue {
            flag: flag.to_string(),
            reason: output
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or("malformed parameters")
                .to_string(),
        }),
    }
}
