//! Stages that run child processes.

use crate::command::{StageContext, StageOp};
use crate::config::OutputMode;
use crate::error::StageError;
use crate::external::ExternalCommand;
use crate::registry::Arity;
use crate::value::WorkingValue;
use argh::FromArgs;
use std::str::FromStr;
use tracing::debug;

#[derive(FromArgs, Debug)]
/// Run a command and append its output.
pub struct Exec {
    #[argh(positional)]
    /// program to run, resolved through PATH.
    pub program: String,

    #[argh(positional)]
    /// arguments passed verbatim.
    pub args: Vec<String>,
}

impl StageOp for Exec {
    const FLAG: &'static str = "--exec";
    const SHORT: Option<&'static str> = Some("-e");
    const ARITY: Arity = Arity::Until(";");
    const PARAMS: &'static str = "CMD ARGS... ;";
    const SUMMARY: &'static str = "Run CMD and append each line of its output";

    fn apply(
        self,
        mut value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let output = ExternalCommand::new(self.program, self.args).capture(ctx.env, ctx.stdout)?;
        for line in output.lines() {
            value.push(line);
        }
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Run a command once per item.
pub struct ForEach {
    #[argh(positional)]
    /// program to run, resolved through PATH.
    pub program: String,

    #[argh(positional)]
    /// arguments passed before the item.
    pub args: Vec<String>,
}

impl StageOp for ForEach {
    const FLAG: &'static str = "--foreach";
    const ARITY: Arity = Arity::Until(";");
    const PARAMS: &'static str = "CMD ARGS... ;";
    const SUMMARY: &'static str = "Run CMD ARGS... ITEM for every item, collecting the outputs";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        let mut result = WorkingValue::new();
        for item in value {
            let mut args = self.args.clone();
            args.push(item);
            let output = ExternalCommand::new(self.program.as_str(), args).capture(ctx.env, ctx.stdout)?;
            for line in output.lines() {
                result.push(line);
            }
        }
        Ok(result)
    }
}

/// A `KEY=VALUE` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub key: String,
    pub value: String,
}

impl FromStr for Assignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok(Self {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Set a variable for subsequent child processes.
pub struct Env {
    #[argh(positional)]
    /// variable assignment in KEY=VALUE form.
    pub assignment: Assignment,
}

impl StageOp for Env {
    const FLAG: &'static str = "--env";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "KEY=VALUE";
    const SUMMARY: &'static str = "Set an environment variable for later --exec/--foreach";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        debug!(key = %self.assignment.key, "setting child environment variable");
        ctx.env.set_var(self.assignment.key, self.assignment.value);
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Route the standard output of later child processes.
pub struct ChildStdout {
    #[argh(positional)]
    /// process, print, ignore or a file path.
    pub mode: OutputMode,
}

impl StageOp for ChildStdout {
    const FLAG: &'static str = "--stdout";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "MODE|PATH";
    const SUMMARY: &'static str = "Send child stdout to the value (process), print, ignore or PATH";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        ctx.env.set_stdout_mode(self.mode);
        Ok(value)
    }
}

#[derive(FromArgs, Debug)]
/// Route the standard error of later child processes.
pub struct ChildStderr {
    #[argh(positional)]
    /// process, print, ignore or a file path.
    pub mode: OutputMode,
}

impl StageOp for ChildStderr {
    const FLAG: &'static str = "--stderr";
    const ARITY: Arity = Arity::Exactly(1);
    const PARAMS: &'static str = "MODE|PATH";
    const SUMMARY: &'static str = "Send child stderr to the value (process), print, ignore or PATH";

    fn apply(
        self,
        value: WorkingValue,
        ctx: &mut StageContext<'_>,
    ) -> Result<WorkingValue, StageError> {
        ctx.env.set_stderr_mode(self.mode);
        Ok(value)
    }
}
