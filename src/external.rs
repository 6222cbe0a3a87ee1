//! Child processes started by `--exec` and `--foreach`.

use crate::command::ExitCode;
use crate::config::OutputMode;
use crate::env::Environment;
use crate::error::StageError;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// A program and its arguments.
///
/// What happens to the child's streams follows the [`OutputMode`]s of the
/// [`Environment`] it runs in.
#[derive(Debug)]
pub struct ExternalCommand {
    program: String,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Run to completion, routing the streams as `env` says.
    ///
    /// Returns the text of every stream in `process` mode (stdout first),
    /// minus its final line break. Streams in `print` mode go to `printed`
    /// (stdout) or straight to our own stderr.
    pub fn capture(&self, env: &Environment, printed: &mut dyn Write) -> Result<String, StageError> {
        self.run(env, env.stdout_mode(), env.stderr_mode(), printed)
    }

    /// Run with stdout captured and stderr discarded, whatever the environment says.
    pub fn quiet_output(&self, env: &Environment) -> Result<String, StageError> {
        self.run(env, &OutputMode::Process, &OutputMode::Ignore, &mut io::sink())
    }

    fn run(
        &self,
        env: &Environment,
        stdout_mode: &OutputMode,
        stderr_mode: &OutputMode,
        printed: &mut dyn Write,
    ) -> Result<String, StageError> {
        let program = resolve(&self.program, env.var("PATH").as_deref());
        debug!(program = %program.display(), args = ?self.args, ?stdout_mode, ?stderr_mode, "spawning");

        let output = Command::new(&program)
            .args(&self.args)
            .envs(env.overrides())
            .current_dir(env.working_dir())
            .stdin(Stdio::null())
            .stdout(stdio(stdout_mode, Stdio::piped())?)
            .stderr(stdio(stderr_mode, Stdio::inherit())?)
            .output()
            .map_err(|e| self.failure(spawn_reason(&e)))?;

        if *stdout_mode == OutputMode::Print {
            printed.write_all(&output.stdout).map_err(StageError::Output)?;
        }

        let code = status_code(output.status);
        if code != 0 {
            return Err(self.failure(format!("exited with status {}", code)));
        }

        let mut captured = String::new();
        if *stdout_mode == OutputMode::Process {
            captured.push_str(&String::from_utf8_lossy(&output.stdout));
        }
        if *stderr_mode == OutputMode::Process {
            if !captured.is_empty() && !captured.ends_with('\n') {
                captured.push('\n');
            }
            captured.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        Ok(trim_final_newline(captured))
    }

    fn failure(&self, reason: String) -> StageError {
        let command = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        StageError::Command { command, reason }
    }
}

/// Child end of one stream. `print` is what `print` mode means for it.
fn stdio(mode: &OutputMode, print: Stdio) -> Result<Stdio, StageError> {
    Ok(match mode {
        OutputMode::Process => Stdio::piped(),
        OutputMode::Print => print,
        OutputMode::Ignore => Stdio::null(),
        OutputMode::Write(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| StageError::fs("create directory", parent, e))?;
            }
            let file = File::create(path).map_err(|e| StageError::fs("write", path, e))?;
            Stdio::from(file)
        }
    })
}

/// Locate `program` for spawning.
///
/// A name with a directory part is used as given. A bare name is looked up in
/// each `path_var` entry; when nothing matches the bare name is returned and
/// the OS does the final lookup, appending `.exe` on Windows.
pub fn resolve(program: &str, path_var: Option<&OsStr>) -> PathBuf {
    let name = Path::new(program);
    if name.has_root() || name.components().count() != 1 {
        return name.to_path_buf();
    }
    path_var
        .into_iter()
        .flat_map(|paths| std::env::split_paths(paths))
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| name.to_path_buf())
}

fn spawn_reason(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::NotFound => "command not found".to_string(),
        _ => format!("failed to start: {}", e),
    }
}

/// Exit status as a shell would report it; signals map to 128 + N.
fn status_code(status: ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn trim_final_newline(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}
