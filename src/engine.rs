//! Runs a [`Pipeline`], threading one [`WorkingValue`] through its stages.

use crate::command::{ExitCode, StageContext};
use crate::config::ErrorPolicy;
use crate::env::Environment;
use crate::error::StageError;
use crate::pipeline::{Pipeline, PipelineStep};
use crate::platform::PlatformInfo;
use crate::value::WorkingValue;
use std::io::Write;
use tracing::{debug, warn};

/// Name used as the prefix of diagnostics.
pub const PROGRAM: &str = env!("CARGO_PKG_NAME");

/// Write the one-line diagnostic for an unrecovered failure.
///
/// `invocation` names the offending stage when there is one.
pub fn report(stderr: &mut dyn Write, invocation: Option<&str>, err: &StageError) {
    let line = match invocation {
        Some(invocation) => format!(
            "{}: {} error in `{}`: {}",
            PROGRAM,
            err.kind(),
            invocation,
            err
        ),
        None => format!("{}: {} error: {}", PROGRAM, err.kind(), err),
    };
    writeln!(stderr, "{}", line).ok();
}

/// Executes pipelines against one platform and child-process environment.
pub struct Engine {
    platform: PlatformInfo,
    env: Environment,
}

impl Engine {
    pub fn new(platform: PlatformInfo, env: Environment) -> Self {
        Self { platform, env }
    }

    /// Run every stage in order, starting from an empty value.
    ///
    /// With `stop_on_error` a failing stage aborts the run and its exit code is
    /// returned; otherwise the value is reset to empty and the next stage runs.
    pub fn run(
        &mut self,
        pipeline: Pipeline,
        policy: ErrorPolicy,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> ExitCode {
        let mut value = WorkingValue::new();

        for PipelineStep { stage, invocation } in pipeline {
            let expected = stage.expected_items();
            let result = if expected.accepts(value.len()) {
                let mut ctx = StageContext {
                    platform: &self.platform,
                    env: &mut self.env,
                    stdout: &mut *stdout,
                };
                stage.apply(value, &mut ctx)
            } else {
                Err(StageError::ItemCount {
                    expected,
                    actual: value.len(),
                })
            };

            value = match result {
                Ok(next) => {
                    debug!(stage = %invocation, items = next.len(), "stage done");
                    next
                }
                Err(err) if policy.stop_on_error => {
                    report(stderr, Some(&invocation), &err);
                    return err.exit_code();
                }
                Err(err) => {
                    warn!(stage = %invocation, kind = %err.kind(), error = %err, "stage failed, continuing with empty value");
                    WorkingValue::new()
                }
            };
        }

        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::build;
    use crate::platform::{EnvFlavor, OsFamily};

    struct Outcome {
        code: ExitCode,
        stdout: String,
        stderr: String,
    }

    fn run_on(platform: PlatformInfo, list: &[&str]) -> Outcome {
        let args: Vec<String> = list.iter().map(|s| s.to_string()).collect();
        let invocation = build(&args).unwrap();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = Engine::new(platform, Environment::new()).run(
            invocation.pipeline,
            invocation.policy,
            &mut stdout,
            &mut stderr,
        );
        Outcome {
            code,
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
        }
    }

    fn run(list: &[&str]) -> Outcome {
        run_on(PlatformInfo::new(OsFamily::Linux, EnvFlavor::Native), list)
    }

    #[test]
    fn test_value_threads_through_stages() {
        let out = run(&["--in", "Hello", "--in", "World", "--upper", "--print"]);
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout, "HELLO\nWORLD\n");
        assert_eq!(out.stderr, "");
    }

    #[test]
    fn test_order_changes_result() {
        let out = run(&["--in", "a", "--print", "--upper", "--print"]);
        assert_eq!(out.stdout, "a\nA\n");
        let out = run(&["--in", "a", "--upper", "--in", "b", "--print"]);
        assert_eq!(out.stdout, "A\nb\n");
        let out = run(&["--in", "b", "--in", "a", "--first", "--print"]);
        assert_eq!(out.stdout, "b\n");
        let out = run(&["--in", "a", "--in", "b", "--first", "--print"]);
        assert_eq!(out.stdout, "a\n");
    }

    #[test]
    fn test_failure_stops_with_diagnostic() {
        let out = run(&["--in", "x", "--print", "--filter", "(", "--print"]);
        assert_eq!(out.code, 4);
        assert_eq!(out.stdout, "x\n");
        assert!(
            out.stderr
                .starts_with("platform_utils: pattern error in `--filter (`: invalid pattern '('"),
            "{}",
            out.stderr
        );
        assert_eq!(out.stderr.lines().count(), 1);
    }

    #[test]
    fn test_recovered_failure_empties_value() {
        let out = run(&[
            "--stoponerror",
            "false",
            "--in",
            "x",
            "--filter",
            "(",
            "--print",
            "--in",
            "after",
            "--print",
        ]);
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout, "after\n");
        assert_eq!(out.stderr, "");
    }

    #[test]
    fn test_item_count_is_checked_before_apply() {
        let out = run(&["--in", "a", "--in", "b", "--symlink", "never-created"]);
        assert_eq!(out.code, 5);
        assert!(out.stderr.contains("expected exactly 1 item(s), got 2"), "{}", out.stderr);
        assert!(!std::path::Path::new("never-created").exists());
    }

    #[test]
    fn test_platform_comes_from_context() {
        let windows = PlatformInfo::new(OsFamily::Windows, EnvFlavor::Msys2);
        let out = run_on(windows, &["--platform", "--platform-exec", "--in", r"C:\x", "--env-path", "--print"]);
        assert_eq!(out.stdout, "Windows\n.exe\n/c/x\n");
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_format_and_closed_stderr() {
        let err = StageError::Policy("bad input".to_string());
        let mut stderr = Vec::new();
        report(&mut stderr, Some("--sort int"), &err);
        report(&mut stderr, None, &err);
        assert_eq!(
            String::from_utf8(stderr).unwrap(),
            "platform_utils: policy error in `--sort int`: bad input\nplatform_utils: policy error: bad input\n"
        );

        report(&mut ClosedPipe, Some("--print"), &err);
    }

    #[test]
    fn test_empty_pipeline_succeeds() {
        let out = run(&["--stoponerror", "true"]);
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout, "");
    }
}
