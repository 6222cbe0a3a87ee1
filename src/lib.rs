//! Portable replacements for shell primitives, chained as one pipeline.
//!
//! Build scripts call the `platform_utils` binary with an ordered list of
//! flags. Each flag becomes a stage; a single in-memory [`WorkingValue`] is
//! threaded through the stages left to right, the way data flows through a
//! shell pipe, so the same script behaves identically under POSIX shells and
//! native Windows shells.
//!
//! ```text
//! platform_utils --in "tools/gcc-*" --glob --sort desc --first --print
//! ```
//!
//! The entry point for embedding is [`run_cli`]. The building blocks are public
//! too: [`parser::build`] turns arguments into a [`Pipeline`], and
//! [`Engine`] runs it against a [`PlatformInfo`].

pub mod command;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
mod external;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod platform;
pub mod registry;
pub mod stages;
pub mod value;

pub use command::{ExitCode, StageContext, StageOp};
pub use config::ErrorPolicy;
pub use engine::Engine;
pub use error::{ErrorKind, StageError};
pub use pipeline::Pipeline;
pub use platform::PlatformInfo;
pub use stages::Stage;
pub use value::WorkingValue;

use std::io::Write;
use tracing::debug;

/// Parse `args` (program name excluded), detect the platform and run.
///
/// Results go to `stdout`, diagnostics to `stderr`. Errors in the command line
/// itself are reported before anything runs, whatever the error policy says.
pub fn run_cli(args: &[String], stdout: &mut dyn Write, stderr: &mut dyn Write) -> ExitCode {
    let invocation = match parser::build(args) {
        Ok(invocation) => invocation,
        Err(e) => {
            engine::report(stderr, None, &e);
            return e.exit_code();
        }
    };

    let platform = match PlatformInfo::detect() {
        Ok(platform) => platform,
        Err(e) => {
            engine::report(stderr, None, &e);
            return e.exit_code();
        }
    };
    debug!(
        platform = platform.name(),
        flavor = ?platform.flavor(),
        stages = invocation.pipeline.len(),
        "starting pipeline"
    );

    Engine::new(platform, env::Environment::new()).run(
        invocation.pipeline,
        invocation.policy,
        stdout,
        stderr,
    )
}
