use anyhow::Context;
use platform_utils::logging::init_tracing;
use platform_utils::run_cli;
use std::io::Write;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    let stdout = std::io::stdout();
    let stderr = std::io::stderr();
    let mut stdout = stdout.lock();
    let mut stderr = stderr.lock();

    let code = run_cli(&args, &mut stdout, &mut stderr);
    stdout.flush().context("failed to flush standard output")?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
