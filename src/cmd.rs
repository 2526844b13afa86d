use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::process::{Command, ExitStatus, Output};

fn echo<S: AsRef<OsStr>>(program: &str, args: &[S]) {
    let args_str: Vec<_> = args.iter().map(|s| s.as_ref().to_string_lossy()).collect();
    tracing::debug!("> {} {}", program, args_str.join(" "));
}

/// Run a command to completion, treating a non-zero exit as an error.
///
/// stderr is captured and folded into the error message so callers can
/// surface the tool's own diagnostic.
pub fn run<I, S>(program: &str, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().collect();
    echo(program, &args);

    let output = Command::new(program)
        .args(&args)
        .output()
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        anyhow::bail!("{}", failure_message(program, &output));
    }

    Ok(())
}

/// Run a command and return its trimmed stdout. Non-zero exit is an error.
pub fn run_output<I, S>(program: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().collect();
    echo(program, &args);

    let output = Command::new(program)
        .args(&args)
        .output()
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        anyhow::bail!("{}", failure_message(program, &output));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a command for its exit status alone. Only a spawn failure is an
/// error; callers interpret the status themselves (query-style tools encode
/// their answer in the exit code).
pub fn run_status<I, S>(program: &str, args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().collect();
    echo(program, &args);

    Command::new(program)
        .args(&args)
        .output()
        .map(|output| output.status)
        .with_context(|| format!("Failed to run {}", program))
}

fn failure_message(program: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();

    if stderr.is_empty() {
        format!("{} failed with exit code {:?}", program, output.status.code())
    } else {
        format!(
            "{} failed with exit code {:?}: {}",
            program,
            output.status.code(),
            stderr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_output_captures_stdout() {
        let out = run_output("sh", ["-c", "printf hello"]).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn run_reports_exit_code_and_stderr() {
        let err = run("sh", ["-c", "echo broken >&2; exit 3"]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code Some(3)"), "{}", msg);
        assert!(msg.contains("broken"), "{}", msg);
    }

    #[test]
    fn run_status_passes_through_failure() {
        let status = run_status("sh", ["-c", "exit 5"]).unwrap();
        assert_eq!(status.code(), Some(5));
    }
}
