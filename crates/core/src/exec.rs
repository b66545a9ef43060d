//! Bounded invocation of external tools
//!
//! Used for the optional collaborators: the timestamping client and the
//! digest reporter's check commands. A missing program is a distinct outcome,
//! not an error, so callers can tell "did not run" from "ran and failed".

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// How an external invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Process ran to completion
    Completed {
        code: Option<i32>,
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// Program is not installed or not on `PATH`
    NotFound { program: String },
    /// Process was killed after exceeding the time limit
    TimedOut { after: Duration },
}

/// Locate `program` on `PATH`, or check it directly when it contains a separator
pub fn find_program(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| candidates(&dir, program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program), dir.join(format!("{}.exe", program))]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run `program args..` in `cwd`, killing it after `timeout`
///
/// Only failures to wait on an already spawned process surface as `Err`.
pub async fn run_bounded<I, S>(
    program: &str,
    args: I,
    cwd: &Path,
    timeout: Duration,
) -> std::io::Result<ExecOutcome>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let Some(resolved) = find_program(program) else {
        return Ok(ExecOutcome::NotFound {
            program: program.to_string(),
        });
    };

    let child = Command::new(&resolved)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ExecOutcome::NotFound {
                program: program.to_string(),
            })
        }
        Err(e) => return Err(e),
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => {
            let output = output?;
            debug!(program, code = ?output.status.code(), "external command finished");
            Ok(ExecOutcome::Completed {
                code: output.status.code(),
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
        // Dropping the wait future drops the child, and kill_on_drop reaps it
        Err(_) => Ok(ExecOutcome::TimedOut { after: timeout }),
    }
}

/// First `n` lines of `text`, for truncated diagnostics
pub fn head_lines(text: &str, n: usize) -> Vec<String> {
    text.lines().take(n).map(str::to_string).collect()
}
