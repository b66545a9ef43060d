//! External check commands
//!
//! Checks run concurrently and independently. Each one ends with a
//! [`CheckStatus`]; a missing or hanging command never stops the others.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use treeseal_core::exec::{head_lines, run_bounded, ExecOutcome};

/// A configured check: `program args..` run from the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Overrides the reporter-wide timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl CheckSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_secs: None,
        }
    }

    /// Command line as shown in reports
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Passed,
    /// Exit code, `None` when killed by a signal
    Failed { code: Option<i32> },
    /// Command not found
    Unavailable,
    TimedOut { after: Duration },
}

impl CheckStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, CheckStatus::Passed)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Passed => write!(f, "pass"),
            CheckStatus::Failed { code: Some(code) } => write!(f, "fail (exit {})", code),
            CheckStatus::Failed { code: None } => write!(f, "fail (signal)"),
            CheckStatus::Unavailable => write!(f, "unavailable"),
            CheckStatus::TimedOut { after } => write!(f, "timed out ({}s)", after.as_secs()),
        }
    }
}

/// Status record for one check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub command: String,
    pub status: CheckStatus,
    /// Leading stderr lines, at most the configured count
    pub stderr_head: Vec<String>,
    pub elapsed: Duration,
}

/// Run every check concurrently, returning results in configuration order
pub async fn run_checks(
    root: &Path,
    checks: &[CheckSpec],
    default_timeout: Duration,
    stderr_lines: usize,
) -> Vec<CheckResult> {
    join_all(
        checks
            .iter()
            .map(|check| run_check(root, check, default_timeout, stderr_lines)),
    )
    .await
}

async fn run_check(
    root: &Path,
    check: &CheckSpec,
    default_timeout: Duration,
    stderr_lines: usize,
) -> CheckResult {
    let timeout = check
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(default_timeout);
    let started = Instant::now();

    let (status, stderr_head) = match run_bounded(&check.program, &check.args, root, timeout).await {
        Ok(ExecOutcome::Completed { success, code, stderr, .. }) => {
            let status = if success {
                CheckStatus::Passed
            } else {
                CheckStatus::Failed { code }
            };
            (status, head_lines(&stderr, stderr_lines))
        }
        Ok(ExecOutcome::NotFound { program }) => (
            CheckStatus::Unavailable,
            vec![format!("command not found: {}", program)],
        ),
        Ok(ExecOutcome::TimedOut { after }) => (CheckStatus::TimedOut { after }, Vec::new()),
        Err(e) => (CheckStatus::Failed { code: None }, vec![e.to_string()]),
    };

    if status.is_passed() {
        debug!(check = %check.name, "check passed");
    } else {
        warn!(check = %check.name, %status, "check did not pass");
    }

    CheckResult {
        name: check.name.clone(),
        command: check.command_line(),
        status,
        stderr_head,
        elapsed: started.elapsed(),
    }
}
