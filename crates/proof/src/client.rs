//! Timestamping clients
//!
//! The proof manager never talks to a timestamping service directly. It goes
//! through a [`ProofClient`], whose default implementation shells out to the
//! OpenTimestamps command line client (`ots`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use treeseal_core::exec::{head_lines, run_bounded, ExecOutcome};
use treeseal_core::find_program;

/// Default bound on any single client invocation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extension the client appends to a stamped file
pub const PROOF_EXTENSION: &str = "ots";

/// Stderr lines kept when a client call fails
const DETAIL_LINES: usize = 5;

/// Client-level failures
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("timestamp client `{program}` is not installed")]
    Unavailable { program: String },

    #[error("timestamp client exited with {}: {detail}", describe_exit(.code))]
    Rejected { code: Option<i32>, detail: String },

    #[error("timestamp client did not finish within {after:?}")]
    TimedOut { after: Duration },

    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of asking the client to upgrade a proof
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeStatus {
    /// Proof now carries a complete attestation
    Complete,
    /// Attestation not yet available upstream
    Pending(String),
}

/// External timestamping collaborator
#[async_trait]
pub trait ProofClient: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Whether the client can be invoked at all
    fn is_available(&self) -> bool;

    /// Where the proof for `manifest` lives once stamped
    fn proof_path(&self, manifest: &Path) -> PathBuf {
        let mut name = manifest.as_os_str().to_owned();
        name.push(".");
        name.push(PROOF_EXTENSION);
        PathBuf::from(name)
    }

    /// Submit `manifest` and return the path of the created proof
    async fn stamp(&self, manifest: &Path) -> Result<PathBuf, ProofError>;

    /// Try to complete the attestation held in `proof`
    async fn upgrade(&self, proof: &Path) -> Result<UpgradeStatus, ProofError>;
}

/// Settings for the command line timestamp client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofSettings {
    /// Submit manifests for timestamping after they are written
    pub enabled: bool,
    /// Client executable, looked up on `PATH`
    pub program: String,
    /// Upper bound for one client call, in seconds
    pub timeout_secs: u64,
}

impl Default for ProofSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "ots".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl ProofSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// OpenTimestamps command line client
///
/// `ots stamp FILE` writes `FILE.ots` next to its input;
/// `ots upgrade FILE.ots` rewrites the proof in place once the
/// attestation is confirmed, and reports a pending state otherwise.
#[derive(Debug, Clone)]
pub struct OtsClient {
    program: String,
    timeout: Duration,
}

impl OtsClient {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &ProofSettings) -> Self {
        Self::new(settings.program.clone(), settings.timeout())
    }

    async fn invoke(&self, subcommand: &str, target: &Path) -> Result<String, ProofError> {
        let cwd = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = target.file_name().unwrap_or(target.as_os_str());

        debug!(program = %self.program, subcommand, target = %target.display(), "invoking timestamp client");
        let outcome = run_bounded(&self.program, [OsStr::new(subcommand), file_name], cwd, self.timeout)
            .await
            .map_err(|source| ProofError::Io {
                context: "failed waiting on timestamp client for",
                path: target.to_path_buf(),
                source,
            })?;

        match outcome {
            ExecOutcome::Completed {
                success: true,
                stdout,
                stderr,
                ..
            } => Ok(format!("{}{}", stdout, stderr)),
            ExecOutcome::Completed { code, stderr, stdout, .. } => {
                let text = if stderr.trim().is_empty() { stdout } else { stderr };
                Err(ProofError::Rejected {
                    code,
                    detail: head_lines(text.trim(), DETAIL_LINES).join("\n"),
                })
            }
            ExecOutcome::NotFound { program } => Err(ProofError::Unavailable { program }),
            ExecOutcome::TimedOut { after } => Err(ProofError::TimedOut { after }),
        }
    }
}

impl Default for OtsClient {
    fn default() -> Self {
        Self::from_settings(&ProofSettings::default())
    }
}

#[async_trait]
impl ProofClient for OtsClient {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        find_program(&self.program).is_some()
    }

    async fn stamp(&self, manifest: &Path) -> Result<PathBuf, ProofError> {
        self.invoke("stamp", manifest).await?;

        let proof = self.proof_path(manifest);
        if !proof.is_file() {
            return Err(ProofError::Rejected {
                code: Some(0),
                detail: format!("client reported success but {} was not created", proof.display()),
            });
        }
        Ok(proof)
    }

    async fn upgrade(&self, proof: &Path) -> Result<UpgradeStatus, ProofError> {
        match self.invoke("upgrade", proof).await {
            Ok(output) if is_pending(&output) => Ok(UpgradeStatus::Pending(first_line(&output))),
            Ok(_) => Ok(UpgradeStatus::Complete),
            // ots exits non-zero while calendars have not yet committed to a block
            Err(ProofError::Rejected { detail, .. }) if is_pending(&detail) => {
                Ok(UpgradeStatus::Pending(first_line(&detail)))
            }
            Err(e) => Err(e),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

fn is_pending(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    lower.contains("pending") || lower.contains("not yet")
}

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}
