//! Best-effort timestamp proofs for written manifests
//!
//! Every call returns a [`ProofOutcome`]; nothing here aborts a pipeline.
//! An absent client is reported as [`ProofOutcome::Unavailable`], separate
//! from a client that ran and failed.

use crate::client::{OtsClient, ProofClient, ProofError, ProofSettings, UpgradeStatus};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// What happened to a submit or upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofOutcome {
    /// Manifest submitted, proof written
    Stamped { proof: PathBuf },
    /// Proof now carries a complete attestation
    Upgraded { proof: PathBuf },
    /// Proof exists but the attestation is not confirmed yet
    Pending { proof: PathBuf, detail: String },
    /// Client disabled or not installed; nothing was attempted
    Unavailable { reason: String },
    /// Client ran and reported a failure
    Failed { detail: String },
    /// Client exceeded its time limit and was killed
    TimedOut { after: Duration },
}

impl ProofOutcome {
    /// Short label for status lines
    pub fn label(&self) -> &'static str {
        match self {
            ProofOutcome::Stamped { .. } => "stamped",
            ProofOutcome::Upgraded { .. } => "upgraded",
            ProofOutcome::Pending { .. } => "pending",
            ProofOutcome::Unavailable { .. } => "skipped",
            ProofOutcome::Failed { .. } => "failed",
            ProofOutcome::TimedOut { .. } => "timed out",
        }
    }

    /// True when a proof file exists for the request
    pub fn has_proof(&self) -> bool {
        matches!(
            self,
            ProofOutcome::Stamped { .. } | ProofOutcome::Upgraded { .. } | ProofOutcome::Pending { .. }
        )
    }
}

impl fmt::Display for ProofOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofOutcome::Stamped { proof } => write!(f, "stamped, proof at {}", proof.display()),
            ProofOutcome::Upgraded { proof } => write!(f, "upgraded {}", proof.display()),
            ProofOutcome::Pending { proof, detail } if detail.is_empty() => {
                write!(f, "pending for {}", proof.display())
            }
            ProofOutcome::Pending { proof, detail } => {
                write!(f, "pending for {} ({})", proof.display(), detail)
            }
            ProofOutcome::Unavailable { reason } => write!(f, "skipped: {}", reason),
            ProofOutcome::Failed { detail } => write!(f, "failed: {}", detail),
            ProofOutcome::TimedOut { after } => write!(f, "timed out after {}s", after.as_secs()),
        }
    }
}

/// Submits manifests to an external timestamping client
pub struct TimestampProofManager {
    client: Option<Box<dyn ProofClient>>,
}

impl TimestampProofManager {
    pub fn new(client: Box<dyn ProofClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Manager that reports every request as unavailable
    pub fn disabled() -> Self {
        Self { client: None }
    }

    /// Manager for the configured command line client
    pub fn from_settings(settings: &ProofSettings) -> Self {
        if settings.enabled {
            Self::new(Box::new(OtsClient::from_settings(settings)))
        } else {
            Self::disabled()
        }
    }

    /// Ready client, or the reason there is none
    fn ready_client(&self) -> Result<&dyn ProofClient, String> {
        match &self.client {
            None => Err("timestamping disabled".to_string()),
            Some(client) if !client.is_available() => {
                Err(format!("timestamp client `{}` not found", client.name()))
            }
            Some(client) => Ok(client.as_ref()),
        }
    }

    /// Submit a written manifest for timestamping
    ///
    /// Repeated submissions are passed through; the service owns deduplication.
    pub async fn submit(&self, manifest: &Path) -> ProofOutcome {
        let client = match self.ready_client() {
            Ok(client) => client,
            Err(reason) => {
                info!(manifest = %manifest.display(), %reason, "timestamp submission skipped");
                return ProofOutcome::Unavailable { reason };
            }
        };

        if !manifest.is_file() {
            let outcome = ProofOutcome::Failed {
                detail: format!("manifest {} does not exist", manifest.display()),
            };
            warn!(%outcome, "timestamp submission failed");
            return outcome;
        }

        let outcome = match client.stamp(manifest).await {
            Ok(proof) => ProofOutcome::Stamped { proof },
            Err(e) => from_error(e),
        };
        log_outcome("submit", manifest, &outcome);
        outcome
    }

    /// Try to complete a previously created proof
    pub async fn upgrade(&self, proof: &Path) -> ProofOutcome {
        let client = match self.ready_client() {
            Ok(client) => client,
            Err(reason) => {
                info!(proof = %proof.display(), %reason, "timestamp upgrade skipped");
                return ProofOutcome::Unavailable { reason };
            }
        };

        if !proof.is_file() {
            let outcome = ProofOutcome::Failed {
                detail: format!("proof {} does not exist", proof.display()),
            };
            warn!(%outcome, "timestamp upgrade failed");
            return outcome;
        }

        let outcome = match client.upgrade(proof).await {
            Ok(UpgradeStatus::Complete) => ProofOutcome::Upgraded {
                proof: proof.to_path_buf(),
            },
            Ok(UpgradeStatus::Pending(detail)) => ProofOutcome::Pending {
                proof: proof.to_path_buf(),
                detail,
            },
            Err(e) => from_error(e),
        };
        log_outcome("upgrade", proof, &outcome);
        outcome
    }
}

/// Delete `proof` unless `manifest` on disk already holds exactly `text`
///
/// Call before rewriting a manifest. A proof attests the bytes it stamped,
/// so it must not outlive them. Returns whether a proof was removed.
pub fn retire_stale_proof(manifest: &Path, proof: &Path, text: &[u8]) -> Result<bool, ProofError> {
    if std::fs::symlink_metadata(proof).is_err() {
        return Ok(false);
    }

    match std::fs::read(manifest) {
        Ok(current) if current == text => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ProofError::Io {
                context: "failed to read manifest",
                path: manifest.to_path_buf(),
                source,
            })
        }
    }

    std::fs::remove_file(proof).map_err(|source| ProofError::Io {
        context: "failed to remove stale proof",
        path: proof.to_path_buf(),
        source,
    })?;
    info!(proof = %proof.display(), "removed proof of a previous manifest");
    Ok(true)
}

fn from_error(error: ProofError) -> ProofOutcome {
    match error {
        ProofError::Unavailable { program } => ProofOutcome::Unavailable {
            reason: format!("timestamp client `{}` not found", program),
        },
        ProofError::TimedOut { after } => ProofOutcome::TimedOut { after },
        other => ProofOutcome::Failed {
            detail: other.to_string(),
        },
    }
}

fn log_outcome(operation: &str, target: &Path, outcome: &ProofOutcome) {
    match outcome {
        ProofOutcome::Failed { .. } | ProofOutcome::TimedOut { .. } => {
            warn!(operation, target = %target.display(), %outcome, "timestamp request did not complete")
        }
        _ => info!(operation, target = %target.display(), %outcome, "timestamp request finished"),
    }
}
