//! Treeseal digest - read-only state report for a tree
//!
//! This crate provides:
//! - Size totals, top-level and largest-file rankings, bloat checkpoints (`scan`)
//! - Concurrent, time-bounded external checks (`checks`)
//! - Markdown rendering and atomic output (`report`)
//!
//! Nothing here mutates the tree or depends on a previous report.

pub mod checks;
pub mod report;
pub mod scan;

pub use checks::{run_checks, CheckResult, CheckSpec, CheckStatus};
pub use report::{format_size, DigestReport};
pub use scan::{scan, BloatCheckpoint, SizeEntry, TreeStats};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use treeseal_core::{Error, Result};

/// Reporter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Report location, relative to the root unless absolute
    pub output: PathBuf,
    /// Number of largest files listed
    pub top: usize,
    /// Heavyweight paths reported as present or absent
    pub checkpoints: Vec<String>,
    /// Default per-check timeout, in seconds
    pub check_timeout_secs: u64,
    /// Stderr lines kept per check
    pub stderr_lines: usize,
    /// External commands whose status is reported
    pub checks: Vec<CheckSpec>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("STATE_DIGEST.md"),
            top: 10,
            checkpoints: [".git", ".venv", "venv", "node_modules", "target", "dist", "build", "__pycache__"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            check_timeout_secs: 120,
            stderr_lines: 20,
            checks: Vec::new(),
        }
    }
}

impl DigestConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

/// Scan `root` and run the configured checks concurrently
///
/// Only an invalid root fails; check problems are recorded per check.
pub async fn generate(root: &Path, config: &DigestConfig) -> Result<DigestReport> {
    if !root.is_dir() {
        return Err(Error::Resolution {
            root: root.to_path_buf(),
        });
    }

    let scan_root = root.to_path_buf();
    let top = config.top;
    let checkpoints = config.checkpoints.clone();
    let scan_task = tokio::task::spawn_blocking(move || scan(&scan_root, top, &checkpoints));

    let (stats, checks) = tokio::join!(
        scan_task,
        run_checks(root, &config.checks, config.check_timeout(), config.stderr_lines)
    );
    let stats = stats.map_err(|e| {
        Error::io(
            "tree scan task failed for",
            root,
            std::io::Error::new(std::io::ErrorKind::Other, e),
        )
    })??;

    info!(
        files = stats.file_count,
        checks = checks.len(),
        failing = checks.iter().filter(|c| !c.status.is_passed()).count(),
        "state digest generated"
    );

    Ok(DigestReport {
        root: root.to_path_buf(),
        generated_at: chrono::Local::now(),
        stats,
        checks,
    })
}
