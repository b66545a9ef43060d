//! Markdown rendering of a state digest

use crate::checks::{CheckResult, CheckStatus};
use crate::scan::TreeStats;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use treeseal_core::store::atomic_write;
use treeseal_core::Result;

/// One generated digest. Regenerated on every run and never read back.
#[derive(Debug, Clone)]
pub struct DigestReport {
    pub root: PathBuf,
    pub generated_at: DateTime<Local>,
    pub stats: TreeStats,
    pub checks: Vec<CheckResult>,
}

impl DigestReport {
    /// Checks that did not pass
    pub fn failing_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.status.is_passed())
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let stats = &self.stats;

        // Writing into a String cannot fail
        let _ = writeln!(out, "# State digest");
        let _ = writeln!(out);
        let _ = writeln!(out, "- Root: `{}`", self.root.display());
        let _ = writeln!(out, "- Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S %:z"));
        let _ = writeln!(
            out,
            "- Total: {} in {} files",
            format_size(stats.total_bytes),
            stats.file_count
        );
        if stats.skipped > 0 {
            let _ = writeln!(out, "- Skipped: {} unreadable entries", stats.skipped);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Top-level sizes");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Path | Size | Share |");
        let _ = writeln!(out, "|---|---:|---:|");
        for entry in &stats.top_level {
            let _ = writeln!(
                out,
                "| `{}` | {} | {:.1}% |",
                entry.path,
                format_size(entry.bytes),
                percent(entry.bytes, stats.total_bytes)
            );
        }

        if !stats.checkpoints.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Bloat checkpoints");
            let _ = writeln!(out);
            let _ = writeln!(out, "| Path | Status | Size |");
            let _ = writeln!(out, "|---|---|---:|");
            for checkpoint in &stats.checkpoints {
                match checkpoint.bytes {
                    Some(bytes) => {
                        let _ = writeln!(out, "| `{}` | present | {} |", checkpoint.path, format_size(bytes));
                    }
                    None => {
                        let _ = writeln!(out, "| `{}` | absent | - |", checkpoint.path);
                    }
                }
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Largest files");
        let _ = writeln!(out);
        let _ = writeln!(out, "| File | Size |");
        let _ = writeln!(out, "|---|---:|");
        for entry in &stats.largest_files {
            let _ = writeln!(out, "| `{}` | {} |", entry.path, format_size(entry.bytes));
        }

        if !self.checks.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Checks");
            let _ = writeln!(out);
            let _ = writeln!(out, "| Check | Command | Status | Time |");
            let _ = writeln!(out, "|---|---|---|---:|");
            for check in &self.checks {
                let _ = writeln!(
                    out,
                    "| {} | `{}` | {} | {:.1}s |",
                    check.name,
                    check.command,
                    status_cell(&check.status),
                    check.elapsed.as_secs_f64()
                );
            }

            for check in self.checks.iter().filter(|c| !c.stderr_head.is_empty()) {
                let _ = writeln!(out);
                let _ = writeln!(out, "### {} stderr", check.name);
                let _ = writeln!(out);
                let _ = writeln!(out, "```");
                for line in &check.stderr_head {
                    let _ = writeln!(out, "{}", line);
                }
                let _ = writeln!(out, "```");
            }
        }

        out
    }

    /// Render and write atomically to `path`
    pub fn write(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.to_markdown().as_bytes())
    }
}

fn status_cell(status: &CheckStatus) -> String {
    match status {
        CheckStatus::Passed => "PASS".to_string(),
        other => format!("**{}**", other.to_string().to_uppercase()),
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Human-readable byte count with binary units
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{BloatCheckpoint, SizeEntry};
    use std::time::Duration;

    fn sample() -> DigestReport {
        DigestReport {
            root: PathBuf::from("/work/project"),
            generated_at: Local::now(),
            stats: TreeStats {
                total_bytes: 2048,
                file_count: 3,
                top_level: vec![SizeEntry { path: "src".into(), bytes: 2048 }],
                largest_files: vec![SizeEntry { path: "src/main.rs".into(), bytes: 1536 }],
                checkpoints: vec![
                    BloatCheckpoint { path: "target".into(), bytes: Some(0) },
                    BloatCheckpoint { path: ".venv".into(), bytes: None },
                ],
                skipped: 0,
            },
            checks: vec![
                CheckResult {
                    name: "tests".into(),
                    command: "cargo test".into(),
                    status: CheckStatus::Failed { code: Some(101) },
                    stderr_head: vec!["test result: FAILED".into()],
                    elapsed: Duration::from_millis(1500),
                },
                CheckResult {
                    name: "lint".into(),
                    command: "ruff check".into(),
                    status: CheckStatus::Unavailable,
                    stderr_head: Vec::new(),
                    elapsed: Duration::ZERO,
                },
            ],
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn test_markdown_sections() {
        let report = sample();
        let md = report.to_markdown();

        assert!(md.starts_with("# State digest\n"));
        assert!(md.contains("- Total: 2.00 KB in 3 files"));
        assert!(md.contains("| `src` | 2.00 KB | 100.0% |"));
        assert!(md.contains("| `target` | present | 0 B |"));
        assert!(md.contains("| `.venv` | absent | - |"));
        assert!(md.contains("| `src/main.rs` | 1.50 KB |"));
        assert!(md.contains("| tests | `cargo test` | **FAIL (EXIT 101)** | 1.5s |"));
        assert!(md.contains("| lint | `ruff check` | **UNAVAILABLE** | 0.0s |"));
        assert!(md.contains("### tests stderr\n\n```\ntest result: FAILED\n```"));
        assert_eq!(report.failing_checks().count(), 2);
    }

    #[test]
    fn test_write_is_atomic_overwrite() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("STATE_DIGEST.md");
        std::fs::write(&target, "stale").unwrap();

        sample().write(&target)?;

        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("# State digest"));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
        Ok(())
    }
}
