//! Size breakdown of a tree
//!
//! The scan is observational: unreadable entries are skipped with a warning
//! instead of failing the report.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use treeseal_core::{Error, Result};
use walkdir::WalkDir;

/// Label for regular files directly under the root
pub const ROOT_FILES: &str = "(root files)";

/// A path and the bytes under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeEntry {
    pub path: String,
    pub bytes: u64,
}

/// Size of a configured heavyweight path, `None` when absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloatCheckpoint {
    pub path: String,
    pub bytes: Option<u64>,
}

impl BloatCheckpoint {
    pub fn is_present(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Totals and rankings for one scan
#[derive(Debug, Clone, Default)]
pub struct TreeStats {
    pub total_bytes: u64,
    pub file_count: usize,
    /// Top-level entries, largest first
    pub top_level: Vec<SizeEntry>,
    /// Largest regular files, largest first
    pub largest_files: Vec<SizeEntry>,
    pub checkpoints: Vec<BloatCheckpoint>,
    /// Entries that could not be read
    pub skipped: usize,
}

/// Walk `root` and collect size statistics
///
/// Symlinks are not followed. Ties in either ranking are broken by path so
/// repeated scans of the same tree render identically.
pub fn scan(root: &Path, top_n: usize, checkpoints: &[String]) -> Result<TreeStats> {
    if !root.is_dir() {
        return Err(Error::Resolution {
            root: root.to_path_buf(),
        });
    }

    let mut stats = TreeStats::default();
    let mut by_top_level: BTreeMap<String, u64> = BTreeMap::new();
    let mut files: Vec<SizeEntry> = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                stats.skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let bytes = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping file without metadata");
                stats.skipped += 1;
                continue;
            }
        };

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        let bucket = if entry.depth() == 1 {
            ROOT_FILES.to_string()
        } else {
            rel_str.split('/').next().unwrap_or(ROOT_FILES).to_string()
        };

        stats.total_bytes += bytes;
        stats.file_count += 1;
        *by_top_level.entry(bucket).or_default() += bytes;
        files.push(SizeEntry {
            path: rel_str,
            bytes,
        });
    }

    let top_level = by_top_level
        .into_iter()
        .map(|(path, bytes)| SizeEntry { path, bytes })
        .collect();
    stats.top_level = ranked(top_level, usize::MAX);
    stats.largest_files = ranked(files, top_n);
    stats.checkpoints = checkpoints
        .iter()
        .map(|name| BloatCheckpoint {
            path: name.clone(),
            bytes: path_size(&root.join(name)),
        })
        .collect();

    debug!(
        root = %root.display(),
        files = stats.file_count,
        bytes = stats.total_bytes,
        "tree scanned"
    );
    Ok(stats)
}

/// Sort largest first, then by path, keeping `limit` entries
fn ranked(mut entries: Vec<SizeEntry>, limit: usize) -> Vec<SizeEntry> {
    entries.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.path.cmp(&b.path)));
    entries.truncate(limit);
    entries
}

/// Total bytes of regular files at or under `path`
fn path_size(path: &Path) -> Option<u64> {
    let meta = std::fs::symlink_metadata(path).ok()?;
    if meta.is_file() {
        return Some(meta.len());
    }
    if !meta.is_dir() {
        return Some(0);
    }

    let total = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum();
    Some(total)
}
