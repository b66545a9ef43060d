//! Atomic artifact output
//!
//! Every artifact (manifest, archive, proof-adjacent files, digest report) is
//! written to a temporary file beside its target and renamed into place only
//! once complete. A failed or canceled run leaves the previous artifact, if
//! any, untouched.

use crate::error::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Glob matching staging files, excluded from every resolution
pub const STAGING_GLOB: &str = ".treeseal-*.tmp";

/// Directory that will hold `target`, creating it when missing
fn parent_dir(target: &Path) -> Result<PathBuf> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)
        .map_err(|e| Error::io("failed to create output directory", &parent, e))?;
    Ok(parent)
}

/// Open a temp file in the same directory as `target`
///
/// Same directory keeps the final rename on one filesystem.
pub fn staging_file(target: &Path) -> Result<NamedTempFile> {
    let parent = parent_dir(target)?;
    tempfile::Builder::new()
        .prefix(".treeseal-")
        .suffix(".tmp")
        .tempfile_in(&parent)
        .map_err(|e| Error::io("failed to create staging file in", &parent, e))
}

/// Fsync a staged file and rename it over `target`
pub fn commit(staged: NamedTempFile, target: &Path) -> Result<()> {
    staged
        .as_file()
        .sync_all()
        .map_err(|e| Error::io("failed to sync staging file for", target, e))?;
    staged
        .persist(target)
        .map_err(|e| Error::io("failed to move artifact into place at", target, e.error))?;

    #[cfg(unix)]
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        // Directory fsync makes the rename durable; not every filesystem allows it.
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}

/// Write `data` to `target` atomically
pub fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let mut staged = staging_file(target)?;
    staged
        .write_all(data)
        .map_err(|e| Error::io("failed to write staging file for", target, e))?;
    commit(staged, target)
}
