//! Size-bounded snapshot archives
//!
//! A build moves through Resolving → Packaging → SizeCheck. An over-budget
//! archive under the primary include set is rebuilt once under the narrower
//! fallback set; over budget again is a terminal [`Error::SizeExceeded`].
//! The artifact is staged beside the target and only renamed into place
//! after it passes the size check.

use crate::error::{Error, Result};
use crate::filter::{artifact_exclude, FilterSpec, PathFilter, ResolvedPathSet};
use crate::store::{commit, staging_file, STAGING_GLOB};
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Compressed container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
    /// tar stream compressed with zstd
    #[default]
    TarZst,
    /// tar stream compressed with gzip
    TarGz,
}

impl ArchiveFormat {
    /// Conventional file extension, without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarZst => "tar.zst",
            Self::TarGz => "tar.gz",
        }
    }

    /// Level used when none is configured
    pub fn default_level(&self) -> i32 {
        match self {
            Self::TarZst => 19,
            Self::TarGz => 9,
        }
    }

    /// Accepted compression levels
    pub fn level_range(&self) -> std::ops::RangeInclusive<i32> {
        match self {
            Self::TarZst => 1..=22,
            Self::TarGz => 0..=9,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which include set is active for a build attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveTier {
    /// Full include set, tried first
    Primary,
    /// Narrower include set, tried once after an over-budget primary build
    Fallback,
}

impl ArchiveTier {
    /// The tier to retry with, if any
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Primary => Some(Self::Fallback),
            Self::Fallback => None,
        }
    }
}

impl fmt::Display for ArchiveTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// What to archive and how large the result may be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSpec {
    pub include: Vec<String>,
    /// Should name a subset of `include`; anything outside it is dropped
    pub fallback_include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_size_bytes: u64,
    pub format: ArchiveFormat,
    /// `None` uses [`ArchiveFormat::default_level`]
    pub compression_level: Option<i32>,
    /// Also honor the root `.gitignore`
    pub use_gitignore: bool,
}

impl ArchiveSpec {
    /// Filter for the given tier
    pub fn filter_for(&self, tier: ArchiveTier) -> FilterSpec {
        let includes = match tier {
            ArchiveTier::Primary => self.include.clone(),
            ArchiveTier::Fallback => self.fallback_include.clone(),
        };
        FilterSpec::new(includes, self.exclude.clone())
    }

    fn level(&self) -> i32 {
        self.compression_level
            .unwrap_or_else(|| self.format.default_level())
    }
}

/// A finished archive that fits the budget
#[derive(Debug, Clone)]
pub struct SnapshotArchive {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub tier: ArchiveTier,
    pub paths: ResolvedPathSet,
}

/// Build an archive of `root` at `output` within `spec.max_size_bytes`
pub fn build_archive(root: &Path, spec: &ArchiveSpec, output: &Path) -> Result<SnapshotArchive> {
    let mut exclude = spec.exclude.clone();
    exclude.push(STAGING_GLOB.to_string());
    exclude.extend(artifact_exclude(root, output));
    let spec = ArchiveSpec {
        exclude,
        ..spec.clone()
    };

    let mut tier = ArchiveTier::Primary;
    let mut primary: Option<(ResolvedPathSet, u64)> = None;

    loop {
        // Resolving
        let filter_spec = spec.filter_for(tier);
        let mut filter = PathFilter::new(&filter_spec)?;
        if spec.use_gitignore {
            filter = filter.with_gitignore(root);
        }
        let mut paths = filter.resolve(root)?;

        if let Some((ref primary_paths, _)) = primary {
            let dropped = paths.retain_within(primary_paths);
            if !dropped.is_empty() {
                warn!(
                    dropped = dropped.len(),
                    first = %dropped[0],
                    "fallback include set names files outside the primary set; ignoring them"
                );
            }
        }
        if paths.is_empty() {
            return Err(Error::EmptyInclude {
                root: root.to_path_buf(),
                patterns: filter_spec.includes,
            });
        }

        // Packaging
        info!(%tier, files = paths.len(), format = %spec.format, "packaging snapshot");
        let staged = package(root, &paths, &spec, output)?;

        // SizeCheck
        let size_bytes = staged
            .as_file()
            .metadata()
            .map_err(|e| Error::io("failed to measure staged archive for", output, e))?
            .len();

        if size_bytes <= spec.max_size_bytes {
            commit(staged, output)?;
            info!(
                %tier,
                size_bytes,
                budget = spec.max_size_bytes,
                path = %output.display(),
                "snapshot written"
            );
            return Ok(SnapshotArchive {
                path: output.to_path_buf(),
                size_bytes,
                tier,
                paths,
            });
        }

        drop(staged);
        let Some(next) = tier.next() else {
            return Err(Error::SizeExceeded {
                primary_bytes: primary.map(|(_, size)| size).unwrap_or(size_bytes),
                fallback_bytes: size_bytes,
                budget: spec.max_size_bytes,
            });
        };
        warn!(
            %tier,
            size_bytes,
            budget = spec.max_size_bytes,
            "snapshot over budget, retrying with fallback include set"
        );
        primary = Some((paths, size_bytes));
        tier = next;
    }
}

/// Write a compressed tar of `paths` to a staging file beside `output`
fn package(
    root: &Path,
    paths: &ResolvedPathSet,
    spec: &ArchiveSpec,
    output: &Path,
) -> Result<NamedTempFile> {
    let staged = staging_file(output)?;
    let io_err = |e: std::io::Error| Error::io("failed to write archive", output, e);
    let file = staged.as_file().try_clone().map_err(io_err)?;

    match spec.format {
        ArchiveFormat::TarZst => {
            let encoder = zstd::Encoder::new(file, spec.level()).map_err(io_err)?;
            let encoder = append_all(tar::Builder::new(encoder), root, paths, output)?;
            finish(encoder.finish().map_err(io_err)?, output)?;
        }
        ArchiveFormat::TarGz => {
            let level = Compression::new(spec.level().clamp(0, 9) as u32);
            let encoder = GzBuilder::new()
                .mtime(0)
                .operating_system(255)
                .write(file, level);
            let encoder = append_all(tar::Builder::new(encoder), root, paths, output)?;
            finish(encoder.finish().map_err(io_err)?, output)?;
        }
    }

    Ok(staged)
}

fn append_all<W: Write>(
    mut tar: tar::Builder<W>,
    root: &Path,
    paths: &ResolvedPathSet,
    output: &Path,
) -> Result<W> {
    tar.mode(tar::HeaderMode::Deterministic);
    for rel in paths {
        tar.append_path_with_name(rel.to_path(root), rel.as_str())
            .map_err(|source| Error::UnreadableFile {
                path: PathBuf::from(rel.as_str()),
                source,
            })?;
    }
    tar.into_inner()
        .map_err(|e| Error::io("failed to finalize tar stream for", output, e))
}

fn finish(mut file: File, output: &Path) -> Result<()> {
    file.flush()
        .map_err(|e| Error::io("failed to flush archive", output, e))
}
