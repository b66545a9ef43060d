//! Tamper-evident content manifests
//!
//! Text format, one entry per line, sorted by path bytes:
//!
//! ```text
//! <64 hex chars><space><space><relative/path>\n
//! ```
//!
//! The same format `sha256sum -c` accepts, so SHA-256 manifests can be checked
//! without this tool.

use crate::error::{Error, Result};
use crate::filter::{RelPath, ResolvedPathSet};
use crate::hash::{hash_path, ContentHash, HashAlgorithm};
use crate::store::atomic_write;
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One file in a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: RelPath,
    pub hash: ContentHash,
}

/// Ordered list of content hashes over a resolved file set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    algorithm: HashAlgorithm,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Build from entries in any order
    pub fn from_entries(algorithm: HashAlgorithm, mut entries: Vec<ManifestEntry>) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries.dedup_by(|a, b| a.path == b.path);
        Self { algorithm, entries }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialized text form
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.entries.len() * 96);
        for entry in &self.entries {
            out.push_str(&entry.hash.to_hex());
            out.push_str("  ");
            out.push_str(entry.path.as_str());
            out.push('\n');
        }
        out
    }

    /// Parse the text form, requiring strictly increasing paths
    pub fn parse(text: &str, algorithm: HashAlgorithm) -> Result<Self> {
        let mut entries: Vec<ManifestEntry> = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.is_empty() {
                continue;
            }
            let (hex, path) = line.split_once("  ").ok_or_else(|| Error::ManifestParse {
                line: line_no,
                reason: "expected '<digest>  <path>'".to_string(),
            })?;
            let hash = ContentHash::from_hex(hex).map_err(|reason| Error::ManifestParse {
                line: line_no,
                reason,
            })?;
            let path = RelPath::parse(path).ok_or_else(|| Error::ManifestParse {
                line: line_no,
                reason: format!("invalid relative path '{}'", path),
            })?;

            if let Some(prev) = entries.last() {
                if prev.path >= path {
                    return Err(Error::ManifestParse {
                        line: line_no,
                        reason: format!("'{}' is out of order or duplicated", path),
                    });
                }
            }
            entries.push(ManifestEntry { path, hash });
        }

        Ok(Self { algorithm, entries })
    }

    /// Read and parse a manifest file; the algorithm comes from its extension
    pub fn read(path: &Path, default: HashAlgorithm) -> Result<Self> {
        let algorithm = algorithm_from_file_name(path).unwrap_or(default);
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io("failed to read manifest", path, e))?;
        Self::parse(&text, algorithm)
    }
}

/// Algorithm named by a manifest file extension, e.g. `MANIFEST.blake3`
pub fn algorithm_from_file_name(path: &Path) -> Option<HashAlgorithm> {
    path.extension()?.to_str()?.parse().ok()
}

/// Algorithm for reading `path`: its extension, else `requested`, else `default`
///
/// An extension naming a different algorithm than `requested` is an error.
pub fn algorithm_for(
    path: &Path,
    requested: Option<HashAlgorithm>,
    default: HashAlgorithm,
) -> Result<HashAlgorithm> {
    match (algorithm_from_file_name(path), requested) {
        (Some(named), Some(requested)) if named != requested => Err(Error::AlgorithmMismatch {
            path: path.to_path_buf(),
            named,
            requested,
        }),
        (Some(named), _) => Ok(named),
        (None, requested) => Ok(requested.unwrap_or(default)),
    }
}

/// `path` with its extension naming `algorithm`
///
/// `hashes.txt` becomes `hashes.txt.blake3`; a path already tagged with
/// another algorithm is rejected.
pub fn tagged_path(path: &Path, algorithm: HashAlgorithm) -> Result<PathBuf> {
    match algorithm_from_file_name(path) {
        Some(named) if named == algorithm => Ok(path.to_path_buf()),
        Some(named) => Err(Error::AlgorithmMismatch {
            path: path.to_path_buf(),
            named,
            requested: algorithm,
        }),
        None => {
            let mut name = path.as_os_str().to_owned();
            name.push(".");
            name.push(algorithm.tag());
            Ok(PathBuf::from(name))
        }
    }
}

/// Conventional manifest file name for `algorithm`
pub fn default_file_name(algorithm: HashAlgorithm) -> String {
    format!("MANIFEST.{}", algorithm.tag())
}

/// Hash every member of `paths` under `root`
///
/// Aborts on the first unreadable file; a partial manifest is never returned.
pub fn build(root: &Path, paths: &ResolvedPathSet, algorithm: HashAlgorithm) -> Result<Manifest> {
    let members: Vec<&RelPath> = paths.iter().collect();
    debug!(files = members.len(), %algorithm, "hashing manifest members");

    let entries = members
        .par_iter()
        .map(|rel| -> Result<ManifestEntry> {
            let abs = rel.to_path(root);
            let hash = hash_regular_file(algorithm, &abs).map_err(|source| Error::UnreadableFile {
                path: PathBuf::from(rel.as_str()),
                source,
            })?;
            Ok(ManifestEntry {
                path: (*rel).clone(),
                hash,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Manifest::from_entries(algorithm, entries))
}

fn hash_regular_file(algorithm: HashAlgorithm, path: &Path) -> io::Result<ContentHash> {
    let meta = std::fs::symlink_metadata(path)?;
    if !meta.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no longer a regular file",
        ));
    }
    hash_path(algorithm, path)
}

/// Write `manifest` atomically to `output`
pub fn write_manifest(manifest: &Manifest, output: &Path) -> Result<()> {
    atomic_write(output, manifest.to_text().as_bytes())?;
    info!(
        path = %output.display(),
        entries = manifest.len(),
        algorithm = %manifest.algorithm(),
        "manifest written"
    );
    Ok(())
}

/// Outcome of checking a tree against a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Entries whose content still matches
    pub matched: usize,
    /// Entries whose content hash changed
    pub modified: Vec<RelPath>,
    /// Entries that are gone or unreadable
    pub missing: Vec<RelPath>,
    /// Files in the current resolution that the manifest does not list
    pub extra: Vec<RelPath>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Recompute hashes for `manifest` under `root`
///
/// When `current` is given, files it contains that the manifest lacks are
/// reported as `extra`.
pub fn verify(root: &Path, manifest: &Manifest, current: Option<&ResolvedPathSet>) -> VerifyReport {
    let algorithm = manifest.algorithm();
    let results: Vec<(RelPath, Option<bool>)> = manifest
        .entries()
        .par_iter()
        .map(|entry| {
            let outcome = hash_regular_file(algorithm, &entry.path.to_path(root))
                .ok()
                .map(|hash| hash == entry.hash);
            (entry.path.clone(), outcome)
        })
        .collect();

    let mut report = VerifyReport::default();
    for (path, outcome) in results {
        match outcome {
            Some(true) => report.matched += 1,
            Some(false) => report.modified.push(path),
            None => report.missing.push(path),
        }
    }

    if let Some(current) = current {
        let listed: std::collections::BTreeSet<&RelPath> =
            manifest.entries().iter().map(|e| &e.path).collect();
        report.extra = current
            .iter()
            .filter(|p| !listed.contains(p))
            .cloned()
            .collect();
    }

    report
}
