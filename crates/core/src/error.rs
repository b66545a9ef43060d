//! Error taxonomy for the manifest and archive pipelines

use crate::hash::HashAlgorithm;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a manifest or archive pipeline
///
/// Every variant names the path or metric that triggered it.
#[derive(Debug, Error)]
pub enum Error {
    /// Root directory does not exist or is not a directory
    #[error("root path is not a directory: {}", root.display())]
    Resolution { root: PathBuf },

    /// Include patterns resolved to no files
    #[error("nothing to include under {}: patterns {patterns:?} matched no files", root.display())]
    EmptyInclude { root: PathBuf, patterns: Vec<String> },

    /// File vanished or became unreadable between resolution and read
    #[error("unreadable file {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive still over budget after the fallback attempt
    #[error(
        "archive exceeds size budget: {fallback_bytes} bytes after fallback \
         ({primary_bytes} bytes under primary), budget {budget} bytes"
    )]
    SizeExceeded {
        primary_bytes: u64,
        fallback_bytes: u64,
        budget: u64,
    },

    /// Glob pattern could not be compiled
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Path under the root is not valid UTF-8
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    /// Manifest text could not be parsed
    #[error("manifest line {line}: {reason}")]
    ManifestParse { line: usize, reason: String },

    /// Manifest file name names a different algorithm than the one requested
    #[error("{} names {named} but {requested} was requested", path.display())]
    AlgorithmMismatch {
        path: PathBuf,
        named: HashAlgorithm,
        requested: HashAlgorithm,
    },

    /// Directory traversal failed
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Other I/O failure, with the path involved
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Build an [`Error::Io`] for `path`
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
