//! Treeseal core - deterministic integrity snapshots of a file tree
//!
//! This crate provides:
//! - Include/exclude resolution with pruned traversal (`filter`)
//! - SHA-256 / BLAKE3 content hashing (`hash`)
//! - Byte-ordered, reproducible manifests and verification (`manifest`)
//! - Size-bounded snapshot archives with a single fallback (`archive`)
//! - Atomic artifact writes (`store`)
//! - Time-bounded external tool invocation (`exec`)

pub mod archive;
pub mod error;
pub mod exec;
pub mod filter;
pub mod hash;
pub mod manifest;
pub mod store;

// Re-export main types for convenience
pub use archive::{build_archive, ArchiveFormat, ArchiveSpec, ArchiveTier, SnapshotArchive};
pub use error::{Error, Result};
pub use exec::{find_program, run_bounded, ExecOutcome};
pub use filter::{resolve, FilterSpec, PathFilter, RelPath, ResolvedPathSet};
pub use hash::{ContentHash, HashAlgorithm};
pub use manifest::{Manifest, ManifestEntry, VerifyReport};
