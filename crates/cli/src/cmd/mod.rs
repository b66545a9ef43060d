//! CLI command implementations

pub mod config;
pub mod digest;
pub mod manifest;
pub mod snapshot;
pub mod stamp;
pub mod verify;

use crate::config::{anchor, Config};
use crate::util::Output;
use std::path::{Path, PathBuf};
use treeseal_core::filter::artifact_exclude;
use treeseal_core::store::STAGING_GLOB;
use treeseal_core::manifest::tagged_path;
use treeseal_core::{FilterSpec, HashAlgorithm, PathFilter};
use treeseal_proof::{OtsClient, ProofClient};

/// Everything a command needs besides its own flags
pub struct Context {
    /// Canonical root directory
    pub root: PathBuf,
    pub config: Config,
    /// File the configuration came from, if any
    pub config_path: Option<PathBuf>,
    pub out: Output,
}

impl Context {
    /// Output path from a flag (as typed) or the configured default (under the root)
    pub fn output_or(&self, flag: Option<PathBuf>, configured: PathBuf) -> PathBuf {
        match flag {
            Some(path) => path,
            None => anchor(&self.root, &configured),
        }
    }

    /// Manifest filter: configured patterns, extra excludes, and every artifact this tool writes
    ///
    /// `manifest` is the manifest file itself; it and its proof never list themselves.
    pub fn manifest_filter(&self, extra_excludes: &[String], manifest: &Path) -> anyhow::Result<PathFilter> {
        let config = &self.config;
        let artifacts = [
            manifest.to_path_buf(),
            self.proof_path(manifest),
            config.snapshot.output_path(&self.root),
            anchor(&self.root, &config.digest.output),
        ];

        let spec = FilterSpec::new(config.manifest.include.clone(), config.manifest.exclude.clone())
            .with_excludes(extra_excludes.iter().cloned())
            .with_excludes([STAGING_GLOB.to_string()])
            .with_excludes(
                artifacts
                    .iter()
                    .filter_map(|artifact| artifact_exclude(&self.root, artifact)),
            );

        let mut filter = PathFilter::new(&spec)?;
        if config.manifest.use_gitignore {
            filter = filter.with_gitignore(&self.root);
        }
        Ok(filter)
    }

    /// Default manifest location for `algorithm`, tagged with its extension
    pub fn default_manifest(&self, algorithm: HashAlgorithm) -> anyhow::Result<PathBuf> {
        let configured = self.config.manifest.output_path(&self.root, algorithm);
        Ok(tagged_path(&configured, algorithm)?)
    }

    /// Where the proof for `manifest` is written
    pub fn proof_path(&self, manifest: &Path) -> PathBuf {
        OtsClient::from_settings(&self.config.proof).proof_path(manifest)
    }
}
