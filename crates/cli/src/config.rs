//! `treeseal.toml` configuration
//!
//! Every section and key is optional; missing values take the defaults
//! below. Command line flags override file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use treeseal_core::manifest::default_file_name;
use treeseal_core::{ArchiveFormat, ArchiveSpec, HashAlgorithm};
use treeseal_digest::DigestConfig;
use treeseal_proof::ProofSettings;

/// File looked up in the root when `--config` is not given
pub const CONFIG_FILE_NAME: &str = "treeseal.toml";

/// Directories nobody wants hashed or archived
const DEFAULT_EXCLUDES: &[&str] = &[".git", ".venv", "venv", "node_modules", "__pycache__", "target"];

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

fn everything() -> Vec<String> {
    vec!["**".to_string()]
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub manifest: ManifestConfig,
    pub snapshot: SnapshotConfig,
    pub proof: ProofSettings,
    pub digest: DigestConfig,
}

/// `[manifest]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub algorithm: HashAlgorithm,
    /// Defaults to `MANIFEST.<algorithm>` in the root
    pub output: Option<PathBuf>,
    pub use_gitignore: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            output: None,
            use_gitignore: false,
            include: everything(),
            exclude: default_excludes(),
        }
    }
}

impl ManifestConfig {
    /// Manifest location for `algorithm`, anchored at `root`
    pub fn output_path(&self, root: &Path, algorithm: HashAlgorithm) -> PathBuf {
        match &self.output {
            Some(path) => anchor(root, path),
            None => root.join(default_file_name(algorithm)),
        }
    }
}

/// `[snapshot]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Defaults to `snapshot.<format extension>` in the root
    pub output: Option<PathBuf>,
    pub format: ArchiveFormat,
    pub compression_level: Option<i32>,
    pub max_size_bytes: u64,
    pub use_gitignore: bool,
    pub include: Vec<String>,
    /// Narrower set tried once when the primary archive is over budget
    pub fallback_include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            output: None,
            format: ArchiveFormat::default(),
            compression_level: None,
            max_size_bytes: 50 * 1024 * 1024,
            use_gitignore: false,
            include: everything(),
            fallback_include: [
                "src", "lib", "tests", "docs", "*.md", "*.toml", "*.json", "*.yaml", "*.yml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude: default_excludes(),
        }
    }
}

impl SnapshotConfig {
    pub fn output_path(&self, root: &Path) -> PathBuf {
        match &self.output {
            Some(path) => anchor(root, path),
            None => root.join(format!("snapshot.{}", self.format.extension())),
        }
    }

    pub fn archive_spec(&self) -> ArchiveSpec {
        ArchiveSpec {
            include: self.include.clone(),
            fallback_include: self.fallback_include.clone(),
            exclude: self.exclude.clone(),
            max_size_bytes: self.max_size_bytes,
            format: self.format,
            compression_level: self.compression_level,
            use_gitignore: self.use_gitignore,
        }
    }
}

/// Relative paths are taken from `root`
pub fn anchor(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl Config {
    /// Load `explicit`, or `<root>/treeseal.toml` when present, or defaults
    ///
    /// Returns the file the values came from, if any.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => {
                anyhow::ensure!(path.is_file(), "Config file not found: {}", path.display());
                path.to_path_buf()
            }
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    return Ok((Self::default(), None));
                }
                candidate
            }
        };

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        Ok((config, Some(path)))
    }

    /// Reject values no pipeline can run with
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.manifest.include.is_empty(),
            "manifest.include must name at least one pattern"
        );

        let snapshot = &self.snapshot;
        anyhow::ensure!(
            !snapshot.include.is_empty(),
            "snapshot.include must name at least one pattern"
        );
        anyhow::ensure!(
            !snapshot.fallback_include.is_empty(),
            "snapshot.fallback_include must name at least one pattern"
        );
        anyhow::ensure!(snapshot.max_size_bytes > 0, "snapshot.max_size_bytes must be positive");
        if let Some(level) = snapshot.compression_level {
            let range = snapshot.format.level_range();
            anyhow::ensure!(
                range.contains(&level),
                "snapshot.compression_level {} is outside {}..={} for {}",
                level,
                range.start(),
                range.end(),
                snapshot.format
            );
        }

        anyhow::ensure!(
            !self.proof.program.trim().is_empty(),
            "proof.program must not be empty"
        );
        anyhow::ensure!(self.proof.timeout_secs > 0, "proof.timeout_secs must be positive");

        let digest = &self.digest;
        anyhow::ensure!(digest.top > 0, "digest.top must be positive");
        anyhow::ensure!(
            digest.check_timeout_secs > 0,
            "digest.check_timeout_secs must be positive"
        );
        let mut names = HashSet::new();
        for check in &digest.checks {
            anyhow::ensure!(!check.name.trim().is_empty(), "digest check names must not be empty");
            anyhow::ensure!(
                !check.program.trim().is_empty(),
                "digest check '{}' has no program",
                check.name
            );
            anyhow::ensure!(
                names.insert(check.name.as_str()),
                "duplicate digest check name '{}'",
                check.name
            );
        }

        Ok(())
    }
}

/// Commented example printed by `treeseal config example`
pub fn example_config() -> &'static str {
    r#"# treeseal.toml - all keys optional, shown with their defaults

[manifest]
# sha256 or blake3; the tag becomes the manifest file extension
algorithm = "sha256"
# output = "MANIFEST.sha256"
use_gitignore = false
include = ["**"]
# Patterns without a '/' match at any depth
exclude = [".git", ".venv", "venv", "node_modules", "__pycache__", "target"]

[snapshot]
# tar-zst or tar-gz
format = "tar-zst"
# output = "snapshot.tar.zst"
# compression_level = 19
max_size_bytes = 52428800
use_gitignore = false
include = ["**"]
# Tried once if the primary archive exceeds max_size_bytes
fallback_include = ["src", "lib", "tests", "docs", "*.md", "*.toml", "*.json", "*.yaml", "*.yml"]
exclude = [".git", ".venv", "venv", "node_modules", "__pycache__", "target"]

[proof]
# Timestamp written manifests with the OpenTimestamps client
enabled = true
program = "ots"
timeout_secs = 60

[digest]
output = "STATE_DIGEST.md"
top = 10
checkpoints = [".git", ".venv", "venv", "node_modules", "target", "dist", "build", "__pycache__"]
check_timeout_secs = 120
stderr_lines = 20

# [[digest.checks]]
# name = "tests"
# program = "cargo"
# args = ["test", "--quiet"]
# timeout_secs = 600
"#
}
