//! Include/exclude resolution against a live file tree
//!
//! Patterns are globs over `/`-separated paths relative to the root:
//! - `*` stays within one path component, `**` spans any number
//! - an exclude without `/` matches at any depth (`node_modules`, `*.pyc`)
//! - an exclude naming a directory, or ending in `/**`, prunes the whole subtree
//! - an include with no glob characters names a file or a whole directory
//!
//! Excluded directories are never entered. Exclude wins over include.

use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A `/`-separated UTF-8 path relative to the resolution root
///
/// Ordering is by raw UTF-8 bytes, independent of locale.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RelPath(String);

impl RelPath {
    /// Convert a relative filesystem path, rejecting `..`, roots and non-UTF-8
    pub fn from_relative(path: &Path) -> Result<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| Error::NonUtf8Path(path.to_path_buf()))?;
                    parts.push(name);
                }
                Component::CurDir => {}
                _ => {
                    return Err(Error::ManifestParse {
                        line: 0,
                        reason: format!("path escapes the root: {}", path.display()),
                    })
                }
            }
        }
        Ok(Self(parts.join("/")))
    }

    /// Build from an already-normalized string (as read from a manifest)
    pub fn parse(s: &str) -> Option<Self> {
        let valid = !s.is_empty()
            && !s.starts_with('/')
            && !s.contains('\\')
            && s.split('/').all(|part| !part.is_empty() && part != "." && part != "..");
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Absolute location under `root`
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.0.split('/'));
        path
    }

    /// First path component
    pub fn top_level(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }
}

impl Ord for RelPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl PartialOrd for RelPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelPath({:?})", self.0)
    }
}

/// Include and exclude patterns for one resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

impl FilterSpec {
    pub fn new(includes: Vec<String>, excludes: Vec<String>) -> Self {
        Self { includes, excludes }
    }

    /// Include the whole tree, minus `excludes`
    pub fn everything(excludes: Vec<String>) -> Self {
        Self {
            includes: vec!["**".to_string()],
            excludes,
        }
    }

    /// Append extra excludes
    pub fn with_excludes<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(extra.into_iter().map(Into::into));
        self
    }
}

/// Deduplicated, byte-ordered set of regular files under a root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPathSet(BTreeSet<RelPath>);

impl ResolvedPathSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, path: &RelPath) -> bool {
        self.0.contains(path)
    }

    /// Iterate in byte order
    pub fn iter(&self) -> impl Iterator<Item = &RelPath> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &ResolvedPathSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Keep only members also present in `other`, returning what was dropped
    pub fn retain_within(&mut self, other: &ResolvedPathSet) -> Vec<RelPath> {
        let dropped: Vec<_> = self.0.difference(&other.0).cloned().collect();
        self.0.retain(|p| other.0.contains(p));
        dropped
    }
}

impl FromIterator<RelPath> for ResolvedPathSet {
    fn from_iter<T: IntoIterator<Item = RelPath>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ResolvedPathSet {
    type Item = &'a RelPath;
    type IntoIter = std::collections::btree_set::Iter<'a, RelPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One compiled include pattern
struct IncludePattern {
    pattern: String,
    /// Literal directory prefix to start walking from ("" for the root)
    base: String,
    /// Deepest level below `base` the pattern can reach; `None` is unbounded
    max_depth: Option<usize>,
    matcher: GlobSet,
}

/// Compiled [`FilterSpec`] ready to resolve against a tree
pub struct PathFilter {
    includes: Vec<IncludePattern>,
    excludes: GlobSet,
    gitignore: Option<Gitignore>,
}

impl PathFilter {
    /// Compile the patterns of `spec`
    pub fn new(spec: &FilterSpec) -> Result<Self> {
        let includes = spec
            .includes
            .iter()
            .map(|p| compile_include(p))
            .collect::<Result<Vec<_>>>()?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &spec.excludes {
            for variant in exclude_variants(pattern) {
                builder.add(glob(&variant, pattern)?);
            }
        }
        let excludes = builder.build().map_err(|source| Error::InvalidPattern {
            pattern: spec.excludes.join(", "),
            source,
        })?;

        Ok(Self {
            includes,
            excludes,
            gitignore: None,
        })
    }

    /// Also honor `<root>/.gitignore`, when present
    pub fn with_gitignore(mut self, root: &Path) -> Self {
        let path = root.join(".gitignore");
        if path.is_file() {
            let mut builder = GitignoreBuilder::new(root);
            if let Some(err) = builder.add(&path) {
                warn!("Ignoring unreadable .gitignore: {}", err);
            }
            match builder.build() {
                Ok(gi) => self.gitignore = Some(gi),
                Err(e) => warn!("Failed to parse .gitignore: {}", e),
            }
        }
        self
    }

    /// Whether `rel` (a file or directory) is excluded
    pub fn is_excluded(&self, rel: &str, is_dir: bool) -> bool {
        if self.excludes.is_match(rel) {
            return true;
        }
        match self.gitignore {
            Some(ref gi) => gi.matched(rel, is_dir).is_ignore(),
            None => false,
        }
    }

    /// Whether `rel` or any of its ancestor directories is excluded
    fn is_pruned(&self, rel: &str) -> bool {
        let mut end = 0;
        for part in rel.split('/') {
            end += part.len();
            if self.is_excluded(&rel[..end], true) {
                return true;
            }
            end += 1;
        }
        false
    }

    /// Resolve against the tree under `root`
    pub fn resolve(&self, root: &Path) -> Result<ResolvedPathSet> {
        if !root.is_dir() {
            return Err(Error::Resolution {
                root: root.to_path_buf(),
            });
        }

        let mut found = BTreeSet::new();
        for include in &self.includes {
            let before = found.len();
            let hits = self.expand(root, include, &mut found)?;
            if hits == 0 {
                debug!(pattern = %include.pattern, "include pattern matched nothing");
            } else {
                debug!(
                    pattern = %include.pattern,
                    hits,
                    new = found.len() - before,
                    "include pattern resolved"
                );
            }
        }

        Ok(ResolvedPathSet(found))
    }

    /// Walk from the pattern's literal base, returning how many files matched
    fn expand(
        &self,
        root: &Path,
        include: &IncludePattern,
        found: &mut BTreeSet<RelPath>,
    ) -> Result<usize> {
        if !include.base.is_empty() && self.is_pruned(&include.base) {
            return Ok(0);
        }

        let start = if include.base.is_empty() {
            root.to_path_buf()
        } else {
            RelPath(include.base.clone()).to_path(root)
        };
        if std::fs::symlink_metadata(&start).is_err() {
            return Ok(0);
        }

        let mut walker = WalkDir::new(&start).follow_links(false).sort_by_file_name();
        if let Some(depth) = include.max_depth {
            walker = walker.max_depth(depth);
        }
        let walker = walker
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                match relative_str(root, entry.path()) {
                    Some(rel) => !self.is_excluded(&rel, entry.file_type().is_dir()),
                    // Surfaced as NonUtf8Path below if a selected file lives here
                    None => true,
                }
            });

        let mut hits = 0;
        for entry in walker {
            let entry = entry.map_err(|source| Error::Walk {
                path: start.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let rel_path = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| Error::Resolution {
                    root: root.to_path_buf(),
                })?;
            if !include.matcher.is_match(rel_path) {
                continue;
            }
            let rel = RelPath::from_relative(rel_path)?;
            hits += 1;
            found.insert(rel);
        }

        Ok(hits)
    }
}

/// Resolve `spec` against `root`
pub fn resolve(root: &Path, spec: &FilterSpec) -> Result<ResolvedPathSet> {
    PathFilter::new(spec)?.resolve(root)
}

/// Exclude pattern for an output artifact that lives inside `root`
///
/// Outputs written under the root must not feed back into their own inputs.
pub fn artifact_exclude(root: &Path, artifact: &Path) -> Option<String> {
    let root = root.canonicalize().ok()?;
    let parent = match artifact.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let full = parent.canonicalize().ok()?.join(artifact.file_name()?);
    let rel = full.strip_prefix(&root).ok()?;
    let rel = RelPath::from_relative(rel).ok()?;
    Some(escape_glob(rel.as_str()))
}

fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    RelPath::from_relative(rel).ok().map(RelPath::into_string)
}

fn normalize_pattern(pattern: &str) -> &str {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.trim_start_matches('/').trim_end_matches('/')
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '{' | '}') {
            out.push('[');
            out.push(c);
            out.push(']');
        } else {
            out.push(c);
        }
    }
    out
}

fn glob(pattern: &str, original: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| Error::InvalidPattern {
            pattern: original.to_string(),
            source,
        })
}

fn compile_include(pattern: &str) -> Result<IncludePattern> {
    let normalized = normalize_pattern(pattern);
    let normalized = if normalized.is_empty() { "**" } else { normalized };

    let base: Vec<&str> = normalized
        .split('/')
        .take_while(|part| !has_glob_meta(part))
        .collect();
    let base = base.join("/");

    // `*` never crosses `/`, so without `**` or braces the depth is fixed
    let fixed_depth =
        has_glob_meta(normalized) && !normalized.contains("**") && !normalized.contains('{');
    let max_depth = if fixed_depth {
        let below_base = if base.is_empty() { 0 } else { base.split('/').count() };
        Some(normalized.split('/').count() - below_base)
    } else {
        None
    };

    let mut builder = GlobSetBuilder::new();
    builder.add(glob(normalized, pattern)?);
    if !has_glob_meta(normalized) {
        // A literal directory includes everything beneath it
        builder.add(glob(&format!("{}/**", normalized), pattern)?);
    }
    let matcher = builder.build().map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    Ok(IncludePattern {
        pattern: pattern.to_string(),
        base,
        max_depth,
        matcher,
    })
}

fn exclude_variants(pattern: &str) -> Vec<String> {
    let normalized = normalize_pattern(pattern);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut variants = Vec::new();
    let anchored = normalized.contains('/');
    let body = if anchored {
        normalized.to_string()
    } else {
        format!("**/{}", normalized)
    };

    if let Some(stem) = body.strip_suffix("/**") {
        if !stem.is_empty() && stem != "**" {
            variants.push(stem.to_string());
        }
    }
    variants.push(body);
    variants
}
