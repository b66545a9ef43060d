//! Check the tree against a written manifest

use super::Context;
use crate::util::display_path;
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use thiserror::Error;
use treeseal_core::manifest::{self, Manifest};
use treeseal_core::{HashAlgorithm, RelPath};

/// Listed entries shown per category before eliding
const SHOW_LIMIT: usize = 20;

/// Tree no longer matches its manifest
#[derive(Debug, Error)]
#[error("tree does not match {manifest}: {modified} modified, {missing} missing, {extra} unlisted")]
pub struct VerifyMismatch {
    pub manifest: String,
    pub modified: usize,
    pub missing: usize,
    pub extra: usize,
}

/// Recompute hashes; files the manifest filter (plus `excludes`) resolves but
/// the manifest lacks count as unlisted
pub async fn run(
    ctx: &Context,
    manifest_path: Option<PathBuf>,
    algorithm: Option<HashAlgorithm>,
    excludes: Vec<String>,
) -> Result<()> {
    let path = match manifest_path {
        Some(path) => path,
        None => locate_manifest(ctx, algorithm)?,
    };
    let algorithm = manifest::algorithm_for(&path, algorithm, ctx.config.manifest.algorithm)?;
    let manifest = Manifest::read(&path, algorithm)?;
    let shown = display_path(&ctx.root, &path);

    let spinner = ctx.out.spinner(format!(
        "Verifying {} files ({})...",
        manifest.len(),
        manifest.algorithm()
    ));
    let current = ctx.manifest_filter(&excludes, &path)?.resolve(&ctx.root)?;
    let report = manifest::verify(&ctx.root, &manifest, Some(&current));
    spinner.finish_and_clear();

    if report.is_clean() {
        ctx.out.ok(
            "verify",
            format!("{} files match {} ({})", report.matched, shown, manifest.algorithm()),
        );
        return Ok(());
    }

    ctx.out.fail(
        "verify",
        format!("{} of {} files match {}", report.matched, manifest.len(), shown),
    );
    print_paths("modified", &report.modified);
    print_paths("missing", &report.missing);
    print_paths("unlisted", &report.extra);

    Err(VerifyMismatch {
        manifest: shown,
        modified: report.modified.len(),
        missing: report.missing.len(),
        extra: report.extra.len(),
    }
    .into())
}

/// Default manifest for `requested`, else the configured one, else whichever
/// algorithm's default file exists
fn locate_manifest(ctx: &Context, requested: Option<HashAlgorithm>) -> Result<PathBuf> {
    if let Some(algorithm) = requested {
        return ctx.default_manifest(algorithm);
    }
    let configured = ctx.default_manifest(ctx.config.manifest.algorithm)?;
    if configured.is_file() {
        return Ok(configured);
    }
    let found = [HashAlgorithm::Sha256, HashAlgorithm::Blake3]
        .into_iter()
        .filter_map(|algorithm| ctx.default_manifest(algorithm).ok())
        .find(|candidate| candidate.is_file());
    Ok(found.unwrap_or(configured))
}

fn print_paths(label: &str, paths: &[RelPath]) {
    if paths.is_empty() {
        return;
    }
    println!("  {} ({}):", label.yellow(), paths.len());
    for path in paths.iter().take(SHOW_LIMIT) {
        println!("    {}", path);
    }
    if paths.len() > SHOW_LIMIT {
        println!("    {}", format!("... and {} more", paths.len() - SHOW_LIMIT).dimmed());
    }
}
