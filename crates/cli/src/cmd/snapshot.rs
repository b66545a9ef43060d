//! Build a size-bounded snapshot archive

use super::Context;
use crate::util::{display_path, format_size};
use anyhow::Result;
use std::path::PathBuf;
use treeseal_core::{build_archive, ArchiveTier};

pub async fn run(ctx: &Context, output: Option<PathBuf>, max_size: Option<u64>) -> Result<()> {
    let snapshot = &ctx.config.snapshot;
    let output = ctx.output_or(output, snapshot.output_path(&ctx.root));
    let mut spec = snapshot.archive_spec();
    if let Some(max) = max_size {
        anyhow::ensure!(max > 0, "--max-size must be positive");
        spec.max_size_bytes = max;
    }

    let budget = spec.max_size_bytes;

    let spinner = ctx.out.spinner(format!(
        "Packaging snapshot (budget {})...",
        format_size(budget)
    ));
    let root = ctx.root.clone();
    let target = output.clone();
    let built = tokio::task::spawn_blocking(move || build_archive(&root, &spec, &target)).await;
    spinner.finish_and_clear();
    let archive = built??;

    if archive.tier == ArchiveTier::Fallback {
        ctx.out.note(
            "snapshot",
            "primary include set over budget; used fallback include set",
        );
    }
    ctx.out.ok(
        "snapshot",
        format!(
            "{} ({}, {} files, {} tier, budget {})",
            display_path(&ctx.root, &archive.path),
            format_size(archive.size_bytes),
            archive.paths.len(),
            archive.tier,
            format_size(budget)
        ),
    );
    Ok(())
}
