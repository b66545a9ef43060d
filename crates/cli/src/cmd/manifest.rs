//! Build, write, and timestamp a manifest of the tree

use super::Context;
use crate::util::display_path;
use anyhow::{Context as _, Result};
use std::path::PathBuf;
use tracing::info;
use treeseal_core::{manifest, Error, HashAlgorithm};
use treeseal_proof::{retire_stale_proof, ProofOutcome, TimestampProofManager};

pub struct ManifestArgs {
    pub excludes: Vec<String>,
    pub output: Option<PathBuf>,
    pub algorithm: Option<HashAlgorithm>,
    pub no_stamp: bool,
}

pub async fn run(ctx: &Context, args: ManifestArgs) -> Result<()> {
    let algorithm = args.algorithm.unwrap_or(ctx.config.manifest.algorithm);
    let output = match args.output {
        Some(path) => manifest::tagged_path(&path, algorithm)?,
        None => ctx.default_manifest(algorithm)?,
    };

    let spinner = ctx.out.spinner("Resolving files...");
    let filter = ctx.manifest_filter(&args.excludes, &output)?;
    let paths = filter.resolve(&ctx.root)?;
    if paths.is_empty() {
        spinner.finish_and_clear();
        return Err(Error::EmptyInclude {
            root: ctx.root.clone(),
            patterns: ctx.config.manifest.include.clone(),
        }
        .into());
    }
    info!(files = paths.len(), %algorithm, "resolved manifest members");

    spinner.set_message(format!("Hashing {} files ({})...", paths.len(), algorithm));
    let built = manifest::build(&ctx.root, &paths, algorithm);
    spinner.finish_and_clear();
    let manifest = built?;

    let proof = ctx.proof_path(&output);
    if retire_stale_proof(&output, &proof, manifest.to_text().as_bytes())? {
        ctx.out.note(
            "timestamp",
            format!("removed stale proof {}", display_path(&ctx.root, &proof)),
        );
    }

    manifest::write_manifest(&manifest, &output)
        .with_context(|| format!("Failed to write manifest {}", output.display()))?;
    ctx.out.ok(
        "manifest",
        format!(
            "{} ({} files, {})",
            display_path(&ctx.root, &output),
            manifest.len(),
            algorithm
        ),
    );

    if args.no_stamp {
        ctx.out.note("timestamp", "skipped (--no-stamp)");
        return Ok(());
    }

    let outcome = TimestampProofManager::from_settings(&ctx.config.proof)
        .submit(&output)
        .await;
    report_outcome(ctx, &outcome);
    Ok(())
}

/// Print a proof outcome; never fails the calling pipeline
pub fn report_outcome(ctx: &Context, outcome: &ProofOutcome) {
    let detail = match outcome {
        ProofOutcome::Stamped { proof } | ProofOutcome::Upgraded { proof } => {
            format!("{} {}", outcome.label(), display_path(&ctx.root, proof))
        }
        other => other.to_string(),
    };

    match outcome {
        ProofOutcome::Stamped { .. } | ProofOutcome::Upgraded { .. } => ctx.out.ok("timestamp", detail),
        _ => ctx.out.note("timestamp", detail),
    }
}
