//! Standalone timestamp submission and upgrade
//!
//! Unlike the manifest pipeline, these commands exist only to produce a
//! proof, so an outcome without one is an error.

use super::manifest::report_outcome;
use super::Context;
use anyhow::Result;
use std::path::Path;
use treeseal_proof::{ProofOutcome, TimestampProofManager};

pub async fn run_stamp(ctx: &Context, manifest: &Path) -> Result<()> {
    let outcome = TimestampProofManager::from_settings(&ctx.config.proof)
        .submit(manifest)
        .await;
    finish(ctx, outcome)
}

pub async fn run_upgrade(ctx: &Context, proof: &Path) -> Result<()> {
    let outcome = TimestampProofManager::from_settings(&ctx.config.proof)
        .upgrade(proof)
        .await;
    finish(ctx, outcome)
}

fn finish(ctx: &Context, outcome: ProofOutcome) -> Result<()> {
    report_outcome(ctx, &outcome);
    anyhow::ensure!(outcome.has_proof(), "timestamp request {}", outcome);
    Ok(())
}
