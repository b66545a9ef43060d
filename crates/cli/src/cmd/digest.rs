//! Write the state digest report

use super::Context;
use crate::util::{display_path, format_size};
use anyhow::{Context as _, Result};
use std::path::PathBuf;
use treeseal_digest::generate;

pub async fn run(ctx: &Context, output: Option<PathBuf>, top: Option<usize>) -> Result<()> {
    let mut config = ctx.config.digest.clone();
    if let Some(top) = top {
        anyhow::ensure!(top > 0, "--top must be positive");
        config.top = top;
    }
    let output = ctx.output_or(output, config.output.clone());

    let spinner = ctx.out.spinner(format!(
        "Scanning tree and running {} checks...",
        config.checks.len()
    ));
    let report = generate(&ctx.root, &config).await;
    spinner.finish_and_clear();
    let report = report?;

    report
        .write(&output)
        .with_context(|| format!("Failed to write digest {}", output.display()))?;

    ctx.out.ok(
        "digest",
        format!(
            "{} ({} in {} files)",
            display_path(&ctx.root, &output),
            format_size(report.stats.total_bytes),
            report.stats.file_count
        ),
    );
    for check in &report.checks {
        if check.status.is_passed() {
            ctx.out.ok("check", format!("{} {}", check.name, check.status));
        } else {
            ctx.out.note("check", format!("{} {}", check.name, check.status));
            if let Some(first) = check.stderr_head.first() {
                ctx.out.detail(first);
            }
        }
    }
    Ok(())
}
