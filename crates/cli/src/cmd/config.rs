//! Configuration display command

use super::Context;
use crate::config::{example_config, CONFIG_FILE_NAME};
use anyhow::{Context as _, Result};
use owo_colors::OwoColorize;

/// Print the effective configuration as TOML
pub async fn run_show(ctx: &Context) -> Result<()> {
    let source = match &ctx.config_path {
        Some(path) => path.display().to_string(),
        None => format!("defaults (no {} in {})", CONFIG_FILE_NAME, ctx.root.display()),
    };
    let rendered = toml::to_string_pretty(&ctx.config).context("Failed to render configuration")?;

    println!("{}", "Effective Configuration".bold());
    println!("{}: {}\n", "Source".dimmed(), source.dimmed());
    println!("{}", rendered);
    Ok(())
}

/// Print a commented example file
pub async fn run_example() -> Result<()> {
    print!("{}", example_config());
    Ok(())
}
