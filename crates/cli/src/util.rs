//! Shared utilities for CLI commands

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Duration;

pub use treeseal_digest::format_size;

/// Output settings shared by every command
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub quiet: bool,
}

impl Output {
    /// Spinner on stderr; hidden when quiet or not attached to a terminal
    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    /// `✓ label detail`
    pub fn ok(&self, label: &str, detail: impl std::fmt::Display) {
        if !self.quiet {
            println!("{} {} {}", "✓".green(), label.bold(), detail);
        }
    }

    /// `- label detail`, for skipped or advisory steps
    pub fn note(&self, label: &str, detail: impl std::fmt::Display) {
        if !self.quiet {
            println!("{} {} {}", "-".yellow(), label.bold(), detail);
        }
    }

    /// `✗ label detail`, printed even when quiet
    pub fn fail(&self, label: &str, detail: impl std::fmt::Display) {
        println!("{} {} {}", "✗".red(), label.bold(), detail);
    }

    /// Indented line under a status line
    pub fn detail(&self, text: impl std::fmt::Display) {
        if !self.quiet {
            println!("    {}", text.dimmed());
        }
    }
}

/// `path` relative to `root` when it lives there, for display
pub fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|rel| rel.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}
