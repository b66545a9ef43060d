//! Treeseal CLI - treeseal command

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use treeseal_core::HashAlgorithm;

mod cmd;
mod config;
mod util;

use cmd::manifest::ManifestArgs;
use cmd::Context;
use config::Config;
use util::Output;

/// Treeseal - reproducible manifests and size-bounded snapshots of a file tree
#[derive(Parser)]
#[command(name = "treeseal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Tree to operate on
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: <root>/treeseal.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only errors and failing results
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash the tree into a manifest and timestamp it
    Manifest {
        /// Additional exclude pattern (repeatable)
        #[arg(short, long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,
        /// Manifest path; `.<algorithm>` is appended unless already present
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Hash algorithm: sha256 or blake3
        #[arg(short, long)]
        algorithm: Option<HashAlgorithm>,
        /// Skip timestamp submission
        #[arg(long)]
        no_stamp: bool,
    },
    /// Check the tree against a manifest
    Verify {
        /// Manifest path (default: the configured manifest in the root)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Hash algorithm, when the manifest file name does not name one
        #[arg(short, long)]
        algorithm: Option<HashAlgorithm>,
        /// Additional exclude pattern used when the manifest was built
        #[arg(short, long = "exclude", value_name = "PATTERN")]
        excludes: Vec<String>,
    },
    /// Build a size-bounded snapshot archive
    Snapshot {
        /// Archive path (default: <root>/snapshot.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Size budget in bytes
        #[arg(long, value_name = "BYTES")]
        max_size: Option<u64>,
    },
    /// Write a state digest report
    Digest {
        /// Report path (default: <root>/STATE_DIGEST.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Number of largest files listed
        #[arg(long)]
        top: Option<usize>,
    },
    /// Submit a manifest for timestamping
    Stamp {
        /// Manifest file
        manifest: PathBuf,
    },
    /// Upgrade a pending timestamp proof
    Upgrade {
        /// Proof file (<manifest>.ots)
        proof: PathBuf,
    },
    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print a commented example treeseal.toml
    Example,
}

/// Exit status for command line usage errors, kept apart from the root check's 2
const USAGE_EXIT: u8 = 64;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            return ExitCode::from(USAGE_EXIT);
        }
        // --help and --version
        Err(err) => err.exit(),
    };
    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    // Needs neither a root nor a config
    if let Commands::Config(ConfigCommands::Example) = cli.command {
        return cmd::config::run_example().await;
    }

    let root = cli
        .root
        .canonicalize()
        .ok()
        .filter(|p| p.is_dir())
        .ok_or_else(|| treeseal_core::Error::Resolution {
            root: cli.root.clone(),
        })?;
    let (config, config_path) = Config::load(&root, cli.config.as_deref())?;
    let ctx = Context {
        root,
        config,
        config_path,
        out: Output { quiet: cli.quiet },
    };

    match cli.command {
        Commands::Manifest {
            excludes,
            output,
            algorithm,
            no_stamp,
        } => {
            let args = ManifestArgs {
                excludes,
                output,
                algorithm,
                no_stamp,
            };
            cmd::manifest::run(&ctx, args).await
        }
        Commands::Verify {
            manifest,
            algorithm,
            excludes,
        } => cmd::verify::run(&ctx, manifest, algorithm, excludes).await,
        Commands::Snapshot { output, max_size } => cmd::snapshot::run(&ctx, output, max_size).await,
        Commands::Digest { output, top } => cmd::digest::run(&ctx, output, top).await,
        Commands::Stamp { manifest } => cmd::stamp::run_stamp(&ctx, &manifest).await,
        Commands::Upgrade { proof } => cmd::stamp::run_upgrade(&ctx, &proof).await,
        Commands::Config(ConfigCommands::Show) => cmd::config::run_show(&ctx).await,
        Commands::Config(ConfigCommands::Example) => cmd::config::run_example().await,
    }
}

/// Process exit status for a failed run
///
/// 2 root invalid, 3 nothing to include, 4 over budget after fallback,
/// 5 unreadable file, 6 verification mismatch, 1 anything else. Usage
/// errors exit with [`USAGE_EXIT`] before a command runs.
fn exit_code(err: &anyhow::Error) -> u8 {
    use treeseal_core::Error;

    if err.downcast_ref::<cmd::verify::VerifyMismatch>().is_some() {
        return 6;
    }
    match err.downcast_ref::<Error>() {
        Some(Error::Resolution { .. }) => 2,
        Some(Error::EmptyInclude { .. }) => 3,
        Some(Error::SizeExceeded { .. }) => 4,
        Some(Error::UnreadableFile { .. }) => 5,
        _ => 1,
    }
}
