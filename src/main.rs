//! Binary entry point for chanwatch.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use chanwatch::WatchConfig;
use chanwatch::observability::{self, MetricsSettings};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::process::ExitCode;

/// Chanwatch - forwards channel messages that mention your keywords.
#[derive(Parser)]
#[command(name = "chanwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CHANWATCH_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Watch the configured channels.
    Run {
        /// Log notifications instead of sending them.
        #[arg(long)]
        dry_run: bool,

        /// Skip the startup scan of recent history.
        #[arg(long)]
        no_backfill: bool,
    },

    /// Show which keywords a text matches.
    Scan {
        /// Text to scan.
        text: String,
    },

    /// Show the resolved configuration.
    Config,

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "chanwatch", &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let config = match WatchConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_env_overrides(),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let metrics = if matches!(cli.command, Commands::Run { .. }) {
        config.metrics
    } else {
        MetricsSettings::default()
    };
    let observability = match observability::init(&config.logging, &metrics, cli.verbose) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = match cli.command {
        Commands::Run {
            dry_run,
            no_backfill,
        } => commands::cmd_run(config, dry_run, !no_backfill).await,
        Commands::Scan { text } => commands::cmd_scan(&config, &text),
        Commands::Config => commands::cmd_config(&config),
        Commands::Completions { .. } => Ok(()),
    };

    if let Some(snapshot) = observability.render_metrics() {
        tracing::debug!(metrics = %snapshot, "Final metrics snapshot");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "chanwatch failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}
