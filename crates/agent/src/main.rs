//! healthwatch - Main Entry Point

use agent::{build_coordinator, init_logging, open_ledger, render_status, run_once, AgentConfig};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ledger::ProbeKey;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "healthwatch",
    about = "Run health probes once and alert on sustained failures",
    version
)]
struct Cli {
    /// Configuration file (default: /etc/healthwatch/healthwatch.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every enabled probe once (the default)
    Run {
        /// Log notifications instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the failure ledger
    Status,
    /// Forget failure state for one probe, or for all probes
    Reset {
        /// Probe key as group.check
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.verbose, config.log_file.as_deref(), config.log_json)?;

    match cli.command.unwrap_or(Commands::Run { dry_run: false }) {
        Commands::Run { dry_run } => {
            info!("=== healthwatch v{} ===", env!("CARGO_PKG_VERSION"));
            let coordinator = build_coordinator(&config, dry_run)?;
            let summary = run_once(&coordinator, &config.probes).await;
            if summary.ledger_errors > 0 {
                bail!(
                    "{} probe outcome(s) could not be recorded in {}",
                    summary.ledger_errors,
                    config.ledger_path.display()
                );
            }
        }
        Commands::Status => {
            let ledger = open_ledger(&config).load()?;
            print!("{}", render_status(&ledger));
        }
        Commands::Reset { key: Some(key) } => {
            let key: ProbeKey = key.parse()?;
            if open_ledger(&config).remove(&key)? {
                info!("Reset {}", key);
            } else {
                info!("{} had no recorded state", key);
            }
        }
        Commands::Reset { key: None } => {
            open_ledger(&config).clear()?;
            info!("Cleared ledger {}", config.ledger_path.display());
        }
    }

    Ok(())
}
