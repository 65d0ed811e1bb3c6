//! Health Check Agent
//!
//! One-shot runner: executes every configured probe once, feeds the
//! outcomes through the alert coordinator and exits. Invocation cadence is
//! left to cron or a systemd timer.

pub mod config;

use alerting::{Action, AlertCoordinator, Notifier};
use anyhow::Context;
use chrono::SecondsFormat;
use ledger::{FailureLedger, Ledger};
use notifier::{ConfiguredNotifier, LogNotifier};
use probes::{run_probe, ProbeDefinition};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::FmtSubscriber;

pub use config::AgentConfig;

/// Totals for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Probes that were executed
    pub executed: usize,
    /// Disabled probes
    pub skipped: usize,
    pub alerts: usize,
    pub recoveries: usize,
    /// Probes whose outcome could not be recorded
    pub ledger_errors: usize,
}

/// Initialize logging. Output goes to `log_file` (appended) when set,
/// otherwise to stderr.
pub fn init_logging(verbose: bool, log_file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(log_file.is_none())
        .with_writer(writer);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to set tracing subscriber")
}

/// Open the ledger described by `config`
pub fn open_ledger(config: &AgentConfig) -> FailureLedger {
    FailureLedger::open(&config.ledger_path).with_corrupt_policy(config.on_corrupt_ledger)
}

/// Build the coordinator for a run. `dry_run` forces log-only notifications.
pub fn build_coordinator(
    config: &AgentConfig,
    dry_run: bool,
) -> anyhow::Result<AlertCoordinator<ConfiguredNotifier>> {
    let ledger = open_ledger(config);
    ledger
        .ensure_exists()
        .with_context(|| format!("Failed to prepare ledger {}", config.ledger_path.display()))?;

    let notifier = if dry_run {
        info!("Dry run: notifications go to the log only");
        ConfiguredNotifier::Log(LogNotifier)
    } else {
        ConfiguredNotifier::from_config(config.webhook.clone())
            .context("Failed to configure webhook notifier")?
    };

    Ok(AlertCoordinator::new(ledger, notifier, config.alerting.clone()))
}

/// Run every enabled probe once and report each outcome.
///
/// A ledger error for one probe is logged and counted; the remaining probes
/// still run.
pub async fn run_once<N: Notifier>(
    coordinator: &AlertCoordinator<N>,
    probes: &[ProbeDefinition],
) -> RunSummary {
    let mut summary = RunSummary::default();

    for probe in probes {
        if !probe.enabled {
            debug!("Skipping disabled probe {}.{}", probe.group, probe.name);
            summary.skipped += 1;
            continue;
        }

        let key = match probe.key() {
            Ok(key) => key,
            Err(e) => {
                error!("Skipping probe with invalid key: {}", e);
                summary.skipped += 1;
                continue;
            }
        };

        let outcome = run_probe(probe).await;
        summary.executed += 1;

        match coordinator.report(&key, &outcome, probe.threshold).await {
            Ok(Action::AlertSent) => summary.alerts += 1,
            Ok(Action::RecoverySent) => summary.recoveries += 1,
            Ok(Action::NoAction) => {}
            Err(e) => {
                error!(
                    probe = %key,
                    "Could not record outcome, alert state for this run is unknown: {}",
                    e
                );
                summary.ledger_errors += 1;
            }
        }
    }

    info!(
        "Run complete: {} executed, {} skipped, {} alerts, {} recoveries, {} ledger errors",
        summary.executed, summary.skipped, summary.alerts, summary.recoveries, summary.ledger_errors
    );
    summary
}

/// Render the ledger as a plain-text table
pub fn render_status(ledger: &Ledger) -> String {
    if ledger.is_empty() {
        return "ledger is empty\n".to_string();
    }

    let width = ledger
        .iter()
        .map(|(key, _)| key.to_string().len())
        .max()
        .unwrap_or(0)
        .max("PROBE".len());

    let mut out = format!("{:<width$}  {:>10}  {}\n", "PROBE", "FAIL_COUNT", "LAST_ALERT");
    for (key, entry) in ledger.iter() {
        let last_alert = entry
            .last_alert_time
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| "never".to_string());
        out.push_str(&format!(
            "{:<width$}  {:>10}  {}\n",
            key.to_string(),
            entry.fail_count,
            last_alert
        ));
    }
    out
}
