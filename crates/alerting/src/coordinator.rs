//! Alert Coordinator Implementation

use crate::notify::{Notifier, Severity};
use chrono::{DateTime, Utc};
use ledger::{FailureLedger, Ledger, LedgerError, ProbeKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum time between two alerts for the same probe (seconds)
    pub cooldown_seconds: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 3600, // 1 hour
        }
    }
}

impl AlertConfig {
    /// Whether strictly more than the cooldown has passed since `last_alert`.
    /// A probe that never alerted is always out of cooldown.
    pub fn cooldown_elapsed(&self, last_alert: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last) = last_alert else {
            return true;
        };
        let cooldown_ms = i64::try_from(self.cooldown_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        now.signed_duration_since(last).num_milliseconds() > cooldown_ms
    }
}

/// Result of running one probe in this invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Failed, with a human-readable description used as the alert text
    Failure(String),
}

impl Outcome {
    pub fn failure(detail: impl Into<String>) -> Self {
        Outcome::Failure(detail.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// What the coordinator did with an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoAction,
    AlertSent,
    RecoverySent,
}

/// Applies the threshold, cooldown and recovery rules for each reported
/// outcome and forwards the resulting notifications.
pub struct AlertCoordinator<N> {
    ledger: FailureLedger,
    notifier: N,
    config: AlertConfig,
}

impl<N: Notifier> AlertCoordinator<N> {
    /// Create a new coordinator
    pub fn new(ledger: FailureLedger, notifier: N, config: AlertConfig) -> Self {
        info!(
            "Creating alert coordinator for {} (cooldown {}s)",
            ledger.path().display(),
            config.cooldown_seconds
        );
        Self {
            ledger,
            notifier,
            config,
        }
    }

    pub fn ledger(&self) -> &FailureLedger {
        &self.ledger
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Report the outcome of one probe run at the current time
    pub async fn report(
        &self,
        key: &ProbeKey,
        outcome: &Outcome,
        threshold: u32,
    ) -> Result<Action, LedgerError> {
        self.report_at(key, outcome, threshold, Utc::now()).await
    }

    /// Report the outcome of one probe run observed at `now`.
    ///
    /// The decision and its ledger update happen in one locked transaction;
    /// the notification is sent after the lock is released. A failed
    /// delivery is logged and does not change the returned action.
    pub async fn report_at(
        &self,
        key: &ProbeKey,
        outcome: &Outcome,
        threshold: u32,
        now: DateTime<Utc>,
    ) -> Result<Action, LedgerError> {
        let action = self
            .ledger
            .update(|ledger| apply(ledger, &self.config, key, outcome, threshold, now))?;

        match action {
            Action::NoAction => {}
            Action::AlertSent => {
                let detail = match outcome {
                    Outcome::Failure(detail) => detail.as_str(),
                    Outcome::Success => "",
                };
                self.deliver(key, Severity::Alert, detail).await;
            }
            Action::RecoverySent => {
                let message = format!("{} has recovered.", key);
                self.deliver(key, Severity::Recovery, &message).await;
            }
        }

        Ok(action)
    }

    async fn deliver(&self, key: &ProbeKey, severity: Severity, message: &str) {
        info!(probe = %key, %severity, "Sending notification: {}", message);
        match self.notifier.notify(severity, message).await {
            Ok(()) => debug!(probe = %key, %severity, "Notification delivered"),
            Err(e) => error!(probe = %key, %severity, "Failed to send notification: {}", e),
        }
    }
}

/// One state transition for `key`. Mutates `ledger` in place and returns the
/// notification that should follow, if any.
fn apply(
    ledger: &mut Ledger,
    config: &AlertConfig,
    key: &ProbeKey,
    outcome: &Outcome,
    threshold: u32,
    now: DateTime<Utc>,
) -> Action {
    let threshold = threshold.max(1);

    match outcome {
        Outcome::Success => {
            let entry = ledger.get(key);
            if entry.is_healthy() {
                return Action::NoAction;
            }

            info!(probe = %key, "Recovery detected after {} failures", entry.fail_count);
            ledger.entry_mut(key).reset();

            if entry.fail_count >= threshold {
                Action::RecoverySent
            } else {
                debug!(probe = %key, "Streak never reached threshold {}, recovering silently", threshold);
                Action::NoAction
            }
        }
        Outcome::Failure(detail) => {
            let entry = ledger.entry_mut(key);
            entry.fail_count = entry.fail_count.saturating_add(1);
            warn!(probe = %key, fail_count = entry.fail_count, "Probe failed: {}", detail);

            if entry.fail_count < threshold {
                debug!(
                    probe = %key,
                    "Alert suppressed: {} failures < threshold {}",
                    entry.fail_count,
                    threshold
                );
                return Action::NoAction;
            }

            if !config.cooldown_elapsed(entry.last_alert_time, now) {
                debug!(probe = %key, "Alert suppressed: in cooldown period");
                return Action::NoAction;
            }

            entry.last_alert_time = Some(now);
            Action::AlertSent
        }
    }
}
