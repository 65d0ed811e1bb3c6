//! Notification seam

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A probe crossed its failure threshold
    Alert,
    /// A probe that had alerted is passing again
    Recovery,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Alert => f.write_str("alert"),
            Severity::Recovery => f.write_str("recovery"),
        }
    }
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Webhook returned status {0}")]
    Status(u16),

    #[error("Notifier misconfigured: {0}")]
    Config(String),
}

/// Delivers alert and recovery messages somewhere a human will see them.
///
/// Delivery failures are reported back but never retried or rolled back by
/// the coordinator.
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        severity: Severity,
        message: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}
