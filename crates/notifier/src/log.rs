//! Log-only channel

use alerting::{Notifier, NotifyError, Severity};
use tracing::{info, warn};

/// Writes notifications to the log instead of sending them anywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, severity: Severity, message: &str) -> Result<(), NotifyError> {
        match severity {
            Severity::Alert => warn!(target: "healthwatch::notify", "Alert: {}", message),
            Severity::Recovery => info!(target: "healthwatch::notify", "Recovered: {}", message),
        }
        Ok(())
    }
}
