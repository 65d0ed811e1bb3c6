//! Notification Channels
//!
//! Implementations of [`alerting::Notifier`]: a Mattermost incoming webhook
//! and a log-only channel for dry runs or when no webhook is configured.

mod log;
mod mattermost;

pub use self::log::LogNotifier;
pub use mattermost::{MattermostNotifier, WebhookConfig};

use alerting::{Notifier, NotifyError, Severity};

/// The channel selected by configuration
pub enum ConfiguredNotifier {
    Mattermost(MattermostNotifier),
    Log(LogNotifier),
}

impl ConfiguredNotifier {
    /// Webhook if one is configured, otherwise the log
    pub fn from_config(webhook: Option<WebhookConfig>) -> Result<Self, NotifyError> {
        match webhook {
            Some(config) => Ok(Self::Mattermost(MattermostNotifier::new(config)?)),
            None => Ok(Self::Log(LogNotifier)),
        }
    }
}

impl Notifier for ConfiguredNotifier {
    async fn notify(&self, severity: Severity, message: &str) -> Result<(), NotifyError> {
        match self {
            Self::Mattermost(notifier) => notifier.notify(severity, message).await,
            Self::Log(notifier) => notifier.notify(severity, message).await,
        }
    }
}
