//! Mattermost incoming webhook

use alerting::{Notifier, NotifyError, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

fn default_username() -> String {
    "cron-Monitor".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

/// Webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Incoming webhook URL
    pub url: String,
    /// Name the messages are posted under
    #[serde(default = "default_username")]
    pub username: String,
    /// Request timeout (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: default_username(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Posts alerts as colored Mattermost attachments
#[derive(Debug, Clone)]
pub struct MattermostNotifier {
    url: String,
    username: String,
    client: reqwest::Client,
}

impl MattermostNotifier {
    /// Create a notifier. Fails if the URL is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        if config.url.trim().is_empty() {
            return Err(NotifyError::Config("webhook url is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        info!("Mattermost notifier posting as {}", config.username);
        Ok(Self {
            url: config.url,
            username: config.username,
            client,
        })
    }

    /// JSON body for one notification
    pub fn payload(&self, severity: Severity, message: &str) -> Value {
        let (emoji, prefix, color) = match severity {
            Severity::Alert => ("🔥", "Alert: ", "#FF0000"),
            Severity::Recovery => ("✅", "Recovered: ", "#4DFF4D"),
        };

        json!({
            "username": self.username,
            "attachments": [
                {
                    "title": format!("{}{}{}", emoji, prefix, message),
                    "color": color,
                }
            ],
        })
    }
}

impl Notifier for MattermostNotifier {
    async fn notify(&self, severity: Severity, message: &str) -> Result<(), NotifyError> {
        let payload = self.payload(severity, message);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        debug!("Webhook accepted {} notification ({})", severity, status);
        Ok(())
    }
}
