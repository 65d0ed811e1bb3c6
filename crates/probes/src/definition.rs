//! Probe definitions

use crate::ProbeError;
use ledger::ProbeKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_threshold() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// One monitored check as it appears in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeDefinition {
    /// Monitor group, e.g. `FS_Monitor`
    pub group: String,
    /// Check name within the group
    pub name: String,
    /// Everything that must pass for the probe to pass
    pub checks: Vec<Check>,
    /// Per-check time limit (seconds)
    #[serde(default)]
    pub timeout_seconds: Option<f64>,
    /// Consecutive failures required before alerting
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// A single thing to try
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Check {
    /// Shell command that must exit with status 0
    Command { command: String },
    /// TCP port that must accept a connection
    Port { host: String, port: u16 },
}

impl ProbeDefinition {
    /// Ledger identity of this probe
    pub fn key(&self) -> Result<ProbeKey, ProbeError> {
        Ok(ProbeKey::new(self.group.as_str(), self.name.as_str())?)
    }

    /// Time limit per check. Values [`validate`](Self::validate) rejects
    /// yield `None`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|limit| !limit.is_zero())
    }

    /// Reject definitions that could never run meaningfully
    pub fn validate(&self) -> Result<(), ProbeError> {
        let key = self.key()?;
        let invalid = |reason: &str| ProbeError::Invalid {
            probe: key.to_string(),
            reason: reason.to_string(),
        };

        if self.checks.is_empty() {
            return Err(invalid("no checks configured"));
        }
        if let Some(secs) = self.timeout_seconds {
            let representable = Duration::try_from_secs_f64(secs).is_ok_and(|d| !d.is_zero());
            if !secs.is_finite() || secs <= 0.0 || !representable {
                return Err(invalid("timeout_seconds must be a positive number of seconds"));
            }
        }
        for check in &self.checks {
            match check {
                Check::Command { command } if command.trim().is_empty() => {
                    return Err(invalid("empty command"));
                }
                Check::Port { host, .. } if host.trim().is_empty() => {
                    return Err(invalid("empty host"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
