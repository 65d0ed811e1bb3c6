//! Probe identity

use crate::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identity of a monitored check: a group (e.g. `FS_Monitor`) and a
/// check name within it (e.g. `check_fs_mount_time`).
///
/// Rendered as `group.check`. The group may not contain a dot, so the
/// rendering can always be split back on the first one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProbeKey {
    group: String,
    check: String,
}

impl ProbeKey {
    /// Create a key from its two parts
    pub fn new(group: impl Into<String>, check: impl Into<String>) -> Result<Self, LedgerError> {
        let group = group.into();
        let check = check.into();

        if group.is_empty() || group.contains('.') {
            return Err(LedgerError::InvalidKey(format!(
                "group '{}' must be non-empty and must not contain '.'",
                group
            )));
        }
        if check.is_empty() {
            return Err(LedgerError::InvalidKey(format!(
                "check name for group '{}' must be non-empty",
                group
            )));
        }

        Ok(Self { group, check })
    }

    /// Monitor group, e.g. `Slurm_Monitor`
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Check name within the group
    pub fn check(&self) -> &str {
        &self.check
    }
}

impl fmt::Display for ProbeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.check)
    }
}

impl FromStr for ProbeKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (group, check) = s
            .split_once('.')
            .ok_or_else(|| LedgerError::InvalidKey(format!("'{}' is not of the form group.check", s)))?;
        Self::new(group, check)
    }
}

impl TryFrom<String> for ProbeKey {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProbeKey> for String {
    fn from(key: ProbeKey) -> Self {
        key.to_string()
    }
}
