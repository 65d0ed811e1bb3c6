//! Ledger records

use crate::ProbeKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Failure state of a single probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Consecutive failures since the last recovery
    #[serde(default)]
    pub fail_count: u32,
    /// When the last alert went out for this streak (`None` = never)
    #[serde(rename = "last_alert", default, with = "last_alert")]
    pub last_alert_time: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Whether the probe has no outstanding failure streak
    pub fn is_healthy(&self) -> bool {
        self.fail_count == 0
    }

    /// Clear the failure streak and its cooldown clock
    pub fn reset(&mut self) {
        self.fail_count = 0;
        self.last_alert_time = None;
    }
}

/// In-memory snapshot of the whole ledger file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<ProbeKey, LedgerEntry>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `key`, or the healthy default if the key is absent
    pub fn get(&self, key: &ProbeKey) -> LedgerEntry {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Mutable entry for `key`, inserting the default if absent
    pub fn entry_mut(&mut self, key: &ProbeKey) -> &mut LedgerEntry {
        self.entries.entry(key.clone()).or_default()
    }

    pub fn set(&mut self, key: ProbeKey, entry: LedgerEntry) {
        self.entries.insert(key, entry);
    }

    pub fn remove(&mut self, key: &ProbeKey) -> Option<LedgerEntry> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProbeKey, &LedgerEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serde adapter for `last_alert`.
///
/// Written as RFC 3339 or `null`. Older record files stored epoch seconds
/// with `0` meaning never, so numbers are accepted on read.
mod last_alert {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(time) => serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            EpochSeconds(f64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::EpochSeconds(secs)) => from_epoch_seconds(secs).map_err(D::Error::custom),
            Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
            Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(text.trim())
                .map(|time| Some(time.with_timezone(&Utc)))
                .map_err(D::Error::custom),
        }
    }

    fn from_epoch_seconds(secs: f64) -> Result<Option<DateTime<Utc>>, String> {
        if !secs.is_finite() {
            return Err(format!("invalid epoch timestamp {}", secs));
        }
        if secs <= 0.0 {
            return Ok(None);
        }

        let whole = secs.trunc() as i64;
        let nanos = ((secs - secs.trunc()) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole, nanos)
            .map(Some)
            .ok_or_else(|| format!("epoch timestamp {} out of range", secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(s: &str) -> ProbeKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_absent_key_reads_as_healthy() {
        let ledger = Ledger::new();
        let entry = ledger.get(&key("FS_Monitor.check_fs_mount_time"));
        assert_eq!(entry, LedgerEntry::default());
        assert!(entry.is_healthy());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut ledger = Ledger::new();
        ledger.set(
            key("Slurm_Monitor.check_sinfo_time"),
            LedgerEntry {
                fail_count: 5,
                last_alert_time: Some(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()),
            },
        );
        ledger.set(key("FS_Monitor.check_mount_ls_time"), LedgerEntry::default());

        let text = serde_yaml::to_string(&ledger).unwrap();
        assert!(text.contains("Slurm_Monitor.check_sinfo_time:"));
        assert!(text.contains("2026-10-19T08:00:00Z"));
        assert!(text.contains("last_alert: null"));

        let parsed: Ledger = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed, ledger);
        assert_eq!(serde_yaml::to_string(&parsed).unwrap(), text);
    }

    #[test]
    fn test_reads_legacy_epoch_values() {
        let text = "\
FS_Monitor.check_fs_mount_time:
  fail_count: 3
  last_alert: 1760860800.5
Slurm_Monitor.check_sacct_time:
  fail_count: 1
  last_alert: 0
Slurm_Monitor.check_sinfo_time:
  last_alert: 1760860800
";
        let ledger: Ledger = serde_yaml::from_str(text).unwrap();

        let fs = ledger.get(&key("FS_Monitor.check_fs_mount_time"));
        assert_eq!(fs.fail_count, 3);
        let alerted = fs.last_alert_time.unwrap();
        assert_eq!(alerted.timestamp(), 1_760_860_800);
        assert_eq!(alerted.timestamp_subsec_millis(), 500);

        let sacct = ledger.get(&key("Slurm_Monitor.check_sacct_time"));
        assert_eq!(sacct.fail_count, 1);
        assert_eq!(sacct.last_alert_time, None);

        // Missing fail_count defaults to zero
        let sinfo = ledger.get(&key("Slurm_Monitor.check_sinfo_time"));
        assert_eq!(sinfo.fail_count, 0);
        assert!(sinfo.last_alert_time.is_some());
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let text = "FS_Monitor.check_fs_mount_time:\n  fail_count: 1\n  last_alert: yesterday\n";
        assert!(serde_yaml::from_str::<Ledger>(text).is_err());
    }

    #[test]
    fn test_reset_clears_streak() {
        let mut entry = LedgerEntry {
            fail_count: 7,
            last_alert_time: Some(Utc::now()),
        };
        entry.reset();
        assert_eq!(entry, LedgerEntry::default());
    }
}
