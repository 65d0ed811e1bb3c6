//! Agent configuration

use alerting::AlertConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use ledger::CorruptPolicy;
use notifier::WebhookConfig;
use probes::ProbeDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given. It may be absent.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/healthwatch/healthwatch.yaml";

fn default_ledger_path() -> PathBuf {
    PathBuf::from("monitor_record.yaml")
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Ledger file carrying failure streaks between runs
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// What to do when the ledger file cannot be parsed
    #[serde(default)]
    pub on_corrupt_ledger: CorruptPolicy,
    /// Append log output to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub alerting: AlertConfig,
    /// Mattermost webhook; alerts only go to the log without one
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub probes: Vec<ProbeDefinition>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ledger_path: default_ledger_path(),
            on_corrupt_ledger: CorruptPolicy::default(),
            log_file: None,
            log_json: false,
            alerting: AlertConfig::default(),
            webhook: None,
            probes: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Load from a YAML file, then apply `HEALTHWATCH__*` environment
    /// overrides (e.g. `HEALTHWATCH__WEBHOOK__URL`).
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let required = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml).required(required))
            .add_source(Environment::with_prefix("HEALTHWATCH").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid probes and probes that would share a ledger key
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for probe in &self.probes {
            probe
                .validate()
                .map_err(|e| ConfigError::Message(e.to_string()))?;
            let key = probe
                .key()
                .map_err(|e| ConfigError::Message(e.to_string()))?;
            if !seen.insert(key.clone()) {
                return Err(ConfigError::Message(format!("duplicate probe {}", key)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probes::Check;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Held by every test that loads configuration, since loading reads
    /// the process environment.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    const SAMPLE: &str = r#"
ledger_path: /var/lib/healthwatch/record.yaml
on_corrupt_ledger: reset
webhook:
  url: http://chat.example.org/hooks/abc
probes:
  - group: FS_Monitor
    name: check_fs_mount_time
    timeout_seconds: 0.25
    checks:
      - kind: command
        command: df -h
  - group: Slurm_Monitor
    name: check_sinfo_time
    timeout_seconds: 1
    threshold: 5
    enabled: false
    checks:
      - kind: command
        command: sinfo
  - group: Slurm_Monitor
    name: check_slurmdbd_status
    checks:
      - kind: port
        host: isn01
        port: 6819
"#;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("healthwatch.yaml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_from_file() {
        let _env = env_guard();
        let (_dir, path) = write_config(SAMPLE);
        let config = AgentConfig::load(Some(&path)).unwrap();

        assert_eq!(config.ledger_path, PathBuf::from("/var/lib/healthwatch/record.yaml"));
        assert_eq!(config.on_corrupt_ledger, CorruptPolicy::Reset);
        assert_eq!(config.alerting.cooldown_seconds, 3600);
        assert!(config.log_file.is_none());

        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.url, "http://chat.example.org/hooks/abc");
        assert_eq!(webhook.username, "cron-Monitor");

        assert_eq!(config.probes.len(), 3);
        assert_eq!(config.probes[0].timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.probes[0].threshold, 1);
        assert_eq!(config.probes[1].threshold, 5);
        assert!(!config.probes[1].enabled);
        assert_eq!(
            config.probes[2].checks,
            vec![Check::Port {
                host: "isn01".to_string(),
                port: 6819
            }]
        );
    }

    #[test]
    fn test_env_override() {
        let _env = env_guard();
        let (_dir, path) = write_config(SAMPLE);

        std::env::set_var("HEALTHWATCH__ALERTING__COOLDOWN_SECONDS", "7200");
        let config = AgentConfig::load(Some(&path));
        std::env::remove_var("HEALTHWATCH__ALERTING__COOLDOWN_SECONDS");

        assert_eq!(config.unwrap().alerting.cooldown_seconds, 7200);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let _env = env_guard();
        let dir = tempfile::tempdir().unwrap();
        assert!(AgentConfig::load(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_duplicate_probe_rejected() {
        let _env = env_guard();
        let (_dir, path) = write_config(
            r#"
probes:
  - group: FS_Monitor
    name: check_fs_mount_time
    checks:
      - kind: command
        command: df -h
  - group: FS_Monitor
    name: check_fs_mount_time
    checks:
      - kind: command
        command: df -i
"#,
        );

        let err = AgentConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("duplicate probe FS_Monitor.check_fs_mount_time"));
    }

    #[test]
    fn test_probe_without_checks_rejected() {
        let _env = env_guard();
        let (_dir, path) = write_config(
            r#"
probes:
  - group: FS_Monitor
    name: check_fs_mount_time
    checks: []
"#,
        );

        assert!(AgentConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_unrepresentable_timeout_rejected() {
        let _env = env_guard();
        let (_dir, path) = write_config(
            r#"
probes:
  - group: FS_Monitor
    name: check_fs_mount_time
    timeout_seconds: 1.0e+20
    checks:
      - kind: command
        command: df -h
"#,
        );

        let err = AgentConfig::load(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("timeout_seconds"));
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let _env = env_guard();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/healthwatch.yaml");
        let config = AgentConfig::load(Some(&path)).unwrap();

        let keys: Vec<String> = config
            .probes
            .iter()
            .map(|p| p.key().unwrap().to_string())
            .collect();
        assert!(keys.contains(&"FS_Monitor.check_mount_ls_time".to_string()));
        assert!(keys.contains(&"Slurm_Monitor.check_slurmctld_status".to_string()));
    }
}
