// Monitoring configuration
//
// `MonitorSpec` is the per-resource configuration read at the start of every
// cycle. `Settings` is the process-level TOML file used by the daemon.

use crate::Result;
use crate::error::MonitorError;
use crate::monitor::types::SourceKind;
use crate::utils::interval::{deserialize_interval, serialize_interval};
use crate::utils::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 86400;
pub const DEFAULT_WARNING_THRESHOLD_DAYS: u32 = 30;
pub const DEFAULT_EMAIL_COOLDOWN_SECS: u64 = 86400;

/// Per-resource monitoring configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorSpec {
    /// Scan certificate secrets held by the cluster
    pub discover_internal: bool,
    /// Scan external endpoints and host certificate directories
    pub discover_external: bool,
    pub send_mail: bool,
    /// Seconds between cycles, 0 means the engine default
    pub check_interval_seconds: u64,
    pub warning_threshold_days: u32,
    #[serde(
        deserialize_with = "deserialize_interval",
        serialize_with = "serialize_interval"
    )]
    pub email_cooldown: Duration,
    pub endpoints: Vec<String>,
    pub cert_dirs: Vec<PathBuf>,
}

impl Default for MonitorSpec {
    fn default() -> Self {
        Self {
            discover_internal: false,
            discover_external: false,
            send_mail: false,
            check_interval_seconds: 0,
            warning_threshold_days: DEFAULT_WARNING_THRESHOLD_DAYS,
            email_cooldown: Duration::from_secs(DEFAULT_EMAIL_COOLDOWN_SECS),
            endpoints: Vec::new(),
            cert_dirs: Vec::new(),
        }
    }
}

impl MonitorSpec {
    /// Source kinds this spec turns on
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        if self.discover_internal {
            kinds.push(SourceKind::Secret);
        }
        if self.discover_external {
            kinds.push(SourceKind::Endpoint);
            kinds.push(SourceKind::Filesystem);
        }
        kinds
    }

    /// Delay before the next cycle
    pub fn requeue_after(&self, default_interval: Duration) -> Duration {
        if self.check_interval_seconds == 0 {
            default_interval
        } else {
            Duration::from_secs(self.check_interval_seconds)
        }
    }

    /// Freeze the notification-related settings for one cycle
    pub fn cooldown_policy(&self) -> std::result::Result<CooldownPolicy, MonitorError> {
        let days = if self.warning_threshold_days == 0 {
            DEFAULT_WARNING_THRESHOLD_DAYS
        } else {
            self.warning_threshold_days
        };

        let cooldown_period = chrono::Duration::from_std(self.email_cooldown).map_err(|e| {
            MonitorError::config(format!(
                "email cooldown {:?} out of range: {}",
                self.email_cooldown, e
            ))
        })?;

        Ok(CooldownPolicy {
            warning_threshold: chrono::Duration::days(i64::from(days)),
            cooldown_period,
            notify_enabled: self.send_mail,
        })
    }
}

/// Notification policy for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub warning_threshold: chrono::Duration,
    pub cooldown_period: chrono::Duration,
    pub notify_enabled: bool,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            warning_threshold: chrono::Duration::days(i64::from(DEFAULT_WARNING_THRESHOLD_DAYS)),
            cooldown_period: chrono::Duration::seconds(DEFAULT_EMAIL_COOLDOWN_SECS as i64),
            notify_enabled: false,
        }
    }
}

/// Process-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub recipients: RecipientSettings,
    pub smtp: SmtpSettings,
    pub endpoint: EndpointSettings,
    pub filesystem: FilesystemSettings,
    pub monitors: Vec<MonitorDefinition>,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    #[serde(
        deserialize_with = "deserialize_interval",
        serialize_with = "serialize_interval"
    )]
    pub default_check_interval: Duration,
    pub persist_retry: RetryConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            persist_retry: RetryConfig::default(),
        }
    }
}

/// Where the recipient list lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipientSettings {
    pub config_map_namespace: String,
    pub config_map_name: String,
    pub key: String,
}

impl Default for RecipientSettings {
    fn default() -> Self {
        Self {
            config_map_namespace: "default".to_string(),
            config_map_name: "email-recipients-config".to_string(),
            key: "emails".to_string(),
        }
    }
}

/// SMTP transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
    pub timeout_seconds: u64,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            from_address: "certmon@localhost".to_string(),
            username: None,
            password: None,
            starttls: true,
            timeout_seconds: 30,
        }
    }
}

/// Endpoint probing timeouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub connect_timeout_seconds: u64,
    pub handshake_timeout_seconds: u64,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            handshake_timeout_seconds: 10,
        }
    }
}

/// Host filesystem scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemSettings {
    /// Namespace recorded for filesystem certificates
    pub node_name: String,
    /// File extensions considered certificates
    pub extensions: Vec<String>,
}

impl Default for FilesystemSettings {
    fn default() -> Self {
        Self {
            node_name: std::env::var("NODE_NAME").unwrap_or_else(|_| "localhost".to_string()),
            extensions: vec!["crt".to_string(), "pem".to_string(), "cer".to_string()],
        }
    }
}

/// A monitor driven by the standalone daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorDefinition {
    pub name: String,
    /// Seeded into the recipient config map
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub spec: MonitorSpec,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {:?}: {}", path.as_ref(), e)
        })?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

        fs::write(path.as_ref(), toml_str).map_err(|e| {
            anyhow::anyhow!("Failed to write config file {:?}: {}", path.as_ref(), e)
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = std::collections::HashSet::new();
        for monitor in &self.monitors {
            if monitor.name.trim().is_empty() {
                anyhow::bail!("Monitor name must not be empty");
            }
            if !names.insert(monitor.name.as_str()) {
                anyhow::bail!("Duplicate monitor name: {}", monitor.name);
            }
            monitor.spec.cooldown_policy()?;
        }

        if self.smtp.enabled && self.smtp.host.trim().is_empty() {
            anyhow::bail!("SMTP is enabled but no host is configured");
        }

        Ok(())
    }

    /// Example configuration with one monitor
    pub fn example() -> Self {
        Self {
            monitors: vec![MonitorDefinition {
                name: "cluster-certs".to_string(),
                recipients: vec!["ops@example.com".to_string()],
                spec: MonitorSpec {
                    discover_internal: true,
                    discover_external: true,
                    send_mail: true,
                    endpoints: vec!["https://example.com".to_string()],
                    cert_dirs: vec![PathBuf::from("/etc/kubernetes/pki")],
                    ..MonitorSpec::default()
                },
            }],
            ..Self::default()
        }
    }
}
