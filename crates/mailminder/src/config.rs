//! Daemon configuration loading and defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Minutes between scheduled processing cycles.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Ceiling on emails fetched per cycle, split across ready sources.
    #[serde(default = "default_max_emails_per_scan")]
    pub max_emails_per_scan: usize,

    /// Reminder-creation attempts before an item is dropped from the queue.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Extractions scoring below this confidence never reach the sink.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: u8,

    /// Per-provider enable flags. Providers absent from the map are enabled.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Where the daemon persists its state. Defaults to the platform data dir.
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    #[serde(default)]
    pub defaults: ReminderDefaults,
}

fn default_interval_minutes() -> u64 {
    30
}

fn default_max_emails_per_scan() -> usize {
    50
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_min_confidence() -> u8 {
    25
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            max_emails_per_scan: default_max_emails_per_scan(),
            retry_attempts: default_retry_attempts(),
            min_confidence: default_min_confidence(),
            providers: HashMap::new(),
            state_path: None,
            defaults: ReminderDefaults::default(),
        }
    }
}

impl DaemonConfig {
    /// Returns the polling interval as a `Duration`.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_minutes * 60)
    }

    /// Whether a provider participates in processing. Providers without an
    /// explicit entry are enabled.
    pub fn provider_enabled(&self, provider: &str) -> bool {
        self.providers.get(provider).map_or(true, |p| p.enabled)
    }

    /// Resolves the state file path, falling back to the platform data dir.
    pub fn resolved_state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("mailminder")
                .join("state.json")
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_minutes == 0 {
            return Err(ConfigError::Validation {
                message: "intervalMinutes must be greater than zero".to_string(),
            });
        }
        if self.retry_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "retryAttempts must be greater than zero".to_string(),
            });
        }
        if self.min_confidence > 100 {
            return Err(ConfigError::Validation {
                message: "minConfidence must be between 0 and 100".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Fallbacks used when a rule's reminder template leaves a knob unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDefaults {
    /// Task list reminders land on when a rule does not name one.
    #[serde(default = "default_list")]
    pub list: String,

    /// Wall-clock time for reminder due dates, HH:MM.
    #[serde(default = "default_time_of_day")]
    pub time_of_day: String,
}

fn default_list() -> String {
    "Reminders".to_string()
}

fn default_time_of_day() -> String {
    "09:00".to_string()
}

impl Default for ReminderDefaults {
    fn default() -> Self {
        Self {
            list: default_list(),
            time_of_day: default_time_of_day(),
        }
    }
}

/// Loads configuration from a JSON file. A missing file yields defaults.
pub fn load_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(DaemonConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config: DaemonConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}
