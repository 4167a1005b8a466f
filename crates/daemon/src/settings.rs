//! Daemon settings
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `RESERVO__SECTION__KEY` environment overrides.

use clap::Parser;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "RESERVO";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_DB_URL: &str = "sqlite://~/.reservo/reservo.db";
const MAX_RETRY_BASE_DELAY_SECS: i64 = 86_400;

#[derive(Debug, Parser)]
#[command(name = "reservo", version, about = "Reservo booking daemon")]
pub struct Cli {
    /// Path to a TOML settings file
    #[arg(short, long, env = "RESERVO_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DB_URL.to_string(),
        }
    }
}

impl DatabaseSettings {
    /// URL with a leading `~` expanded
    pub fn expanded_url(&self) -> String {
        match self.url.strip_prefix("sqlite://") {
            Some(path) => format!("sqlite://{}", shellexpand::tilde(path)),
            None => shellexpand::tilde(&self.url).into_owned(),
        }
    }

    /// Parent directory of a file database, if any
    pub fn file_parent(&self) -> Option<PathBuf> {
        let url = self.expanded_url();
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(&url);
        if path.is_empty() || path.starts_with(':') {
            return None;
        }
        let path = path.split('?').next().unwrap_or(path);
        Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9640,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub poll_interval_ms: u64,
    pub batch_size: u32,
    pub min_lead_secs: i64,
    pub max_attempts: u32,
    pub reminder_base_delay_secs: i64,
    pub workers: usize,
    pub recovery_window_secs: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            batch_size: 16,
            min_lead_secs: 5,
            max_attempts: 3,
            reminder_base_delay_secs: 60,
            workers: 1,
            recovery_window_secs: 300,
        }
    }
}

impl SchedulerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSettings {
    pub hook_timeout_ms: u64,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            hook_timeout_ms: 2000,
        }
    }
}

/// Without an endpoint, emails are logged instead of sent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub api_key: String,
    pub from: String,
    pub timeout_secs: u64,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: String::new(),
            from: "noreply@reservo.local".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingSettings {
    pub interval_secs: u64,
    pub job_retention_days: i64,
}

impl Default for HousekeepingSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            job_retention_days: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Also write daily-rotated JSON files here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub rpc: RpcSettings,
    pub scheduler: SchedulerSettings,
    pub booking: BookingSettings,
    pub mail: MailSettings,
    pub housekeeping: HousekeepingSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load from defaults, `path` and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// `env` replaces the process environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.workers == 0 {
            return Err(ConfigError::Message("scheduler.workers must be at least 1".into()));
        }
        if self.scheduler.max_attempts == 0 {
            return Err(ConfigError::Message(
                "scheduler.max_attempts must be at least 1".into(),
            ));
        }
        if self.housekeeping.interval_secs == 0 {
            return Err(ConfigError::Message(
                "housekeeping.interval_secs must be at least 1".into(),
            ));
        }
        if !(0..=MAX_RETRY_BASE_DELAY_SECS).contains(&self.scheduler.reminder_base_delay_secs) {
            return Err(ConfigError::Message(format!(
                "scheduler.reminder_base_delay_secs must be between 0 and {}",
                MAX_RETRY_BASE_DELAY_SECS
            )));
        }
                if self.scheduler.batch_size == 0 {
            return Err(ConfigError::Message("scheduler.batch_size must be at least 1".into()));
        }
        Ok(())
    }
}
