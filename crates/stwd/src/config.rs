//! TOML-based daemon configuration.
//!
//! Stored at `~/.config/stw/config.toml`. Every field is optional; a
//! missing file at the default location yields the defaults.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stw_core::ResetHour;
use thiserror::Error;

use crate::monitor::MonitorConfig;
use crate::supervisor::RetryPolicy;

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "STW_SOCKET";

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/stw.sock";

const MAX_LOOKBACK_SECS: u64 = 86_400;

/// Retention must cover a full daily window.
const MIN_RETENTION_HOURS: u64 = 24;
const MAX_RETENTION_HOURS: u64 = 24 * 366;

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Local hour at which the daily window restarts.
    #[serde(default)]
    pub reset_hour: ResetHour,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How far back foreground detection looks for transitions.
    #[serde(default = "default_foreground_lookback_secs")]
    pub foreground_lookback_secs: u64,
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    #[serde(default)]
    pub limits_path: Option<PathBuf>,
    /// Applications treated as the home screen.
    #[serde(default)]
    pub launchers: Vec<String>,
    /// Command bringing the home screen to the front.
    #[serde(default = "default_home_command")]
    pub home_command: Vec<String>,
    /// Breach notification command; `{app}`, `{used}` and `{budget}` are
    /// substituted in every argument.
    #[serde(default = "default_notify_command")]
    pub notify_command: Vec<String>,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// How long recorded transitions are kept.
    #[serde(default = "default_journal_retention_hours")]
    pub journal_retention_hours: u64,
}

fn default_tick_interval_ms() -> u64 {
    3_000
}
fn default_foreground_lookback_secs() -> u64 {
    60
}
fn default_home_command() -> Vec<String> {
    vec!["wmctrl".into(), "-k".into(), "on".into()]
}
fn default_notify_command() -> Vec<String> {
    vec![
        "notify-send".into(),
        "Time Limit Reached for {app}".into(),
        "Used for {used} minutes. Limit was {budget} minutes.".into(),
    ]
}
fn default_retry_initial_delay_ms() -> u64 {
    1_000
}
fn default_retry_max_delay_ms() -> u64 {
    60_000
}
fn default_journal_retention_hours() -> u64 {
    48
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reset_hour: ResetHour::default(),
            tick_interval_ms: default_tick_interval_ms(),
            foreground_lookback_secs: default_foreground_lookback_secs(),
            socket_path: None,
            limits_path: None,
            launchers: Vec::new(),
            home_command: default_home_command(),
            notify_command: default_notify_command(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            journal_retention_hours: default_journal_retention_hours(),
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("stw").join("config.toml"))
    }

    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// used and a missing file yields [`Config::default`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_str(&content).map_err(|e| match e {
                ConfigError::Parse { message, .. } => ConfigError::Parse { path, message },
                other => other,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io {
                path,
                message: e.to_string(),
            }),
        }
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.foreground_lookback_secs == 0 || self.foreground_lookback_secs > MAX_LOOKBACK_SECS {
            return Err(ConfigError::Invalid {
                field: "foreground_lookback_secs",
                message: format!("must be between 1 and {MAX_LOOKBACK_SECS}"),
            });
        }
        if self.journal_retention_hours < MIN_RETENTION_HOURS
            || self.journal_retention_hours > MAX_RETENTION_HOURS
        {
            return Err(ConfigError::Invalid {
                field: "journal_retention_hours",
                message: format!("must be between {MIN_RETENTION_HOURS} and {MAX_RETENTION_HOURS}"),
            });
        }
        if self.retry_initial_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry_initial_delay_ms",
                message: format!("must not exceed retry_max_delay_ms ({})", self.retry_max_delay_ms),
            });
        }
        Ok(())
    }

    /// Socket path: `STW_SOCKET`, then the config file, then the default.
    pub fn socket_path(&self) -> PathBuf {
        std::env::var_os(SOCKET_ENV)
            .map(PathBuf::from)
            .or_else(|| self.socket_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
    }

    /// Limits file path, defaulting to `~/.local/share/stw/limits.json`.
    pub fn limits_path(&self) -> PathBuf {
        self.limits_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("stw")
                .join("limits.json")
        })
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            reset_hour: self.reset_hour,
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            foreground_lookback: chrono::Duration::seconds(
                self.foreground_lookback_secs.min(MAX_LOOKBACK_SECS) as i64,
            ),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn journal_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.journal_retention_hours.clamp(MIN_RETENTION_HOURS, MAX_RETENTION_HOURS) as i64)
    }
}

/// Errors from loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reset_hour.get(), 5);
        assert_eq!(config.tick_interval_ms, 3_000);
        assert_eq!(config.foreground_lookback_secs, 60);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_toml_str(
            r#"
            reset_hour = 4
            tick_interval_ms = 500
            launchers = ["org.gnome.Shell"]
            home_command = []
            "#,
        )
        .unwrap();
        assert_eq!(config.reset_hour.get(), 4);
        assert_eq!(config.monitor_config().tick_interval, Duration::from_millis(500));
        assert_eq!(config.launchers, vec!["org.gnome.Shell".to_string()]);
        assert!(config.home_command.is_empty());
    }

    #[test]
    fn test_invalid_reset_hour_rejected() {
        assert!(matches!(
            Config::from_toml_str("reset_hour = 24"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(
            Config::from_toml_str("tick_interval_ms = 0"),
            Err(ConfigError::Invalid { field: "tick_interval_ms", .. })
        ));
    }

    #[test]
    fn test_retention_shorter_than_a_day_rejected() {
        assert!(matches!(
            Config::from_toml_str("journal_retention_hours = 12"),
            Err(ConfigError::Invalid { field: "journal_retention_hours", .. })
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_toml_str("reset_hours = 4").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_from_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "reset_hour = \"five\"").unwrap();

        match Config::load(Some(&path)) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected parse error, got {other:?}"),
        }
    }
}
