//! TOML-based application configuration.
//!
//! Stored at `~/.config/fmxmirror/config.toml`. The API key can be kept out
//! of the file and supplied via `FMXMIRROR_API_KEY` instead, which matches
//! how the tool is deployed under cron.
//!
//! Everything here is an immutable value constructed once at startup and
//! passed to the collaborators that need it; nothing reads or mutates
//! endpoint state at process scope.

use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `remote.api_key`.
pub const API_KEY_ENV: &str = "FMXMIRROR_API_KEY";

const CONFIG_FILE: &str = "config.toml";

/// The FMX deployment events are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,

    /// IANA zone the source calendar renders its times in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Custom field ids appended to the agenda request, if the deployment
    /// exposes extra fields that way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<String>,
}

impl SourceConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(self.timezone.clone()))
    }
}

/// The Employee App calendar API events are mirrored into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    /// Calendar the mirrored events are created in.
    pub calendar_id: String,

    /// Access groups granted on created events.
    #[serde(default)]
    pub access_groups: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where the sync ledger lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Defaults to `<data dir>/fmxmirror.db` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl LedgerConfig {
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("fmxmirror.db")),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl Config {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join(CONFIG_FILE))
    }

    /// Load, apply the environment override, and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_lenient()?;
        config.validate()?;
        Ok(config)
    }

    /// Load without validating; used by `config show` so a half-filled
    /// file can still be inspected.
    pub fn load_lenient() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.remote.api_key = key;
            }
        }
        Ok(config)
    }

    /// Parse a config file. Does not consult the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("source.base_url", &self.source.base_url)?;
        validate_url("remote.base_url", &self.remote.base_url)?;
        self.source.tz()?;
        if self.remote.api_key.is_empty() {
            return Err(ConfigError::MissingKey(format!(
                "remote.api_key (or {API_KEY_ENV})"
            )));
        }
        if self.remote.calendar_id.is_empty() {
            return Err(ConfigError::MissingKey("remote.calendar_id".into()));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "remote.timeout_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Template written by `config init`.
    pub fn default_toml() -> &'static str {
        r#"# fmxmirror configuration

[source]
# Base URL of the FMX deployment events are read from.
base_url = "https://example.gofmx.com"
# IANA time zone the source calendar renders its times in.
timezone = "America/New_York"
# Custom field ids appended to the agenda request (optional).
# custom_fields = "220653"

[remote]
# Base URL of the Employee App API.
base_url = "https://api.theemployeeapp.com/v2"
# API key; the FMXMIRROR_API_KEY environment variable overrides this.
api_key = ""
# Calendar the mirrored events are created in.
calendar_id = ""
# Access groups granted on created events.
access_groups = []
# Per-request timeout in seconds.
# timeout_secs = 30

[ledger]
# SQLite database path; defaults to ~/.config/fmxmirror/fmxmirror.db
# path = "/var/lib/fmxmirror/fmxmirror.db"
"#
    }
}

fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        key: key.into(),
        message: e.to_string(),
    })?;
    Ok(())
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Returns `~/.config/fmxmirror/`, creating it if needed.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fmxmirror");

    fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
