//! Device connection settings supplied by the caller.
//!
//! Settings come from a TOML document, optionally overlaid with `VIGI_*`
//! environment variables. Nothing here is ever written back to disk.
//!
//! ```toml
//! address = "192.168.0.60"
//! username = "admin"
//! password = "123456"
//! control_timeout_secs = 5
//! upload_timeout_secs = 15
//!
//! [defaults]
//! volume = 30
//! sound_id = 1
//! base_slot = 101
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONTROL_PORT: u16 = 443;
const DEFAULT_CONTROL_TIMEOUT_SECS: u64 = 5;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Values pushed to the device when the alarm baseline is established, plus
/// the caller-facing defaults for manual alarms and slot synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AlarmDefaults {
    pub baseline_volume: u8,
    pub baseline_alarm_type: u32,
    pub volume: u8,
    pub sound_id: u32,
    pub base_slot: u32,
}

impl Default for AlarmDefaults {
    fn default() -> Self {
        Self {
            baseline_volume: 10,
            baseline_alarm_type: 1,
            volume: 30,
            sound_id: 1,
            base_slot: 101,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_control_timeout")]
    pub control_timeout_secs: u64,
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    /// Scheme and authority used instead of `https://{address}:{port}`.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub defaults: AlarmDefaults,
}

fn default_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_control_timeout() -> u64 {
    DEFAULT_CONTROL_TIMEOUT_SECS
}

fn default_upload_timeout() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT_SECS
}

impl DeviceConfig {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_CONTROL_PORT,
            username: username.into(),
            password: password.into(),
            control_timeout_secs: DEFAULT_CONTROL_TIMEOUT_SECS,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            base_url: None,
            defaults: AlarmDefaults::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Overlays `VIGI_ADDRESS`, `VIGI_PORT`, `VIGI_USERNAME` and `VIGI_PASSWORD`.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("VIGI_ADDRESS") {
            self.address = address;
        }
        if let Some(port) = lookup("VIGI_PORT") {
            self.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("VIGI_PORT is not a port: {port}")))?;
        }
        if let Some(username) = lookup("VIGI_USERNAME") {
            self.username = username;
        }
        if let Some(password) = lookup("VIGI_PASSWORD") {
            self.password = password;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("device address is empty".into()));
        }
        if self.username.is_empty() {
            return Err(ConfigError::Invalid("username is empty".into()));
        }
        if self.defaults.volume > 100 || self.defaults.baseline_volume > 100 {
            return Err(ConfigError::Invalid("default volume must be within 0..=100".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}", self.address, self.port),
        }
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("control_timeout_secs", &self.control_timeout_secs)
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("base_url", &self.base_url)
            .field("defaults", &self.defaults)
            .finish()
    }
}
