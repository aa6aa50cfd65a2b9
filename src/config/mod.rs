// Configuration module

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::monitor::MonitorSettings;

/// Prefix for every environment variable read into [`Settings`].
const ENV_PREFIX: &str = "PATCHSCOUT";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub environment: Environment,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl Settings {
    /// Load settings from `.env` (if present) and `PATCHSCOUT_*` variables.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::build(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Load settings from an explicit variable map instead of the process environment.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, SettingsError> {
        Self::build(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(Some(vars)),
        )
    }

    fn build(source: config::Environment) -> Result<Self, SettingsError> {
        let defaults = Settings::default();
        let settings: Settings = config::Config::builder()
            .set_default("api_base_url", defaults.api_base_url)?
            .set_default("poll_interval_secs", defaults.poll_interval_secs)?
            .set_default("max_polls", u64::from(defaults.max_polls))?
            .set_default("request_timeout_secs", defaults.request_timeout_secs)?
            .set_default("connect_timeout_secs", defaults.connect_timeout_secs)?
            .set_default("environment", "development")?
            .add_source(source)
            .build()?
            .try_deserialize()?;

        if settings.poll_interval_secs == 0 {
            return Err(SettingsError::Zero("poll_interval_secs"));
        }
        if settings.max_polls == 0 {
            return Err(SettingsError::Zero("max_polls"));
        }
        Ok(settings)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            poll_interval_secs: 5,
            max_polls: 60,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            environment: Environment::Development,
        }
    }
}
