use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

use crate::error::{Result, SchedulerError};
use crate::time_unit::TimeUnit;

/// Prefix of environment overrides, e.g. `TEMPO_SCHEDULER__TICK_RATE=8ms`.
const ENV_PREFIX: &str = "TEMPO";

/// Table the scheduler reads its settings from.
const SETTINGS_KEY: &str = "scheduler";

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Load config from a specific TOML file
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
        .add_source(environment())
        .build()?;
    Ok(config)
}

/// Load config from a specific YAML file
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
        .add_source(environment())
        .build()?;
    Ok(config)
}

/// Settings as they appear in a config file, before durations are parsed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawSettings {
    poll_owner_state: bool,
    max_diagnostics: usize,
    tick_rate: String,
    max_delta: String,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            poll_owner_state: true,
            max_diagnostics: 256,
            tick_rate: "16ms".to_string(),
            max_delta: "250ms".to_string(),
        }
    }
}

/// Runtime settings of a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    /// Ask each owner's collaborator for its state before every tick.
    pub poll_owner_state: bool,
    /// Diagnostics kept before the oldest are dropped. Zero disables them.
    pub max_diagnostics: usize,
    /// Period of the tokio driver, in seconds.
    pub tick_rate: f64,
    /// Largest delta the driver reports for one tick, in seconds.
    pub max_delta: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_owner_state: true,
            max_diagnostics: 256,
            tick_rate: 0.016,
            max_delta: 0.25,
        }
    }
}

impl SchedulerSettings {
    /// Read the `[scheduler]` table. A missing table yields the defaults.
    pub fn from_config(config: &Config) -> Result<Self> {
        let raw = match config.get::<RawSettings>(SETTINGS_KEY) {
            Ok(raw) => raw,
            Err(ConfigError::NotFound(_)) => RawSettings::default(),
            Err(e) => return Err(e.into()),
        };

        let settings = Self {
            poll_owner_state: raw.poll_owner_state,
            max_diagnostics: raw.max_diagnostics,
            tick_rate: parse_duration_setting("tick_rate", &raw.tick_rate)?,
            max_delta: parse_duration_setting("max_delta", &raw.max_delta)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_duration("tick_rate", self.tick_rate)?;
        check_duration("max_delta", self.max_delta)?;
        Ok(())
    }
}

fn parse_duration_setting(key: &'static str, value: &str) -> Result<f64> {
    TimeUnit::parse_seconds(value).ok_or_else(|| SchedulerError::InvalidSetting {
        key,
        value: value.to_string(),
    })
}

fn check_duration(key: &'static str, seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(())
    } else {
        Err(SchedulerError::InvalidSetting {
            key,
            value: seconds.to_string(),
        })
    }
}
