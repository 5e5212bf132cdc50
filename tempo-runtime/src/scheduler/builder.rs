use super::scheduler::Scheduler;
use crate::config::{load_toml_config, load_yaml_config, SchedulerSettings};
use crate::error::Result;
use config::Config;
use std::path::Path;
use tracing::info;

/// Builder for the scheduler
#[derive(Debug, Clone, Default)]
pub struct SchedulerBuilder {
    pub(crate) settings: SchedulerSettings,
}

impl SchedulerBuilder {
    /// Create a new scheduler builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with TOML config file. Environment overrides (`TEMPO_SCHEDULER__*`)
    /// are applied on top of the file.
    pub fn with_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = load_toml_config(path)?;
        Self::with_config(&config)
    }

    /// Create with YAML config file
    pub fn with_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = load_yaml_config(path)?;
        Self::with_config(&config)
    }

    /// Create with custom config, reading its `[scheduler]` table
    pub fn with_config(config: &Config) -> Result<Self> {
        Ok(Self {
            settings: SchedulerSettings::from_config(config)?,
        })
    }

    pub fn settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn poll_owner_state(mut self, enabled: bool) -> Self {
        self.settings.poll_owner_state = enabled;
        self
    }

    pub fn max_diagnostics(mut self, max: usize) -> Self {
        self.settings.max_diagnostics = max;
        self
    }

    /// Driver period in seconds.
    pub fn tick_rate(mut self, seconds: f64) -> Self {
        self.settings.tick_rate = seconds;
        self
    }

    pub fn max_delta(mut self, seconds: f64) -> Self {
        self.settings.max_delta = seconds;
        self
    }

    /// Build the scheduler (does not start a driver)
    ///
    /// ```rust
    /// use tempo_runtime::SchedulerBuilder;
    ///
    /// # fn main() -> Result<(), tempo_runtime::SchedulerError> {
    /// let scheduler = SchedulerBuilder::new()
    ///     .tick_rate(0.02)
    ///     .max_diagnostics(32)
    ///     .build()?;
    /// assert_eq!(scheduler.frame(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<Scheduler> {
        self.settings.validate()?;
        info!(
            poll_owner_state = self.settings.poll_owner_state,
            max_diagnostics = self.settings.max_diagnostics,
            tick_rate = self.settings.tick_rate,
            max_delta = self.settings.max_delta,
            "Building scheduler"
        );
        Ok(Scheduler::with_settings(self.settings))
    }
}
