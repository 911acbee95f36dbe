//! Module configuration file.

use crate::error::ConfigError;
use crate::validation::{ValidationResult, validate_module_config};
use serde::{Deserialize, Serialize};
use sigtap_core::{
    App, LinkDirection, MutePolicy, SampleFormat, SignalProcessingConfig, WorkingFlags,
};
use std::path::Path;

/// Configuration of one signal-processing module.
///
/// ```toml
/// name = "mod_gain"
/// version = "1.0.0"
///
/// [processing]
/// allowed_sample_rates = [8000, 16000]
/// working_channel = "uplink"
/// mute_policy = "process_discard"
///
/// [logging]
/// filter = "sigtap_core=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Module name, e.g. `mod_gain`.
    pub name: String,

    /// One-line description of the app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// App version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Usage syntax of the app's arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax: Option<String>,

    /// Signal-processing settings.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Logging settings for hosts that install a subscriber.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The `[processing]` table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Accepted sample rates; empty accepts any.
    pub allowed_sample_rates: Vec<u32>,
    /// Direction the algorithm works on.
    pub working_channel: LinkDirection,
    /// Modifier on the working channel.
    pub working_flags: WorkingFlags,
    /// Sample format handed to the algorithm.
    pub datatype: SampleFormat,
    /// Behavior of muted processors.
    pub mute_policy: MutePolicy,
}

/// The `[logging]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ModuleConfig {
    /// Create a configuration with default processing settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
            syntax: None,
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the working channel and flags.
    pub fn with_working_channel(mut self, channel: LinkDirection, flags: WorkingFlags) -> Self {
        self.processing.working_channel = channel;
        self.processing.working_flags = flags;
        self
    }

    /// Set the allowed sample rates.
    pub fn with_sample_rates(mut self, rates: impl IntoIterator<Item = u32>) -> Self {
        self.processing.allowed_sample_rates = rates.into_iter().collect();
        self
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config: ModuleConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), module = %config.name, "loaded module config");
        Ok(config)
    }

    /// Load a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_module_config(self)
    }

    /// Write the `[processing]` table into `config`.
    ///
    /// The configuration is validated first. The owning module must still be
    /// initializing, otherwise the core rejects the first setter.
    pub fn apply(&self, config: &SignalProcessingConfig) -> Result<(), ConfigError> {
        self.validate()?;
        let p = &self.processing;
        config.allow_sample_rates(&p.allowed_sample_rates)?;
        config.set_working_channel(p.working_channel, p.working_flags)?;
        config.set_datatype(p.datatype)?;
        config.set_mute_policy(p.mute_policy)?;
        tracing::debug!(
            module = %self.name,
            buffer_mode = ?config.buffer_mode(),
            "applied processing config"
        );
        Ok(())
    }

    /// Apply metadata and processing settings to `app`.
    pub fn apply_to_app<H: Send + 'static>(&self, app: &App<H>) -> Result<(), ConfigError> {
        self.apply(app.config())?;
        if let Some(version) = &self.version {
            app.set_version(version.as_str())?;
        }
        if let Some(description) = &self.description {
            app.set_description(description.as_str())?;
        }
        if let Some(syntax) = &self.syntax {
            app.set_syntax(syntax.as_str())?;
        }
        Ok(())
    }
}
