//! TOML configuration for sigtap signal-processing modules.
//!
//! A [`ModuleConfig`] names the module, carries the app metadata, and holds
//! the `[processing]` settings that are written into a module's
//! [`SignalProcessingConfig`](sigtap_core::SignalProcessingConfig) while it
//! is still initializing.
//!
//! # Example
//!
//! ```rust,no_run
//! use sigtap_config::ModuleConfig;
//! use sigtap_core::{LinkDirection, WorkingFlags};
//!
//! let config = ModuleConfig::new("mod_gain")
//!     .with_description("Fixed gain on the caller's voice")
//!     .with_working_channel(LinkDirection::Uplink, WorkingFlags::Default)
//!     .with_sample_rates([8000, 16000]);
//!
//! config.save("/etc/sigtap/modules/mod_gain.toml").unwrap();
//! let loaded = ModuleConfig::load("/etc/sigtap/modules/mod_gain.toml").unwrap();
//! assert_eq!(loaded, config);
//! ```

mod error;
mod module_config;

/// Platform-specific locations of module configuration files.
#[cfg(feature = "std")]
pub mod paths;

/// Module configuration validation.
pub mod validation;

pub use error::ConfigError;
pub use module_config::{LoggingConfig, ModuleConfig, ProcessingConfig};
#[cfg(feature = "std")]
pub use paths::{find_module_config, load_module_config, user_modules_dir};
pub use validation::{
    ValidationError, ValidationResult, validate_module_config, validate_processing,
};
