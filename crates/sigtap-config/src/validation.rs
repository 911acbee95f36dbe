//! Module configuration validation.
//!
//! Checks that cannot be expressed in the TOML schema itself: rates must be
//! non-zero and unique, and catching both links needs a working channel to
//! start from.
//!
//! # Example
//!
//! ```rust
//! use sigtap_config::{ModuleConfig, ValidationError, validate_module_config};
//!
//! let mut config = ModuleConfig::new("mod_gain");
//! config.processing.allowed_sample_rates = vec![8000, 8000];
//!
//! assert_eq!(
//!     validate_module_config(&config),
//!     Err(ValidationError::DuplicateSampleRate(8000))
//! );
//! ```

use crate::module_config::{ModuleConfig, ProcessingConfig};
use sigtap_core::{LinkDirection, WorkingFlags};
use thiserror::Error;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The module name is empty.
    #[error("module name is empty")]
    EmptyName,

    /// A listed sample rate is zero.
    #[error("allowed sample rate is zero")]
    ZeroSampleRate,

    /// A sample rate is listed more than once.
    #[error("sample rate {0} is listed more than once")]
    DuplicateSampleRate(u32),

    /// `catch_both_links` without a working channel intercepts nothing.
    #[error("working flags catch_both_links require a working channel")]
    BothLinksWithoutChannel,

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate the processing table.
pub fn validate_processing(processing: &ProcessingConfig) -> ValidationResult<()> {
    collapse(processing_errors(processing))
}

/// Validate a whole module configuration.
///
/// Every problem is collected; more than one is returned as
/// [`ValidationError::Multiple`].
pub fn validate_module_config(config: &ModuleConfig) -> ValidationResult<()> {
    let mut errors = Vec::new();
    if config.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
    }
    errors.extend(processing_errors(&config.processing));
    collapse(errors)
}

fn processing_errors(processing: &ProcessingConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let rates = &processing.allowed_sample_rates;

    if rates.contains(&0) {
        errors.push(ValidationError::ZeroSampleRate);
    }
    for (i, &rate) in rates.iter().enumerate() {
        if rate != 0 && rates[..i].contains(&rate) && !errors.contains(&ValidationError::DuplicateSampleRate(rate)) {
            errors.push(ValidationError::DuplicateSampleRate(rate));
        }
    }
    if processing.working_channel == LinkDirection::NoLink
        && processing.working_flags == WorkingFlags::CatchBothLinks
    {
        errors.push(ValidationError::BothLinksWithoutChannel);
    }
    errors
}

fn collapse(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}
