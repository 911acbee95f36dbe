//! Signal-processing configuration shared by all processors of one module.
//!
//! Settings are written only while the module is
//! [`Initializing`](crate::ModuleState::Initializing). Each mutation publishes
//! a fresh [`SpSettings`] through an [`ArcSwap`]; processors take a snapshot
//! at creation and never see later changes.

use crate::channel::SampleFormat;
use crate::error::{Error, Result};
use crate::link::{BufferMode, LinkDirection, WorkingFlags};
use crate::mode::MutePolicy;
use crate::module::ModuleContext;
use crate::report::{Component, Severity, raise};
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Immutable snapshot of the signal-processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpSettings {
    /// Sample rates the algorithm accepts. Empty means any rate.
    pub allowed_sample_rates: Vec<u32>,
    /// Direction the algorithm works on.
    pub working_channel: LinkDirection,
    /// Modifier on the working channel.
    pub working_flags: WorkingFlags,
    /// Sample format handed to the algorithm.
    pub datatype: SampleFormat,
    /// Whether muted processors keep running the algorithm.
    pub mute_policy: MutePolicy,
}

impl SpSettings {
    /// Directions intercepted under these settings.
    pub fn buffer_mode(&self) -> BufferMode {
        BufferMode::derive(self.working_channel, self.working_flags)
    }

    /// Whether `rate` is in the allowed set.
    pub fn is_sample_rate_allowed(&self, rate: u32) -> bool {
        self.allowed_sample_rates.contains(&rate)
    }

    /// Whether a stream at `rate` may be processed: the allowed set is empty
    /// or contains `rate`.
    pub fn permits(&self, rate: u32) -> bool {
        self.allowed_sample_rates.is_empty() || self.is_sample_rate_allowed(rate)
    }
}

/// Module-wide signal-processing configuration.
pub struct SignalProcessingConfig {
    settings: ArcSwap<SpSettings>,
    module: Arc<ModuleContext>,
}

impl SignalProcessingConfig {
    /// Create a configuration with default settings (no link, I16 samples).
    pub fn new(module: Arc<ModuleContext>) -> Self {
        Self {
            settings: ArcSwap::from_pointee(SpSettings::default()),
            module,
        }
    }

    // ── Mutators (initialization only) ──

    /// Replace the allowed sample-rate set.
    ///
    /// If the new set cannot be stored, the set is left empty and
    /// `AllocationFailed` is returned.
    pub fn allow_sample_rates(&self, rates: &[u32]) -> Result<()> {
        self.require_initializing("allow_sample_rates")?;
        if let Some(zero) = rates.iter().position(|&r| r == 0) {
            return Err(self.fail(
                Error::invalid_argument(format!("sample rate at index {zero} is zero")),
                Severity::Error,
            ));
        }

        let mut allowed = Vec::new();
        if let Err(e) = allowed.try_reserve_exact(rates.len()) {
            self.update(|s| s.allowed_sample_rates.clear());
            return Err(self.fail(
                Error::allocation_failed(format!("allowed sample rates: {e}")),
                Severity::Critical,
            ));
        }
        allowed.extend_from_slice(rates);
        self.update(|s| s.allowed_sample_rates = allowed);
        Ok(())
    }

    /// Select the working channel and its flags.
    pub fn set_working_channel(&self, channel: LinkDirection, flags: WorkingFlags) -> Result<()> {
        self.require_initializing("set_working_channel")?;
        self.update(|s| {
            s.working_channel = channel;
            s.working_flags = flags;
        });
        Ok(())
    }

    /// Select the sample format handed to the algorithm.
    pub fn set_datatype(&self, datatype: SampleFormat) -> Result<()> {
        self.require_initializing("set_datatype")?;
        self.update(|s| s.datatype = datatype);
        Ok(())
    }

    /// Select what muted processors do with the algorithm.
    pub fn set_mute_policy(&self, policy: MutePolicy) -> Result<()> {
        self.require_initializing("set_mute_policy")?;
        self.update(|s| s.mute_policy = policy);
        Ok(())
    }

    // ── Readers ──

    /// Current settings snapshot.
    pub fn snapshot(&self) -> Arc<SpSettings> {
        self.settings.load_full()
    }

    /// Whether `rate` is in the allowed set.
    pub fn is_sample_rate_allowed(&self, rate: u32) -> bool {
        self.settings.load().is_sample_rate_allowed(rate)
    }

    /// Allowed sample rates.
    pub fn allowed_sample_rates(&self) -> Vec<u32> {
        self.settings.load().allowed_sample_rates.clone()
    }

    /// Working channel and flags.
    pub fn working_channel(&self) -> (LinkDirection, WorkingFlags) {
        let s = self.settings.load();
        (s.working_channel, s.working_flags)
    }

    /// Configured sample format.
    pub fn datatype(&self) -> SampleFormat {
        self.settings.load().datatype
    }

    /// Configured mute policy.
    pub fn mute_policy(&self) -> MutePolicy {
        self.settings.load().mute_policy
    }

    /// Directions intercepted under the current settings.
    pub fn buffer_mode(&self) -> BufferMode {
        self.settings.load().buffer_mode()
    }

    fn update(&self, f: impl FnOnce(&mut SpSettings)) {
        let mut next = SpSettings::clone(&self.settings.load());
        f(&mut next);
        self.settings.store(Arc::new(next));
    }

    #[track_caller]
    fn require_initializing(&self, op: &str) -> Result<()> {
        self.module.require_initializing(op, Component::SpConfig)
    }

    #[track_caller]
    fn fail(&self, error: Error, severity: Severity) -> Error {
        raise(self.module.errors().as_ref(), error, severity, Component::SpConfig)
    }
}

impl std::fmt::Debug for SignalProcessingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalProcessingConfig")
            .field("settings", &*self.settings.load())
            .finish_non_exhaustive()
    }
}
