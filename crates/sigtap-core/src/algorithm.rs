//! The contract between the framework and a pluggable algorithm.
//!
//! An algorithm is a set of capabilities operating on an opaque per-processor
//! handle `H`. The framework guarantees, per processor:
//!
//! - `construct` runs once, when the host attaches the stream.
//! - `initialize` runs exactly once, before the first `process`.
//! - `process` runs on the media thread, once per intercepted frame, only
//!   while the processor is `Processing` and its mode allows it.
//! - `terminate` runs exactly once, after the last `process`.
//! - `destruct` (or a plain drop of the handle) runs last.
//! - `update`, if provided, runs between frames when requested.
//!
//! `process` is real-time: it must not block, allocate, or panic.
//!
//! Two ways to provide an algorithm:
//!
//! - implement [`Algorithm`] on the handle type and use
//!   [`AlgorithmPluginBuilder::from_algorithm`], or
//! - fill an [`AlgorithmPluginBuilder`] with closures.
//!
//! # Example
//!
//! ```rust
//! use sigtap_core::{AlgorithmPluginBuilder, AudioFrame, ChannelModel};
//!
//! struct Invert;
//!
//! let plugin = AlgorithmPluginBuilder::<Invert>::new()
//!     .construct(|_: &ChannelModel, _: &str| Ok(Invert))
//!     .initialize(|_, _| Ok(()))
//!     .process(|_, frame: &mut AudioFrame<'_>, _| {
//!         for s in frame.samples_mut() {
//!             *s = s.saturating_neg();
//!         }
//!     })
//!     .terminate(|_| Ok(()))
//!     .build()
//!     .unwrap();
//! assert!(!plugin.supports_update());
//! ```

use crate::channel::ChannelModel;
use crate::error::{Error, Result};
use crate::frame::AudioFrame;
use std::fmt;

/// How a requested update is executed relative to frame processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ExecMode {
    /// No synchronization with `process` is promised.
    #[default]
    Async = 0,
    /// The processor enters `Updating`; no `process` call is in flight.
    Sync = 1,
}

type ConstructFn<H> = dyn Fn(&ChannelModel, &str) -> Result<H> + Send + Sync;
type InitializeFn<H> = dyn Fn(&mut H, &ChannelModel) -> Result<()> + Send + Sync;
type ProcessFn<H> = dyn Fn(&mut H, &mut AudioFrame<'_>, &ChannelModel) + Send + Sync;
type TerminateFn<H> = dyn Fn(&mut H) -> Result<()> + Send + Sync;
type DestructFn<H> = dyn Fn(H) + Send + Sync;
type UpdateFn<H> = dyn Fn(&mut H, ExecMode) + Send + Sync;

/// An algorithm implemented directly on its handle type.
pub trait Algorithm: Send + Sized + 'static {
    /// Update execution mode, or `None` if the algorithm takes no updates.
    const UPDATE: Option<ExecMode> = None;

    /// Create a handle for the stream described by `model`.
    ///
    /// `args` is the free-form argument string given when the instance was
    /// produced.
    fn construct(model: &ChannelModel, args: &str) -> Result<Self>;

    /// Prepare for processing.
    fn initialize(&mut self, _model: &ChannelModel) -> Result<()> {
        Ok(())
    }

    /// Process one frame in place.
    fn process(&mut self, frame: &mut AudioFrame<'_>, model: &ChannelModel);

    /// Stop processing.
    fn terminate(&mut self) -> Result<()> {
        Ok(())
    }

    /// Apply a pending update.
    fn update(&mut self, _exec: ExecMode) {}
}

/// Capability table for one algorithm, shared by every processor of a module.
pub struct AlgorithmPlugin<H> {
    pub(crate) construct: Box<ConstructFn<H>>,
    pub(crate) initialize: Box<InitializeFn<H>>,
    pub(crate) process: Box<ProcessFn<H>>,
    pub(crate) terminate: Box<TerminateFn<H>>,
    pub(crate) destruct: Option<Box<DestructFn<H>>>,
    pub(crate) update: Option<Box<UpdateFn<H>>>,
    pub(crate) update_exec: ExecMode,
}

impl<H> AlgorithmPlugin<H> {
    /// Whether the plugin accepts update requests.
    pub fn supports_update(&self) -> bool {
        self.update.is_some()
    }

    /// How updates are executed.
    pub fn update_exec(&self) -> ExecMode {
        self.update_exec
    }

    /// Release a handle through `destruct`, or drop it.
    pub(crate) fn release(&self, handle: H) {
        match &self.destruct {
            Some(destruct) => destruct(handle),
            None => drop(handle),
        }
    }
}

impl<A: Algorithm> AlgorithmPlugin<A> {
    /// Capability table backed by the [`Algorithm`] impl of `A`.
    pub fn from_algorithm() -> Self {
        Self {
            construct: Box::new(A::construct),
            initialize: Box::new(A::initialize),
            process: Box::new(A::process),
            terminate: Box::new(A::terminate),
            destruct: None,
            update: A::UPDATE.map(|_| Box::new(A::update) as Box<UpdateFn<A>>),
            update_exec: A::UPDATE.unwrap_or_default(),
        }
    }
}

impl<H> fmt::Debug for AlgorithmPlugin<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmPlugin")
            .field("destruct", &self.destruct.is_some())
            .field("update", &self.update.is_some())
            .field("update_exec", &self.update_exec)
            .finish_non_exhaustive()
    }
}

/// Collects algorithm capabilities and validates them.
pub struct AlgorithmPluginBuilder<H> {
    construct: Option<Box<ConstructFn<H>>>,
    initialize: Option<Box<InitializeFn<H>>>,
    process: Option<Box<ProcessFn<H>>>,
    terminate: Option<Box<TerminateFn<H>>>,
    destruct: Option<Box<DestructFn<H>>>,
    update: Option<Box<UpdateFn<H>>>,
    update_exec: ExecMode,
}

impl<H> Default for AlgorithmPluginBuilder<H> {
    fn default() -> Self {
        Self {
            construct: None,
            initialize: None,
            process: None,
            terminate: None,
            destruct: None,
            update: None,
            update_exec: ExecMode::Async,
        }
    }
}

impl<H> AlgorithmPluginBuilder<H> {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the constructor. Mandatory.
    pub fn construct(
        mut self,
        f: impl Fn(&ChannelModel, &str) -> Result<H> + Send + Sync + 'static,
    ) -> Self {
        self.construct = Some(Box::new(f));
        self
    }

    /// Set the initializer. Mandatory.
    pub fn initialize(
        mut self,
        f: impl Fn(&mut H, &ChannelModel) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.initialize = Some(Box::new(f));
        self
    }

    /// Set the frame processor. Mandatory.
    pub fn process(
        mut self,
        f: impl Fn(&mut H, &mut AudioFrame<'_>, &ChannelModel) + Send + Sync + 'static,
    ) -> Self {
        self.process = Some(Box::new(f));
        self
    }

    /// Set the terminator. Mandatory.
    pub fn terminate(mut self, f: impl Fn(&mut H) -> Result<()> + Send + Sync + 'static) -> Self {
        self.terminate = Some(Box::new(f));
        self
    }

    /// Set the destructor. Without one, handles are dropped.
    pub fn destruct(mut self, f: impl Fn(H) + Send + Sync + 'static) -> Self {
        self.destruct = Some(Box::new(f));
        self
    }

    /// Set the update hook and how it is executed.
    pub fn update(mut self, exec: ExecMode, f: impl Fn(&mut H, ExecMode) + Send + Sync + 'static) -> Self {
        self.update = Some(Box::new(f));
        self.update_exec = exec;
        self
    }

    /// Validate and produce the capability table.
    ///
    /// Fails with `InvalidArgument` naming the first missing mandatory
    /// capability.
    pub fn build(self) -> Result<AlgorithmPlugin<H>> {
        let missing = |name: &str| Error::invalid_argument(format!("algorithm plugin has no {name} capability"));
        Ok(AlgorithmPlugin {
            construct: self.construct.ok_or_else(|| missing("construct"))?,
            initialize: self.initialize.ok_or_else(|| missing("initialize"))?,
            process: self.process.ok_or_else(|| missing("process"))?,
            terminate: self.terminate.ok_or_else(|| missing("terminate"))?,
            destruct: self.destruct,
            update: self.update,
            update_exec: self.update_exec,
        })
    }
}

impl<A: Algorithm> AlgorithmPluginBuilder<A> {
    /// Builder pre-filled from the [`Algorithm`] impl of `A`.
    pub fn from_algorithm() -> Self {
        let plugin = AlgorithmPlugin::<A>::from_algorithm();
        Self {
            construct: Some(plugin.construct),
            initialize: Some(plugin.initialize),
            process: Some(plugin.process),
            terminate: Some(plugin.terminate),
            destruct: plugin.destruct,
            update: plugin.update,
            update_exec: plugin.update_exec,
        }
    }
}
