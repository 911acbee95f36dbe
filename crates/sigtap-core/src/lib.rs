//! Sigtap Core - lifecycle and plugin protocol for real-time telephony audio
//!
//! This crate lets a pluggable algorithm run against the live audio of a
//! telephony session. It owns the parts that are hard to get right: the
//! per-session state machine, the contract with the algorithm, runtime mode
//! switching from a control thread, and a thread-safe observer to broadcast
//! those switches. The telephony host is reached through traits only.
//!
//! # Core Abstractions
//!
//! ## Module and App
//!
//! - [`Module`] - Loadable unit; `Initializing` → `Running` via [`Module::init_check`]
//! - [`App`] - Produces one processor per session, holds metadata and config
//! - [`SignalProcessingConfig`] - Working link, allowed rates, datatype, mute policy
//!
//! ## Processing
//!
//! - [`Processor`] - Media-thread half, driven by host events
//! - [`ProcessorHandle`] - Control half: mode, state, observers, updates
//! - [`ChannelModel`] - Format of one intercepted direction
//! - [`AudioFrame`] - One frame of 16-bit linear audio
//!
//! ## Algorithms
//!
//! - [`Algorithm`] - Implement on your handle type
//! - [`AlgorithmPluginBuilder`] - Or assemble capabilities from closures
//!
//! ## Plumbing
//!
//! - [`Observer`] - Listener registry with snapshot broadcast
//! - [`ErrorSink`] / [`ErrorHandler`] - The single error-reporting path
//! - [`MediaInterception`] / [`Session`] - Host seams
//!
//! # Real-time rules
//!
//! Frame events never take a lock and never allocate on the steady-state
//! path. The mode is an atomic; configuration and plugin are immutable
//! `Arc`s by the time any frame arrives.
//!
//! # Example
//!
//! ```rust,ignore
//! use sigtap_core::{AlgorithmPluginBuilder, LinkDirection, Module, WorkingFlags};
//!
//! let mut module = Module::new("mod_gain");
//! let app = module.create_sigproc_app(host, AlgorithmPluginBuilder::<Gain>::from_algorithm())?;
//! app.config().set_working_channel(LinkDirection::Uplink, WorkingFlags::Default)?;
//! module.init_check()?;
//!
//! let processor = app.produce_instance(session, "gain=0.5")?;
//! processor.set_mode(AlgoMode::Mute)?;
//! ```

pub mod algorithm;
pub mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod frame;
pub mod host;
pub mod link;
pub mod mode;
pub mod module;
pub mod observer;
pub mod processor;
pub mod report;

#[cfg(test)]
mod test_host;

pub use algorithm::{Algorithm, AlgorithmPlugin, AlgorithmPluginBuilder, ExecMode};
pub use app::{App, AppInfo};
pub use channel::{ChannelFormat, ChannelModel, FetchMode, SampleFormat, StreamFormat};
pub use config::{SignalProcessingConfig, SpSettings};
pub use error::{Error, Result, Status};
pub use frame::AudioFrame;
pub use host::{
    FrameKind, HostError, InterceptionCallback, InterceptionToken, MediaEvent, MediaInterception,
    Session,
};
pub use link::{BufferMode, InterceptFlags, LinkDirection, WorkingFlags};
pub use mode::{AlgoMode, MutePolicy};
pub use module::{Module, ModuleContext, ModuleState};
pub use observer::{ListenerId, Observer};
pub use processor::{Processor, ProcessorHandle, ProcessorState};
pub use report::{Component, ErrorHandler, ErrorReport, ErrorSink, Severity, raise};
