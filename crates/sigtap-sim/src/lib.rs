//! Loopback host and call simulator for sigtap algorithms.
//!
//! Runs a module end to end without a telephony switch:
//!
//! - [`LoopbackHost`] - `MediaInterception` that delivers events on the caller's thread
//! - [`SimSession`] - Session with an id and optional caller identity
//! - [`Gain`] - Demo algorithm, `gain=<factor>`
//! - [`CallScript`] / [`CallReport`] - Tone-driven call and its statistics
//!
//! # Example
//!
//! ```rust
//! use sigtap_core::{AlgorithmPluginBuilder, LinkDirection, Module, WorkingFlags};
//! use sigtap_sim::{CallScript, Gain, LoopbackHost};
//!
//! let host = LoopbackHost::new();
//! let mut module = Module::new("mod_gain");
//! let app = module
//!     .create_sigproc_app(host.clone(), AlgorithmPluginBuilder::<Gain>::from_algorithm())
//!     .unwrap();
//! app.config().set_working_channel(LinkDirection::Uplink, WorkingFlags::Default).unwrap();
//! module.init_check().unwrap();
//!
//! let script = CallScript { args: "gain=0.5".into(), frames: 10, ..CallScript::default() };
//! let report = script.run(&app, &host).unwrap();
//! assert_eq!(report.frames_delivered, 10);
//! assert!(report.output_peak < report.input_peak);
//! ```

mod gain;
mod loopback;
mod script;
mod session;

pub use gain::Gain;
pub use loopback::LoopbackHost;
pub use script::{CallReport, CallScript, SimError};
pub use session::SimSession;
