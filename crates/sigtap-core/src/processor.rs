//! Per-session processing unit.
//!
//! A processor is split in two:
//!
//! - [`Processor`] is the media-thread half. It is handed to the host as the
//!   interception callback, owns the algorithm handle and the channel
//!   models, and is the only writer of the lifecycle state.
//! - [`ProcessorHandle`] is the control half. It is cheap to clone and lets
//!   any thread read the state, switch the mode, watch mode changes, request
//!   updates and tear the interception down.
//!
//! Both halves share one `Arc`'d block of atomics. Nothing on the frame path
//! takes a lock or allocates, except renegotiation, which notifies channel
//! observers.
//!
//! # Lifecycle
//!
//! ```text
//! Constructing ──Attached──▶ Initializing ──▶ Processing ◀──▶ Updating
//!                                              │   ▲
//!                                              ▼   │
//!                                             Hibernating
//!        Processing/Updating/Hibernating ──Detached──▶ Terminating ──▶ Destructing
//!        any non-terminal ──failure──▶ Failed
//! ```

use crate::algorithm::{AlgorithmPlugin, ExecMode};
use crate::app::App;
use crate::channel::{ChannelModel, FetchMode, StreamFormat};
use crate::config::SpSettings;
use crate::error::{Error, Result};
use crate::frame::AudioFrame;
use crate::host::{
    FrameKind, InterceptionCallback, InterceptionToken, MediaEvent, MediaInterception, Session,
};
use crate::link::{BufferMode, LinkDirection};
use crate::mode::{AlgoMode, MutePolicy};
use crate::observer::{ListenerId, Observer};
use crate::report::{Component, ErrorSink, Severity, raise};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Lifecycle state of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProcessorState {
    /// Created and registered; waiting for the stream to attach.
    Constructing = 0,
    /// Algorithm initialization in progress.
    Initializing = 1,
    /// Frames are handed to the algorithm.
    Processing = 2,
    /// A synchronous update is running between frames.
    Updating = 3,
    /// Algorithm termination in progress.
    Terminating = 4,
    /// Stream renegotiated to a rate the algorithm does not accept; frames
    /// pass through until an accepted rate returns.
    Hibernating = 5,
    /// Algorithm released. Terminal.
    Destructing = 6,
    /// Something failed. Terminal; frames pass through.
    Failed = 7,
}

impl ProcessorState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Constructing,
            1 => Self::Initializing,
            2 => Self::Processing,
            3 => Self::Updating,
            4 => Self::Terminating,
            5 => Self::Hibernating,
            6 => Self::Destructing,
            _ => Self::Failed,
        }
    }

    /// Whether no further transition can leave this state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Destructing | Self::Failed)
    }
}

/// State shared by the media-thread and control halves.
struct ProcessorShared {
    app_name: String,
    session: Arc<dyn Session>,
    buffer_mode: BufferMode,
    mode: AtomicU8,
    state: AtomicU8,
    update_pending: AtomicBool,
    detached: AtomicBool,
    supports_update: bool,
    mode_observer: Observer<ProcessorHandle>,
    uplink: ArcSwapOption<ChannelModel>,
    downlink: ArcSwapOption<ChannelModel>,
    token: Mutex<Option<InterceptionToken>>,
    facility: Arc<dyn MediaInterception>,
    sink: Arc<dyn ErrorSink>,
}

impl ProcessorShared {
    fn state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` unless the current state is terminal.
    fn set_state(&self, next: ProcessorState) {
        let result = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (!ProcessorState::from_u8(cur).is_terminal()).then_some(next as u8)
            });
        if let Ok(prev) = result {
            tracing::debug!(
                app = %self.app_name,
                session = self.session.id(),
                from = ?ProcessorState::from_u8(prev),
                to = ?next,
                "processor state"
            );
        }
    }

    fn mode(&self) -> AlgoMode {
        AlgoMode::try_from(self.mode.load(Ordering::Acquire)).unwrap_or(AlgoMode::On)
    }

    #[track_caller]
    fn fail(&self, error: Error, severity: Severity) -> Error {
        raise(self.sink.as_ref(), error, severity, Component::SpProcessor)
    }
}

/// Control-plane view of a processor.
#[derive(Clone)]
pub struct ProcessorHandle {
    shared: Arc<ProcessorShared>,
}

impl ProcessorHandle {
    // ── Identity ──

    /// Name of the app that produced the processor.
    pub fn app_name(&self) -> &str {
        &self.shared.app_name
    }

    /// Session the processor is attached to.
    pub fn session(&self) -> &Arc<dyn Session> {
        &self.shared.session
    }

    /// Directions the processor intercepts.
    pub fn buffer_mode(&self) -> BufferMode {
        self.shared.buffer_mode
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessorState {
        self.shared.state()
    }

    // ── Mode (lock-free) ──

    /// Current mode.
    pub fn mode(&self) -> AlgoMode {
        self.shared.mode()
    }

    /// Switch the mode and notify mode observers on the calling thread.
    ///
    /// A failed processor accepts the call and changes nothing.
    pub fn set_mode(&self, mode: AlgoMode) -> Result<()> {
        if self.state() == ProcessorState::Failed {
            return Ok(());
        }
        let prev = self.shared.mode.swap(mode as u8, Ordering::AcqRel);
        tracing::debug!(
            app = %self.shared.app_name,
            session = self.shared.session.id(),
            from = ?AlgoMode::try_from(prev).ok(),
            to = %mode,
            "mode changed"
        );
        self.shared.mode_observer.notify(self)
    }

    /// Switch the mode from an untyped value.
    ///
    /// An unknown value is reported as `InvalidArgument` and leaves the mode
    /// unchanged.
    pub fn set_mode_raw(&self, raw: u8) -> Result<()> {
        let mode = AlgoMode::try_from(raw).map_err(|e| self.shared.fail(e, Severity::Error))?;
        self.set_mode(mode)
    }

    /// Register a callback invoked after every mode change.
    pub fn add_mode_observer(
        &self,
        callback: impl Fn(&ProcessorHandle) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        self.shared.mode_observer.add(callback)
    }

    /// Remove a mode callback.
    pub fn remove_mode_observer(&self, id: ListenerId) -> Result<()> {
        self.shared.mode_observer.remove(id)
    }

    /// Number of mode callbacks.
    pub fn mode_observer_count(&self) -> usize {
        self.shared.mode_observer.count()
    }

    // ── Streams ──

    /// Uplink channel model, once attached.
    pub fn uplink_info(&self) -> Option<Arc<ChannelModel>> {
        self.shared.uplink.load_full()
    }

    /// Downlink channel model, once attached.
    pub fn downlink_info(&self) -> Option<Arc<ChannelModel>> {
        self.shared.downlink.load_full()
    }

    // ── Control ──

    /// Ask for the algorithm's update hook to run before the next frame.
    pub fn request_update(&self) -> Result<()> {
        if !self.shared.supports_update {
            return Err(self.shared.fail(
                Error::invalid_argument(format!("app {} has no update capability", self.shared.app_name)),
                Severity::Warning,
            ));
        }
        self.shared.update_pending.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether an update request has not been serviced yet.
    pub fn update_pending(&self) -> bool {
        self.shared.update_pending.load(Ordering::Acquire)
    }

    /// Whether the host has delivered `Detached` and the algorithm is gone.
    pub fn is_detached(&self) -> bool {
        self.shared.detached.load(Ordering::Acquire)
    }

    /// Tear down the interception.
    ///
    /// The host delivers `Detached` to the media-thread half. Calling this
    /// again, or after the host detached on its own, does nothing.
    pub fn detach(&self) -> Result<()> {
        let token = self.shared.token.lock().take();
        let Some(token) = token else {
            return Ok(());
        };
        self.shared.facility.remove(token).map_err(|e| {
            self.shared.fail(
                Error::MediaBug(format!("removing interception for {}: {e}", self.shared.session.id())),
                Severity::Error,
            )
        })
    }
}

impl fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("app", &self.shared.app_name)
            .field("session", &self.shared.session.id())
            .field("state", &self.state())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

/// Media-thread half of a processor.
pub struct Processor<H> {
    shared: Arc<ProcessorShared>,
    plugin: Arc<AlgorithmPlugin<H>>,
    settings: Arc<SpSettings>,
    args: String,
    handle: Option<H>,
    uplink: Option<Arc<ChannelModel>>,
    downlink: Option<Arc<ChannelModel>>,
    /// Pre-allocated copy target for muted processing.
    scratch: Vec<i16>,
    released: bool,
}

impl<H: Send + 'static> Processor<H> {
    /// Create a processor for `session` and install it with the host.
    ///
    /// The processor starts with mode `On` in `Constructing`. Its settings
    /// are a snapshot of `app`'s configuration. When the configuration
    /// selects no link, nothing is registered and the handle stays idle.
    ///
    /// If the host refuses the interception, `MediaBug` is reported and
    /// returned.
    pub fn create(
        app: &App<H>,
        sink: Arc<dyn ErrorSink>,
        session: Arc<dyn Session>,
        args: &str,
        plugin: Arc<AlgorithmPlugin<H>>,
    ) -> Result<ProcessorHandle> {
        let settings = app.config().snapshot();
        let buffer_mode = settings.buffer_mode();

        let shared = Arc::new(ProcessorShared {
            app_name: app.name().to_owned(),
            session: Arc::clone(&session),
            buffer_mode,
            mode: AtomicU8::new(AlgoMode::On as u8),
            state: AtomicU8::new(ProcessorState::Constructing as u8),
            update_pending: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            supports_update: plugin.supports_update(),
            mode_observer: Observer::new(Arc::clone(&sink)),
            uplink: ArcSwapOption::empty(),
            downlink: ArcSwapOption::empty(),
            token: Mutex::new(None),
            facility: Arc::clone(app.facility()),
            sink,
        });
        let handle = ProcessorHandle {
            shared: Arc::clone(&shared),
        };

        let Some(flags) = buffer_mode.intercept_flags() else {
            tracing::debug!(app = app.name(), session = session.id(), "no working link; nothing intercepted");
            return Ok(handle);
        };

        let processor = Self {
            shared: Arc::clone(&shared),
            plugin,
            settings,
            args: args.to_owned(),
            handle: None,
            uplink: None,
            downlink: None,
            scratch: Vec::new(),
            released: false,
        };

        match app
            .facility()
            .register(&session, app.name(), flags, Box::new(processor))
        {
            Ok(token) => {
                *shared.token.lock() = Some(token);
                tracing::debug!(app = app.name(), session = session.id(), ?flags, "interception installed");
                Ok(handle)
            }
            Err(e) => {
                shared.set_state(ProcessorState::Failed);
                Err(shared.fail(
                    Error::MediaBug(format!("installing interception on {}: {e}", session.id())),
                    Severity::Critical,
                ))
            }
        }
    }
}

impl<H> Processor<H> {
    fn state(&self) -> ProcessorState {
        self.shared.state()
    }

    fn model(&self, direction: LinkDirection) -> Option<&Arc<ChannelModel>> {
        match direction {
            LinkDirection::Uplink => self.uplink.as_ref(),
            LinkDirection::Downlink => self.downlink.as_ref(),
            LinkDirection::NoLink => None,
        }
    }

    /// Model handed to `construct` and `initialize`: the working channel's,
    /// or the other one when only that exists.
    fn primary_model(&self) -> Option<Arc<ChannelModel>> {
        self.model(self.settings.working_channel)
            .or(self.uplink.as_ref())
            .or(self.downlink.as_ref())
            .cloned()
    }

    fn all_rates_permitted(&self) -> bool {
        [&self.uplink, &self.downlink]
            .into_iter()
            .flatten()
            .all(|m| self.settings.permits(m.sample_rate()))
    }

    // ── Attach ──

    fn on_attached(&mut self, stream: &StreamFormat) -> bool {
        if self.state() != ProcessorState::Constructing {
            tracing::warn!(session = self.shared.session.id(), state = ?self.state(), "attach ignored");
            return true;
        }
        match self.start(stream) {
            Ok(()) => {
                self.shared.set_state(ProcessorState::Processing);
                true
            }
            Err(e) => {
                self.shared.fail(e, Severity::Error);
                self.shared.set_state(ProcessorState::Failed);
                false
            }
        }
    }

    fn start(&mut self, stream: &StreamFormat) -> Result<()> {
        if !self.settings.permits(stream.sample_rate) {
            return Err(Error::InvalidFormat(format!(
                "sample rate {} Hz not in allowed set {:?}",
                stream.sample_rate, self.settings.allowed_sample_rates
            )));
        }

        for direction in [LinkDirection::Uplink, LinkDirection::Downlink] {
            if !self.shared.buffer_mode.covers(direction) {
                continue;
            }
            let model = Arc::new(ChannelModel::new(
                direction,
                FetchMode::Replacing,
                self.settings.datatype,
                stream,
                Arc::clone(&self.shared.sink),
            )?);
            match direction {
                LinkDirection::Uplink => {
                    self.shared.uplink.store(Some(Arc::clone(&model)));
                    self.uplink = Some(model);
                }
                _ => {
                    self.shared.downlink.store(Some(Arc::clone(&model)));
                    self.downlink = Some(model);
                }
            }
        }

        if self.settings.mute_policy == MutePolicy::ProcessDiscard {
            self.scratch = vec![0; stream.frame_len()];
        }

        let primary = self
            .primary_model()
            .ok_or_else(|| Error::ResourceUninitialized("no channel model for working link".into()))?;

        let model: &ChannelModel = &primary;
        let mut handle = (self.plugin.construct)(model, &self.args)?;
        self.shared.set_state(ProcessorState::Initializing);
        if let Err(e) = (self.plugin.initialize)(&mut handle, model) {
            self.plugin.release(handle);
            return Err(e);
        }
        self.handle = Some(handle);
        Ok(())
    }

    // ── Frames ──

    fn on_frame(&mut self, kind: FrameKind, frame: &mut AudioFrame<'_>) -> bool {
        let direction = kind.direction();

        if self.state() == ProcessorState::Processing
            && self.shared.update_pending.swap(false, Ordering::AcqRel)
        {
            self.run_update();
        }

        // Nothing to process, and no format to renegotiate to.
        if frame.samples().is_empty() {
            return self.state() != ProcessorState::Failed;
        }

        let needs_renegotiation = match self.model(direction) {
            Some(model) => !model.matches(frame.sample_rate(), frame.frame_size(), frame.channels()),
            None => return self.state() != ProcessorState::Failed,
        };
        if needs_renegotiation {
            self.renegotiate(direction, frame);
        }

        if self.state() != ProcessorState::Processing {
            return self.state() != ProcessorState::Failed;
        }

        let Self {
            shared,
            plugin,
            settings,
            handle,
            uplink,
            downlink,
            scratch,
            ..
        } = self;
        let model = match direction {
            LinkDirection::Uplink => uplink.as_deref(),
            _ => downlink.as_deref(),
        };
        let (Some(model), Some(handle)) = (model, handle.as_mut()) else {
            return true;
        };

        match shared.mode() {
            AlgoMode::On => (plugin.process)(handle, frame, model),
            AlgoMode::Off => {}
            AlgoMode::Mute => {
                if settings.mute_policy == MutePolicy::ProcessDiscard {
                    let n = frame.samples().len();
                    if scratch.len() < n {
                        tracing::debug!(
                            session = shared.session.id(),
                            have = scratch.len(),
                            need = n,
                            "mute scratch grown outside renegotiation"
                        );
                        scratch.resize(n, 0);
                    }
                    let copy = &mut scratch[..n];
                    copy.copy_from_slice(frame.samples());
                    let mut shadow = frame.with_samples(copy);
                    (plugin.process)(handle, &mut shadow, model);
                }
            }
        }
        true
    }

    fn run_update(&mut self) {
        let Some(update) = self.plugin.update.as_ref() else {
            return;
        };
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        match self.plugin.update_exec {
            ExecMode::Sync => {
                self.shared.set_state(ProcessorState::Updating);
                update(handle, ExecMode::Sync);
                self.shared.set_state(ProcessorState::Processing);
            }
            ExecMode::Async => update(handle, ExecMode::Async),
        }
        tracing::trace!(session = self.shared.session.id(), "update serviced");
    }

    fn renegotiate(&mut self, direction: LinkDirection, frame: &AudioFrame<'_>) {
        let Some(model) = self.model(direction) else {
            return;
        };
        let stream = StreamFormat {
            sample_rate: frame.sample_rate(),
            original_sample_rate: model.original_sample_rate(),
            samples_per_frame: frame.frame_size(),
            channels: frame.channels(),
        };
        if model.renegotiate(&stream).is_err() {
            return;
        }

        if self.settings.mute_policy == MutePolicy::ProcessDiscard
            && self.scratch.len() < stream.frame_len()
        {
            self.scratch.resize(stream.frame_len(), 0);
        }

        let permitted = self.all_rates_permitted();
        match (self.state(), permitted) {
            (ProcessorState::Processing, false) => {
                self.shared.fail(
                    Error::InvalidFormat(format!(
                        "{direction} renegotiated to {} Hz; algorithm parked",
                        stream.sample_rate
                    )),
                    Severity::Warning,
                );
                self.shared.set_state(ProcessorState::Hibernating);
            }
            (ProcessorState::Hibernating, true) => {
                self.shared.set_state(ProcessorState::Processing);
            }
            _ => {}
        }
    }

    // ── Detach ──

    fn on_detached(&mut self) -> bool {
        if self.released {
            return true;
        }
        self.released = true;

        let state = self.state();
        if let Some(mut handle) = self.handle.take() {
            if matches!(
                state,
                ProcessorState::Processing | ProcessorState::Updating | ProcessorState::Hibernating
            ) {
                self.shared.set_state(ProcessorState::Terminating);
                if let Err(e) = (self.plugin.terminate)(&mut handle) {
                    self.shared.fail(e, Severity::Warning);
                }
            }
            self.shared.set_state(ProcessorState::Destructing);
            self.plugin.release(handle);
        } else {
            self.shared.set_state(ProcessorState::Destructing);
        }

        // Cleanup failures are already reported by the observers.
        let _ = self.shared.mode_observer.clear();
        for model in [&self.uplink, &self.downlink].into_iter().flatten() {
            let _ = model.clear_observers();
        }
        self.shared.token.lock().take();
        self.shared.detached.store(true, Ordering::Release);
        true
    }
}

impl<H: Send + 'static> InterceptionCallback for Processor<H> {
    fn on_event(&mut self, event: MediaEvent<'_>) -> bool {
        match event {
            MediaEvent::Attached(stream) => self.on_attached(&stream),
            MediaEvent::Frame(kind, mut frame) => self.on_frame(kind, &mut frame),
            MediaEvent::Detached => self.on_detached(),
        }
    }
}

impl<H> Drop for Processor<H> {
    /// The host dropped the callback without detaching. A live algorithm
    /// handle is still terminated and released.
    fn drop(&mut self) {
        if !self.released && self.handle.is_some() {
            self.on_detached();
        }
    }
}

impl<H> fmt::Debug for Processor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("session", &self.shared.session.id())
            .field("state", &self.state())
            .field("has_handle", &self.handle.is_some())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmPluginBuilder;
    use crate::link::WorkingFlags;
    use crate::module::Module;
    use crate::test_host::{ManualHost, session};
    use crate::{InterceptFlags, SignalProcessingConfig, Status};
    use std::sync::OnceLock;

    type Log = Arc<Mutex<Vec<String>>>;
    type Cell = Arc<OnceLock<ProcessorHandle>>;

    fn recording(log: &Log, cell: &Cell) -> AlgorithmPluginBuilder<()> {
        let (a, b, c, d, e, f) = (
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
            log.clone(),
        );
        let (cb, cd, ce, cf) = (cell.clone(), cell.clone(), cell.clone(), cell.clone());
        let state = |cell: &Cell| cell.get().map(|h| format!("{:?}", h.state())).unwrap_or_default();
        AlgorithmPluginBuilder::new()
            .construct(move |_, args| {
                a.lock().push(format!("construct:{args}"));
                Ok(())
            })
            .initialize(move |_, model| {
                b.lock()
                    .push(format!("initialize:{}:{}", model.which_link(), state(&cb)));
                Ok(())
            })
            .process(move |_, frame, _| {
                c.lock().push(format!("process:{}", frame.direction()));
                frame.samples_mut().fill(7);
            })
            .terminate(move |_| {
                d.lock().push(format!("terminate:{}", state(&cd)));
                Ok(())
            })
            .destruct(move |()| e.lock().push(format!("destruct:{}", state(&ce))))
            .update(ExecMode::Sync, move |_, exec| {
                f.lock().push(format!("update:{exec:?}:{}", state(&cf)));
            })
    }

    fn app_with(
        host: &Arc<ManualHost>,
        plugin: AlgorithmPluginBuilder<()>,
        configure: impl FnOnce(&SignalProcessingConfig),
    ) -> (Module, Arc<App<()>>) {
        let mut module = Module::new("mod_recorder");
        let app = module.create_sigproc_app(host.clone(), plugin).unwrap();
        configure(app.config());
        module.init_check().unwrap();
        (module, app)
    }

    fn uplink(cfg: &SignalProcessingConfig) {
        cfg.set_working_channel(LinkDirection::Uplink, WorkingFlags::Default)
            .unwrap();
    }

    fn setup(configure: impl FnOnce(&SignalProcessingConfig)) -> (Arc<ManualHost>, Log, Module, ProcessorHandle) {
        let host = ManualHost::new();
        let log = Log::default();
        let cell = Cell::default();
        let (module, app) = app_with(&host, recording(&log, &cell), configure);
        let handle = app.produce_instance(session("s1"), "level=3").unwrap();
        cell.set(handle.clone()).unwrap();
        (host, log, module, handle)
    }

    #[test]
    fn full_lifecycle_in_order() {
        let (host, log, _module, handle) = setup(uplink);
        assert_eq!(*host.flags.lock(), Some(InterceptFlags::ReadReplace));
        assert_eq!(handle.state(), ProcessorState::Constructing);
        assert_eq!(handle.mode(), AlgoMode::On);

        assert!(host.attach(StreamFormat::mono(8000, 160)));
        assert_eq!(handle.state(), ProcessorState::Processing);
        assert_eq!(handle.uplink_info().unwrap().sample_rate(), 8000);
        assert!(handle.downlink_info().is_none());

        let mut buf = [1i16; 160];
        assert!(host.frame(FrameKind::ReadReplace, 8000, &mut buf));
        assert!(buf.iter().all(|&s| s == 7));

        host.detach();
        assert_eq!(handle.state(), ProcessorState::Destructing);
        assert_eq!(
            *log.lock(),
            vec![
                "construct:level=3",
                "initialize:uplink:Initializing",
                "process:uplink",
                "terminate:Terminating",
                "destruct:Destructing",
            ]
        );
    }

    #[test]
    fn second_detach_is_a_no_op() {
        let (host, log, _module, handle) = setup(uplink);
        host.attach(StreamFormat::mono(8000, 160));
        assert!(host.detach());
        assert!(host.detach());
        let log = log.lock();
        assert_eq!(log.iter().filter(|l| l.starts_with("terminate")).count(), 1);
        assert_eq!(log.iter().filter(|l| l.starts_with("destruct")).count(), 1);
        assert_eq!(handle.state(), ProcessorState::Destructing);
    }

    #[test]
    fn mode_off_leaves_audio_untouched() {
        let (host, log, _module, handle) = setup(uplink);
        host.attach(StreamFormat::mono(8000, 160));
        handle.set_mode(AlgoMode::Off).unwrap();

        let mut buf = [3i16; 160];
        host.frame(FrameKind::ReadReplace, 8000, &mut buf);
        assert!(buf.iter().all(|&s| s == 3));
        assert!(!log.lock().iter().any(|l| l.starts_with("process")));
    }

    #[test]
    fn frames_of_other_link_are_ignored() {
        let (host, log, _module, _handle) = setup(uplink);
        host.attach(StreamFormat::mono(8000, 160));

        let mut buf = [3i16; 160];
        host.frame(FrameKind::WriteReplace, 8000, &mut buf);
        assert_eq!(buf, [3i16; 160]);
        assert!(!log.lock().iter().any(|l| l.starts_with("process")));
    }

    #[test]
    fn mute_bypass_skips_algorithm() {
        let (host, log, _module, handle) = setup(uplink);
        host.attach(StreamFormat::mono(8000, 160));
        handle.set_mode(AlgoMode::Mute).unwrap();

        let mut buf = [3i16; 160];
        host.frame(FrameKind::ReadReplace, 8000, &mut buf);
        assert_eq!(buf, [3i16; 160]);
        assert!(!log.lock().iter().any(|l| l.starts_with("process")));
    }

    #[test]
    fn mute_process_discard_runs_on_copy() {
        let (host, log, _module, handle) = setup(|cfg| {
            uplink(cfg);
            cfg.set_mute_policy(MutePolicy::ProcessDiscard).unwrap();
        });
        host.attach(StreamFormat::mono(8000, 160));
        handle.set_mode(AlgoMode::Mute).unwrap();

        let mut buf = [3i16; 160];
        host.frame(FrameKind::ReadReplace, 8000, &mut buf);
        assert_eq!(buf, [3i16; 160]);
        assert_eq!(log.lock().iter().filter(|l| l.starts_with("process")).count(), 1);
    }

    #[test]
    fn disallowed_rate_fails_attach() {
        let (host, log, module, handle) = setup(|cfg| {
            uplink(cfg);
            cfg.allow_sample_rates(&[8000]).unwrap();
        });
        assert!(!host.attach(StreamFormat::mono(16000, 320)));
        assert_eq!(handle.state(), ProcessorState::Failed);
        assert!(module.errors().has_error());

        let mut buf = [3i16; 320];
        host.frame(FrameKind::ReadReplace, 16000, &mut buf);
        assert_eq!(buf, [3i16; 320]);

        handle.set_mode(AlgoMode::Off).unwrap();
        assert_eq!(handle.mode(), AlgoMode::On);

        host.detach();
        assert_eq!(handle.state(), ProcessorState::Failed);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn initialize_failure_releases_handle_without_terminate() {
        let host = ManualHost::new();
        let log = Log::default();
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
        let plugin = AlgorithmPluginBuilder::<()>::new()
            .construct(|_, _| Ok(()))
            .initialize(|_, _| Err(Error::invalid_argument("bad coefficients")))
            .process(move |_, _, _| l1.lock().push("process".into()))
            .terminate(move |_| {
                l2.lock().push("terminate".into());
                Ok(())
            })
            .destruct(move |()| l3.lock().push("destruct".into()));
        let (_module, app) = app_with(&host, plugin, uplink);
        let handle = app.produce_instance(session("s1"), "").unwrap();

        assert!(!host.attach(StreamFormat::mono(8000, 160)));
        assert_eq!(handle.state(), ProcessorState::Failed);
        host.detach();
        assert_eq!(*log.lock(), vec!["destruct"]);
    }

    #[test]
    fn sync_update_runs_in_updating_state() {
        let (host, log, _module, handle) = setup(uplink);
        host.attach(StreamFormat::mono(8000, 160));
        handle.request_update().unwrap();
        assert!(handle.update_pending());

        let mut buf = [0i16; 160];
        host.frame(FrameKind::ReadReplace, 8000, &mut buf);
        assert!(!handle.update_pending());
        assert_eq!(handle.state(), ProcessorState::Processing);

        let log = log.lock();
        let update = log.iter().position(|l| l == "update:Sync:Updating").unwrap();
        let process = log.iter().position(|l| l.starts_with("process")).unwrap();
        assert!(update < process);
    }

    #[test]
    fn update_without_capability_is_rejected() {
        let host = ManualHost::new();
        let plugin = AlgorithmPluginBuilder::<()>::new()
            .construct(|_, _| Ok(()))
            .initialize(|_, _| Ok(()))
            .process(|_, _, _| {})
            .terminate(|_| Ok(()));
        let (_module, app) = app_with(&host, plugin, uplink);
        let handle = app.produce_instance(session("s1"), "").unwrap();
        assert_eq!(handle.request_update().unwrap_err().kind(), Status::InvalidArgument);
    }

    #[test]
    fn renegotiation_hibernates_and_wakes() {
        let (host, log, _module, handle) = setup(|cfg| {
            uplink(cfg);
            cfg.allow_sample_rates(&[8000]).unwrap();
        });
        host.attach(StreamFormat::mono(8000, 160));

        let mut wide = [3i16; 320];
        host.frame(FrameKind::ReadReplace, 16000, &mut wide);
        assert_eq!(handle.state(), ProcessorState::Hibernating);
        assert_eq!(wide, [3i16; 320]);
        assert_eq!(handle.uplink_info().unwrap().sample_rate(), 16000);

        let mut narrow = [3i16; 160];
        host.frame(FrameKind::ReadReplace, 8000, &mut narrow);
        assert_eq!(handle.state(), ProcessorState::Processing);
        assert!(narrow.iter().all(|&s| s == 7));
        assert_eq!(log.lock().iter().filter(|l| l.starts_with("process")).count(), 1);
    }

    #[test]
    fn channel_count_change_renegotiates() {
        let (host, log, module, handle) = setup(|cfg| {
            uplink(cfg);
            cfg.set_mute_policy(MutePolicy::ProcessDiscard).unwrap();
        });
        host.attach(StreamFormat::mono(8000, 160));

        let mut stereo = [3i16; 320];
        assert!(host.interleaved(FrameKind::ReadReplace, 8000, 2, &mut stereo));
        let model = handle.uplink_info().unwrap();
        assert_eq!(model.channel_count(), 2);
        assert_eq!(model.frame_size(), 160);
        assert!(stereo.iter().all(|&s| s == 7));

        handle.set_mode(AlgoMode::Mute).unwrap();
        let mut muted = [5i16; 320];
        host.interleaved(FrameKind::ReadReplace, 8000, 2, &mut muted);
        assert_eq!(muted, [5i16; 320]);
        assert_eq!(log.lock().iter().filter(|l| l.starts_with("process")).count(), 2);
        assert_eq!(handle.state(), ProcessorState::Processing);
        assert!(!module.errors().has_error());
    }

    #[test]
    fn empty_frames_pass_without_reports() {
        let (host, log, module, handle) = setup(uplink);
        host.attach(StreamFormat::mono(8000, 160));
        let reports = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        {
            let reports = Arc::clone(&reports);
            module.errors().set_callback(move |_| {
                reports.fetch_add(1, Ordering::Relaxed);
            });
        }

        for _ in 0..3 {
            assert!(host.frame(FrameKind::ReadReplace, 8000, &mut []));
        }
        assert_eq!(reports.load(Ordering::Relaxed), 0);
        assert_eq!(handle.uplink_info().unwrap().frame_size(), 160);
        assert_eq!(handle.state(), ProcessorState::Processing);
        assert!(!log.lock().iter().any(|l| l.starts_with("process")));
    }

    #[test]
    fn invalid_raw_mode_keeps_previous() {
        let (_host, _log, module, handle) = setup(uplink);
        handle.set_mode(AlgoMode::Mute).unwrap();
        let err = handle.set_mode_raw(42).unwrap_err();
        assert_eq!(err.kind(), Status::InvalidArgument);
        assert_eq!(handle.mode(), AlgoMode::Mute);
        assert!(module.errors().has_error());
    }

    #[test]
    fn mode_observers_fire_on_caller_thread() {
        let (_host, _log, _module, handle) = setup(uplink);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let id = handle
            .add_mode_observer(move |h| s.lock().push(h.mode()))
            .unwrap();

        handle.set_mode(AlgoMode::Off).unwrap();
        handle.set_mode(AlgoMode::On).unwrap();
        handle.remove_mode_observer(id).unwrap();
        handle.set_mode(AlgoMode::Mute).unwrap();

        assert_eq!(*seen.lock(), vec![AlgoMode::Off, AlgoMode::On]);
    }

    #[test]
    fn no_link_registers_nothing() {
        let (host, log, _module, handle) = setup(|_| {});
        assert!(host.flags.lock().is_none());
        assert_eq!(handle.buffer_mode(), BufferMode::None);
        assert_eq!(handle.state(), ProcessorState::Constructing);
        handle.detach().unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn refused_registration_is_media_bug() {
        let host = ManualHost::new();
        host.refuse.store(true, Ordering::Relaxed);
        let log = Log::default();
        let (module, app) = app_with(&host, recording(&log, &Cell::default()), uplink);

        let err = app.produce_instance(session("s1"), "").unwrap_err();
        assert_eq!(err.kind(), Status::MediaBug);
        assert!(module.errors().has_error());
        assert_eq!(app.instance_count(), 0);
    }

    #[test]
    fn both_links_route_by_direction() {
        let (host, log, _module, handle) = setup(|cfg| {
            cfg.set_working_channel(LinkDirection::Downlink, WorkingFlags::CatchBothLinks)
                .unwrap();
        });
        assert_eq!(*host.flags.lock(), Some(InterceptFlags::ReadWriteReplace));
        host.attach(StreamFormat::mono(8000, 160));
        assert!(handle.uplink_info().is_some());
        assert!(handle.downlink_info().is_some());

        let mut buf = [0i16; 160];
        host.frame(FrameKind::ReadReplace, 8000, &mut buf);
        host.frame(FrameKind::WriteReplace, 8000, &mut buf);

        let log = log.lock();
        assert_eq!(log[1], "initialize:downlink:Initializing");
        assert!(log.contains(&"process:uplink".to_string()));
        assert!(log.contains(&"process:downlink".to_string()));
    }
}
