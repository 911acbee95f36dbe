//! Module lifecycle: the loadable unit that owns one signal-processing app.
//!
//! A module starts in [`ModuleState::Initializing`]. While there, its app is
//! created and configured. [`Module::init_check`] then moves it to
//! `Running`, or to `Failed` if anything reported an error during setup.

use crate::algorithm::AlgorithmPluginBuilder;
use crate::app::App;
use crate::error::{Error, Result};
use crate::host::MediaInterception;
use crate::report::{Component, ErrorHandler, ErrorSink, Severity, raise};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModuleState {
    /// Setup in progress; configuration may change.
    Initializing = 0,
    /// Serving sessions; configuration is frozen.
    Running = 1,
    /// Shutting down.
    Terminating = 2,
    /// Setup failed; no instances can be produced.
    Failed = 3,
}

impl ModuleState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Initializing,
            1 => Self::Running,
            2 => Self::Terminating,
            _ => Self::Failed,
        }
    }
}

/// State shared between a module and everything it creates.
pub struct ModuleContext {
    name: String,
    state: AtomicU8,
    errors: Arc<ErrorHandler>,
}

impl ModuleContext {
    /// Create a context in `Initializing` with a fresh error handler.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(ModuleState::Initializing as u8),
            errors: Arc::new(ErrorHandler::new()),
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModuleState {
        ModuleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether configuration may still change.
    pub fn is_initializing(&self) -> bool {
        self.state() == ModuleState::Initializing
    }

    /// The module's error handler.
    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    /// The module's error handler as a sink.
    pub fn sink(&self) -> Arc<dyn ErrorSink> {
        self.errors.clone()
    }

    pub(crate) fn set_state(&self, state: ModuleState) {
        let prev = self.state.swap(state as u8, Ordering::AcqRel);
        tracing::debug!(
            module = %self.name,
            from = ?ModuleState::from_u8(prev),
            to = ?state,
            "module state"
        );
    }

    /// Fail with `NotInitializing` unless the module is initializing.
    #[track_caller]
    pub(crate) fn require_initializing(&self, op: &str, component: Component) -> Result<()> {
        if self.is_initializing() {
            Ok(())
        } else {
            Err(raise(
                self.errors.as_ref(),
                Error::not_initializing(op),
                Severity::Error,
                component,
            ))
        }
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("errors", &self.errors)
            .finish()
    }
}

/// Type-erased view of an app, used for shutdown.
trait AppLifecycle: Send + Sync {
    fn shutdown(&self);
}

impl<H: Send + 'static> AppLifecycle for App<H> {
    fn shutdown(&self) {
        App::shutdown(self);
    }
}

/// A loadable signal-processing module.
pub struct Module {
    ctx: Arc<ModuleContext>,
    app: Option<Arc<dyn AppLifecycle>>,
}

impl Module {
    /// Create a module in `Initializing`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            ctx: Arc::new(ModuleContext::new(name)),
            app: None,
        }
    }

    /// Shared context handed to the module's app and config.
    pub fn context(&self) -> &Arc<ModuleContext> {
        &self.ctx
    }

    /// Module name.
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ModuleState {
        self.ctx.state()
    }

    /// The module's error handler.
    pub fn errors(&self) -> &Arc<ErrorHandler> {
        self.ctx.errors()
    }

    /// Create the module's signal-processing app.
    ///
    /// The plugin is validated here; a missing mandatory capability is
    /// reported and returned as `InvalidArgument`, which also makes the next
    /// [`init_check`](Self::init_check) fail the module. The app name is the
    /// module name without a leading `mod_`.
    pub fn create_sigproc_app<H: Send + 'static>(
        &mut self,
        facility: Arc<dyn MediaInterception>,
        plugin: AlgorithmPluginBuilder<H>,
    ) -> Result<Arc<App<H>>> {
        self.ctx.require_initializing("create_sigproc_app", Component::Module)?;
        if self.app.is_some() {
            return Err(raise(
                self.ctx.errors().as_ref(),
                Error::ResourceExisting(format!("module {} already has an app", self.ctx.name())),
                Severity::Error,
                Component::Module,
            ));
        }

        let plugin = plugin
            .build()
            .map_err(|e| raise(self.ctx.errors().as_ref(), e, Severity::Critical, Component::App))?;

        let name = self.ctx.name();
        let app_name = name.strip_prefix("mod_").unwrap_or(name);
        let app = Arc::new(App::new(
            app_name,
            Arc::clone(&self.ctx),
            facility,
            Arc::new(plugin),
        ));
        let lifecycle: Arc<dyn AppLifecycle> = app.clone();
        self.app = Some(lifecycle);
        tracing::debug!(module = %self.ctx.name(), app = app_name, "sigproc app created");
        Ok(app)
    }

    /// Finish initialization.
    ///
    /// Moves to `Running` when no error was reported since creation,
    /// otherwise to `Failed` and returns `PendingConfiguration`.
    pub fn init_check(&self) -> Result<()> {
        if self.ctx.state() != ModuleState::Initializing {
            return Err(Error::not_initializing("init_check"));
        }
        if self.ctx.errors().has_error() {
            self.ctx.set_state(ModuleState::Failed);
            return Err(Error::PendingConfiguration(format!(
                "module {} reported {} error(s) during initialization",
                self.ctx.name(),
                self.ctx.errors().failure_count()
            )));
        }
        self.ctx.set_state(ModuleState::Running);
        Ok(())
    }

    /// Stop accepting new instances.
    pub fn prepare_end(&self) {
        if self.ctx.state() != ModuleState::Failed {
            self.ctx.set_state(ModuleState::Terminating);
        }
    }

    /// Detach every live instance of the module's app.
    pub fn terminate(&mut self) {
        self.prepare_end();
        if let Some(app) = self.app.take() {
            app.shutdown();
        }
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("ctx", &self.ctx)
            .field("has_app", &self.app.is_some())
            .finish()
    }
}
