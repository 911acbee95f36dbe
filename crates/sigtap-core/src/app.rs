//! Signal-processing app: produces one processor per session.

use crate::algorithm::AlgorithmPlugin;
use crate::config::SignalProcessingConfig;
use crate::error::{Error, Result};
use crate::host::{MediaInterception, Session};
use crate::module::{ModuleContext, ModuleState};
use crate::processor::{Processor, ProcessorHandle};
use crate::report::{Component, Severity, raise};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

/// Descriptive metadata shown by control surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppInfo {
    /// Version string.
    pub version: String,
    /// One-line description.
    pub description: String,
    /// Usage syntax of the app's arguments.
    pub syntax: String,
}

/// Entry of the per-session instance map.
enum Slot {
    /// Host registration in progress; the processor is not published yet.
    Reserved,
    Live(ProcessorHandle),
}

impl Slot {
    fn live(&self) -> Option<&ProcessorHandle> {
        match self {
            Self::Live(handle) => Some(handle),
            Self::Reserved => None,
        }
    }
}

/// Drop instances the host has already detached.
fn prune(instances: &mut HashMap<String, Slot>) {
    instances.retain(|_, slot| !slot.live().is_some_and(ProcessorHandle::is_detached));
}

/// The app of a signal-processing module.
///
/// Created by [`Module::create_sigproc_app`](crate::Module::create_sigproc_app).
pub struct App<H> {
    name: String,
    ctx: Arc<ModuleContext>,
    facility: Arc<dyn MediaInterception>,
    plugin: Arc<AlgorithmPlugin<H>>,
    config: SignalProcessingConfig,
    info: RwLock<AppInfo>,
    instances: Mutex<HashMap<String, Slot>>,
}

impl<H: Send + 'static> App<H> {
    pub(crate) fn new(
        name: &str,
        ctx: Arc<ModuleContext>,
        facility: Arc<dyn MediaInterception>,
        plugin: Arc<AlgorithmPlugin<H>>,
    ) -> Self {
        Self {
            name: name.to_owned(),
            config: SignalProcessingConfig::new(Arc::clone(&ctx)),
            ctx,
            facility,
            plugin,
            info: RwLock::new(AppInfo::default()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// App name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal-processing configuration shared by all instances.
    pub fn config(&self) -> &SignalProcessingConfig {
        &self.config
    }

    /// Media-interception facility instances register with.
    pub fn facility(&self) -> &Arc<dyn MediaInterception> {
        &self.facility
    }

    /// The algorithm plugin.
    pub fn plugin(&self) -> &Arc<AlgorithmPlugin<H>> {
        &self.plugin
    }

    // ── Metadata (initialization only) ──

    /// Current metadata.
    pub fn info(&self) -> AppInfo {
        self.info.read().clone()
    }

    /// Set the version string.
    pub fn set_version(&self, version: impl Into<String>) -> Result<()> {
        self.ctx.require_initializing("set_version", Component::App)?;
        self.info.write().version = version.into();
        Ok(())
    }

    /// Set the description.
    pub fn set_description(&self, description: impl Into<String>) -> Result<()> {
        self.ctx.require_initializing("set_description", Component::App)?;
        self.info.write().description = description.into();
        Ok(())
    }

    /// Set the argument syntax.
    pub fn set_syntax(&self, syntax: impl Into<String>) -> Result<()> {
        self.ctx.require_initializing("set_syntax", Component::App)?;
        self.info.write().syntax = syntax.into();
        Ok(())
    }

    // ── Instances ──

    /// Create and attach a processor to `session`.
    ///
    /// The module must be running. A session holds at most one live instance
    /// of the app; a second request is rejected with `DuplicateEntry` before
    /// anything is registered with the host. An instance the host already
    /// detached does not count.
    ///
    /// The instance map is not locked while the host registers the
    /// interception, so a host that attaches synchronously may call back
    /// into the app.
    pub fn produce_instance(&self, session: Arc<dyn Session>, args: &str) -> Result<ProcessorHandle> {
        if self.ctx.state() != ModuleState::Running {
            return Err(self.fail(
                Error::PendingConfiguration(format!(
                    "module {} is {:?}",
                    self.ctx.name(),
                    self.ctx.state()
                )),
                Severity::Error,
            ));
        }

        let id = session.id().to_owned();
        let reserved = {
            let mut instances = self.instances.lock();
            prune(&mut instances);
            match instances.entry(id.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(Slot::Reserved);
                    true
                }
            }
        };
        if !reserved {
            return Err(self.fail(
                Error::DuplicateEntry(format!("{} already runs on {id}", self.name)),
                Severity::Warning,
            ));
        }

        let created = Processor::create(
            self,
            self.ctx.sink(),
            session,
            args,
            Arc::clone(&self.plugin),
        );

        let handle = match created {
            Ok(handle) => handle,
            Err(e) => {
                self.instances.lock().remove(&id);
                return Err(e);
            }
        };

        let published = {
            let mut instances = self.instances.lock();
            match instances.get_mut(&id) {
                Some(slot) if matches!(slot, Slot::Reserved) => {
                    *slot = Slot::Live(handle.clone());
                    true
                }
                _ => false,
            }
        };
        if !published {
            // Shut down while the host was registering.
            handle.detach()?;
            return Err(self.fail(
                Error::PendingConfiguration(format!("{} shut down while attaching {id}", self.name)),
                Severity::Warning,
            ));
        }
        Ok(handle)
    }

    /// Instance running on `session_id`.
    pub fn instance(&self, session_id: &str) -> Result<ProcessorHandle> {
        let found = {
            let mut instances = self.instances.lock();
            prune(&mut instances);
            instances.get(session_id).and_then(Slot::live).cloned()
        };
        found.ok_or_else(|| {
            self.fail(
                Error::AppInstanceNotFound(format!("{} on {session_id}", self.name)),
                Severity::Warning,
            )
        })
    }

    /// Detach and forget the instance running on `session_id`.
    pub fn remove_instance(&self, session_id: &str) -> Result<ProcessorHandle> {
        let removed = {
            let mut instances = self.instances.lock();
            if matches!(instances.get(session_id), Some(Slot::Live(_))) {
                instances.remove(session_id)
            } else {
                None
            }
        };
        let Some(Slot::Live(handle)) = removed else {
            return Err(self.fail(
                Error::AppInstanceNotFound(format!("{} on {session_id}", self.name)),
                Severity::Warning,
            ));
        };
        handle.detach()?;
        Ok(handle)
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        let mut instances = self.instances.lock();
        prune(&mut instances);
        instances.values().filter(|slot| slot.live().is_some()).count()
    }

    /// Detach every instance.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.instances.lock().drain().collect();
        for (session, slot) in drained {
            let Slot::Live(handle) = slot else { continue };
            if handle.detach().is_err() {
                tracing::warn!(app = %self.name, session = %session, "instance did not detach cleanly");
            }
        }
    }

    #[track_caller]
    fn fail(&self, error: Error, severity: Severity) -> Error {
        raise(self.ctx.errors().as_ref(), error, severity, Component::App)
    }
}

impl<H> fmt::Debug for App<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("info", &*self.info.read())
            .field("instances", &self.instances.lock().len())
            .finish_non_exhaustive()
    }
}
