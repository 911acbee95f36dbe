//! Thread-safe listener registry with synchronous broadcast.
//!
//! An [`Observer`] belongs to one subject (a processor, a channel model) and
//! holds callbacks registered from any thread. [`Observer::notify`] invokes
//! them on the notifying thread, in registration order.
//!
//! # Snapshot semantics
//!
//! `notify` copies the listener list under the shared lock and releases the
//! lock before calling anyone. A listener added during a notification is not
//! called by that notification; a listener removed during one may still be
//! called by it. Listeners may freely add or remove listeners from inside a
//! callback.
//!
//! # Lock failures
//!
//! Every lock acquisition is bounded by [`LOCK_TIMEOUT`]. On timeout the
//! operation does nothing, a `ResourceException` goes to the error sink, and
//! the error is returned.

use crate::error::{Error, Result};
use crate::report::{Component, ErrorSink, Severity, raise};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bound on waiting for the listener lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(250);

/// Capacity added to the listener list each time it fills up.
pub const GROWTH_INCREMENT: usize = 2;

/// Identifies one registration, returned by [`Observer::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback<S> = Arc<dyn Fn(&S) + Send + Sync>;

struct Listener<S: ?Sized> {
    id: ListenerId,
    callback: Callback<S>,
}

/// Registry of callbacks interested in a subject of type `S`.
pub struct Observer<S: ?Sized> {
    listeners: RwLock<Vec<Listener<S>>>,
    next_id: AtomicU64,
    sink: Arc<dyn ErrorSink>,
}

impl<S: ?Sized> Observer<S> {
    /// Create an empty observer that reports lock and allocation failures to `sink`.
    pub fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sink,
        }
    }

    /// Register `callback`.
    ///
    /// Data the callback needs is captured by the closure. The same closure
    /// may be registered more than once; each registration gets its own id.
    #[track_caller]
    pub fn add(&self, callback: impl Fn(&S) + Send + Sync + 'static) -> Result<ListenerId> {
        let mut listeners = self
            .listeners
            .try_write_for(LOCK_TIMEOUT)
            .ok_or_else(|| self.lock_failed("add"))?;

        if listeners.len() == listeners.capacity() {
            listeners.try_reserve_exact(GROWTH_INCREMENT).map_err(|e| {
                raise(
                    self.sink.as_ref(),
                    Error::allocation_failed(format!("observer listener list: {e}")),
                    Severity::Critical,
                    Component::Observer,
                )
            })?;
        }

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        listeners.push(Listener {
            id,
            callback: Arc::new(callback),
        });
        Ok(id)
    }

    /// Remove the registration `id`, keeping the order of the rest.
    ///
    /// Removing an id that is not registered succeeds and changes nothing.
    #[track_caller]
    pub fn remove(&self, id: ListenerId) -> Result<()> {
        let mut listeners = self
            .listeners
            .try_write_for(LOCK_TIMEOUT)
            .ok_or_else(|| self.lock_failed("remove"))?;

        if let Some(pos) = listeners.iter().position(|l| l.id == id) {
            listeners.remove(pos);
        }
        Ok(())
    }

    /// Remove every registration.
    #[track_caller]
    pub fn clear(&self) -> Result<()> {
        let mut listeners = self
            .listeners
            .try_write_for(LOCK_TIMEOUT)
            .ok_or_else(|| self.lock_failed("clear"))?;
        listeners.clear();
        Ok(())
    }

    /// Invoke every registered callback with `subject`.
    #[track_caller]
    pub fn notify(&self, subject: &S) -> Result<()> {
        let snapshot: Vec<Callback<S>> = {
            let listeners = self
                .listeners
                .try_read_for(LOCK_TIMEOUT)
                .ok_or_else(|| self.lock_failed("notify"))?;
            listeners.iter().map(|l| Arc::clone(&l.callback)).collect()
        };

        for callback in &snapshot {
            callback(subject);
        }
        Ok(())
    }

    /// Number of registrations. Returns 0 if the lock could not be taken.
    #[track_caller]
    pub fn count(&self) -> usize {
        match self.listeners.try_read_for(LOCK_TIMEOUT) {
            Some(listeners) => listeners.len(),
            None => {
                self.lock_failed("count");
                0
            }
        }
    }

    /// Whether no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    #[track_caller]
    fn lock_failed(&self, op: &str) -> Error {
        raise(
            self.sink.as_ref(),
            Error::resource_exception(format!("observer {op}: lock not acquired within {LOCK_TIMEOUT:?}")),
            Severity::Error,
            Component::Observer,
        )
    }
}

impl<S: ?Sized> fmt::Debug for Observer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.listeners.try_read().map(|l| l.len());
        f.debug_struct("Observer").field("listeners", &count).finish()
    }
}
