//! In-process media-interception host.
//!
//! [`LoopbackHost`] keeps one callback per installed interception and lets
//! the caller play the media thread: attach a stream, deliver frames, detach.
//! Events for one token must come from one thread at a time; different
//! tokens are independent.

use parking_lot::Mutex;
use sigtap_core::{
    AudioFrame, FrameKind, HostError, InterceptFlags, InterceptionCallback, InterceptionToken,
    MediaEvent, MediaInterception, Session, StreamFormat,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

struct Slot {
    session: String,
    name: String,
    flags: InterceptFlags,
    format: Option<StreamFormat>,
    /// `None` while an event is being delivered.
    callback: Option<Box<dyn InterceptionCallback>>,
    /// The callback asked for no more frames.
    stopped: bool,
}

/// Host that delivers media events on the calling thread.
#[derive(Default)]
pub struct LoopbackHost {
    slots: Mutex<HashMap<u64, Slot>>,
    next_token: AtomicU64,
    refuse: AtomicBool,
}

impl LoopbackHost {
    /// Create an empty host.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent registrations fail (or succeed again).
    pub fn fail_registrations(&self, fail: bool) {
        self.refuse.store(fail, Ordering::Relaxed);
    }

    /// Number of installed interceptions.
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }

    /// Token of the interception installed on `session_id`, if any.
    pub fn token_for(&self, session_id: &str) -> Option<InterceptionToken> {
        self.slots
            .lock()
            .iter()
            .find(|(_, slot)| slot.session == session_id)
            .map(|(&id, _)| InterceptionToken(id))
    }

    /// Flags requested by the interception behind `token`.
    pub fn flags(&self, token: InterceptionToken) -> Option<InterceptFlags> {
        self.slots.lock().get(&token.0).map(|s| s.flags)
    }

    /// Name the interception behind `token` was registered under.
    pub fn name(&self, token: InterceptionToken) -> Option<String> {
        self.slots.lock().get(&token.0).map(|s| s.name.clone())
    }

    /// Start the stream.
    pub fn attach(&self, token: InterceptionToken, format: StreamFormat) -> Result<bool, HostError> {
        self.slot_mut(token, |slot| slot.format = Some(format))?;
        self.dispatch(token, |cb| cb.on_event(MediaEvent::Attached(format)))
    }

    /// Change the format of later frames without an event, as a mid-call
    /// codec switch does.
    pub fn renegotiate(&self, token: InterceptionToken, format: StreamFormat) -> Result<(), HostError> {
        self.slot_mut(token, |slot| slot.format = Some(format))
    }

    /// Deliver one frame of `samples` in the attached format.
    ///
    /// Returns `Ok(false)` without calling the callback once it has asked to
    /// stop, or if no stream is attached yet.
    pub fn deliver(
        &self,
        token: InterceptionToken,
        kind: FrameKind,
        samples: &mut [i16],
    ) -> Result<bool, HostError> {
        let format = self.slots.lock().get(&token.0).ok_or_else(|| unknown(token))?.format;
        let Some(format) = format else {
            return Ok(false);
        };
        self.dispatch(token, |cb| {
            let frame = AudioFrame::new(kind.direction(), format.sample_rate, format.channels, samples);
            cb.on_event(MediaEvent::Frame(kind, frame))
        })
    }

    /// Tear the interception down; the callback receives `Detached` and is
    /// dropped.
    pub fn detach(&self, token: InterceptionToken) -> Result<(), HostError> {
        let slot = self.slots.lock().remove(&token.0).ok_or_else(|| unknown(token))?;
        // An in-flight delivery finds the slot gone and detaches on return.
        if let Some(mut cb) = slot.callback {
            cb.on_event(MediaEvent::Detached);
        }
        tracing::debug!(token = token.0, session = %slot.session, "interception removed");
        Ok(())
    }

    fn slot_mut(&self, token: InterceptionToken, f: impl FnOnce(&mut Slot)) -> Result<(), HostError> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(&token.0).ok_or_else(|| unknown(token))?;
        f(slot);
        Ok(())
    }

    /// Run `f` on the callback outside the lock.
    fn dispatch(
        &self,
        token: InterceptionToken,
        f: impl FnOnce(&mut dyn InterceptionCallback) -> bool,
    ) -> Result<bool, HostError> {
        let mut cb = {
            let mut slots = self.slots.lock();
            let slot = slots.get_mut(&token.0).ok_or_else(|| unknown(token))?;
            if slot.stopped {
                return Ok(false);
            }
            slot.callback
                .take()
                .ok_or_else(|| HostError(format!("interception {} is busy", token.0)))?
        };

        let keep = f(cb.as_mut());

        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&token.0) {
            slot.stopped |= !keep;
            slot.callback = Some(cb);
        } else {
            drop(slots);
            cb.on_event(MediaEvent::Detached);
        }
        Ok(keep)
    }
}

fn unknown(token: InterceptionToken) -> HostError {
    HostError(format!("unknown interception {}", token.0))
}

impl MediaInterception for LoopbackHost {
    fn register(
        &self,
        session: &Arc<dyn Session>,
        name: &str,
        flags: InterceptFlags,
        callback: Box<dyn InterceptionCallback>,
    ) -> Result<InterceptionToken, HostError> {
        if self.refuse.load(Ordering::Relaxed) {
            return Err(HostError(format!("registration refused on {}", session.id())));
        }
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.slots.lock().insert(
            id,
            Slot {
                session: session.id().to_owned(),
                name: name.to_owned(),
                flags,
                format: None,
                callback: Some(callback),
                stopped: false,
            },
        );
        tracing::debug!(token = id, session = session.id(), name, ?flags, "interception installed");
        Ok(InterceptionToken(id))
    }

    fn remove(&self, token: InterceptionToken) -> Result<(), HostError> {
        self.detach(token)
    }
}

impl std::fmt::Debug for LoopbackHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackHost")
            .field("active", &self.active())
            .field("refuse", &self.refuse.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
