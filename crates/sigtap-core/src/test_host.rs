//! Single-slot host used by unit tests.

use crate::channel::StreamFormat;
use crate::frame::AudioFrame;
use crate::host::{
    FrameKind, HostError, InterceptionCallback, InterceptionToken, MediaEvent, MediaInterception,
    Session,
};
use crate::link::InterceptFlags;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct TestSession(pub &'static str);

impl Session for TestSession {
    fn id(&self) -> &str {
        self.0
    }
}

pub(crate) fn session(id: &'static str) -> Arc<dyn Session> {
    Arc::new(TestSession(id))
}

type RegisterHook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub(crate) struct ManualHost {
    slot: Mutex<Option<Box<dyn InterceptionCallback>>>,
    pub flags: Mutex<Option<InterceptFlags>>,
    pub refuse: AtomicBool,
    /// Runs inside `register`, after the callback is installed.
    pub on_register: Mutex<Option<RegisterHook>>,
}

impl ManualHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn send(&self, event: MediaEvent<'_>) -> bool {
        match self.slot.lock().as_mut() {
            Some(cb) => cb.on_event(event),
            None => false,
        }
    }

    pub fn attach(&self, stream: StreamFormat) -> bool {
        self.send(MediaEvent::Attached(stream))
    }

    pub fn frame(&self, kind: FrameKind, rate: u32, samples: &mut [i16]) -> bool {
        self.interleaved(kind, rate, 1, samples)
    }

    pub fn interleaved(&self, kind: FrameKind, rate: u32, channels: u8, samples: &mut [i16]) -> bool {
        let frame = AudioFrame::new(kind.direction(), rate, channels, samples);
        self.send(MediaEvent::Frame(kind, frame))
    }

    pub fn detach(&self) -> bool {
        self.send(MediaEvent::Detached)
    }
}

impl MediaInterception for ManualHost {
    fn register(
        &self,
        _session: &Arc<dyn Session>,
        _name: &str,
        flags: InterceptFlags,
        callback: Box<dyn InterceptionCallback>,
    ) -> Result<InterceptionToken, HostError> {
        if self.refuse.load(Ordering::Relaxed) {
            return Err(HostError("refused".into()));
        }
        *self.flags.lock() = Some(flags);
        *self.slot.lock() = Some(callback);
        if let Some(hook) = self.on_register.lock().as_ref() {
            hook();
        }
        Ok(InterceptionToken(1))
    }

    fn remove(&self, _token: InterceptionToken) -> Result<(), HostError> {
        let cb = self.slot.lock().take();
        if let Some(mut cb) = cb {
            cb.on_event(MediaEvent::Detached);
        }
        Ok(())
    }
}
