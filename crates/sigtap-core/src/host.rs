//! Seams to the telephony host.
//!
//! The framework never talks to a concrete media stack. A host provides a
//! [`MediaInterception`] facility that installs an [`InterceptionCallback`]
//! on a [`Session`] and delivers [`MediaEvent`]s to it on the session's media
//! thread.

use crate::channel::StreamFormat;
use crate::frame::AudioFrame;
use crate::link::{InterceptFlags, LinkDirection};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A call leg the processor is attached to.
pub trait Session: Send + Sync {
    /// Unique identifier of the session.
    fn id(&self) -> &str;

    /// Caller display name, if known.
    fn caller_name(&self) -> Option<&str> {
        None
    }

    /// Caller number, if known.
    fn caller_number(&self) -> Option<&str> {
        None
    }
}

impl fmt::Debug for dyn Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id()).finish_non_exhaustive()
    }
}

/// Kind of frame event.
///
/// Reads carry uplink audio and writes carry downlink audio. Replace kinds
/// let the callback modify the frame in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Read-only copy of an uplink frame.
    Read,
    /// Read-only copy of a downlink frame.
    Write,
    /// Uplink frame, replaceable in place.
    ReadReplace,
    /// Downlink frame, replaceable in place.
    WriteReplace,
}

impl FrameKind {
    /// Direction the frame travels in.
    pub const fn direction(self) -> LinkDirection {
        match self {
            Self::Read | Self::ReadReplace => LinkDirection::Uplink,
            Self::Write | Self::WriteReplace => LinkDirection::Downlink,
        }
    }
}

/// Event delivered by the host to an interception callback.
#[derive(Debug)]
pub enum MediaEvent<'a> {
    /// The interception is live and the stream has this format.
    Attached(StreamFormat),
    /// The interception is being torn down.
    Detached,
    /// A frame is available.
    Frame(FrameKind, AudioFrame<'a>),
}

/// Receiver of media events, owned by the host for the lifetime of one
/// interception.
pub trait InterceptionCallback: Send {
    /// Handle one event. Returning `false` asks the host to stop delivering
    /// frames; the host still delivers `Detached`.
    fn on_event(&mut self, event: MediaEvent<'_>) -> bool;
}

/// Opaque identifier of an installed interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptionToken(pub u64);

/// Failure reported by the host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HostError(pub String);

/// Facility that installs and removes interceptions on sessions.
pub trait MediaInterception: Send + Sync {
    /// Install `callback` on `session`, requesting `flags` access.
    ///
    /// On failure the callback is dropped without receiving any event.
    fn register(
        &self,
        session: &Arc<dyn Session>,
        name: &str,
        flags: InterceptFlags,
        callback: Box<dyn InterceptionCallback>,
    ) -> Result<InterceptionToken, HostError>;

    /// Tear down an interception. The callback receives `Detached` before
    /// this returns, unless it already has.
    fn remove(&self, token: InterceptionToken) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_links() {
        assert_eq!(FrameKind::Read.direction(), LinkDirection::Uplink);
        assert_eq!(FrameKind::ReadReplace.direction(), LinkDirection::Uplink);
        assert_eq!(FrameKind::Write.direction(), LinkDirection::Downlink);
        assert_eq!(FrameKind::WriteReplace.direction(), LinkDirection::Downlink);
    }
}
