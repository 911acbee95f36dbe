//! Link directions and which of them a processor intercepts.

use core::fmt;

/// Direction of an audio stream relative to the local endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LinkDirection {
    /// No direction selected. Processors of this config intercept nothing.
    #[default]
    NoLink,
    /// Audio going out towards the far end (write path).
    Downlink,
    /// Audio coming in from the far end (read path).
    Uplink,
}

impl LinkDirection {
    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoLink => "no_link",
            Self::Downlink => "downlink",
            Self::Uplink => "uplink",
        }
    }
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Modifier on the working channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WorkingFlags {
    /// Intercept the working channel only.
    #[default]
    Default,
    /// Intercept both links whenever a working channel is set.
    CatchBothLinks,
}

/// Which directions a processor hooks into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferMode {
    /// Nothing is intercepted.
    None,
    /// Downlink only.
    Downlink,
    /// Uplink only.
    Uplink,
    /// Both links.
    BothLinks,
}

impl BufferMode {
    /// Derive the buffer mode from the configured working channel and flags.
    ///
    /// | channel  | flags            | mode      |
    /// |----------|------------------|-----------|
    /// | no-link  | any              | none      |
    /// | other    | catch-both-links | both      |
    /// | uplink   | default          | uplink    |
    /// | downlink | default          | downlink  |
    pub const fn derive(channel: LinkDirection, flags: WorkingFlags) -> Self {
        match (channel, flags) {
            (LinkDirection::NoLink, _) => Self::None,
            (_, WorkingFlags::CatchBothLinks) => Self::BothLinks,
            (LinkDirection::Uplink, WorkingFlags::Default) => Self::Uplink,
            (LinkDirection::Downlink, WorkingFlags::Default) => Self::Downlink,
        }
    }

    /// Whether frames travelling in `direction` are intercepted.
    pub const fn covers(self, direction: LinkDirection) -> bool {
        matches!(
            (self, direction),
            (Self::BothLinks, LinkDirection::Uplink | LinkDirection::Downlink)
                | (Self::Uplink, LinkDirection::Uplink)
                | (Self::Downlink, LinkDirection::Downlink)
        )
    }

    /// Interception flags to request from the host, or `None` when nothing
    /// should be registered.
    pub const fn intercept_flags(self) -> Option<InterceptFlags> {
        match self {
            Self::None => None,
            Self::Downlink => Some(InterceptFlags::WriteReplace),
            Self::Uplink => Some(InterceptFlags::ReadReplace),
            Self::BothLinks => Some(InterceptFlags::ReadWriteReplace),
        }
    }
}

/// Access requested from the media-interception facility.
///
/// Reads carry uplink audio, writes carry downlink audio. Every variant asks
/// for in-place replacement of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptFlags {
    /// Replace uplink frames.
    ReadReplace,
    /// Replace downlink frames.
    WriteReplace,
    /// Replace frames in both directions.
    ReadWriteReplace,
}
