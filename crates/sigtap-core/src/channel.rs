//! Per-direction description of an intercepted audio stream.
//!
//! A [`ChannelModel`] is built when the host attaches a stream and lives as
//! long as the processor that owns it. Its format fields can change mid-call
//! when the host renegotiates the codec; the direction, fetch mode and sample
//! format cannot.
//!
//! Format reads go through an [`ArcSwap`] snapshot and are wait-free, so
//! algorithms can query the model from inside `process`.

use crate::error::{Error, Result};
use crate::link::LinkDirection;
use crate::observer::{ListenerId, Observer};
use crate::report::{Component, ErrorSink, Severity, raise};
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

/// Sample representation the algorithm expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SampleFormat {
    /// Unspecified.
    None,
    /// Opaque data.
    Data,
    /// Signed 16-bit little endian.
    #[default]
    I16Le,
    /// Signed 32-bit little endian.
    I32Le,
    /// Signed 64-bit little endian.
    I64Le,
    /// Signed 8-bit.
    I8,
    /// Unsigned 16-bit little endian.
    U16Le,
    /// Unsigned 32-bit little endian.
    U32Le,
    /// Unsigned 64-bit little endian.
    U64Le,
    /// Unsigned 8-bit.
    U8,
}

impl SampleFormat {
    /// Width of one sample in bytes, `None` for formats without a fixed width.
    pub const fn bytes_per_sample(self) -> Option<usize> {
        match self {
            Self::None | Self::Data => None,
            Self::I8 | Self::U8 => Some(1),
            Self::I16Le | Self::U16Le => Some(2),
            Self::I32Le | Self::U32Le => Some(4),
            Self::I64Le | Self::U64Le => Some(8),
        }
    }
}

/// How the host hands frames of this direction to the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Frames are not delivered.
    Ignoring,
    /// Frames are delivered as read-only copies.
    Catching,
    /// Frames are delivered in place and may be modified.
    Replacing,
}

/// Stream parameters announced by the host when it attaches or renegotiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    /// Effective sample rate in Hz.
    pub sample_rate: u32,
    /// Sample rate of the negotiated codec in Hz.
    pub original_sample_rate: u32,
    /// Samples per channel in one frame.
    pub samples_per_frame: usize,
    /// Interleaved channel count.
    pub channels: u8,
}

impl StreamFormat {
    /// Mono stream whose codec runs at the effective rate.
    pub const fn mono(sample_rate: u32, samples_per_frame: usize) -> Self {
        Self {
            sample_rate,
            original_sample_rate: sample_rate,
            samples_per_frame,
            channels: 1,
        }
    }

    /// Total interleaved samples in one frame.
    pub const fn frame_len(&self) -> usize {
        self.samples_per_frame * self.channels as usize
    }
}

/// Derived, immutable view of a stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelFormat {
    /// Effective sample rate in Hz. Always positive.
    pub sample_rate: u32,
    /// Codec sample rate in Hz.
    pub original_sample_rate: u32,
    /// Samples per channel in one frame.
    pub frame_size: usize,
    /// Smallest power of two not below `frame_size`.
    pub optimal_transform_size: usize,
    /// Interleaved channel count.
    pub channel_count: u8,
    /// Duration of one frame in microseconds.
    pub frame_duration_us: u64,
}

impl ChannelFormat {
    /// Validate `stream` and derive the remaining fields.
    pub fn from_stream(stream: &StreamFormat) -> Result<Self> {
        if stream.sample_rate == 0 {
            return Err(Error::InvalidFormat("sample rate must be positive".into()));
        }
        if stream.channels == 0 {
            return Err(Error::InvalidFormat("channel count must be positive".into()));
        }
        if stream.samples_per_frame == 0 {
            return Err(Error::InvalidFormat("frame size must be positive".into()));
        }

        Ok(Self {
            sample_rate: stream.sample_rate,
            original_sample_rate: stream.original_sample_rate,
            frame_size: stream.samples_per_frame,
            optimal_transform_size: stream.samples_per_frame.next_power_of_two(),
            channel_count: stream.channels,
            frame_duration_us: stream.samples_per_frame as u64 * 1_000_000
                / u64::from(stream.sample_rate),
        })
    }

    /// Total interleaved samples in one frame.
    pub const fn frame_len(&self) -> usize {
        self.frame_size * self.channel_count as usize
    }
}

/// Description of one intercepted direction.
pub struct ChannelModel {
    direction: LinkDirection,
    fetch_mode: FetchMode,
    datatype: SampleFormat,
    format: ArcSwap<ChannelFormat>,
    observer: Observer<ChannelModel>,
    sink: Arc<dyn ErrorSink>,
}

impl ChannelModel {
    /// Build a model for `direction` from the host's announced stream.
    ///
    /// `sink` receives failures of later renegotiations.
    pub fn new(
        direction: LinkDirection,
        fetch_mode: FetchMode,
        datatype: SampleFormat,
        stream: &StreamFormat,
        sink: Arc<dyn ErrorSink>,
    ) -> Result<Self> {
        let format = ChannelFormat::from_stream(stream)?;

        Ok(Self {
            direction,
            fetch_mode,
            datatype,
            format: ArcSwap::from_pointee(format),
            observer: Observer::new(Arc::clone(&sink)),
            sink,
        })
    }

    // ── Fixed properties ──

    /// Link this model describes.
    pub fn which_link(&self) -> LinkDirection {
        self.direction
    }

    /// How frames of this link are delivered.
    pub fn how_fetched(&self) -> FetchMode {
        self.fetch_mode
    }

    /// Sample format declared by the module configuration.
    pub fn datatype(&self) -> SampleFormat {
        self.datatype
    }

    // ── Format access (wait-free) ──

    /// Current format snapshot.
    pub fn format(&self) -> ChannelFormat {
        **self.format.load()
    }

    /// Effective sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.format.load().sample_rate
    }

    /// Codec sample rate in Hz.
    pub fn original_sample_rate(&self) -> u32 {
        self.format.load().original_sample_rate
    }

    /// Samples per channel in one frame.
    pub fn frame_size(&self) -> usize {
        self.format.load().frame_size
    }

    /// Smallest power of two not below the frame size.
    pub fn optimal_transform_size(&self) -> usize {
        self.format.load().optimal_transform_size
    }

    /// Interleaved channel count.
    pub fn channel_count(&self) -> u8 {
        self.format.load().channel_count
    }

    /// Duration of one frame in microseconds.
    pub fn frame_duration_us(&self) -> u64 {
        self.format.load().frame_duration_us
    }

    /// Whether a frame with this rate, per-channel length and channel count
    /// fits the current format.
    pub fn matches(&self, sample_rate: u32, frame_size: usize, channels: u8) -> bool {
        let format = self.format.load();
        format.sample_rate == sample_rate
            && format.frame_size == frame_size
            && format.channel_count == channels
    }

    // ── Renegotiation ──

    /// Replace the format with one derived from `stream`.
    ///
    /// Observers are notified when the derived format actually changed.
    /// Returns whether it did. An invalid stream leaves the model untouched.
    pub fn renegotiate(&self, stream: &StreamFormat) -> Result<bool> {
        let next = ChannelFormat::from_stream(stream)
            .map_err(|e| raise(self.sink.as_ref(), e, Severity::Warning, Component::Channel))?;

        if **self.format.load() == next {
            return Ok(false);
        }
        self.format.store(Arc::new(next));
        tracing::debug!(
            link = %self.direction,
            sample_rate = next.sample_rate,
            frame_size = next.frame_size,
            "channel renegotiated"
        );
        self.observer.notify(self)?;
        Ok(true)
    }

    // ── Observers ──

    /// Register a callback invoked after each renegotiation.
    pub fn add_observer(
        &self,
        callback: impl Fn(&ChannelModel) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        self.observer.add(callback)
    }

    /// Remove a renegotiation callback.
    pub fn remove_observer(&self, id: ListenerId) -> Result<()> {
        self.observer.remove(id)
    }

    /// Number of renegotiation callbacks.
    pub fn observer_count(&self) -> usize {
        self.observer.count()
    }

    pub(crate) fn clear_observers(&self) -> Result<()> {
        self.observer.clear()
    }
}

impl fmt::Debug for ChannelModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelModel")
            .field("direction", &self.direction)
            .field("fetch_mode", &self.fetch_mode)
            .field("datatype", &self.datatype)
            .field("format", &self.format())
            .finish_non_exhaustive()
    }
}
