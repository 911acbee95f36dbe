//! One frame of intercepted audio.

use crate::link::LinkDirection;

/// Borrowed view of one frame of signed 16-bit linear audio.
///
/// Samples are interleaved when `channels > 1`. The frame is only valid for
/// the duration of the callback that received it.
#[derive(Debug)]
pub struct AudioFrame<'a> {
    direction: LinkDirection,
    sample_rate: u32,
    channels: u8,
    samples: &'a mut [i16],
}

impl<'a> AudioFrame<'a> {
    /// Wrap `samples` travelling in `direction`.
    pub fn new(direction: LinkDirection, sample_rate: u32, channels: u8, samples: &'a mut [i16]) -> Self {
        Self {
            direction,
            sample_rate,
            channels: channels.max(1),
            samples,
        }
    }

    /// Direction the frame travels in.
    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Interleaved channel count, at least 1.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Samples per channel.
    pub fn frame_size(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[i16] {
        self.samples
    }

    /// Interleaved samples, writable.
    pub fn samples_mut(&mut self) -> &mut [i16] {
        self.samples
    }

    /// Reborrow with another sample buffer of the same shape.
    pub(crate) fn with_samples<'b>(&self, samples: &'b mut [i16]) -> AudioFrame<'b> {
        AudioFrame {
            direction: self.direction,
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        }
    }
}
