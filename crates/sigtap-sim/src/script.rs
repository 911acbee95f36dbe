//! Scripted calls against a [`LoopbackHost`].

use crate::loopback::LoopbackHost;
use crate::session::SimSession;
use serde::Serialize;
use sigtap_core::{AlgoMode, App, FrameKind, HostError, LinkDirection, ProcessorHandle, StreamFormat};
use std::sync::Arc;
use thiserror::Error;

/// Failure while running a script.
#[derive(Debug, Error)]
pub enum SimError {
    /// The framework rejected an operation.
    #[error(transparent)]
    Core(#[from] sigtap_core::Error),
    /// The host rejected an operation.
    #[error("host: {0}")]
    Host(#[from] HostError),
}

/// One simulated call: a sine tone pushed through the app for a number of
/// frames, in every direction the app intercepts.
#[derive(Debug, Clone)]
pub struct CallScript {
    /// Session id.
    pub session_id: String,
    /// Instance arguments.
    pub args: String,
    /// Mode set right after the instance is produced.
    pub mode: AlgoMode,
    /// Stream sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per frame.
    pub frame_size: usize,
    /// Frames per direction.
    pub frames: usize,
    /// Tone frequency in Hz.
    pub tone_hz: f32,
    /// Tone peak amplitude.
    pub amplitude: i16,
}

impl Default for CallScript {
    fn default() -> Self {
        Self {
            session_id: "sim-call".to_string(),
            args: String::new(),
            mode: AlgoMode::On,
            sample_rate: 8000,
            frame_size: 160,
            frames: 50,
            tone_hz: 440.0,
            amplitude: 8000,
        }
    }
}

/// Statistics of a finished call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallReport {
    /// Session id.
    pub session: String,
    /// App name.
    pub app: String,
    /// Intercepted directions.
    pub buffer_mode: String,
    /// Mode during the call.
    pub mode: AlgoMode,
    /// Processor state after attach.
    pub attached_state: String,
    /// Processor state after detach.
    pub final_state: String,
    /// Frames handed to the processor.
    pub frames_delivered: usize,
    /// Frames that came back different.
    pub frames_altered: usize,
    /// Largest absolute input sample.
    pub input_peak: i32,
    /// Largest absolute output sample.
    pub output_peak: i32,
    /// RMS of all input samples.
    pub input_rms: f64,
    /// RMS of all output samples.
    pub output_rms: f64,
}

#[derive(Default)]
struct Meter {
    peak: i32,
    sum_sq: f64,
    count: usize,
}

impl Meter {
    fn feed(&mut self, samples: &[i16]) {
        for &s in samples {
            self.peak = self.peak.max(i32::from(s).abs());
            self.sum_sq += f64::from(s) * f64::from(s);
        }
        self.count += samples.len();
    }

    fn rms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.sum_sq / self.count as f64).sqrt()
        }
    }
}

impl CallScript {
    /// Tone samples of frame `index`, phase-continuous across frames.
    pub fn tone_frame(&self, index: usize) -> Vec<i16> {
        let start = index * self.frame_size;
        let rate = self.sample_rate.max(1) as f32;
        (start..start + self.frame_size)
            .map(|n| {
                let t = n as f32 / rate;
                ((2.0 * std::f32::consts::PI * self.tone_hz * t).sin() * f32::from(self.amplitude)) as i16
            })
            .collect()
    }

    /// Run the call on `app`, whose facility must be `host`.
    ///
    /// The instance is removed from the app when the call ends.
    pub fn run<H: Send + 'static>(&self, app: &App<H>, host: &LoopbackHost) -> Result<CallReport, SimError> {
        let session = Arc::new(SimSession::new(self.session_id.clone()));
        let handle = app.produce_instance(session, &self.args)?;
        handle.set_mode(self.mode)?;

        let mut input = Meter::default();
        let mut output = Meter::default();
        let mut frames_delivered = 0;
        let mut frames_altered = 0;

        let attached_state = match host.token_for(&self.session_id) {
            Some(token) => {
                host.attach(token, StreamFormat::mono(self.sample_rate, self.frame_size))?;
                let attached_state = format!("{:?}", handle.state());

                let kinds = directions(&handle);
                'call: for index in 0..self.frames {
                    let tone = self.tone_frame(index);
                    for &kind in &kinds {
                        let mut buf = tone.clone();
                        if !host.deliver(token, kind, &mut buf)? {
                            break 'call;
                        }
                        frames_delivered += 1;
                        frames_altered += usize::from(buf != tone);
                        input.feed(&tone);
                        output.feed(&buf);
                    }
                }
                attached_state
            }
            None => format!("{:?}", handle.state()),
        };

        app.remove_instance(&self.session_id)?;
        tracing::debug!(session = %self.session_id, frames_delivered, frames_altered, "call finished");

        Ok(CallReport {
            session: self.session_id.clone(),
            app: app.name().to_owned(),
            buffer_mode: format!("{:?}", handle.buffer_mode()),
            mode: handle.mode(),
            attached_state,
            final_state: format!("{:?}", handle.state()),
            frames_delivered,
            frames_altered,
            input_peak: input.peak,
            output_peak: output.peak,
            input_rms: input.rms(),
            output_rms: output.rms(),
        })
    }
}

fn directions(handle: &ProcessorHandle) -> Vec<FrameKind> {
    let mode = handle.buffer_mode();
    [
        (LinkDirection::Uplink, FrameKind::ReadReplace),
        (LinkDirection::Downlink, FrameKind::WriteReplace),
    ]
    .into_iter()
    .filter(|(dir, _)| mode.covers(*dir))
    .map(|(_, kind)| kind)
    .collect()
}
