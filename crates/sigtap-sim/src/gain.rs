//! Fixed-gain demo algorithm.

use sigtap_core::{Algorithm, AudioFrame, ChannelModel, Error, Result};

/// Scales every sample by a constant factor, saturating at full scale.
///
/// Arguments: `gain=<factor>`, with `factor` finite and non-negative. An
/// empty argument string means unity gain.
#[derive(Debug, Clone, PartialEq)]
pub struct Gain {
    factor: f32,
    clipped: u64,
}

impl Gain {
    /// Parse the instance arguments.
    pub fn parse_args(args: &str) -> Result<f32> {
        let mut factor = 1.0;
        for pair in args.split([',', ' ']).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::invalid_argument(format!("expected key=value, got '{pair}'")))?;
            match key.trim() {
                "gain" => {
                    factor = value
                        .trim()
                        .parse::<f32>()
                        .map_err(|e| Error::invalid_argument(format!("gain '{value}': {e}")))?;
                }
                other => return Err(Error::invalid_argument(format!("unknown argument '{other}'"))),
            }
        }
        if !factor.is_finite() || factor < 0.0 {
            return Err(Error::invalid_argument(format!("gain {factor} out of range")));
        }
        Ok(factor)
    }

    /// Gain factor.
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Samples that hit full scale so far.
    pub fn clipped(&self) -> u64 {
        self.clipped
    }
}

impl Algorithm for Gain {
    fn construct(model: &ChannelModel, args: &str) -> Result<Self> {
        let factor = Self::parse_args(args)?;
        tracing::debug!(factor, link = %model.which_link(), rate = model.sample_rate(), "gain constructed");
        Ok(Self { factor, clipped: 0 })
    }

    fn process(&mut self, frame: &mut AudioFrame<'_>, _model: &ChannelModel) {
        for s in frame.samples_mut() {
            let scaled = f32::from(*s) * self.factor;
            if scaled >= f32::from(i16::MAX) || scaled <= f32::from(i16::MIN) {
                self.clipped += 1;
            }
            *s = scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        }
    }

    fn terminate(&mut self) -> Result<()> {
        if self.clipped > 0 {
            tracing::info!(clipped = self.clipped, factor = self.factor, "gain clipped samples");
        }
        Ok(())
    }
}
