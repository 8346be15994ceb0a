use super::effect::{Effect, Params};
use crate::block::FrameBlock;
use crate::{Error, Result};
use std::f64::consts::TAU;

/// Sine amplitude modulation.
///
/// Gain swings between `1 - depth` and `1`. The oscillator phase is carried
/// across blocks.
pub struct Tremolo {
    pub rate_hz: f32,
    pub depth: f32,
    phase: f64,
}

impl Tremolo {
    pub fn new(rate_hz: f32, depth: f32) -> Self {
        let mut t = Self { rate_hz, depth, phase: 0.0 };
        t.clamp_params();
        t
    }

    fn clamp_params(&mut self) {
        self.rate_hz = if self.rate_hz.is_finite() { self.rate_hz.max(0.0) } else { 0.0 };
        self.depth = if self.depth.is_nan() { 0.0 } else { self.depth.clamp(0.0, 1.0) };
    }
}

impl Default for Tremolo {
    fn default() -> Self {
        Self::new(5.0, 0.7)
    }
}

impl Effect for Tremolo {
    fn name(&self) -> &'static str {
        "tremolo"
    }

    fn set_param(&mut self, key: &str, value: f32) -> Result<()> {
        match key {
            "rate_hz" => self.rate_hz = value,
            "depth" => self.depth = value,
            _ => return Err(Error::UnknownParam { effect: self.name(), param: key.into() }),
        }
        Ok(())
    }

    fn params(&self) -> Params {
        vec![("rate_hz", self.rate_hz), ("depth", self.depth)]
    }

    fn process(&mut self, block: &mut FrameBlock, sample_rate: u32) {
        if block.is_empty() || sample_rate == 0 {
            return;
        }
        self.clamp_params();

        let depth = f64::from(self.depth);
        let inc = TAU * f64::from(self.rate_hz) / f64::from(sample_rate);
        for frame in block.frames_iter_mut() {
            let osc = (1.0 - depth) + depth * 0.5 * (1.0 + self.phase.sin());
            for s in frame.iter_mut() {
                *s = (f64::from(*s) * osc) as f32;
            }
            self.phase = (self.phase + inc) % TAU;
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}
