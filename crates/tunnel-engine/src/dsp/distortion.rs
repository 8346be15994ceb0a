use super::effect::{Effect, Params};
use crate::block::FrameBlock;
use crate::{Error, Result};

/// tanh waveshaper with level compensation and dry/wet blend.
///
/// `intensity` sets the drive: the input is multiplied by `(intensity + 1)²`,
/// limited to ±8 and shaped by `tanh`, then scaled back down by
/// `max(0.25, 1 / drive)`. Output is clipped to [-1, 1].
pub struct Distortion {
    /// Drive amount, `>= 0`.
    pub intensity: f32,
    /// Wet fraction in [0, 1].
    pub mix: f32,
}

impl Distortion {
    pub fn new(intensity: f32, mix: f32) -> Self {
        let mut d = Self { intensity, mix };
        d.clamp_params();
        d
    }

    fn clamp_params(&mut self) {
        self.intensity = if self.intensity.is_nan() { 0.0 } else { self.intensity.max(0.0) };
        self.mix = if self.mix.is_nan() { 1.0 } else { self.mix.clamp(0.0, 1.0) };
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new(5.0, 1.0)
    }
}

impl Effect for Distortion {
    fn name(&self) -> &'static str {
        "distortion"
    }

    fn set_param(&mut self, key: &str, value: f32) -> Result<()> {
        match key {
            "intensity" => self.intensity = value,
            "mix" => self.mix = value,
            _ => return Err(Error::UnknownParam { effect: self.name(), param: key.into() }),
        }
        Ok(())
    }

    fn params(&self) -> Params {
        vec![("intensity", self.intensity), ("mix", self.mix)]
    }

    fn process(&mut self, block: &mut FrameBlock, _sample_rate: u32) {
        if block.is_empty() {
            return;
        }
        self.clamp_params();

        let pre_gain = (self.intensity + 1.0).powi(2);
        let comp = (1.0 / pre_gain).max(0.25);
        let mix = self.mix;

        for s in block.samples_mut() {
            let x = if s.is_nan() { 0.0 } else { s.clamp(f32::MIN, f32::MAX) };
            let driven = (x * pre_gain).clamp(-8.0, 8.0).tanh();
            let wet = driven * comp;
            *s = (x * (1.0 - mix) + wet * mix).clamp(-1.0, 1.0);
        }
    }
}
