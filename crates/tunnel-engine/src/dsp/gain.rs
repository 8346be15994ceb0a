use super::effect::{Effect, Params};
use crate::block::FrameBlock;
use crate::{Error, Result};

/// Gain range in dB; anything outside is held at the nearest bound.
pub const GAIN_DB_RANGE: (f32, f32) = (-120.0, 120.0);

/// Linear gain with dB control. Unclipped.
pub struct Gain {
    pub db: f32,
    lin: f32,
}

impl Gain {
    pub fn new(db: f32) -> Self {
        let mut g = Self { db, lin: 1.0 };
        g.recompute();
        g
    }
    fn recompute(&mut self) {
        if !self.db.is_nan() {
            self.db = self.db.clamp(GAIN_DB_RANGE.0, GAIN_DB_RANGE.1);
        }
        self.lin = 10f32.powf(self.db / 20.0);
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Effect for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }
    fn set_param(&mut self, key: &str, value: f32) -> Result<()> {
        match key {
            "gain_db" => self.db = value,
            _ => return Err(Error::UnknownParam { effect: self.name(), param: key.into() }),
        }
        Ok(())
    }
    fn params(&self) -> Params {
        vec![("gain_db", self.db)]
    }
    fn process(&mut self, block: &mut FrameBlock, _sample_rate: u32) {
        if block.is_empty() || self.db.is_nan() {
            return;
        }
        // `db` is public, so pick up edits made since the last block.
        self.recompute();
        let g = self.lin;
        for s in block.samples_mut() {
            *s *= g;
        }
    }
}
