use super::effect::{Effect, Params};
use crate::block::FrameBlock;
use crate::{Error, Result};

const MAX_FEEDBACK: f32 = 0.9;
/// Longest delay the line will be sized for.
pub const MAX_DELAY_MS: f32 = 5000.0;

/// Feedback delay.
///
/// Per sample, with `p` walking a circular line of `delay` frames:
/// `out = in + line[p]`, then `line[p] = in + line[p] * feedback`.
/// `delay_ms` is held to `[0, MAX_DELAY_MS]`.
/// The line length is `max(1, round(delay_ms * sr / 1000))`; it is rebuilt
/// (silent) when that length or the channel count changes.
pub struct Echo {
    pub delay_ms: f32,
    pub feedback: f32,
    line: Vec<f32>,
    // (frames, channels) the line was built for
    shape: (usize, u16),
    pos: usize,
}

impl Echo {
    pub fn new(delay_ms: f32, feedback: f32) -> Self {
        let mut e = Self { delay_ms, feedback, line: Vec::new(), shape: (0, 0), pos: 0 };
        e.clamp_params();
        e
    }

    fn clamp_params(&mut self) {
        self.delay_ms = if self.delay_ms.is_nan() {
            0.0
        } else {
            self.delay_ms.clamp(0.0, MAX_DELAY_MS)
        };
        self.feedback = if self.feedback.is_nan() {
            0.0
        } else {
            self.feedback.clamp(0.0, MAX_FEEDBACK)
        };
    }

    fn delay_frames(&self, sample_rate: u32) -> usize {
        let n = (f64::from(self.delay_ms) * f64::from(sample_rate) / 1000.0).round();
        (n as usize).max(1)
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::new(400.0, 0.35)
    }
}

impl Effect for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn set_param(&mut self, key: &str, value: f32) -> Result<()> {
        match key {
            "delay_ms" => self.delay_ms = value,
            "feedback" => self.feedback = value,
            _ => return Err(Error::UnknownParam { effect: self.name(), param: key.into() }),
        }
        Ok(())
    }

    fn params(&self) -> Params {
        vec![("delay_ms", self.delay_ms), ("feedback", self.feedback)]
    }

    fn process(&mut self, block: &mut FrameBlock, sample_rate: u32) {
        if block.is_empty() || sample_rate == 0 {
            return;
        }
        self.clamp_params();

        let ch = block.channels();
        let delay = self.delay_frames(sample_rate);
        if self.shape != (delay, ch) {
            tracing::debug!(delay, channels = ch, "echo: allocating delay line");
            self.line = vec![0.0; delay * ch as usize];
            self.shape = (delay, ch);
            self.pos = 0;
        }

        let fb = self.feedback;
        for frame in block.frames_iter_mut() {
            let base = self.pos * ch as usize;
            let tap = &mut self.line[base..base + ch as usize];
            for (x, slot) in frame.iter_mut().zip(tap.iter_mut()) {
                let delayed = *slot;
                let dry = *x;
                *x = dry + delayed;
                *slot = dry + delayed * fb;
            }
            self.pos = (self.pos + 1) % delay;
        }
        block.clip(-1.0, 1.0);
    }

    fn reset(&mut self) {
        self.line.clear();
        self.shape = (0, 0);
        self.pos = 0;
    }
}
