//! Small Schroeder-style room: four damped combs in parallel feeding two
//! all-pass diffusers in series.
//!
//! Delay lengths are tuned for 44.1 kHz and scaled to the running sample
//! rate; the comb lengths also grow with `room_size` (0.5x to 3x). Any change
//! in the resulting lengths or in the channel count rebuilds every line from
//! silence.

use super::effect::{Effect, Params};
use crate::block::FrameBlock;
use crate::{Error, Result};

const COMB_TUNING: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_TUNING: [usize; 2] = [556, 441];
const ALLPASS_FEEDBACK: f32 = 0.5;
const TUNING_RATE: f64 = 44100.0;

struct Comb {
    buf: Vec<f32>,
    len: usize,
    pos: usize,
    // one-pole low-pass state per channel
    damp: Vec<f32>,
}

struct AllPass {
    buf: Vec<f32>,
    len: usize,
    pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shape {
    combs: [usize; 4],
    allpasses: [usize; 2],
    channels: u16,
}

pub struct Reverb {
    pub room_size: f32,
    pub damping: f32,
    pub mix: f32,
    combs: Vec<Comb>,
    allpasses: Vec<AllPass>,
    acc: Vec<f32>,
    shape: Option<Shape>,
}

impl Reverb {
    pub fn new(room_size: f32, damping: f32, mix: f32) -> Self {
        let mut r = Self {
            room_size,
            damping,
            mix,
            combs: Vec::new(),
            allpasses: Vec::new(),
            acc: Vec::new(),
            shape: None,
        };
        r.clamp_params();
        r
    }

    fn clamp_params(&mut self) {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        self.room_size = unit(self.room_size);
        self.damping = unit(self.damping);
        self.mix = unit(self.mix);
    }

    fn shape_for(&self, sample_rate: u32, channels: u16) -> Shape {
        let scale = f64::from(sample_rate) / TUNING_RATE;
        let room_scale = 0.5 + f64::from(self.room_size) * 2.5;
        Shape {
            combs: COMB_TUNING.map(|t| ((t as f64 * scale * room_scale) as usize).max(1)),
            allpasses: ALLPASS_TUNING.map(|t| ((t as f64 * scale) as usize).max(1)),
            channels,
        }
    }

    fn allocate(&mut self, shape: Shape) {
        tracing::debug!(
            combs = ?shape.combs,
            allpasses = ?shape.allpasses,
            channels = shape.channels,
            "reverb: allocating lines"
        );
        let ch = shape.channels as usize;
        self.combs = shape
            .combs
            .iter()
            .map(|&len| Comb { buf: vec![0.0; len * ch], len, pos: 0, damp: vec![0.0; ch] })
            .collect();
        self.allpasses = shape
            .allpasses
            .iter()
            .map(|&len| AllPass { buf: vec![0.0; len * ch], len, pos: 0 })
            .collect();
        self.acc = vec![0.0; ch];
        self.shape = Some(shape);
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new(0.5, 0.5, 0.3)
    }
}

impl Effect for Reverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn set_param(&mut self, key: &str, value: f32) -> Result<()> {
        match key {
            "room_size" => self.room_size = value,
            "damping" => self.damping = value,
            "mix" => self.mix = value,
            _ => return Err(Error::UnknownParam { effect: self.name(), param: key.into() }),
        }
        Ok(())
    }

    fn params(&self) -> Params {
        vec![("room_size", self.room_size), ("damping", self.damping), ("mix", self.mix)]
    }

    fn process(&mut self, block: &mut FrameBlock, sample_rate: u32) {
        if block.is_empty() || sample_rate == 0 {
            return;
        }
        self.clamp_params();

        let shape = self.shape_for(sample_rate, block.channels());
        if self.shape != Some(shape) {
            self.allocate(shape);
        }

        let ch = block.channels() as usize;
        let damping = self.damping;
        let fb = 0.5 + self.room_size * 0.4;
        let wet_gain = 1.0 + self.room_size * 0.5;
        let mix = self.mix;

        for frame in block.frames_iter_mut() {
            self.acc.fill(0.0);

            for comb in self.combs.iter_mut() {
                let base = comb.pos * ch;
                for c in 0..ch {
                    let delayed = comb.buf[base + c];
                    comb.damp[c] = comb.damp[c] * (1.0 - damping) + delayed * damping;
                    self.acc[c] += delayed;
                    comb.buf[base + c] = frame[c] + comb.damp[c] * fb;
                }
                comb.pos = (comb.pos + 1) % comb.len;
            }

            for a in self.acc.iter_mut() {
                *a *= 0.25;
            }

            for ap in self.allpasses.iter_mut() {
                let base = ap.pos * ch;
                for c in 0..ch {
                    let input = self.acc[c];
                    let delayed = ap.buf[base + c];
                    ap.buf[base + c] = input + delayed * ALLPASS_FEEDBACK;
                    self.acc[c] = -input + delayed;
                }
                ap.pos = (ap.pos + 1) % ap.len;
            }

            for (x, &w) in frame.iter_mut().zip(self.acc.iter()) {
                *x = *x * (1.0 - mix) + w * wet_gain * mix;
            }
        }
        block.clip(-1.0, 1.0);
    }

    fn reset(&mut self) {
        self.combs.clear();
        self.allpasses.clear();
        self.acc.clear();
        self.shape = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize) -> FrameBlock {
        let mut v = vec![0.0; len];
        v[0] = 1.0;
        FrameBlock::from_mono(v)
    }

    #[test]
    fn line_lengths_scale_with_rate_and_room() {
        let r = Reverb::new(0.0, 0.5, 0.3);
        let s = r.shape_for(44100, 1);
        assert_eq!(s.combs, [558, 594, 638, 678]);
        assert_eq!(s.allpasses, [556, 441]);

        let r = Reverb::new(1.0, 0.5, 0.3);
        let s = r.shape_for(22050, 2);
        assert_eq!(s.combs, [1674, 1782, 1915, 2034]);
        assert_eq!(s.allpasses, [278, 220]);
    }

    #[test]
    fn dry_only_passes_input() {
        let mut r = Reverb::new(0.8, 0.2, 0.0);
        let mut b = FrameBlock::from_mono(vec![0.5, -0.25, 0.125]);
        r.process(&mut b, 44100);
        assert_eq!(b.samples(), &[0.5, -0.25, 0.125]);
    }

    #[test]
    fn wet_signal_arrives_after_shortest_comb() {
        // room 0 at 44.1k: shortest comb 558 frames
        let mut r = Reverb::new(0.0, 0.0, 1.0);
        let mut b = impulse(1200);
        r.process(&mut b, 44100);
        let s = b.samples();
        assert!(s[..558].iter().all(|&v| v == 0.0));
        assert!(s[558..].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn tail_continues_across_blocks() {
        let mut whole = Reverb::default();
        let mut one = impulse(4000);
        whole.process(&mut one, 44100);

        let mut split = Reverb::default();
        let mut a = impulse(1500);
        let mut b = FrameBlock::silence(2500, 1);
        split.process(&mut a, 44100);
        split.process(&mut b, 44100);

        let joined: Vec<f32> = a.samples().iter().chain(b.samples()).copied().collect();
        assert_eq!(joined.as_slice(), one.samples());
    }

    #[test]
    fn rate_change_resets_tail() {
        let mut r = Reverb::new(0.5, 0.5, 1.0);
        r.process(&mut impulse(64), 44100);
        let mut b = FrameBlock::silence(4096, 1);
        r.process(&mut b, 48000);
        assert!(b.samples().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn output_bounded() {
        let mut r = Reverb::new(1.0, 0.0, 1.0);
        let mut b = FrameBlock::new(vec![1.0; 20000], 2).unwrap();
        r.process(&mut b, 44100);
        assert!(b.samples().iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }
}
