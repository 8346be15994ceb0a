use crate::{Error, Result};

/// A run of interleaved frames, `channels` samples per frame.
///
/// Samples are f32, nominally in [-1, 1]. The channel count is fixed for the
/// lifetime of the block and the sample vector always holds whole frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBlock {
    samples: Vec<f32>,
    channels: u16,
}

impl FrameBlock {
    /// Wrap interleaved samples. Fails unless they form whole frames.
    pub fn new(samples: Vec<f32>, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(Error::config("block", "channels", "must be > 0"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(Error::PartialFrame { len: samples.len(), channels });
        }
        Ok(Self { samples, channels })
    }

    /// Caller guarantees `samples` holds whole frames and `channels > 0`.
    pub(crate) fn from_interleaved(samples: Vec<f32>, channels: u16) -> Self {
        debug_assert!(channels > 0 && samples.len() % channels as usize == 0);
        Self { samples, channels }
    }

    /// Zero-frame block.
    pub fn empty(channels: u16) -> Self {
        Self { samples: Vec::new(), channels: channels.max(1) }
    }

    /// Single-channel block; one sample per frame.
    pub fn from_mono(samples: Vec<f32>) -> Self {
        Self { samples, channels: 1 }
    }

    pub fn silence(frames: usize, channels: u16) -> Self {
        let channels = channels.max(1);
        Self { samples: vec![0.0; frames * channels as usize], channels }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Samples of frame `i`, one per channel.
    pub fn frame(&self, i: usize) -> &[f32] {
        let ch = self.channels as usize;
        &self.samples[i * ch..(i + 1) * ch]
    }

    pub fn frames_iter(&self) -> std::slice::ChunksExact<'_, f32> {
        self.samples.chunks_exact(self.channels as usize)
    }

    pub fn frames_iter_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        self.samples.chunks_exact_mut(self.channels as usize)
    }

    /// Reshape to `channels`.
    ///
    /// Mono fans out to every channel and anything folds down to mono by
    /// averaging; other layout changes are rejected.
    pub fn to_channels(self, channels: u16) -> Result<Self> {
        if channels == self.channels {
            return Ok(self);
        }
        if self.channels == 1 && channels > 1 {
            let n = channels as usize;
            let mut out = Vec::with_capacity(self.samples.len() * n);
            for &s in &self.samples {
                out.extend(std::iter::repeat(s).take(n));
            }
            return Ok(Self { samples: out, channels });
        }
        if channels == 1 {
            let n = self.channels as f32;
            let samples = self.frames_iter().map(|f| f.iter().sum::<f32>() / n).collect();
            return Ok(Self { samples, channels: 1 });
        }
        Err(Error::ChannelMismatch { expected: channels, actual: self.channels })
    }

    /// Clamp every sample into `[lo, hi]`.
    pub fn clip(&mut self, lo: f32, hi: f32) {
        for s in self.samples.iter_mut() {
            *s = s.clamp(lo, hi);
        }
    }
}
