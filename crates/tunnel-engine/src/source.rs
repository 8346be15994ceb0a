//! Where frames come from: a WAV file or a capture device.

use crate::block::FrameBlock;
use crate::config::LiveInput;
use crate::devices::{pick_device, Direction};
use crate::ring::RingBuffer;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Sample, SizedSample};
use hound::{SampleFormat, WavReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Longest a live read waits for a full block.
const LIVE_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Produces blocks on demand.
///
/// `read` may return fewer frames than asked for; an empty block means the
/// source is exhausted or had nothing within its wait window. `close` is
/// idempotent and a closed source reads empty.
pub trait Source {
    fn read(&mut self, max_frames: usize) -> Result<FrameBlock>;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
    fn close(&mut self) -> Result<()>;
}

/* ---------- file ---------- */

pub struct FileSource {
    reader: Option<WavReader<BufReader<File>>>,
    sample_rate: u32,
    channels: u16,
    // None for float files
    int_scale: Option<f32>,
    // samples (not frames) left in the data chunk
    remaining: usize,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        let int_scale = match spec.sample_format {
            SampleFormat::Float => None,
            SampleFormat::Int => Some(1.0 / (1u32 << (spec.bits_per_sample - 1)) as f32),
        };
        tracing::info!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            bits = spec.bits_per_sample,
            "opened file source"
        );
        let remaining = reader.len() as usize;
        Ok(Self {
            reader: Some(reader),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            int_scale,
            remaining,
        })
    }
}

impl Source for FileSource {
    fn read(&mut self, max_frames: usize) -> Result<FrameBlock> {
        let ch = self.channels as usize;
        let Some(reader) = self.reader.as_mut() else {
            return Ok(FrameBlock::empty(self.channels));
        };
        let want = max_frames.saturating_mul(ch).min(self.remaining);
        let mut out = Vec::with_capacity(want);
        match self.int_scale {
            Some(scale) => {
                for s in reader.samples::<i32>().take(want) {
                    out.push(s? as f32 * scale);
                }
            }
            None => {
                for s in reader.samples::<f32>().take(want) {
                    out.push(s?);
                }
            }
        }
        self.remaining -= out.len();
        // a truncated file can end mid-frame
        out.truncate(out.len() - out.len() % ch);
        Ok(FrameBlock::from_interleaved(out, self.channels))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

/* ---------- live ---------- */

/// Capture device feeding a [`RingBuffer`] from the audio callback.
pub struct LiveSource {
    stream: Option<cpal::Stream>,
    ring: Arc<RingBuffer>,
    sample_rate: u32,
    channels: u16,
}

impl LiveSource {
    pub fn open(cfg: &LiveInput) -> Result<Self> {
        let host = cpal::default_host();
        let dev = pick_device(&host, Direction::Input, cfg.device.as_ref())?;
        let format = dev
            .default_input_config()
            .map_err(|e| Error::Device(e.to_string()))?
            .sample_format();

        let stream_cfg = cpal::StreamConfig {
            channels: cfg.channels,
            sample_rate: cpal::SampleRate(cfg.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(cfg.block_size as u32),
        };

        let buffered = (f64::from(cfg.sample_rate) * f64::from(cfg.buffer_seconds)) as usize;
        let capacity = (cfg.block_size * 4).max(buffered);
        let ring = Arc::new(RingBuffer::new(capacity, cfg.channels)?);

        let scratch = cfg.block_size * cfg.channels as usize;
        let stream = match format {
            cpal::SampleFormat::F32 => build_input::<f32>(&dev, &stream_cfg, &ring, scratch),
            cpal::SampleFormat::I16 => build_input::<i16>(&dev, &stream_cfg, &ring, scratch),
            cpal::SampleFormat::U16 => build_input::<u16>(&dev, &stream_cfg, &ring, scratch),
            other => return Err(Error::UnsupportedFormat(format!("{other:?}"))),
        }?;
        stream.play().map_err(|e| Error::Stream(format!("failed to start input: {e}")))?;

        tracing::info!(
            device = %dev.name().unwrap_or_default(),
            sample_rate = cfg.sample_rate,
            channels = cfg.channels,
            capacity,
            "opened live source"
        );
        Ok(Self {
            stream: Some(stream),
            ring,
            sample_rate: cfg.sample_rate,
            channels: cfg.channels,
        })
    }
}

fn build_input<T>(
    dev: &cpal::Device,
    cfg: &cpal::StreamConfig,
    ring: &Arc<RingBuffer>,
    scratch_len: usize,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
{
    let ring = Arc::clone(ring);
    // Scratch buffer reused in the input callback (avoid allocs)
    let mut scratch = Vec::<f32>::with_capacity(scratch_len);
    dev.build_input_stream::<T, _, _>(
        cfg,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
            if let Err(err) = ring.write_interleaved(&scratch) {
                tracing::warn!(%err, "dropping capture callback data");
            }
        },
        move |err| tracing::error!(%err, "input stream error"),
        None,
    )
    .map_err(|e| Error::Stream(format!("failed to build input stream: {e}")))
}

impl Source for LiveSource {
    fn read(&mut self, max_frames: usize) -> Result<FrameBlock> {
        if self.stream.is_none() {
            return Ok(FrameBlock::empty(self.channels));
        }
        Ok(self.ring.read(max_frames, true, Some(LIVE_READ_TIMEOUT)))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!(err = %e, "pause on close failed");
            }
            self.ring.clear();
            tracing::info!("closed live source");
        }
        Ok(())
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
