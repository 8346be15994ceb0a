//! Where processed frames go: a WAV file or a playback device.

use crate::block::FrameBlock;
use crate::config::LiveOutput;
use crate::devices::{pick_device, Direction};
use crate::ring::RingBuffer;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Longest a live write waits for the device to make room.
const LIVE_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Longest close waits for queued audio to play out.
const LIVE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Accepts blocks. Empty blocks are ignored; mono blocks are spread across
/// the consumer's channels. `close` is idempotent.
pub trait Consumer {
    fn write(&mut self, block: &FrameBlock) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

fn shaped(block: &FrameBlock, channels: u16) -> Result<std::borrow::Cow<'_, FrameBlock>> {
    use std::borrow::Cow;
    if block.channels() == channels {
        Ok(Cow::Borrowed(block))
    } else {
        Ok(Cow::Owned(block.clone().to_channels(channels)?))
    }
}

/* ---------- file ---------- */

/// 16-bit PCM WAV writer.
pub struct FileConsumer {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    channels: u16,
}

impl FileConsumer {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32, channels: u16) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(&path, spec)?;
        tracing::info!(path = %path.display(), sample_rate, channels, "opened file consumer");
        Ok(Self { writer: Some(writer), path, channels })
    }
}

impl Consumer for FileConsumer {
    fn write(&mut self, block: &FrameBlock) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        let block = shaped(block, self.channels)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Stream(format!("{} is already closed", self.path.display())))?;
        for &s in block.samples() {
            let v = (s * 32768.0).round().clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(v)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            tracing::info!(path = %self.path.display(), "closed file consumer");
        }
        Ok(())
    }
}

/* ---------- live ---------- */

/// Playback device drained from a [`RingBuffer`] by the audio callback.
///
/// `write` waits for room so the processing loop runs at device speed.
pub struct LiveConsumer {
    stream: Option<cpal::Stream>,
    ring: Arc<RingBuffer>,
    channels: u16,
}

impl LiveConsumer {
    pub fn open(cfg: &LiveOutput, sample_rate: u32, channels: u16) -> Result<Self> {
        let host = cpal::default_host();
        let dev = pick_device(&host, Direction::Output, cfg.device.as_ref())?;
        let format = dev
            .default_output_config()
            .map_err(|e| Error::Device(e.to_string()))?
            .sample_format();

        let stream_cfg = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(cfg.block_size as u32),
        };
        let ring = Arc::new(RingBuffer::new(cfg.block_size * 4, channels)?);

        let scratch = cfg.block_size * channels as usize;
        let stream = match format {
            cpal::SampleFormat::F32 => build_output::<f32>(&dev, &stream_cfg, &ring, scratch),
            cpal::SampleFormat::I16 => build_output::<i16>(&dev, &stream_cfg, &ring, scratch),
            cpal::SampleFormat::U16 => build_output::<u16>(&dev, &stream_cfg, &ring, scratch),
            other => return Err(Error::UnsupportedFormat(format!("{other:?}"))),
        }?;
        stream.play().map_err(|e| Error::Stream(format!("failed to start output: {e}")))?;

        tracing::info!(
            device = %dev.name().unwrap_or_default(),
            sample_rate,
            channels,
            "opened live consumer"
        );
        Ok(Self { stream: Some(stream), ring, channels })
    }
}

fn build_output<T>(
    dev: &cpal::Device,
    cfg: &cpal::StreamConfig,
    ring: &Arc<RingBuffer>,
    scratch_len: usize,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let ring = Arc::clone(ring);
    let channels = cfg.channels as usize;
    let mut scratch = vec![0.0f32; scratch_len];
    dev.build_output_stream::<T, _, _>(
        cfg,
        move |out: &mut [T], _: &cpal::OutputCallbackInfo| {
            if scratch.len() < out.len() {
                scratch.resize(out.len(), 0.0);
            }
            let buf = &mut scratch[..out.len()];
            let frames = ring.read_into(buf);
            // underrun: pad with silence
            buf[frames * channels..].fill(0.0);
            for (o, &v) in out.iter_mut().zip(buf.iter()) {
                *o = v.clamp(-1.0, 1.0).to_sample::<T>();
            }
        },
        move |err| tracing::error!(%err, "output stream error"),
        None,
    )
    .map_err(|e| Error::Stream(format!("failed to build output stream: {e}")))
}

impl Consumer for LiveConsumer {
    fn write(&mut self, block: &FrameBlock) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        if self.stream.is_none() {
            return Err(Error::Stream("live consumer is already closed".into()));
        }
        let block = shaped(block, self.channels)?;
        let ch = self.channels as usize;
        for chunk in block.samples().chunks(self.ring.capacity() * ch) {
            let frames = chunk.len() / ch;
            if !self.ring.wait_for_room(frames, LIVE_WRITE_TIMEOUT) {
                tracing::warn!(frames, "playback stalled, overwriting queued audio");
            }
            self.ring.write_interleaved(chunk)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            // let queued audio play out
            if !self.ring.wait_for_room(self.ring.capacity(), LIVE_DRAIN_TIMEOUT) {
                tracing::debug!("closing with audio still queued");
            }
            if let Err(e) = stream.pause() {
                tracing::debug!(err = %e, "pause on close failed");
            }
            tracing::info!("closed live consumer");
        }
        Ok(())
    }
}

impl Drop for LiveConsumer {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
