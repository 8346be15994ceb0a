//! Input/output descriptors and engine-wide defaults.

use crate::{Error, Result};
use std::path::PathBuf;

/// Fallbacks for live descriptors and the default `start()` block size.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: usize, // frames per pipeline cycle
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { sample_rate: 44100, channels: 1, block_size: 1024 }
    }
}

/// How to pick an audio device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Position among the devices that support the direction, as listed.
    Index(usize),
    /// Case-insensitive substring of the device name.
    Name(String),
}

impl From<&str> for DeviceSelector {
    /// Digits select by index, anything else by name.
    fn from(s: &str) -> Self {
        match s.trim().parse::<usize>() {
            Ok(i) => DeviceSelector::Index(i),
            Err(_) => DeviceSelector::Name(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveInput {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_size: usize,
    pub device: Option<DeviceSelector>,
    /// Ring buffer length in seconds of audio.
    pub buffer_seconds: f32,
}

impl LiveInput {
    /// Live capture at the engine defaults on the default device.
    pub fn from_defaults(cfg: &EngineConfig) -> Self {
        Self {
            sample_rate: cfg.sample_rate,
            channels: cfg.channels,
            block_size: cfg.block_size,
            device: None,
            buffer_seconds: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputConfig {
    File { path: PathBuf },
    Live(LiveInput),
}

impl InputConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        InputConfig::File { path: path.into() }
    }

    pub fn validate(&self) -> Result<()> {
        const D: &str = "input";
        match self {
            InputConfig::File { path } => validate_path(D, path),
            InputConfig::Live(live) => {
                positive(D, "sample_rate", live.sample_rate as usize)?;
                positive(D, "channels", live.channels as usize)?;
                positive(D, "block_size", live.block_size)?;
                if !(live.buffer_seconds.is_finite() && live.buffer_seconds >= 0.0) {
                    return Err(Error::config(D, "buffer_seconds", "must be a finite value >= 0"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveOutput {
    /// `None` follows the source.
    pub sample_rate: Option<u32>,
    /// `None` follows the source.
    pub channels: Option<u16>,
    pub block_size: usize,
    pub device: Option<DeviceSelector>,
}

impl LiveOutput {
    /// Playback that follows the source format on the default device.
    pub fn following_source(cfg: &EngineConfig) -> Self {
        Self { sample_rate: None, channels: None, block_size: cfg.block_size, device: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputConfig {
    File {
        path: PathBuf,
        sample_rate: Option<u32>,
        channels: Option<u16>,
    },
    Live(LiveOutput),
}

impl OutputConfig {
    /// WAV output in the source's format.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        OutputConfig::File { path: path.into(), sample_rate: None, channels: None }
    }

    pub fn validate(&self) -> Result<()> {
        const D: &str = "output";
        let (sample_rate, channels) = match self {
            OutputConfig::File { path, sample_rate, channels } => {
                validate_path(D, path)?;
                (*sample_rate, *channels)
            }
            OutputConfig::Live(live) => {
                positive(D, "block_size", live.block_size)?;
                (live.sample_rate, live.channels)
            }
        };
        if let Some(sr) = sample_rate {
            positive(D, "sample_rate", sr as usize)?;
        }
        if let Some(ch) = channels {
            positive(D, "channels", ch as usize)?;
        }
        Ok(())
    }
}

fn validate_path(descriptor: &'static str, path: &std::path::Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::config(descriptor, "path", "must not be empty"));
    }
    Ok(())
}

fn positive(descriptor: &'static str, field: &'static str, v: usize) -> Result<()> {
    if v == 0 {
        return Err(Error::config(descriptor, field, "must be > 0"));
    }
    Ok(())
}
