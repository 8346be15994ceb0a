//! Error types for the streaming engine.

/// Everything that can go wrong while configuring or running a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A descriptor field holds an unusable value.
    #[error("invalid {descriptor} configuration: {field} {reason}")]
    Config {
        descriptor: &'static str,
        field: &'static str,
        reason: String,
    },

    /// A required piece of configuration was never supplied.
    #[error("not configured: {0}")]
    NotConfigured(&'static str),

    /// Effect name not present in the registry.
    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    /// Parameter name not understood by the effect.
    #[error("effect '{effect}' has no parameter '{param}'")]
    UnknownParam { effect: &'static str, param: String },

    /// Audio data does not have the channel layout the receiver expects.
    #[error("channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: u16, actual: u16 },

    /// Interleaved data whose length is not a whole number of frames.
    #[error("{len} samples is not a whole number of {channels}-channel frames")]
    PartialFrame { len: usize, channels: u16 },

    /// Audio host or device failure.
    #[error("device error: {0}")]
    Device(String),

    /// No device matched and the host offers no default.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The device only speaks a sample format we cannot convert.
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Stream setup or runtime failure.
    #[error("stream error: {0}")]
    Stream(String),

    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(
        descriptor: &'static str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config { descriptor, field, reason: reason.into() }
    }

    /// True for errors caused by a bad call rather than by the environment.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::NotConfigured(_)
                | Self::UnknownEffect(_)
                | Self::UnknownParam { .. }
                | Self::ChannelMismatch { .. }
                | Self::PartialFrame { .. }
        )
    }
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
