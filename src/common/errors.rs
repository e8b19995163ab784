use thiserror::Error;

use super::types::ChannelId;

/// Errors surfaced by mixer construction, loading and channel control.
#[derive(Error, Debug)]
pub enum MixerError {
    /// A memory reservation for sound data or a source failed.
    #[error("allocation failed")]
    Allocation,

    /// No decoder recognised the header bytes.
    #[error("unknown format or invalid data")]
    UnknownFormat,

    /// The container was recognised but is malformed or unsupported.
    #[error("{0}")]
    Format(String),

    /// Every channel is occupied by a source that is still playing.
    #[error("no free channels available")]
    NoFreeChannel,

    /// The decoder rejected its input.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("could not load file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid channel {0}")]
    InvalidChannel(ChannelId),

    #[error("no sound playing on channel {0}")]
    EmptyChannel(ChannelId),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MixerError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}

impl From<symphonia::core::errors::Error> for MixerError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<std::collections::TryReserveError> for MixerError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::Allocation
    }
}

/// Result type for mixer operations.
pub type MixerResult<T> = Result<T, MixerError>;
