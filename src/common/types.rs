use std::sync::Arc;

/// Application-facing channel handle (`0..channels`).
pub type ChannelId = usize;

/// Invoked with the channel handle once a non-looping play-through completes.
pub type FinishedCallback = Arc<dyn Fn(ChannelId) + Send + Sync>;

/// Container formats recognised by the header probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Ogg,
    Unknown,
}

impl AudioFormat {
    pub fn as_ext(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Unknown => "",
        }
    }

    pub fn as_mime(&self) -> Option<&'static str> {
        match self {
            Self::Wav => Some("audio/wav"),
            Self::Ogg => Some("audio/ogg"),
            Self::Unknown => None,
        }
    }
}
