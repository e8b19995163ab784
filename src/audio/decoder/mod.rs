//! Decoder capability: format-specific streams that produce interleaved
//! stereo i16 PCM on demand.
//!
//! A decoder is released by dropping it. Built-in streams share the encoded
//! bytes through an `Arc`, so the raw buffer is freed with the last user.

pub mod ogg;
pub mod wav;

use std::sync::Arc;

use tracing::debug;

use crate::audio::demux::{AudioFormat, detect_format};
use crate::common::{MixerError, MixerResult};

pub use ogg::OggStream;
pub use wav::WavStream;

pub trait Decoder: Send {
    /// Fill all of `dst` with interleaved stereo samples.
    ///
    /// When the request crosses the end of the stream the decoder continues
    /// from the start within the same call.
    fn produce(&mut self, dst: &mut [i16]);

    /// Reset the decode cursor to the first frame.
    fn rewind(&mut self);
}

/// An opened stream, ready to be bound to a source.
pub struct StreamInfo {
    /// Native sample rate in Hz.
    pub sample_rate: u32,
    /// Stream length in frames.
    pub length: u64,
    pub decoder: Box<dyn Decoder>,
    /// Encoded bytes the decoder reads from, when it came from a `Sound`.
    pub(crate) origin: Option<Arc<[u8]>>,
}

impl StreamInfo {
    pub fn new(sample_rate: u32, length: u64, decoder: Box<dyn Decoder>) -> Self {
        Self {
            sample_rate,
            length,
            decoder,
            origin: None,
        }
    }
}

/// Probe `data` and open the matching decoder.
pub fn open(data: Arc<[u8]>) -> MixerResult<StreamInfo> {
    let format = detect_format(&data);
    let mut info = match format {
        AudioFormat::Wav => WavStream::open(Arc::clone(&data))?,
        AudioFormat::Ogg => OggStream::open(Arc::clone(&data))?,
        AudioFormat::Unknown => return Err(MixerError::UnknownFormat),
    };

    debug!(
        "opened {:?} stream: {}Hz, {} frames",
        format, info.sample_rate, info.length
    );
    info.origin = Some(data);
    Ok(info)
}
