//! `voxmix`: real-time multi-voice PCM mixer.
//!
//! A [`Mixer`] owns a fixed table of channels. The control side starts
//! [`Sound`]s on free channels and tweaks their gain, pan, pitch, filter and
//! fades; the audio callback calls [`Mixer::process`] to pull interleaved
//! stereo i16 blocks.

pub mod audio;
pub mod common;
pub mod configs;

pub use audio::{
    Clock, Decoder, FilterSpec, ManualClock, Mixer, MonotonicClock, PlayOptions, PlaybackState,
    Sound, StreamInfo,
};
pub use common::{MixerError, MixerResult};
pub use configs::Config;
