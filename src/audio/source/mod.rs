//! A single voice: decoder, ring buffer, fixed-point playhead and filter
//! history. Mixed by [`Source::process`] while the structural lock is held.

pub mod params;

use std::sync::Arc;

use tracing::debug;

use crate::audio::buffer::PcmRing;
use crate::audio::clock::Clock;
use crate::audio::constants::{
    BATCH_GUARD_FRAMES, FILL_FRAMES, MIXER_CHANNELS, REFILL_LOOKAHEAD_FRAMES,
};
use crate::audio::decoder::{Decoder, StreamInfo};
use crate::audio::effects::FadeStep;
use crate::audio::filters::{BiquadCoeffs, StereoBiquad};
use crate::audio::fixed::{Fixed, lerp};
use crate::audio::mix::callbacks::CallbackQueue;
use crate::common::types::ChannelId;
use crate::common::{MixerError, MixerResult};

pub use params::{AtomicCoeffs, AtomicF64, PlaybackState, SourceParams, pan_gains};

pub struct Source {
    pub(crate) params: Arc<SourceParams>,
    decoder: Box<dyn Decoder>,
    /// Encoded bytes backing the decoder, if any.
    pub(crate) origin: Option<Arc<[u8]>>,
    ring: PcmRing,
    channel: ChannelId,

    position: Fixed,
    /// Loop-end marker (frames); moves forward by `length` per play-through.
    end: i64,
    /// Frame index at which the next half-ring window begins.
    next_fill: i64,
    length: i64,
    filter: StereoBiquad,

    /// Linked into the active list.
    pub(crate) active: bool,
    pub(crate) next: Option<usize>,
}

#[inline]
fn narrow(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Filter one stereo frame, apply the channel gains and add it into `dst`.
#[inline]
fn mix_frame(
    dst: &mut [i32],
    filter: &mut StereoBiquad,
    coeffs: &BiquadCoeffs,
    (left, right): (i32, i32),
    (left_gain, right_gain): (Fixed, Fixed),
) {
    let (yl, yr) = filter.process(left as i64, right as i64, coeffs);
    dst[0] = dst[0].saturating_add(narrow(left_gain.scale(narrow(yl) as i64)));
    dst[1] = dst[1].saturating_add(narrow(right_gain.scale(narrow(yr) as i64)));
}

impl Source {
    pub fn new(channel: ChannelId, params: Arc<SourceParams>, info: StreamInfo) -> MixerResult<Self> {
        let ring = PcmRing::try_new().map_err(|_| MixerError::Allocation)?;
        let length = i64::try_from(info.length)
            .map_err(|_| MixerError::format("stream too long"))?;

        Ok(Self {
            params,
            decoder: info.decoder,
            origin: info.origin,
            ring,
            channel,
            position: Fixed::ZERO,
            end: length,
            next_fill: 0,
            length,
            filter: StereoBiquad::default(),
            active: false,
            next: None,
        })
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn uses_data(&self, data: &Arc<[u8]>) -> bool {
        self.origin.as_ref().is_some_and(|o| Arc::ptr_eq(o, data))
    }

    fn rewind(&mut self) {
        self.decoder.rewind();
        self.position = Fixed::ZERO;
        self.end = self.length;
        self.next_fill = 0;
    }

    fn fill(&mut self) {
        self.decoder.produce(self.ring.fill_window(self.next_fill));
        self.next_fill += FILL_FRAMES as i64;
    }

    fn apply_fade(&self, clock: &dyn Clock) {
        let Some(fade) = self.params.fade() else {
            return;
        };
        match fade.gain_at(clock.now()) {
            FadeStep::Gain(gain) => self.params.set_gain(gain),
            FadeStep::Done(gain) => self.params.finish_fade(gain),
        }
    }

    /// Mix this source into `mix` (interleaved stereo, one block).
    pub fn process(&mut self, mix: &mut [i32], clock: &dyn Clock, queue: &mut CallbackQueue) {
        if self.params.take_rewind() {
            self.rewind();
        }

        if self.params.state() != PlaybackState::Playing {
            return;
        }

        let mut remaining = (mix.len() / MIXER_CHANNELS) as i64;
        let mut out = 0usize;

        while remaining > 0 {
            let frame = self.position.frames();

            if frame + REFILL_LOOKAHEAD_FRAMES >= self.next_fill {
                self.fill();
            }

            self.apply_fade(clock);

            if frame >= self.end {
                if self.params.looping() {
                    // The decoder wraps on its own; only the marker moves.
                    while frame >= self.end {
                        self.end += self.length;
                    }
                } else {
                    self.params.set_state(PlaybackState::Stopped);
                    self.params.request_rewind();
                    if let Some(callback) = self.params.finished_callback() {
                        queue.push(self.channel, callback);
                    }
                    break;
                }
            }

            let rate = self.params.rate();
            let span = (self.next_fill - BATCH_GUARD_FRAMES).min(self.end) - frame;
            let count = rate
                .steps_in(Fixed::from_frames(span))
                .max(1)
                .min(remaining);
            remaining -= count;

            let gains = self.params.gains();
            let coeffs = self.params.coeffs();
            let start = out * MIXER_CHANNELS;
            let end = start + count as usize * MIXER_CHANNELS;
            let dst = &mut mix[start..end];

            if rate == Fixed::ONE {
                for (i, dst) in dst.chunks_exact_mut(MIXER_CHANNELS).enumerate() {
                    let sample = self.ring.frame(frame + i as i64);
                    mix_frame(dst, &mut self.filter, &coeffs, sample, gains);
                }
                self.position += Fixed::from_frames(count);
            } else {
                for dst in dst.chunks_exact_mut(MIXER_CHANNELS) {
                    let at = self.position.frames();
                    let weight = self.position.fract();
                    let (al, ar) = self.ring.frame(at);
                    let (bl, br) = self.ring.frame(at + 1);
                    let sample = (lerp(al, bl, weight), lerp(ar, br, weight));
                    mix_frame(dst, &mut self.filter, &coeffs, sample, gains);
                    self.position += rate;
                }
            }

            out += count as usize;
        }

        self.params.store_position(self.position.frames());
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        debug!("source on channel {} destroyed", self.channel);
    }
}
