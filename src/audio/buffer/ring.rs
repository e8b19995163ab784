//! Fixed-size circular PCM buffer owned by each source.
//!
//! Unlike a FIFO, the ring is addressed by absolute stream frame index: the
//! decoder writes half-ring windows ahead of the playhead and the mixer reads
//! any frame still resident. Indices wrap with [`RING_MASK`].

use std::collections::TryReserveError;

use crate::audio::constants::{FILL_FRAMES, MIXER_CHANNELS, RING_MASK, RING_SAMPLES};

const FILL_SAMPLES: usize = FILL_FRAMES * MIXER_CHANNELS;

pub struct PcmRing {
    buf: Box<[i16]>,
}

impl PcmRing {
    /// Allocate a silent ring, reporting allocation failure instead of aborting.
    pub fn try_new() -> Result<Self, TryReserveError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(RING_SAMPLES)?;
        buf.resize(RING_SAMPLES, 0i16);
        Ok(Self {
            buf: buf.into_boxed_slice(),
        })
    }

    #[inline]
    fn sample_index(frame: i64, channel: usize) -> usize {
        ((frame as usize).wrapping_mul(MIXER_CHANNELS) + channel) & RING_MASK
    }

    /// The half-ring window that holds `frame`, ready to be filled by a decoder.
    ///
    /// Refill markers are multiples of [`FILL_FRAMES`], so the window never
    /// straddles the physical end of the ring.
    pub fn fill_window(&mut self, frame: i64) -> &mut [i16] {
        let offset = Self::sample_index(frame, 0) & !(FILL_SAMPLES - 1);
        &mut self.buf[offset..offset + FILL_SAMPLES]
    }

    /// Left/right sample pair at absolute frame index `frame`.
    #[inline]
    pub fn frame(&self, frame: i64) -> (i32, i32) {
        (
            self.buf[Self::sample_index(frame, 0)] as i32,
            self.buf[Self::sample_index(frame, 1)] as i32,
        )
    }
}
