//! Central constants for the mixing engine.
//!
//! Ring geometry, look-ahead distances and numeric floors live here so the
//! source, ring and engine agree on them.

// ── Sample / PCM ─────────────────────────────────────────────────────────────

/// Stereo channel count used throughout the mixer.
pub const MIXER_CHANNELS: usize = 2;

pub const INT16_MAX_I32: i32 = i16::MAX as i32;
pub const INT16_MIN_I32: i32 = i16::MIN as i32;

// ── Per-source ring buffer ───────────────────────────────────────────────────

/// Interleaved i16 samples held by each source's ring (256 stereo frames).
pub const RING_SAMPLES: usize = 512;

/// Index mask for ring wrap-around. `RING_SAMPLES` must be a power of two.
pub const RING_MASK: usize = RING_SAMPLES - 1;

/// Frames requested from the decoder per refill (half the ring).
pub const FILL_FRAMES: usize = RING_SAMPLES / MIXER_CHANNELS / 2;

/// A refill is requested once the playhead is this close to the next-refill marker.
pub const REFILL_LOOKAHEAD_FRAMES: i64 = 3;

/// Frames kept between the end of a batch and the next-refill marker, so the
/// interpolator's right-hand neighbour is always decoded.
pub const BATCH_GUARD_FRAMES: i64 = 2;

// ── Rates ────────────────────────────────────────────────────────────────────

/// Playback rate used for non-positive pitch; the playhead never stalls.
pub const MIN_PLAYBACK_RATE: f64 = 0.001;

/// Upper bound on the playback rate so a batch always advances within the ring.
pub const MAX_PLAYBACK_RATE: f64 = 64.0;

// ── Filter design ────────────────────────────────────────────────────────────

/// Lowest normalised cutoff (fraction of Nyquist) accepted for lowpass designs.
pub const LOWPASS_MIN_CUTOFF: f64 = 0.001;

/// Lowest normalised cutoff accepted for highpass / bandstop upper edge.
pub const HIGHPASS_MIN_CUTOFF: f64 = 0.002;

/// Highest normalised cutoff accepted for any design.
pub const MAX_CUTOFF: f64 = 0.999;
