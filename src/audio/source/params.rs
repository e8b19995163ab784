//! Per-source parameter block shared between the control side and the mixer.
//!
//! Every field is an atomic so setters never take the structural lock. A
//! multi-field update (gain then pan, or the five filter coefficients) may be
//! observed half-applied for one block; the values are continuously varying
//! audio parameters and settle on the next block.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::audio::constants::{MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
use crate::audio::effects::FadeEnvelope;
use crate::audio::filters::BiquadCoeffs;
use crate::audio::fixed::Fixed;
use crate::common::types::FinishedCallback;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

/// `f64` stored as its bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Release);
    }
}

/// Five biquad coefficients, each written independently.
#[derive(Debug)]
pub struct AtomicCoeffs {
    b0: AtomicF64,
    b1: AtomicF64,
    b2: AtomicF64,
    a1: AtomicF64,
    a2: AtomicF64,
}

impl AtomicCoeffs {
    pub fn new(c: BiquadCoeffs) -> Self {
        Self {
            b0: AtomicF64::new(c.b0),
            b1: AtomicF64::new(c.b1),
            b2: AtomicF64::new(c.b2),
            a1: AtomicF64::new(c.a1),
            a2: AtomicF64::new(c.a2),
        }
    }

    #[inline]
    pub fn load(&self) -> BiquadCoeffs {
        BiquadCoeffs::new(
            self.b0.load(),
            self.b1.load(),
            self.b2.load(),
            self.a1.load(),
            self.a2.load(),
        )
    }

    pub fn store(&self, c: BiquadCoeffs) {
        self.b0.store(c.b0);
        self.b1.store(c.b1);
        self.b2.store(c.b2);
        self.a1.store(c.a1);
        self.a2.store(c.a2);
    }
}

impl Default for AtomicCoeffs {
    fn default() -> Self {
        Self::new(BiquadCoeffs::IDENTITY)
    }
}

/// Left/right fixed-point gains for linear `gain` and `pan` in [-1, 1].
pub fn pan_gains(gain: f64, pan: f64) -> (Fixed, Fixed) {
    let left = gain * if pan <= 0.0 { 1.0 } else { 1.0 - pan };
    let right = gain * if pan >= 0.0 { 1.0 } else { 1.0 + pan };
    (Fixed::from_f64(left), Fixed::from_f64(right))
}

pub struct SourceParams {
    state: AtomicU8,
    rewind: AtomicBool,
    looping: AtomicBool,

    gain: AtomicF64,
    pan: AtomicF64,
    left_gain: AtomicI64,  // Fixed raw
    right_gain: AtomicI64, // Fixed raw
    rate: AtomicI64,       // Fixed raw
    coeffs: AtomicCoeffs,

    fade_active: AtomicBool,
    fade_start_gain: AtomicF64,
    fade_target_gain: AtomicF64,
    fade_start_time: AtomicF64,
    fade_duration: AtomicF64,

    /// Playhead in whole frames, mirrored once per block.
    position: AtomicI64,
    finished: RwLock<Option<FinishedCallback>>,

    sample_rate: u32,
    length: u64,
    /// Native rate over mixer rate.
    rate_ratio: f64,
}

impl SourceParams {
    pub fn new(sample_rate: u32, mixer_rate: u32, length: u64) -> Self {
        let params = Self {
            state: AtomicU8::new(PlaybackState::Stopped as u8),
            rewind: AtomicBool::new(true),
            looping: AtomicBool::new(false),
            gain: AtomicF64::new(1.0),
            pan: AtomicF64::new(0.0),
            left_gain: AtomicI64::new(Fixed::ONE.raw()),
            right_gain: AtomicI64::new(Fixed::ONE.raw()),
            rate: AtomicI64::new(Fixed::ONE.raw()),
            coeffs: AtomicCoeffs::default(),
            fade_active: AtomicBool::new(false),
            fade_start_gain: AtomicF64::new(1.0),
            fade_target_gain: AtomicF64::new(1.0),
            fade_start_time: AtomicF64::new(0.0),
            fade_duration: AtomicF64::new(0.0),
            position: AtomicI64::new(0),
            finished: RwLock::new(None),
            sample_rate,
            length,
            rate_ratio: sample_rate as f64 / mixer_rate as f64,
        };
        params.set_pitch(1.0);
        params
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Stop and rewind on the next mixing pass.
    pub fn stop(&self) {
        self.set_state(PlaybackState::Stopped);
        self.rewind.store(true, Ordering::Release);
    }

    pub fn request_rewind(&self) {
        self.rewind.store(true, Ordering::Release);
    }

    /// Consume the rewind-pending edge.
    pub fn take_rewind(&self) -> bool {
        self.rewind.swap(false, Ordering::AcqRel)
    }

    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Release);
    }

    pub fn gain(&self) -> f64 {
        self.gain.load()
    }

    pub fn pan(&self) -> f64 {
        self.pan.load()
    }

    pub fn set_gain(&self, gain: f64) {
        let gain = gain.max(0.0);
        self.gain.store(gain);
        self.store_gains(gain, self.pan.load());
    }

    pub fn set_pan(&self, pan: f64) {
        let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
        self.pan.store(pan);
        self.store_gains(self.gain.load(), pan);
    }

    fn store_gains(&self, gain: f64, pan: f64) {
        let (left, right) = pan_gains(gain, pan);
        self.left_gain.store(left.raw(), Ordering::Release);
        self.right_gain.store(right.raw(), Ordering::Release);
    }

    /// Left/right fixed-point gains.
    #[inline]
    pub fn gains(&self) -> (Fixed, Fixed) {
        (
            Fixed::from_raw(self.left_gain.load(Ordering::Acquire)),
            Fixed::from_raw(self.right_gain.load(Ordering::Acquire)),
        )
    }

    pub fn set_pitch(&self, pitch: f64) {
        let rate = if pitch > 0.0 {
            (self.rate_ratio * pitch).min(MAX_PLAYBACK_RATE)
        } else {
            MIN_PLAYBACK_RATE
        };
        // Never let quantization stall the playhead.
        let raw = Fixed::from_f64(rate).raw().max(1);
        self.rate.store(raw, Ordering::Release);
    }

    #[inline]
    pub fn rate(&self) -> Fixed {
        Fixed::from_raw(self.rate.load(Ordering::Acquire))
    }

    pub fn set_coeffs(&self, coeffs: BiquadCoeffs) {
        self.coeffs.store(coeffs);
    }

    #[inline]
    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs.load()
    }

    /// Schedule a fade from the current gain. A non-positive duration snaps.
    pub fn start_fade(&self, now: f64, duration: f64, target: f64) {
        let target = target.max(0.0);
        if duration.is_nan() || duration <= 0.0 {
            self.fade_active.store(false, Ordering::Release);
            self.set_gain(target);
            return;
        }

        self.fade_active.store(false, Ordering::Release);
        self.fade_start_gain.store(self.gain());
        self.fade_target_gain.store(target);
        self.fade_start_time.store(now);
        self.fade_duration.store(duration);
        self.fade_active.store(true, Ordering::Release);
    }

    pub fn is_fading(&self) -> bool {
        self.fade_active.load(Ordering::Acquire)
    }

    pub fn fade(&self) -> Option<FadeEnvelope> {
        if !self.is_fading() {
            return None;
        }
        Some(FadeEnvelope::new(
            self.fade_start_gain.load(),
            self.fade_target_gain.load(),
            self.fade_start_time.load(),
            self.fade_duration.load(),
        ))
    }

    pub fn finish_fade(&self, gain: f64) {
        self.fade_active.store(false, Ordering::Release);
        self.set_gain(gain);
    }

    pub fn store_position(&self, frames: i64) {
        self.position.store(frames, Ordering::Release);
    }

    /// Seconds into the current play-through.
    pub fn position(&self) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        let frames = self.position.load(Ordering::Acquire).max(0) as u64;
        (frames % self.length) as f64 / self.sample_rate as f64
    }

    /// Stream length in seconds.
    pub fn length(&self) -> f64 {
        self.length as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn finished_callback(&self) -> Option<FinishedCallback> {
        self.finished.read().clone()
    }

    pub fn set_finished_callback(&self, callback: Option<FinishedCallback>) {
        *self.finished.write() = callback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fixed::FX_UNIT;

    fn close(a: Fixed, expected: f64) -> bool {
        (a.to_f64() - expected).abs() <= 1.0 / FX_UNIT as f64
    }

    #[test]
    fn center_pan_is_equal_gain() {
        let (l, r) = pan_gains(0.8, 0.0);
        assert_eq!(l, r);
        assert!(close(l, 0.8));
    }

    #[test]
    fn hard_pans_silence_the_other_side() {
        let (l, r) = pan_gains(0.6, 1.0);
        assert_eq!(l, Fixed::ZERO);
        assert!(close(r, 0.6));

        let (l, r) = pan_gains(0.6, -1.0);
        assert!(close(l, 0.6));
        assert_eq!(r, Fixed::ZERO);
    }

    #[test]
    fn pan_is_clamped() {
        let params = SourceParams::new(44_100, 44_100, 100);
        params.set_pan(3.0);
        assert_eq!(params.pan(), 1.0);
        params.set_pan(f64::NAN);
        assert_eq!(params.pan(), 0.0);
    }

    #[test]
    fn starts_stopped_with_rewind_pending() {
        let params = SourceParams::new(44_100, 44_100, 100);
        assert_eq!(params.state(), PlaybackState::Stopped);
        assert!(params.take_rewind());
        assert!(!params.take_rewind());
        assert_eq!(params.coeffs(), BiquadCoeffs::IDENTITY);
        assert_eq!(params.gains(), (Fixed::ONE, Fixed::ONE));
    }

    #[test]
    fn pitch_maps_to_rate() {
        let params = SourceParams::new(22_050, 44_100, 100);
        assert_eq!(params.rate(), Fixed::from_f64(0.5));

        params.set_pitch(2.0);
        assert_eq!(params.rate(), Fixed::ONE);

        params.set_pitch(0.0);
        assert!(params.rate().raw() >= 1);

        params.set_pitch(1e9);
        assert_eq!(params.rate(), Fixed::from_f64(MAX_PLAYBACK_RATE));
    }

    #[test]
    fn fade_captures_current_gain() {
        let params = SourceParams::new(44_100, 44_100, 100);
        params.set_gain(0.5);
        params.start_fade(2.0, 1.0, 0.0);
        let fade = params.fade().unwrap();
        assert_eq!(fade.start_gain, 0.5);
        assert_eq!(fade.target_gain, 0.0);
        assert_eq!(fade.start_time, 2.0);
        // Gain is untouched until the mixer evaluates the envelope.
        assert_eq!(params.gain(), 0.5);
    }

    #[test]
    fn zero_duration_fade_snaps() {
        let params = SourceParams::new(44_100, 44_100, 100);
        params.start_fade(0.0, 0.0, 0.25);
        assert!(!params.is_fading());
        assert_eq!(params.gain(), 0.25);
    }

    #[test]
    fn position_wraps_by_length() {
        let params = SourceParams::new(1_000, 44_100, 500);
        params.store_position(1_250);
        assert!((params.position() - 0.25).abs() < 1e-12);
        assert!((params.length() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn state_round_trips_through_u8() {
        for state in [PlaybackState::Stopped, PlaybackState::Playing, PlaybackState::Paused] {
            assert_eq!(PlaybackState::from_u8(state as u8), state);
        }
        assert_eq!(PlaybackState::from_u8(42), PlaybackState::Stopped);
    }
}
