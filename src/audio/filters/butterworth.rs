//! Butterworth coefficient synthesis via the bilinear transform.
//!
//! Cutoffs are pre-warped with `K = tan(π·f/fs)` so the −3 dB point lands on
//! the requested frequency. Bandpass/bandstop use a first-order prototype,
//! which yields a single biquad.

use std::f64::consts::{PI, SQRT_2};

use super::biquad::BiquadCoeffs;
use crate::audio::constants::{HIGHPASS_MIN_CUTOFF, LOWPASS_MIN_CUTOFF, MAX_CUTOFF};

/// A filter request in Hz, independent of the sample rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterSpec {
    /// Removes filtering (b0 = 1).
    Bypass,
    /// Order is clamped into `1..=2`.
    Lowpass { order: u8, cutoff: f64 },
    /// Order is clamped into `1..=2`.
    Highpass { order: u8, cutoff: f64 },
    Bandpass { low: f64, high: f64 },
    Bandstop { low: f64, high: f64 },
}

/// Turns a [`FilterSpec`] into the five coefficients the recurrence consumes.
pub trait CoefficientProvider: Send + Sync {
    fn coefficients(&self, spec: FilterSpec, sample_rate: u32) -> BiquadCoeffs;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Butterworth;

/// Fraction of Nyquist, clamped.
fn normalized(freq: f64, sample_rate: u32, min: f64) -> f64 {
    let f = 2.0 * freq / sample_rate as f64;
    if f.is_nan() || f < min {
        min
    } else if f >= 1.0 {
        MAX_CUTOFF
    } else {
        f
    }
}

/// Pre-warped analog frequency for a normalised cutoff.
fn prewarp(fraction_of_nyquist: f64) -> f64 {
    (PI * fraction_of_nyquist / 2.0).tan()
}

impl Butterworth {
    fn lowpass(order: u8, k: f64) -> BiquadCoeffs {
        if order <= 1 {
            let a0 = 1.0 + k;
            BiquadCoeffs::new(k / a0, k / a0, 0.0, (k - 1.0) / a0, 0.0)
        } else {
            let k2 = k * k;
            let norm = 1.0 / (1.0 + SQRT_2 * k + k2);
            let b0 = k2 * norm;
            BiquadCoeffs::new(
                b0,
                2.0 * b0,
                b0,
                2.0 * (k2 - 1.0) * norm,
                (1.0 - SQRT_2 * k + k2) * norm,
            )
        }
    }

    fn highpass(order: u8, k: f64) -> BiquadCoeffs {
        if order <= 1 {
            let a0 = 1.0 + k;
            BiquadCoeffs::new(1.0 / a0, -1.0 / a0, 0.0, (k - 1.0) / a0, 0.0)
        } else {
            let k2 = k * k;
            let norm = 1.0 / (1.0 + SQRT_2 * k + k2);
            BiquadCoeffs::new(
                norm,
                -2.0 * norm,
                norm,
                2.0 * (k2 - 1.0) * norm,
                (1.0 - SQRT_2 * k + k2) * norm,
            )
        }
    }

    /// `(bandwidth, centre²)` of the pre-warped band, edges ordered.
    fn band(low: f64, high: f64) -> (f64, f64) {
        let (w1, w2) = if low <= high { (low, high) } else { (high, low) };
        (w2 - w1, w1 * w2)
    }

    fn bandpass(w1: f64, w2: f64) -> BiquadCoeffs {
        let (bw, w0sq) = Self::band(w1, w2);
        let a0 = 1.0 + bw + w0sq;
        BiquadCoeffs::new(
            bw / a0,
            0.0,
            -bw / a0,
            2.0 * (w0sq - 1.0) / a0,
            (1.0 - bw + w0sq) / a0,
        )
    }

    fn bandstop(w1: f64, w2: f64) -> BiquadCoeffs {
        let (bw, w0sq) = Self::band(w1, w2);
        let a0 = 1.0 + bw + w0sq;
        BiquadCoeffs::new(
            (1.0 + w0sq) / a0,
            2.0 * (w0sq - 1.0) / a0,
            (1.0 + w0sq) / a0,
            2.0 * (w0sq - 1.0) / a0,
            (1.0 - bw + w0sq) / a0,
        )
    }
}

impl CoefficientProvider for Butterworth {
    fn coefficients(&self, spec: FilterSpec, sample_rate: u32) -> BiquadCoeffs {
        match spec {
            FilterSpec::Bypass => BiquadCoeffs::IDENTITY,
            FilterSpec::Lowpass { order, cutoff } => {
                let k = prewarp(normalized(cutoff, sample_rate, LOWPASS_MIN_CUTOFF));
                Self::lowpass(order.clamp(1, 2), k)
            }
            FilterSpec::Highpass { order, cutoff } => {
                let k = prewarp(normalized(cutoff, sample_rate, HIGHPASS_MIN_CUTOFF));
                Self::highpass(order.clamp(1, 2), k)
            }
            FilterSpec::Bandpass { low, high } => Self::bandpass(
                prewarp(normalized(low, sample_rate, 0.0)),
                prewarp(normalized(high, sample_rate, 0.0)),
            ),
            FilterSpec::Bandstop { low, high } => Self::bandstop(
                prewarp(normalized(low, sample_rate, 0.0)),
                prewarp(normalized(high, sample_rate, HIGHPASS_MIN_CUTOFF)),
            ),
        }
    }
}
