//! 20.12 fixed-point numbers for the per-sample hot path.
//!
//! Overflow policy: conversions from `f64` saturate (NaN maps to zero),
//! products with samples saturate before the shift, and playhead addition
//! wraps. A wrapping playhead needs 2^51 frames and is not reachable in
//! practice.

use std::ops::{Add, AddAssign};

/// Fractional bits.
pub const FX_BITS: u32 = 12;
/// Raw value of 1.0.
pub const FX_UNIT: i64 = 1 << FX_BITS;
/// Mask selecting the fractional bits.
pub const FX_MASK: i64 = FX_UNIT - 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i64);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(FX_UNIT);

    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    pub fn from_f64(v: f64) -> Self {
        Self((v * FX_UNIT as f64) as i64)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FX_UNIT as f64
    }

    /// Whole frames.
    pub fn from_frames(frames: i64) -> Self {
        Self(frames.saturating_mul(FX_UNIT))
    }

    /// Integer part (floor).
    pub const fn frames(self) -> i64 {
        self.0 >> FX_BITS
    }

    /// Fractional part as a raw 0..FX_UNIT weight.
    pub const fn fract(self) -> i64 {
        self.0 & FX_MASK
    }

    /// `sample * self`, truncated toward negative infinity like an arithmetic shift.
    pub fn scale(self, sample: i64) -> i64 {
        sample.saturating_mul(self.0) >> FX_BITS
    }

    /// How many steps of `self` fit into `span` (at least zero).
    pub fn steps_in(self, span: Fixed) -> i64 {
        if self.0 <= 0 {
            return 0;
        }
        span.0 / self.0
    }
}

impl Add for Fixed {
    type Output = Fixed;

    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

/// Linear interpolation between two samples with a raw fractional weight.
pub fn lerp(a: i32, b: i32, weight: i64) -> i32 {
    let a = a as i64;
    (a + (((b as i64 - a) * weight) >> FX_BITS)) as i32
}
