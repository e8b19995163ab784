//! Second-order IIR recurrence shared by every voice and the master stage.
//!
//! `y = b0·x + b1·x₋₁ + b2·x₋₂ − a1·y₋₁ − a2·y₋₂` (Direct Form I, a0 = 1).

/// Biquad filter coefficients (normalized by a0).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
  pub b0: f64,
  pub b1: f64,
  pub b2: f64,
  pub a1: f64,
  pub a2: f64,
}

impl BiquadCoeffs {
  /// Pass-through: b0 = 1, everything else 0.
  pub const IDENTITY: BiquadCoeffs = BiquadCoeffs {
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
    a1: 0.0,
    a2: 0.0,
  };

  pub const fn new(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
    Self { b0, b1, b2, a1, a2 }
  }

  pub fn is_identity(&self) -> bool {
    *self == Self::IDENTITY
  }
}

impl Default for BiquadCoeffs {
  fn default() -> Self {
    Self::IDENTITY
  }
}

/// Per-channel biquad filter state (Direct Form I).
#[derive(Clone, Debug, Default)]
pub struct BiquadState {
  pub x1: f64,
  pub x2: f64,
  pub y1: f64,
  pub y2: f64,
}

impl BiquadState {
  /// Process one sample through the biquad filter.
  pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
    let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
      - coeffs.a1 * self.y1
      - coeffs.a2 * self.y2;

    if !output.is_finite() {
      // Unstable coefficients: reset rather than poison every later sample.
      self.reset();
      return 0.0;
    }

    self.x2 = self.x1;
    self.x1 = input;
    self.y2 = self.y1;
    self.y1 = output;
    output
  }

  pub fn reset(&mut self) {
    self.x1 = 0.0;
    self.x2 = 0.0;
    self.y1 = 0.0;
    self.y2 = 0.0;
  }
}

/// Independent left/right histories driven by one coefficient set.
#[derive(Clone, Debug, Default)]
pub struct StereoBiquad {
  pub left: BiquadState,
  pub right: BiquadState,
}

impl StereoBiquad {
  #[inline]
  pub fn process(&mut self, left: i64, right: i64, coeffs: &BiquadCoeffs) -> (i64, i64) {
    (
      self.left.process(left as f64, coeffs) as i64,
      self.right.process(right as f64, coeffs) as i64,
    )
  }
}
