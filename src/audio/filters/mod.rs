pub mod biquad;
pub mod butterworth;

pub use biquad::{BiquadCoeffs, BiquadState, StereoBiquad};
pub use butterworth::{Butterworth, CoefficientProvider, FilterSpec};
