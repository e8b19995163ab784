pub mod fade;

pub use fade::{FadeEnvelope, FadeStep};
