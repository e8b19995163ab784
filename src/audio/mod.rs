pub mod buffer;
pub mod clock;
pub mod constants;
pub mod decoder;
pub mod demux;
pub mod effects;
pub mod filters;
pub mod fixed;
pub mod mix;
pub mod sound;
pub mod source;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use decoder::{Decoder, StreamInfo};
pub use filters::{BiquadCoeffs, Butterworth, CoefficientProvider, FilterSpec};
pub use mix::{LockEvents, Mixer, PlayOptions, finished_channel};
pub use sound::Sound;
pub use source::PlaybackState;
