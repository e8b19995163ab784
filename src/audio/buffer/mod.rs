pub mod ring;

pub use ring::PcmRing;
