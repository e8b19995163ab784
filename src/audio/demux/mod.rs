//! Demux layer: container detection by header sniffing.

pub mod format;

pub use crate::common::types::AudioFormat;
pub use format::detect_format;
