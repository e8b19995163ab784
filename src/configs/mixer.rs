use serde::{Deserialize, Serialize};

use crate::common::{MixerError, MixerResult};

/// Engine-wide settings fixed at construction time.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MixerConfig {
    /// Output sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Frames per internal mixing block; larger `process` requests are split.
    #[serde(default = "default_block_frames")]
    pub block_frames: usize,
    /// Number of channel slots.
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// Initial linear master gain.
    #[serde(default = "default_master_gain")]
    pub master_gain: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            block_frames: default_block_frames(),
            channels: default_channels(),
            master_gain: default_master_gain(),
        }
    }
}

impl MixerConfig {
    pub fn validate(&self) -> MixerResult<()> {
        if self.sample_rate == 0 {
            return Err(MixerError::Config("sample_rate must be positive".into()));
        }
        if self.block_frames == 0 {
            return Err(MixerError::Config("block_frames must be positive".into()));
        }
        if self.channels == 0 {
            return Err(MixerError::Config("channels must be positive".into()));
        }
        if !self.master_gain.is_finite() || self.master_gain < 0.0 {
            return Err(MixerError::Config(
                "master_gain must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_block_frames() -> usize {
    256
}

fn default_channels() -> usize {
    32
}

fn default_master_gain() -> f64 {
    1.0
}
