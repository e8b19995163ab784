use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{MixerError, MixerResult};
use crate::configs::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
  #[serde(default)]
  pub mixer: MixerConfig,
  pub logging: Option<LoggingConfig>,
}

impl Config {
  /// Load `voxmix.toml`, falling back to `voxmix.default.toml`.
  pub fn load() -> MixerResult<Self> {
    let config_path = if std::path::Path::new("voxmix.toml").exists() {
      "voxmix.toml"
    } else if std::path::Path::new("voxmix.default.toml").exists() {
      "voxmix.default.toml"
    } else {
      return Err(MixerError::Config(
        "voxmix.toml or voxmix.default.toml not found".into(),
      ));
    };

    info!("Loading configuration from: {}", config_path);

    let config_str = std::fs::read_to_string(config_path)?;
    if config_str.is_empty() {
      return Err(MixerError::Config(format!("{} is empty", config_path)));
    }

    Self::from_toml_str(&config_str)
  }

  pub fn from_toml_str(s: &str) -> MixerResult<Self> {
    let config: Config = toml::from_str(s).map_err(|e| MixerError::Config(e.to_string()))?;
    config.mixer.validate()?;
    Ok(config)
  }
}
