//! Encoded audio kept in memory and shared by every voice playing it.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::common::MixerResult;

/// Encoded WAV or Ogg bytes. Cloning is cheap; each play opens its own
/// decoder over the same bytes, which are freed with the last user.
#[derive(Clone)]
pub struct Sound {
    name: String,
    data: Arc<[u8]>,
}

impl Sound {
    /// Read a file into memory. Decoding is deferred until the sound is played.
    pub fn load(path: impl AsRef<Path>) -> MixerResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len() as usize;

        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size)?;
        file.read_to_end(&mut bytes)?;

        debug!("loaded {} ({} bytes)", path.display(), bytes.len());
        Ok(Self {
            name: path.display().to_string(),
            data: Arc::from(bytes),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            data: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}
