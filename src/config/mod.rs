//! Sample download settings
//!
//! The defaults describe the published piroplasma example image. A JSON file
//! in the user's config directory can override any of them:
//! - Linux: ~/.config/piroplasma/sample.json
//! - macOS: ~/Library/Application Support/piroplasma/sample.json
//! - Windows: %APPDATA%\piroplasma\sample.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;

/// Where the example image is published
pub const DEFAULT_URL: &str =
    "https://zenodo.org/records/18154748/files/example_image_001.tif?download=1";

/// Published size of the example image in bytes
pub const DEFAULT_EXPECTED_SIZE: u64 = 1_287_565_150;

/// Bytes per durable write (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

const SETTINGS_FILE_NAME: &str = "sample.json";

/// Settings for fetching the sample dataset
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SampleSettings {
    /// Source URL of the sample image
    pub url: String,

    /// Content length used to precompute the progress total.
    /// The server's actual size is never consulted, so progress may
    /// overshoot or stall short of 100% if the two differ.
    pub expected_size: u64,

    /// Size of each durable write in bytes
    pub chunk_size: usize,
}

impl Default for SampleSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            expected_size: DEFAULT_EXPECTED_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SampleSettings {
    /// Expected number of chunks, floored and never zero
    pub fn total_chunks(&self) -> u64 {
        let chunk_size = self.chunk_size.max(1) as u64;
        (self.expected_size / chunk_size).max(1)
    }

    /// Default location of the settings file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(crate::cache::CACHE_DIR_NAME).join(SETTINGS_FILE_NAME))
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON string; absent keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
