//! Configuration schema
//!
//! Configuration is stored at `~/.config/narkeep/config.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote cache settings
    pub remote: RemoteConfig,

    /// Compression defaults
    pub compression: CompressionConfig,

    /// Store layout settings
    pub store: StoreConfig,
}

/// Remote cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Cache endpoints tried in order (URLs or mirror directories)
    pub caches: Vec<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            caches: vec!["https://cache.nixos.org".to_string()],
            timeout_secs: 10,
        }
    }
}

/// Compression defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Target compression when none is given on the command line
    pub default: String,

    /// xz preset level
    pub xz_level: u32,

    /// zstd compression level
    pub zstd_level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            default: "xz".to_string(),
            xz_level: 6,
            zstd_level: 3,
        }
    }
}

/// Store layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Payload subdirectory relative to the store root
    pub nar_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            nar_dir: "nar".to_string(),
        }
    }
}
