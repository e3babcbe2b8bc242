//! Configuration Module
//!
//! Limits for the large object middleware, loadable from a YAML file with
//! sensible defaults and validation. The values double as the capability
//! numbers advertised on the proxy's `/info` endpoint.

use crate::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Limits applied to static and dynamic large objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LargeObjectConfig {
    /// Maximum number of entries accepted in a client PUT manifest.
    #[serde(default = "default_max_manifest_segments")]
    pub max_manifest_segments: usize,
    /// Maximum raw size of a persisted SLO manifest body, in bytes.
    #[serde(default = "default_max_manifest_size")]
    pub max_manifest_size: usize,
    /// Advertised minimum segment size, in bytes.
    #[serde(default = "default_min_segment_size")]
    pub min_segment_size: u64,
    /// Advertised maximum number of segments a DLO listing may resolve to.
    #[serde(default = "default_dlo_max_segments")]
    pub dlo_max_segments: usize,
}

fn default_max_manifest_segments() -> usize {
    1000
}

fn default_max_manifest_size() -> usize {
    1024 * 1024 * 2
}

fn default_min_segment_size() -> u64 {
    1024 * 1024
}

fn default_dlo_max_segments() -> usize {
    10000
}

impl Default for LargeObjectConfig {
    fn default() -> Self {
        Self {
            max_manifest_segments: default_max_manifest_segments(),
            max_manifest_size: default_max_manifest_size(),
            min_segment_size: default_min_segment_size(),
            dlo_max_segments: default_dlo_max_segments(),
        }
    }
}

impl LargeObjectConfig {
    /// Load configuration from a YAML file, falling back to defaults when
    /// the file does not exist.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config
            .validate()
            .map_err(ProxyError::ConfigError)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_manifest_segments == 0 {
            return Err("max_manifest_segments must be at least 1".to_string());
        }
        if self.max_manifest_size < 1024 {
            return Err(format!(
                "max_manifest_size must be at least 1024 bytes, got {}",
                self.max_manifest_size
            ));
        }
        if self.dlo_max_segments == 0 {
            return Err("dlo_max_segments must be at least 1".to_string());
        }
        Ok(())
    }
}
