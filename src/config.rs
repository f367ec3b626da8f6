use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{MappingError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_TOLERANCE_MARGIN: f64 = 0.0001;
pub const DEFAULT_MAX_PARALLEL_VERSIONS: usize = 4;

/// Run configuration of the mapping engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MappingConfig {
    /// Number of contiguous points processed and emitted together
    pub chunk_size: usize,

    /// Margin added when a mapped value widens a base case limit
    pub tolerance_margin: f64,

    /// Upper bound on versions mapped concurrently
    pub max_parallel_versions: usize,

    /// Keep one record per corrected point, not only the per-version synthesis
    pub log_point_details: bool,

    /// Versions to map; all versions of the store when unset
    pub versions: Option<Vec<u32>>,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tolerance_margin: DEFAULT_TOLERANCE_MARGIN,
            max_parallel_versions: DEFAULT_MAX_PARALLEL_VERSIONS,
            log_point_details: true,
            versions: None,
        }
    }
}

impl MappingConfig {
    /// Load from `config/default.toml`, then `TSM__` prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(MappingConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TSM__").split("__"));
        let cfg: MappingConfig = figment
            .extract()
            .map_err(|e| MappingError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_tolerance_margin(mut self, tolerance_margin: f64) -> Self {
        self.tolerance_margin = tolerance_margin;
        self
    }

    pub fn with_versions(mut self, versions: Vec<u32>) -> Self {
        self.versions = Some(versions);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(MappingError::InvalidConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if !self.tolerance_margin.is_finite() || self.tolerance_margin < 0.0 {
            return Err(MappingError::InvalidConfig(format!(
                "tolerance_margin must be a finite non-negative number, got {}",
                self.tolerance_margin
            )));
        }
        if self.max_parallel_versions == 0 {
            return Err(MappingError::InvalidConfig(
                "max_parallel_versions must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
