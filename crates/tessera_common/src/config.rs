use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ErrorContext, TesseraResult};

/// Process-level props (`tessera.toml`). Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesseraConfig {
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

/// What the cartesian engine does with combinations whose tables landed on
/// different data sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartesianPolicy {
    /// Drop the combination, count it, and log a warning.
    #[default]
    Narrow,
    /// Reject the whole statement as a cross data source join.
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub cartesian_policy: CartesianPolicy,
    /// Cap on OR expansion during condition extraction; past it the
    /// predicate is treated as carrying no usable condition.
    pub max_condition_branches: usize,
    /// Reject UPDATEs whose SET clause moves a row to another shard.
    pub check_sharding_key_update: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cartesian_policy: CartesianPolicy::Narrow,
            max_condition_branches: 64,
            check_sharding_key_update: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Row count emitted when a merged query must fetch every row of a unit.
    pub max_row_count: i64,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            max_row_count: i64::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Worker threads used to fetch table metadata in parallel.
    pub worker_pool_size: usize,
    /// Whole-load deadline in milliseconds (0 = none).
    pub load_timeout_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 8,
            load_timeout_ms: 0,
        }
    }
}

impl TesseraConfig {
    pub fn from_toml_str(text: &str) -> TesseraResult<Self> {
        let config: TesseraConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load props from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> TesseraResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "props file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&text).ctx_with(|| path.display().to_string())
    }

    pub fn validate(&self) -> TesseraResult<()> {
        if self.router.max_condition_branches == 0 {
            crate::bail_config!("router.max_condition_branches must be at least 1");
        }
        if self.rewrite.max_row_count <= 0 {
            crate::bail_config!("rewrite.max_row_count must be positive");
        }
        if self.metadata.worker_pool_size == 0 {
            crate::bail_config!("metadata.worker_pool_size must be at least 1");
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> TesseraResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }
}
