//! Historizing configuration
//!
//! Loaded with figment, lowest to highest priority:
//! built-in defaults, a YAML file, then `VOLTAGE_HISTORY_*` environment
//! variables (nested keys separated by `__`, e.g.
//! `VOLTAGE_HISTORY_CONTINUATION__IDLE_TIMEOUT_MS=30000`).

use common::logging::LoggingConfig;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::archive::DEFAULT_MAX_ONLINE_VALUES;
use crate::error::{HistoryError, Result};

pub const ENV_PREFIX: &str = "VOLTAGE_HISTORY_";

/// Continuation point registry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationConfig {
    /// Idle time after which an unused continuation point expires
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Maximum number of live continuation points across all nodes
    #[serde(default = "default_max_continuation_points")]
    pub max_continuation_points: usize,
    /// Interval of the background expiry sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_idle_timeout_ms() -> u64 {
    60_000
}

fn default_max_continuation_points() -> usize {
    1_000
}

fn default_sweep_interval_ms() -> u64 {
    5_000
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            max_continuation_points: default_max_continuation_points(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Address-space wide historizing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorizingConfig {
    /// Archive capacity for installs that don't set `max_online_values`
    #[serde(default = "default_max_online_values")]
    pub max_online_values: usize,
    #[serde(default)]
    pub continuation: ContinuationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_max_online_values() -> usize {
    DEFAULT_MAX_ONLINE_VALUES
}

impl Default for HistorizingConfig {
    fn default() -> Self {
        Self {
            max_online_values: default_max_online_values(),
            continuation: ContinuationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HistorizingConfig {
    /// Load from a YAML file (missing file is allowed) and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        info!(
            path = %path.display(),
            max_online_values = config.max_online_values,
            "Historizing configuration loaded"
        );
        Ok(config)
    }

    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_online_values == 0 {
            return Err(HistoryError::invalid_config(
                "max_online_values",
                "must be greater than 0",
            ));
        }
        if self.continuation.idle_timeout_ms == 0 {
            return Err(HistoryError::invalid_config(
                "continuation.idle_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.continuation.max_continuation_points == 0 {
            return Err(HistoryError::invalid_config(
                "continuation.max_continuation_points",
                "must be greater than 0",
            ));
        }
        if self.continuation.sweep_interval_ms == 0 {
            return Err(HistoryError::invalid_config(
                "continuation.sweep_interval_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Per-node install options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataNodeOptions {
    /// Archive capacity; `None` uses the address space default
    #[serde(default)]
    pub max_online_values: Option<usize>,
}

impl HistoricalDataNodeOptions {
    pub fn with_max_online_values(max_online_values: usize) -> Self {
        Self {
            max_online_values: Some(max_online_values),
        }
    }

    /// Resolve the archive capacity, rejecting a zero capacity from either
    /// the options or the address space default
    pub fn resolve_capacity(&self, default: usize) -> Result<usize> {
        match self.max_online_values.unwrap_or(default) {
            0 => Err(HistoryError::invalid_config(
                "max_online_values",
                "must be greater than 0",
            )),
            n => Ok(n),
        }
    }
}
