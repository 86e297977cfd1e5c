use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use scanpool_core::{FaultPolicy, ScanPoolConfig};

pub const ENV_CONFIG_PATH: &str = "SCANPOOL_CONFIG";
pub const ENV_POOL_SIZE: &str = "SCANPOOL_POOL_SIZE";
pub const ENV_LATENCY_WINDOW: &str = "SCANPOOL_LATENCY_WINDOW";
pub const ENV_THROTTLE_FACTOR: &str = "SCANPOOL_THROTTLE_FACTOR";
pub const ENV_DECODE_TIMEOUT: &str = "SCANPOOL_DECODE_TIMEOUT";
pub const ENV_FAULT_POLICY: &str = "SCANPOOL_FAULT_POLICY";

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub pool: FilePoolConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FilePoolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_window: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_factor: Option<f64>,
    /// Humantime duration such as `250ms` or `2s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_policy: Option<FaultPolicy>,
}

impl From<&ScanPoolConfig> for FileConfig {
    fn from(config: &ScanPoolConfig) -> Self {
        FileConfig {
            pool: FilePoolConfig {
                pool_size: Some(config.resolved_pool_size()),
                latency_window: Some(config.latency_window),
                throttle_factor: Some(config.throttle_factor),
                decode_timeout: config
                    .decode_timeout()
                    .map(|timeout| humantime::format_duration(timeout).to_string()),
                fault_policy: Some(config.fault_policy),
            },
        }
    }
}

/// Raw values picked up from the process environment. Parsing happens in
/// the loader so malformed values surface as errors instead of vanishing.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub pool_size: Option<String>,
    pub latency_window: Option<String>,
    pub throttle_factor: Option<String>,
    pub decode_timeout: Option<String>,
    pub fault_policy: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        EnvConfig {
            config_path: read(ENV_CONFIG_PATH).map(PathBuf::from),
            pool_size: read(ENV_POOL_SIZE),
            latency_window: read(ENV_LATENCY_WINDOW),
            throttle_factor: read(ENV_THROTTLE_FACTOR),
            decode_timeout: read(ENV_DECODE_TIMEOUT),
            fault_policy: read(ENV_FAULT_POLICY),
        }
    }
}
