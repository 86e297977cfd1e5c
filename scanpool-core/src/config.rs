use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

/// Knobs for the decode pool. Every field carries a default so a partial
/// TOML table is enough.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanPoolConfig {
    /// Number of decode slots. `None` sizes the pool from the host: available
    /// cores minus two, at least one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
    /// How many recent latency samples feed the throttle.
    pub latency_window: usize,
    /// Multiplier applied to the per-slot mean latency to absorb jitter.
    pub throttle_factor: f64,
    /// Optional per-decode deadline. Unset means a decode may run forever.
    ///
    /// On expiry the slot reports `TimedOut` and takes new frames at once,
    /// but only the decode future is dropped. Work a decoder moved onto a
    /// thread (such as [`RqrrDecoder`](crate::decoders)'s blocking job) runs
    /// to the end, so a slot may briefly have two scans using CPU.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_timeout_ms: Option<u64>,
    /// What happens to a slot whose decoder fails fatally.
    pub fault_policy: FaultPolicy,
}

impl Default for ScanPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: None,
            latency_window: 10,
            throttle_factor: 1.2,
            decode_timeout_ms: None,
            fault_policy: FaultPolicy::Retire,
        }
    }
}

impl ScanPoolConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    pub fn with_decode_timeout(mut self, timeout: Duration) -> Self {
        self.decode_timeout_ms =
            Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    /// Slot count after applying the host-derived default.
    pub fn resolved_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(default_pool_size)
    }

    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == Some(0) {
            return Err(PoolError::InvalidConfig(
                "pool_size must be at least 1".into(),
            ));
        }
        if self.latency_window == 0 {
            return Err(PoolError::InvalidConfig(
                "latency_window must be at least 1".into(),
            ));
        }
        if !self.throttle_factor.is_finite() || self.throttle_factor <= 0.0 {
            return Err(PoolError::InvalidConfig(format!(
                "throttle_factor must be a positive number, got {}",
                self.throttle_factor
            )));
        }
        if self.decode_timeout_ms == Some(0) {
            return Err(PoolError::InvalidConfig(
                "decode_timeout_ms must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}

/// Handling for a slot whose decoder reported a fatal failure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Take the slot out of rotation for the rest of the pool's life.
    #[default]
    Retire,
    /// Ask the factory for a fresh decoder and keep the slot in rotation.
    Respawn,
}

pub fn default_pool_size() -> usize {
    num_cpus::get().saturating_sub(2).max(1)
}
