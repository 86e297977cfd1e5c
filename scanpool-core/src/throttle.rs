//! Submission throttling derived from recent decode latency.
//!
//! The interval is `ceil(mean(window) / pool_size * factor)`. The factor is
//! held in thousandths and the division is done on integers so the ceiling
//! never lands one millisecond high because of float rounding.

use std::time::Duration;

use crate::latency::LatencyWindow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottlePolicy {
    factor_milli: u64,
}

impl ThrottlePolicy {
    pub fn new(factor: f64) -> Self {
        let factor_milli = (factor * 1000.0).round().max(1.0) as u64;
        Self { factor_milli }
    }

    pub fn factor(&self) -> f64 {
        self.factor_milli as f64 / 1000.0
    }

    /// Minimum spacing between accepted submissions; zero until the window
    /// holds at least one sample.
    pub fn interval_ms(&self, window: &LatencyWindow, pool_size: usize) -> u64 {
        if window.is_empty() || pool_size == 0 {
            return 0;
        }
        let numerator = window.sum() * self.factor_milli as u128;
        let denominator = window.len() as u128 * pool_size as u128 * 1000;
        u64::try_from(numerator.div_ceil(denominator)).unwrap_or(u64::MAX)
    }

    pub fn interval(&self, window: &LatencyWindow, pool_size: usize) -> Duration {
        Duration::from_millis(self.interval_ms(window, pool_size))
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(1.2)
    }
}

/// Frames per second the pool can absorb at the window's mean latency.
pub fn scan_frequency_hz(window: &LatencyWindow, pool_size: usize) -> f64 {
    match window.mean() {
        Some(mean) if mean > 0.0 => pool_size as f64 * 1000.0 / mean,
        _ => 0.0,
    }
}
