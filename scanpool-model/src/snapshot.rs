use crate::ids::SlotId;
use crate::outcome::DecodeErrorKind;

/// Per-slot view inside a [`PoolSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerStatusView {
    pub slot: SlotId,
    pub busy: bool,
    /// Decoder failed fatally and the slot no longer takes frames.
    pub faulted: bool,
    /// This slot produced the completion that triggered the snapshot.
    pub is_last_emitter: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<DecodeErrorKind>,
    pub payload: Option<String>,
    /// Fatal decoder error behind the slot's latest completion. Latency,
    /// error and payload are cleared alongside it.
    pub failure: Option<String>,
}

/// Point-in-time view of the whole pool, emitted after every completion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolSnapshot {
    /// Number of completions observed so far, starting at 1.
    pub sequence: u64,
    pub throttle_interval_ms: u64,
    /// Latency window contents, oldest first.
    pub samples: Vec<u64>,
    /// Frames per second the pool sustains at the current mean latency.
    pub scan_frequency_hz: f64,
    pub workers: Vec<WorkerStatusView>,
}

impl PoolSnapshot {
    pub fn last_emitter(&self) -> Option<&WorkerStatusView> {
        self.workers.iter().find(|w| w.is_last_emitter)
    }

    pub fn worker(&self, slot: SlotId) -> Option<&WorkerStatusView> {
        self.workers.get(slot.index())
    }

    pub fn busy_count(&self) -> usize {
        self.workers.iter().filter(|w| w.busy).count()
    }
}
