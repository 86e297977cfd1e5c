use std::fmt;
use std::sync::Arc;

use scanpool_contracts::{Decoded, Decoder};
use scanpool_model::{DecodeOutcome, SlotId};

/// One pool member: a decoder instance plus the status the scheduler keeps
/// for it. Only the scheduler touches these fields, and only while holding
/// the pool state lock.
pub(crate) struct WorkerSlot {
    pub(crate) id: SlotId,
    pub(crate) decoder: Arc<dyn Decoder>,
    pub(crate) busy: bool,
    pub(crate) faulted: bool,
    pub(crate) last_outcome: Option<DecodeOutcome>,
    /// Set when the most recent completion was a fatal decoder failure.
    pub(crate) last_failure: Option<String>,
}

impl WorkerSlot {
    pub(crate) fn new(id: SlotId, decoder: Arc<dyn Decoder>) -> Self {
        Self {
            id,
            decoder,
            busy: false,
            faulted: false,
            last_outcome: None,
            last_failure: None,
        }
    }

    pub(crate) fn is_available(&self) -> bool {
        !self.busy && !self.faulted
    }
}

impl fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("id", &self.id)
            .field("decoder", &self.decoder.name())
            .field("busy", &self.busy)
            .field("faulted", &self.faulted)
            .field("last_outcome", &self.last_outcome)
            .field("last_failure", &self.last_failure)
            .finish()
    }
}

/// Stamps a decoder's answer with the latency the scheduler measured.
pub(crate) fn outcome_from(decoded: Decoded, latency_ms: u64) -> DecodeOutcome {
    match decoded {
        Decoded::Found { payload, location } => {
            DecodeOutcome::found(payload, location, latency_ms)
        }
        Decoded::Missed(kind) => DecodeOutcome::missed(kind, latency_ms),
    }
}
