//! Pool-wide snapshot assembly. Pure: reads slot state and the latency
//! window, never mutates them.

use scanpool_model::{PoolSnapshot, SlotId, WorkerStatusView};

use crate::latency::LatencyWindow;
use crate::slot::WorkerSlot;
use crate::throttle::scan_frequency_hz;

pub(crate) struct PoolView<'a> {
    pub(crate) slots: &'a [WorkerSlot],
    pub(crate) window: &'a LatencyWindow,
    pub(crate) last_emitter: Option<SlotId>,
    pub(crate) throttle_interval_ms: u64,
    pub(crate) sequence: u64,
}

pub(crate) fn aggregate(view: PoolView<'_>) -> PoolSnapshot {
    let workers = view
        .slots
        .iter()
        .map(|slot| {
            let last = slot.last_outcome.as_ref();
            WorkerStatusView {
                slot: slot.id,
                busy: slot.busy,
                faulted: slot.faulted,
                is_last_emitter: view.last_emitter == Some(slot.id),
                latency_ms: last.map(|o| o.latency_ms),
                error: last.and_then(|o| o.error),
                payload: last.and_then(|o| o.payload.clone()),
                failure: slot.last_failure.clone(),
            }
        })
        .collect();

    PoolSnapshot {
        sequence: view.sequence,
        throttle_interval_ms: view.throttle_interval_ms,
        samples: view.window.to_vec(),
        scan_frequency_hz: scan_frequency_hz(view.window, view.slots.len()),
        workers,
    }
}
