use std::fmt;

use scanpool_contracts::{ResultSink, StatsSink};
use scanpool_model::{PoolSnapshot, Quad};
use tokio::sync::broadcast;

/// A successful decode as seen on the bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedEvent {
    pub payload: String,
    pub location: Option<Quad>,
    pub latency_ms: u64,
}

#[derive(Clone, Debug)]
pub enum ScanEvent {
    Decoded(DecodedEvent),
    Stats(PoolSnapshot),
}

/// Lightweight in-process bus that fans pool notifications out to any number
/// of observers. Install it as both sinks; slow receivers lag and drop the
/// oldest events instead of holding up completions.
#[derive(Clone)]
pub struct InProcScanEventBus {
    sender: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl fmt::Debug for InProcScanEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcScanEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcScanEventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ResultSink for InProcScanEventBus {
    fn on_result(&self, payload: &str, location: Option<Quad>, latency_ms: u64) {
        let _ = self.sender.send(ScanEvent::Decoded(DecodedEvent {
            payload: payload.to_string(),
            location,
            latency_ms,
        }));
    }
}

impl StatsSink for InProcScanEventBus {
    fn on_stats(&self, snapshot: &PoolSnapshot) {
        let _ = self.sender.send(ScanEvent::Stats(snapshot.clone()));
    }
}
