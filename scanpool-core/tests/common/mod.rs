#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use scanpool_core::contracts::{ResultSink, StatsSink};
use scanpool_core::{Frame, PoolSnapshot, Quad};

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn frame() -> Frame {
    Frame::filled(4, 4, [255, 255, 255, 255]).expect("frame")
}

/// Captures everything the pool reports to its sinks.
#[derive(Clone, Default)]
pub struct Recorder {
    stats: Arc<Mutex<Vec<PoolSnapshot>>>,
    results: Arc<Mutex<Vec<(String, Option<Quad>, u64)>>>,
}

impl Recorder {
    pub fn stats_sink(&self) -> impl StatsSink + 'static {
        let stats = Arc::clone(&self.stats);
        move |snapshot: &PoolSnapshot| stats.lock().push(snapshot.clone())
    }

    pub fn result_sink(&self) -> impl ResultSink + 'static {
        let results = Arc::clone(&self.results);
        move |payload: &str, location: Option<Quad>, latency_ms: u64| {
            results
                .lock()
                .push((payload.to_string(), location, latency_ms))
        }
    }

    pub fn stats(&self) -> Vec<PoolSnapshot> {
        self.stats.lock().clone()
    }

    pub fn results(&self) -> Vec<(String, Option<Quad>, u64)> {
        self.results.lock().clone()
    }
}
