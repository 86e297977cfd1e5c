use scanpool_model::{PoolSnapshot, Quad};

/// Receives every successful decode.
pub trait ResultSink: Send + Sync {
    fn on_result(&self, payload: &str, location: Option<Quad>, latency_ms: u64);
}

impl<F> ResultSink for F
where
    F: Fn(&str, Option<Quad>, u64) + Send + Sync,
{
    fn on_result(&self, payload: &str, location: Option<Quad>, latency_ms: u64) {
        self(payload, location, latency_ms)
    }
}

/// Receives the pool snapshot after every completion, successful or not.
pub trait StatsSink: Send + Sync {
    fn on_stats(&self, snapshot: &PoolSnapshot);
}

impl<F> StatsSink for F
where
    F: Fn(&PoolSnapshot) + Send + Sync,
{
    fn on_stats(&self, snapshot: &PoolSnapshot) {
        self(snapshot)
    }
}
