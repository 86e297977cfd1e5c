use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use scanpool_contracts::{
    Decoded, Decoder, DecoderFactory, DecoderFailure, ResultSink, StatsSink,
};
use scanpool_model::{DecodeErrorKind, Frame, PoolSnapshot, SlotId};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{FaultPolicy, ScanPoolConfig};
use crate::error::{PoolError, Result};
use crate::latency::LatencyWindow;
use crate::slot::{WorkerSlot, outcome_from};
use crate::stats::{PoolView, aggregate};
use crate::throttle::ThrottlePolicy;

/// Why a frame was not accepted. Flow control, not failure: callers simply
/// move on to the next frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Arrived before the throttle window since the last completion closed.
    Throttled { retry_after: Duration },
    /// Every usable slot is busy.
    Saturated,
    /// Every slot has been retired after a fatal decoder failure.
    Exhausted,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Throttled { retry_after } => {
                write!(f, "throttled for another {}ms", retry_after.as_millis())
            }
            Rejection::Saturated => f.write_str("all decode slots busy"),
            Rejection::Exhausted => f.write_str("all decode slots retired"),
        }
    }
}

/// Running totals since the pool was built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolCounters {
    pub accepted: u64,
    pub throttled: u64,
    pub saturated: u64,
    pub exhausted: u64,
    pub completed: u64,
    pub faults: u64,
}

impl PoolCounters {
    pub fn rejected(&self) -> u64 {
        self.throttled + self.saturated + self.exhausted
    }
}

#[derive(Clone, Default)]
struct Sinks {
    result: Option<Arc<dyn ResultSink>>,
    stats: Option<Arc<dyn StatsSink>>,
}

struct PoolState {
    slots: Vec<WorkerSlot>,
    window: LatencyWindow,
    last_completion: Option<Instant>,
    last_emitter: Option<SlotId>,
    throttle_interval_ms: u64,
    in_flight: usize,
    /// Completions that have freed their slot but not yet reached the sinks.
    undelivered: usize,
    counters: PoolCounters,
}

impl PoolState {
    fn snapshot(&self) -> PoolSnapshot {
        aggregate(PoolView {
            slots: &self.slots,
            window: &self.window,
            last_emitter: self.last_emitter,
            throttle_interval_ms: self.throttle_interval_ms,
            sequence: self.counters.completed,
        })
    }

    fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.undelivered == 0
    }

    fn throttle_open_at(&self) -> Option<Instant> {
        self.last_completion
            .map(|at| at + Duration::from_millis(self.throttle_interval_ms))
    }
}

struct PoolInner {
    pool_size: usize,
    throttle: ThrottlePolicy,
    decode_timeout: Option<Duration>,
    fault_policy: FaultPolicy,
    factory: Arc<dyn DecoderFactory>,
    runtime: Handle,
    state: Mutex<PoolState>,
    /// Serializes completion handling, including sink notification, so
    /// subscribers observe snapshots in completion order.
    completion: Mutex<()>,
    sinks: RwLock<Sinks>,
    idle: Notify,
}

/// Load-balancing decode scheduler over a fixed pool of decoder slots.
///
/// Frames go to the first idle slot in index order. Submissions are dropped,
/// never queued, when every slot is busy or when they arrive inside the
/// throttle window that follows each completion. The window length is derived
/// from recent decode latency (see [`ThrottlePolicy`]).
///
/// Cloning is cheap; clones drive the same pool.
#[derive(Clone)]
pub struct ScanPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for ScanPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ScanPool");
        debug
            .field("pool_size", &self.inner.pool_size)
            .field("throttle_factor", &self.inner.throttle.factor())
            .field("decode_timeout", &self.inner.decode_timeout)
            .field("fault_policy", &self.inner.fault_policy);

        match self.inner.state.try_lock() {
            Some(state) => {
                debug
                    .field("in_flight", &state.in_flight)
                    .field("throttle_interval_ms", &state.throttle_interval_ms)
                    .field("samples", &state.window.len())
                    .field("counters", &state.counters);
            }
            None => {
                debug.field("state", &"<locked>");
            }
        }

        debug.finish()
    }
}

impl ScanPool {
    pub fn builder() -> ScanPoolBuilder {
        ScanPoolBuilder::default()
    }

    /// Builds a pool with one decoder per slot. Must be called from within a
    /// Tokio runtime; decode tasks are spawned onto it.
    pub fn new(
        config: ScanPoolConfig,
        factory: impl DecoderFactory,
    ) -> Result<Self> {
        Self::builder().config(config).factory(factory).build()
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    /// Offers a frame to the pool. `true` means a slot took it and a
    /// completion will follow at some later point; `false` means it was
    /// dropped.
    pub fn submit(&self, frame: Frame) -> bool {
        self.try_submit(frame).is_ok()
    }

    /// Same decision as [`ScanPool::submit`], with the slot chosen or the
    /// reason for rejecting.
    pub fn try_submit(&self, frame: Frame) -> std::result::Result<SlotId, Rejection> {
        let dispatched_at = Instant::now();

        let (slot, decoder) = {
            let mut state = self.inner.state.lock();

            if let Some(open_at) = state.throttle_open_at()
                && dispatched_at < open_at
            {
                state.counters.throttled += 1;
                let retry_after = open_at - dispatched_at;
                trace!(retry_after_ms = retry_after.as_millis() as u64, "frame throttled");
                return Err(Rejection::Throttled { retry_after });
            }

            let Some(index) = state.slots.iter().position(WorkerSlot::is_available)
            else {
                let rejection = if state.slots.iter().all(|s| s.faulted) {
                    state.counters.exhausted += 1;
                    Rejection::Exhausted
                } else {
                    state.counters.saturated += 1;
                    Rejection::Saturated
                };
                trace!(%rejection, "frame dropped");
                return Err(rejection);
            };

            state.in_flight += 1;
            state.counters.accepted += 1;
            let entry = &mut state.slots[index];
            entry.busy = true;
            (entry.id, Arc::clone(&entry.decoder))
        };

        trace!(%slot, "frame dispatched");
        let inner = Arc::clone(&self.inner);
        let deadline = self.inner.decode_timeout;
        self.inner.runtime.spawn(async move {
            let result = run_decode(slot, decoder, frame, deadline).await;
            inner.complete(slot, dispatched_at, result);
        });

        Ok(slot)
    }

    /// Installs the subscriber for successful decodes, replacing any previous
    /// one.
    pub fn set_result_sink<S: ResultSink + 'static>(&self, sink: S) {
        self.inner.sinks.write().result = Some(Arc::new(sink));
    }

    /// Installs the subscriber for per-completion snapshots, replacing any
    /// previous one.
    pub fn set_stats_sink<S: StatsSink + 'static>(&self, sink: S) {
        self.inner.sinks.write().stats = Some(Arc::new(sink));
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.inner.state.lock().snapshot()
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.inner.state.lock().throttle_interval_ms)
    }

    pub fn counters(&self) -> PoolCounters {
        self.inner.state.lock().counters
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Resolves once no decode is in flight and every completion has reached
    /// the sinks. Never resolves while a decoder hangs without a deadline.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.inner.idle.notified());
            notified.as_mut().enable();
            if self.inner.state.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl PoolInner {
    fn complete(
        &self,
        slot: SlotId,
        dispatched_at: Instant,
        result: std::result::Result<Decoded, DecoderFailure>,
    ) {
        let _serial = self.completion.lock();
        let finished_at = Instant::now();
        let latency_ms =
            u64::try_from(finished_at.duration_since(dispatched_at).as_millis())
                .unwrap_or(u64::MAX);

        let (decoded, failure, replacement) = match result {
            Ok(decoded) => (Some(decoded), None, None),
            Err(failure) => {
                warn!(%slot, error = %failure, "decoder failed");
                (None, Some(failure.to_string()), self.replacement_for(slot))
            }
        };

        let (snapshot, outcome) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let outcome = decoded.map(|decoded| outcome_from(decoded, latency_ms));
            let entry = &mut state.slots[slot.index()];
            entry.busy = false;
            match &outcome {
                Some(outcome) => {
                    entry.last_outcome = Some(outcome.clone());
                    entry.last_failure = None;
                    state.window.push(outcome.latency_ms);
                }
                None => {
                    entry.last_outcome = None;
                    entry.last_failure = failure;
                    match replacement {
                        Some(decoder) => entry.decoder = decoder,
                        None => entry.faulted = true,
                    }
                    state.counters.faults += 1;
                }
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            state.undelivered += 1;

            state.last_emitter = Some(slot);
            state.last_completion = Some(finished_at);
            state.throttle_interval_ms =
                self.throttle.interval_ms(&state.window, state.slots.len());
            state.counters.completed += 1;

            (state.snapshot(), outcome)
        };

        debug!(
            %slot,
            latency_ms,
            error = outcome.as_ref().and_then(|o| o.error).map(DecodeErrorKind::as_str),
            throttle_ms = snapshot.throttle_interval_ms,
            "decode completed"
        );

        let sinks = self.sinks.read().clone();
        if let Some(stats) = &sinks.stats {
            stats.on_stats(&snapshot);
        }
        if let (Some(sink), Some(outcome)) = (&sinks.result, &outcome)
            && let Some(payload) = outcome.payload.as_deref()
        {
            sink.on_result(payload, outcome.location, outcome.latency_ms);
        }

        let mut state = self.state.lock();
        state.undelivered = state.undelivered.saturating_sub(1);
        let drained = state.is_idle();
        drop(state);
        if drained {
            self.idle.notify_waiters();
        }
    }

    fn replacement_for(&self, slot: SlotId) -> Option<Arc<dyn Decoder>> {
        match self.fault_policy {
            FaultPolicy::Retire => {
                warn!(%slot, "retiring decode slot");
                None
            }
            FaultPolicy::Respawn => match self.factory.create(slot) {
                Ok(decoder) => {
                    info!(%slot, decoder = decoder.name(), "respawned decoder");
                    Some(decoder)
                }
                Err(err) => {
                    warn!(%slot, error = %err, "respawn failed, retiring decode slot");
                    None
                }
            },
        }
    }
}

async fn run_decode(
    slot: SlotId,
    decoder: Arc<dyn Decoder>,
    frame: Frame,
    deadline: Option<Duration>,
) -> std::result::Result<Decoded, DecoderFailure> {
    let attempt = AssertUnwindSafe(decoder.decode(frame)).catch_unwind();
    let settled = match deadline {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(settled) => settled,
            Err(_) => {
                warn!(%slot, deadline_ms = limit.as_millis() as u64, "decode timed out");
                return Ok(Decoded::Missed(DecodeErrorKind::TimedOut));
            }
        },
        None => attempt.await,
    };
    settled.unwrap_or_else(|panic| Err(DecoderFailure::Panicked(panic_message(panic))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "decoder panicked".to_string()
    }
}

/// Assembles a [`ScanPool`] from config, a decoder factory and optional
/// subscribers.
#[derive(Default)]
pub struct ScanPoolBuilder {
    config: ScanPoolConfig,
    factory: Option<Arc<dyn DecoderFactory>>,
    sinks: Sinks,
}

impl fmt::Debug for ScanPoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanPoolBuilder")
            .field("config", &self.config)
            .field("has_factory", &self.factory.is_some())
            .field("has_result_sink", &self.sinks.result.is_some())
            .field("has_stats_sink", &self.sinks.stats.is_some())
            .finish()
    }
}

impl ScanPoolBuilder {
    pub fn config(mut self, config: ScanPoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = Some(pool_size);
        self
    }

    pub fn factory(mut self, factory: impl DecoderFactory) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn result_sink<S: ResultSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.result = Some(Arc::new(sink));
        self
    }

    pub fn stats_sink<S: StatsSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.stats = Some(Arc::new(sink));
        self
    }

    pub fn build(self) -> Result<ScanPool> {
        self.config.validate()?;
        let factory = self.factory.ok_or(PoolError::MissingFactory)?;
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let pool_size = self.config.resolved_pool_size();
        let slots = (0..pool_size)
            .map(|index| {
                let id = SlotId(index);
                factory
                    .create(id)
                    .map(|decoder| WorkerSlot::new(id, decoder))
                    .map_err(|source| PoolError::Factory { slot: id, source })
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            pool_size,
            decoder = slots.first().map(|s| s.decoder.name()).unwrap_or("none"),
            "spawned {} decode slots",
            pool_size
        );

        let state = PoolState {
            slots,
            window: LatencyWindow::new(self.config.latency_window),
            last_completion: None,
            last_emitter: None,
            throttle_interval_ms: 0,
            in_flight: 0,
            undelivered: 0,
            counters: PoolCounters::default(),
        };

        Ok(ScanPool {
            inner: Arc::new(PoolInner {
                pool_size,
                throttle: ThrottlePolicy::new(self.config.throttle_factor),
                decode_timeout: self.config.decode_timeout(),
                fault_policy: self.config.fault_policy,
                factory,
                runtime,
                state: Mutex::new(state),
                completion: Mutex::new(()),
                sinks: RwLock::new(self.sinks),
                idle: Notify::new(),
            }),
        })
    }
}
