//! # scanpool-core
//!
//! Load-balancing decode scheduler for optical codes in live frame streams.
//!
//! A [`ScanPool`] owns a fixed number of decoder slots. Each frame offered
//! through [`ScanPool::submit`] is either handed to the first idle slot and
//! decoded on a spawned task, or dropped because every slot is busy or
//! because it arrived inside the throttle window. The throttle window is
//! recomputed after every completion from the most recent latency samples:
//!
//! ```text
//! interval = ceil(mean(latency window) / pool size * throttle factor)
//! ```
//!
//! After every completion the pool builds a [`PoolSnapshot`] and hands it to
//! the stats sink; successful decodes also reach the result sink.
//!
//! ```no_run
//! use scanpool_core::prelude::*;
//!
//! # async fn run(frame: Frame) -> Result<(), PoolError> {
//! let pool = ScanPool::builder()
//!     .factory(|_: SlotId| RqrrDecoder::new())
//!     .result_sink(|payload: &str, _: Option<Quad>, latency_ms: u64| {
//!         println!("{payload} ({latency_ms}ms)");
//!     })
//!     .build()?;
//!
//! if !pool.submit(frame) {
//!     // throttled or saturated; the next frame will get its chance
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decoders;
pub mod error;
pub mod event_bus;
pub mod latency;
pub mod scheduler;
mod slot;
mod stats;
pub mod throttle;

pub use config::{FaultPolicy, ScanPoolConfig, default_pool_size};
pub use error::{PoolError, Result};
pub use event_bus::{DecodedEvent, InProcScanEventBus, ScanEvent};
pub use latency::LatencyWindow;
pub use scheduler::{PoolCounters, Rejection, ScanPool, ScanPoolBuilder};
pub use throttle::ThrottlePolicy;

pub use scanpool_contracts as contracts;
pub use scanpool_model as model;
pub use scanpool_model::{
    DecodeErrorKind, DecodeOutcome, Frame, PoolSnapshot, Quad, SlotId,
    WorkerStatusView,
};

/// Everything needed to build a pool and plug decoders and sinks into it.
pub mod prelude {
    #[cfg(feature = "rqrr")]
    pub use crate::decoders::RqrrDecoder;
    pub use crate::decoders::{InvertingDecoder, ScriptStep, ScriptedDecoder};
    pub use crate::{
        FaultPolicy, InProcScanEventBus, PoolError, Rejection, ScanEvent,
        ScanPool, ScanPoolConfig,
    };
    pub use scanpool_contracts::prelude::*;
    pub use scanpool_model::{DecodeOutcome, PoolSnapshot, WorkerStatusView};
}
