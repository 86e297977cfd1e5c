//! Core data model definitions shared across scanpool crates.
#![allow(missing_docs)]

pub mod error;
pub mod frame;
pub mod geometry;
pub mod ids;
pub mod outcome;
pub mod snapshot;

pub use error::{ModelError, Result as ModelResult};
pub use frame::Frame;
pub use geometry::{Point, Quad};
pub use ids::SlotId;
pub use outcome::{DecodeErrorKind, DecodeOutcome};
pub use snapshot::{PoolSnapshot, WorkerStatusView};
