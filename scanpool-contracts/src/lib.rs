//! Trait surfaces that describe how decoders and subscribers plug into the
//! scanpool scheduler.

pub mod decoder;
pub mod sink;

pub use decoder::{Decoded, Decoder, DecoderFactory, DecoderFailure};
pub use sink::{ResultSink, StatsSink};

/// Frequently used traits for decoder backends and subscribers.
pub mod prelude {
    pub use super::decoder::{Decoded, Decoder, DecoderFactory, DecoderFailure};
    pub use super::sink::{ResultSink, StatsSink};
    pub use async_trait::async_trait;
    pub use scanpool_model::{DecodeErrorKind, Frame, Quad, SlotId};
}
