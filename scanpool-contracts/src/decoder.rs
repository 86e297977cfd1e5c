use std::sync::Arc;

use async_trait::async_trait;
use scanpool_model::{DecodeErrorKind, Frame, Quad, SlotId};
use thiserror::Error;

/// What a decoder found in one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Found {
        payload: String,
        location: Option<Quad>,
    },
    Missed(DecodeErrorKind),
}

impl Decoded {
    pub fn found(payload: impl Into<String>, location: Option<Quad>) -> Self {
        Decoded::Found {
            payload: payload.into(),
            location,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Decoded::Found { .. })
    }
}

/// The decoder instance can no longer be used. Routine misses are reported
/// through [`Decoded::Missed`] instead.
#[derive(Debug, Error)]
pub enum DecoderFailure {
    #[error("decoder unavailable: {0}")]
    Unavailable(String),
    #[error("decoder panicked: {0}")]
    Panicked(String),
    #[error("decoder backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Opaque decode capability. One instance serves one slot and is never asked
/// for more than one frame at a time; instances must not share mutable state
/// with each other.
#[async_trait]
pub trait Decoder: Send + Sync + 'static {
    async fn decode(&self, frame: Frame) -> Result<Decoded, DecoderFailure>;

    /// Short label used in logs.
    fn name(&self) -> &'static str {
        "decoder"
    }
}

/// Produces one independent decoder per slot.
pub trait DecoderFactory: Send + Sync + 'static {
    fn create(&self, slot: SlotId) -> Result<Arc<dyn Decoder>, DecoderFailure>;
}

impl<F, D> DecoderFactory for F
where
    F: Fn(SlotId) -> D + Send + Sync + 'static,
    D: Decoder,
{
    fn create(&self, slot: SlotId) -> Result<Arc<dyn Decoder>, DecoderFailure> {
        Ok(Arc::new(self(slot)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(&'static str);

    #[async_trait]
    impl Decoder for Constant {
        async fn decode(&self, _frame: Frame) -> Result<Decoded, DecoderFailure> {
            Ok(Decoded::found(self.0, None))
        }
    }

    #[tokio::test]
    async fn closures_act_as_factories() {
        let factory = |slot: SlotId| {
            Constant(if slot.index() == 0 { "first" } else { "other" })
        };
        let frame = Frame::filled(1, 1, [0, 0, 0, 255]).expect("frame");

        let first = factory.create(SlotId(0)).expect("create");
        let other = factory.create(SlotId(3)).expect("create");

        assert_eq!(
            first.decode(frame.clone()).await.expect("decode"),
            Decoded::found("first", None)
        );
        assert_eq!(
            other.decode(frame).await.expect("decode"),
            Decoded::found("other", None)
        );
    }
}
