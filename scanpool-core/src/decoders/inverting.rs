use async_trait::async_trait;
use scanpool_contracts::{Decoded, Decoder, DecoderFailure};
use scanpool_model::{DecodeErrorKind, Frame};

/// Runs the inner decoder on the frame, and again on its colour-inverted
/// copy when the first pass comes up empty. Catches light-on-dark codes that
/// a dark-on-light binarizer misses.
#[derive(Debug)]
pub struct InvertingDecoder<D> {
    inner: D,
}

impl<D: Decoder> InvertingDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

#[async_trait]
impl<D: Decoder> Decoder for InvertingDecoder<D> {
    async fn decode(&self, frame: Frame) -> Result<Decoded, DecoderFailure> {
        let first = match self.inner.decode(frame.clone()).await? {
            found @ Decoded::Found { .. } => return Ok(found),
            Decoded::Missed(DecodeErrorKind::TimedOut) => {
                return Ok(Decoded::Missed(DecodeErrorKind::TimedOut));
            }
            Decoded::Missed(kind) => kind,
        };

        match self.inner.decode(frame.inverted()).await? {
            found @ Decoded::Found { .. } => Ok(found),
            // A located-but-unreadable code says more than "nothing here".
            Decoded::Missed(second) => {
                if first == DecodeErrorKind::PayloadCorrupted {
                    Ok(Decoded::Missed(first))
                } else {
                    Ok(Decoded::Missed(second))
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Finds a code only in frames whose first pixel is dark.
    struct DarkOnly;

    #[async_trait]
    impl Decoder for DarkOnly {
        async fn decode(&self, frame: Frame) -> Result<Decoded, DecoderFailure> {
            if frame.luma(0, 0) < 128 {
                Ok(Decoded::found("dark", None))
            } else {
                Ok(Decoded::Missed(DecodeErrorKind::PatternNotFound))
            }
        }
    }

    #[tokio::test]
    async fn retries_on_inverted_frame() {
        let decoder = InvertingDecoder::new(DarkOnly);
        let light = Frame::filled(2, 2, [250, 250, 250, 255]).expect("frame");
        assert_eq!(
            decoder.decode(light).await.expect("decode"),
            Decoded::found("dark", None)
        );
    }

    #[tokio::test]
    async fn first_pass_hit_skips_inversion() {
        let decoder = InvertingDecoder::new(DarkOnly);
        let dark = Frame::filled(2, 2, [5, 5, 5, 255]).expect("frame");
        assert!(decoder.decode(dark).await.expect("decode").is_found());
    }

    struct CorruptThenNothing;

    #[async_trait]
    impl Decoder for CorruptThenNothing {
        async fn decode(&self, frame: Frame) -> Result<Decoded, DecoderFailure> {
            if frame.luma(0, 0) < 128 {
                Ok(Decoded::Missed(DecodeErrorKind::PayloadCorrupted))
            } else {
                Ok(Decoded::Missed(DecodeErrorKind::PatternNotFound))
            }
        }
    }

    #[tokio::test]
    async fn prefers_corrupted_over_not_found() {
        let decoder = InvertingDecoder::new(CorruptThenNothing);
        let dark = Frame::filled(1, 1, [0, 0, 0, 255]).expect("frame");
        assert_eq!(
            decoder.decode(dark).await.expect("decode"),
            Decoded::Missed(DecodeErrorKind::PayloadCorrupted)
        );
    }
}
