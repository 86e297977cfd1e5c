use async_trait::async_trait;
use scanpool_contracts::{Decoded, Decoder, DecoderFailure};
use scanpool_model::{DecodeErrorKind, Frame, Point, Quad};
use tracing::trace;

/// QR backend built on `rqrr`. Detection is CPU-bound, so each frame runs
/// on Tokio's blocking pool and never holds up the async workers. A decode
/// deadline abandons the scan without stopping it.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Decoder for RqrrDecoder {
    async fn decode(&self, frame: Frame) -> Result<Decoded, DecoderFailure> {
        tokio::task::spawn_blocking(move || scan(&frame))
            .await
            .map_err(|err| DecoderFailure::Panicked(err.to_string()))
    }

    fn name(&self) -> &'static str {
        "rqrr"
    }
}

pub(crate) fn scan(frame: &Frame) -> Decoded {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let luma = frame.to_luma();

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma[y * width + x]
        });
    let grids = prepared.detect_grids();
    let Some(grid) = grids.first() else {
        return Decoded::Missed(DecodeErrorKind::PatternNotFound);
    };

    match grid.decode() {
        Ok((_meta, content)) => {
            let [tl, tr, br, bl] = grid.bounds;
            let location = Quad::new(
                Point::new(tl.x, tl.y),
                Point::new(tr.x, tr.y),
                Point::new(br.x, br.y),
                Point::new(bl.x, bl.y),
            );
            Decoded::found(content, Some(location))
        }
        Err(err) => {
            trace!(error = ?err, "grid located but payload unreadable");
            Decoded::Missed(DecodeErrorKind::PayloadCorrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_has_no_pattern() {
        let frame = Frame::filled(64, 64, [255, 255, 255, 255]).expect("frame");
        assert_eq!(
            scan(&frame),
            Decoded::Missed(DecodeErrorKind::PatternNotFound)
        );
    }

    #[tokio::test]
    async fn runs_off_the_async_workers() {
        let frame = Frame::filled(32, 32, [0, 0, 0, 255]).expect("frame");
        let decoded = RqrrDecoder::new().decode(frame).await.expect("decode");
        assert!(!decoded.is_found());
    }
}
