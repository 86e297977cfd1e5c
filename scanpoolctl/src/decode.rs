//! `scanpoolctl decode`: push image files through a QR pool.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use parking_lot::Mutex;
use scanpool_core::contracts::{Decoder, DecoderFactory, DecoderFailure};
use scanpool_core::decoders::{InvertingDecoder, RqrrDecoder};
use scanpool_core::{
    DecodeErrorKind, Frame, PoolSnapshot, Rejection, ScanPool, ScanPoolConfig,
    SlotId,
};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub paths: Vec<PathBuf>,
    /// Retry each frame with inverted luminance when nothing is found.
    pub invert: bool,
    /// Cadence at which frames are offered to the pool.
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Found { payload: String, latency_ms: u64 },
    Missed { error: DecodeErrorKind, latency_ms: u64 },
    Failed,
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

#[derive(Debug, Default)]
pub struct DecodeReport {
    pub files: Vec<FileReport>,
}

impl DecodeReport {
    pub fn found(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Found { .. }))
            .count()
    }
}

#[derive(Debug)]
struct QrFactory {
    invert: bool,
}

impl DecoderFactory for QrFactory {
    fn create(&self, _slot: SlotId) -> Result<Arc<dyn Decoder>, DecoderFailure> {
        Ok(if self.invert {
            Arc::new(InvertingDecoder::new(RqrrDecoder::new()))
        } else {
            Arc::new(RqrrDecoder::new())
        })
    }
}

/// Files dispatched to each slot, oldest first. A slot decodes one frame at
/// a time, so its completions arrive in dispatch order.
#[derive(Debug, Default)]
struct Dispatched {
    pending: HashMap<SlotId, VecDeque<PathBuf>>,
    reports: Vec<FileReport>,
}

pub fn load_frame(path: &Path) -> anyhow::Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?;
    Frame::try_from(&image)
        .with_context(|| format!("unusable image {}", path.display()))
}

pub async fn run(
    config: ScanPoolConfig,
    options: DecodeOptions,
) -> anyhow::Result<DecodeReport> {
    if options.paths.is_empty() {
        bail!("no image paths given");
    }

    let frames = options
        .paths
        .iter()
        .map(|path| load_frame(path).map(|frame| (path.clone(), frame)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let dispatched = Arc::new(Mutex::new(Dispatched::default()));
    let sink_state = Arc::clone(&dispatched);

    let pool = ScanPool::builder()
        .config(config)
        .factory(QrFactory {
            invert: options.invert,
        })
        .stats_sink(move |snapshot: &PoolSnapshot| {
            record_completion(&mut sink_state.lock(), snapshot);
        })
        .build()
        .context("failed to build decode pool")?;

    info!(
        files = frames.len(),
        pool_size = pool.pool_size(),
        invert = options.invert,
        "decoding images"
    );

    let mut ticker = tokio::time::interval(options.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    for (path, frame) in frames {
        loop {
            ticker.tick().await;
            // Held across the submit so the completion cannot be recorded
            // before its file is.
            let accepted = {
                let mut state = dispatched.lock();
                pool.try_submit(frame.clone()).inspect(|slot| {
                    state
                        .pending
                        .entry(*slot)
                        .or_default()
                        .push_back(path.clone());
                })
            };
            match accepted {
                Ok(slot) => {
                    debug!(%slot, path = %path.display(), "frame accepted");
                    break;
                }
                Err(Rejection::Throttled { retry_after }) => {
                    tokio::time::sleep(retry_after).await;
                }
                Err(Rejection::Saturated) => {}
                Err(Rejection::Exhausted) => {
                    bail!("every decoder has failed; giving up");
                }
            }
        }
    }

    pool.wait_idle().await;

    let mut state = dispatched.lock();
    let mut files = std::mem::take(&mut state.reports);
    files.sort_by_key(|report| {
        options
            .paths
            .iter()
            .position(|p| *p == report.path)
            .unwrap_or(usize::MAX)
    });
    Ok(DecodeReport { files })
}

fn record_completion(state: &mut Dispatched, snapshot: &PoolSnapshot) {
    let Some(worker) = snapshot.last_emitter() else {
        return;
    };
    let Some(path) = state
        .pending
        .get_mut(&worker.slot)
        .and_then(VecDeque::pop_front)
    else {
        return;
    };

    let latency_ms = worker.latency_ms.unwrap_or_default();
    let outcome = if worker.faulted || worker.failure.is_some() {
        FileOutcome::Failed
    } else if let Some(payload) = &worker.payload {
        FileOutcome::Found {
            payload: payload.clone(),
            latency_ms,
        }
    } else {
        FileOutcome::Missed {
            error: worker.error.unwrap_or(DecodeErrorKind::PatternNotFound),
            latency_ms,
        }
    };
    state.reports.push(FileReport { path, outcome });
}
