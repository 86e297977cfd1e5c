//! `scanpoolctl bench`: drive a pool of simulated decoders at a fixed frame
//! rate and report how many frames it admits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, ensure};
use async_trait::async_trait;
use rand::Rng;
use scanpool_core::contracts::{Decoded, Decoder, DecoderFailure};
use scanpool_core::{
    DecodeErrorKind, Frame, PoolCounters, PoolSnapshot, Quad, ScanPool,
    ScanPoolConfig, SlotId,
};
use scanpool_model::Point;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub frames: u64,
    pub fps: f64,
    pub min_latency: Duration,
    pub max_latency: Duration,
    /// Probability that a simulated decode finds a code.
    pub hit_rate: f64,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            frames: 300,
            fps: 30.0,
            min_latency: Duration::from_millis(40),
            max_latency: Duration::from_millis(120),
            hit_rate: 0.3,
        }
    }
}

impl BenchOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.frames > 0, "--frames must be at least 1");
        ensure!(
            self.fps.is_finite() && self.fps > 0.0,
            "--fps must be a positive number"
        );
        ensure!(
            self.min_latency <= self.max_latency,
            "--min-latency-ms must not exceed --max-latency-ms"
        );
        ensure!(
            (0.0..=1.0).contains(&self.hit_rate),
            "--hit-rate must be between 0 and 1"
        );
        Ok(())
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

/// Decoder stand-in with uniformly random latency and hit probability.
#[derive(Debug)]
pub struct SimulatedDecoder {
    slot: SlotId,
    min_latency: Duration,
    max_latency: Duration,
    hit_rate: f64,
    hits: AtomicU64,
}

impl SimulatedDecoder {
    pub fn new(slot: SlotId, options: &BenchOptions) -> Self {
        Self {
            slot,
            min_latency: options.min_latency,
            max_latency: options.max_latency,
            hit_rate: options.hit_rate,
            hits: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Decoder for SimulatedDecoder {
    async fn decode(&self, frame: Frame) -> Result<Decoded, DecoderFailure> {
        let (latency, hit) = {
            let mut rng = rand::rng();
            let latency = rng.random_range(self.min_latency..=self.max_latency);
            (latency, rng.random_bool(self.hit_rate))
        };
        tokio::time::sleep(latency).await;

        if !hit {
            return Ok(Decoded::Missed(DecodeErrorKind::PatternNotFound));
        }
        let n = self.hits.fetch_add(1, Ordering::Relaxed);
        let (w, h) = (frame.width() as i32, frame.height() as i32);
        let location = Quad::new(
            Point::new(0, 0),
            Point::new(w, 0),
            Point::new(w, h),
            Point::new(0, h),
        );
        Ok(Decoded::found(format!("{}:{n}", self.slot), Some(location)))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[derive(Debug)]
pub struct BenchReport {
    pub counters: PoolCounters,
    pub snapshot: PoolSnapshot,
    pub results: u64,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn acceptance_rate(&self) -> f64 {
        let offered = self.counters.accepted + self.counters.rejected();
        if offered == 0 {
            0.0
        } else {
            self.counters.accepted as f64 / offered as f64
        }
    }
}

pub async fn run(
    config: ScanPoolConfig,
    options: BenchOptions,
) -> anyhow::Result<BenchReport> {
    options.validate()?;

    let results = Arc::new(AtomicU64::new(0));
    let counted = Arc::clone(&results);
    let decoder_options = options.clone();

    let pool = ScanPool::builder()
        .config(config)
        .factory(move |slot: SlotId| SimulatedDecoder::new(slot, &decoder_options))
        .result_sink(move |_: &str, _: Option<Quad>, _: u64| {
            counted.fetch_add(1, Ordering::Relaxed);
        })
        .build()
        .context("failed to build bench pool")?;

    info!(
        frames = options.frames,
        fps = options.fps,
        pool_size = pool.pool_size(),
        "starting bench"
    );

    let frame = Frame::filled(64, 64, [255, 255, 255, 255])?;
    let started = Instant::now();
    let mut ticker = tokio::time::interval(options.frame_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    for _ in 0..options.frames {
        ticker.tick().await;
        pool.submit(frame.clone());
    }
    pool.wait_idle().await;

    Ok(BenchReport {
        counters: pool.counters(),
        snapshot: pool.snapshot(),
        results: results.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
    })
}
