mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Recorder, frame, ms};
use scanpool_core::prelude::*;

#[tokio::test(start_paused = true)]
async fn failing_decoder_retires_its_slot_by_default() {
    let recorder = Recorder::default();
    let pool = ScanPool::builder()
        .pool_size(1)
        .factory(|_: SlotId| ScriptedDecoder::failing(ms(5), "camera went away"))
        .result_sink(recorder.result_sink())
        .stats_sink(recorder.stats_sink())
        .build()
        .expect("pool");

    assert!(pool.submit(frame()));
    pool.wait_idle().await;

    let stats = recorder.stats();
    assert_eq!(stats.len(), 1);
    let slot = stats[0].worker(SlotId(0)).expect("slot 0");
    assert!(slot.faulted);
    assert!(!slot.busy);
    assert!(slot.is_last_emitter);
    // A fatal failure carries no latency sample.
    assert!(stats[0].samples.is_empty());
    assert!(recorder.results().is_empty());

    assert_eq!(pool.try_submit(frame()), Err(Rejection::Exhausted));
    let counters = pool.counters();
    assert_eq!(counters.faults, 1);
    assert_eq!(counters.completed, 1);
    assert_eq!(counters.exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn retired_slot_is_skipped_while_others_keep_working() {
    let pool = ScanPool::builder()
        .pool_size(2)
        .factory(|slot: SlotId| match slot.index() {
            0 => ScriptedDecoder::failing(ms(1), "broken"),
            _ => ScriptedDecoder::found(ms(4), "healthy"),
        })
        .build()
        .expect("pool");

    assert_eq!(pool.try_submit(frame()), Ok(SlotId(0)));
    pool.wait_idle().await;

    assert_eq!(pool.try_submit(frame()), Ok(SlotId(1)));
    assert_eq!(pool.try_submit(frame()), Err(Rejection::Saturated));
    pool.wait_idle().await;

    let snapshot = pool.snapshot();
    assert!(snapshot.worker(SlotId(0)).expect("slot 0").faulted);
    assert_eq!(
        snapshot.worker(SlotId(1)).expect("slot 1").payload.as_deref(),
        Some("healthy")
    );
}

#[tokio::test(start_paused = true)]
async fn respawn_policy_replaces_a_failed_decoder() {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let recorder = Recorder::default();
    let pool = ScanPool::builder()
        .config(ScanPoolConfig::default().with_fault_policy(FaultPolicy::Respawn))
        .pool_size(1)
        .factory(move |_: SlotId| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ScriptedDecoder::failing(ms(5), "driver reset")
            } else {
                ScriptedDecoder::found(ms(5), "ok")
            }
        })
        .result_sink(recorder.result_sink())
        .build()
        .expect("pool");

    assert!(pool.submit(frame()));
    pool.wait_idle().await;
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert!(!pool.snapshot().worker(SlotId(0)).expect("slot 0").faulted);

    tokio::time::sleep(pool.throttle_interval()).await;
    assert!(pool.submit(frame()));
    pool.wait_idle().await;

    let results = recorder.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, "ok");
    assert_eq!(pool.counters().faults, 1);
}

#[tokio::test(start_paused = true)]
async fn respawned_failure_does_not_replay_the_previous_payload() {
    let recorder = Recorder::default();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let pool = ScanPool::builder()
        .config(ScanPoolConfig::default().with_fault_policy(FaultPolicy::Respawn))
        .pool_size(1)
        .factory(move |_: SlotId| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ScriptedDecoder::from_steps(vec![
                    ScriptStep::Answer {
                        delay: ms(5),
                        decoded: Decoded::found("X", None),
                    },
                    ScriptStep::Fail {
                        delay: ms(5),
                        reason: "sensor lost".into(),
                    },
                ])
            } else {
                ScriptedDecoder::found(ms(5), "Y")
            }
        })
        .stats_sink(recorder.stats_sink())
        .result_sink(recorder.result_sink())
        .build()
        .expect("pool");

    assert!(pool.submit(frame()));
    pool.wait_idle().await;
    tokio::time::sleep(pool.throttle_interval()).await;
    assert!(pool.submit(frame()));
    pool.wait_idle().await;

    let stats = recorder.stats();
    assert_eq!(stats.len(), 2);
    let slot = stats[1].worker(SlotId(0)).expect("slot 0");
    assert!(slot.is_last_emitter);
    assert!(!slot.faulted);
    assert_eq!(slot.payload, None);
    assert_eq!(slot.error, None);
    assert_eq!(slot.latency_ms, None);
    assert_eq!(
        slot.failure.as_deref(),
        Some("decoder unavailable: sensor lost")
    );
    assert_eq!(recorder.results().len(), 1);

    // The next success clears the failure marker.
    tokio::time::sleep(pool.throttle_interval()).await;
    assert!(pool.submit(frame()));
    pool.wait_idle().await;
    let snapshot = pool.snapshot();
    let slot = snapshot.worker(SlotId(0)).expect("slot 0");
    assert_eq!(slot.failure, None);
    assert_eq!(slot.payload.as_deref(), Some("Y"));
}

#[tokio::test(start_paused = true)]
async fn deadline_turns_a_hung_decode_into_a_timeout() {
    let recorder = Recorder::default();
    let pool = ScanPool::builder()
        .config(ScanPoolConfig::default().with_decode_timeout(ms(30)))
        .pool_size(1)
        .factory(|_: SlotId| ScriptedDecoder::hanging())
        .stats_sink(recorder.stats_sink())
        .build()
        .expect("pool");

    assert!(pool.submit(frame()));
    tokio::time::sleep(ms(10)).await;
    assert!(pool.snapshot().worker(SlotId(0)).expect("slot 0").busy);

    pool.wait_idle().await;
    let snapshot = pool.snapshot();
    let slot = snapshot.worker(SlotId(0)).expect("slot 0");
    assert!(!slot.busy);
    assert!(!slot.faulted);
    assert_eq!(slot.error, Some(DecodeErrorKind::TimedOut));
    assert_eq!(slot.latency_ms, Some(30));
    assert_eq!(snapshot.samples, vec![30]);
    assert_eq!(recorder.stats().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_slot_takes_the_next_frame() {
    let pool = ScanPool::builder()
        .config(ScanPoolConfig::default().with_decode_timeout(ms(30)))
        .pool_size(1)
        .factory(|_: SlotId| {
            ScriptedDecoder::from_steps(vec![
                ScriptStep::Hang,
                ScriptStep::Answer {
                    delay: ms(5),
                    decoded: Decoded::found("late", None),
                },
            ])
        })
        .build()
        .expect("pool");

    assert!(pool.submit(frame()));
    pool.wait_idle().await;
    assert_eq!(pool.in_flight(), 0);

    // ceil(30 * 1.2) = 36ms window.
    tokio::time::sleep(pool.throttle_interval()).await;
    assert_eq!(pool.try_submit(frame()), Ok(SlotId(0)));
    pool.wait_idle().await;
    assert_eq!(
        pool.snapshot().worker(SlotId(0)).expect("slot 0").payload.as_deref(),
        Some("late")
    );
}

#[tokio::test(start_paused = true)]
async fn hung_decode_without_deadline_keeps_its_slot() {
    let pool = ScanPool::builder()
        .pool_size(1)
        .factory(|_: SlotId| ScriptedDecoder::hanging())
        .build()
        .expect("pool");

    assert!(pool.submit(frame()));
    tokio::time::sleep(ms(10_000)).await;
    assert_eq!(pool.in_flight(), 1);
    assert_eq!(pool.try_submit(frame()), Err(Rejection::Saturated));
    assert_eq!(pool.counters().completed, 0);
}

#[derive(Debug)]
struct Exploding;

#[async_trait]
impl Decoder for Exploding {
    async fn decode(&self, _frame: Frame) -> Result<Decoded, DecoderFailure> {
        panic!("decoder blew up");
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_decoder_counts_as_a_fault() {
    let recorder = Recorder::default();
    let pool = ScanPool::builder()
        .pool_size(1)
        .factory(|_: SlotId| Exploding)
        .stats_sink(recorder.stats_sink())
        .build()
        .expect("pool");

    assert!(pool.submit(frame()));
    pool.wait_idle().await;

    assert_eq!(recorder.stats().len(), 1);
    assert!(pool.snapshot().worker(SlotId(0)).expect("slot 0").faulted);
    assert_eq!(pool.counters().faults, 1);
}

/// Hands out decoders for slot 0 only.
struct SingleCamera;

impl DecoderFactory for SingleCamera {
    fn create(&self, slot: SlotId) -> Result<Arc<dyn Decoder>, DecoderFailure> {
        if slot.index() == 0 {
            Ok(Arc::new(ScriptedDecoder::hanging()))
        } else {
            Err(DecoderFailure::Unavailable("no second camera".into()))
        }
    }
}

#[tokio::test]
async fn factory_failure_aborts_the_build() {
    let err = ScanPool::builder()
        .pool_size(2)
        .factory(SingleCamera)
        .build()
        .expect_err("factory refuses slot 1");

    match err {
        PoolError::Factory { slot, .. } => assert_eq!(slot, SlotId(1)),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let err = ScanPool::builder()
        .pool_size(0)
        .factory(|_: SlotId| ScriptedDecoder::hanging())
        .build()
        .expect_err("zero slots");
    assert!(matches!(err, PoolError::InvalidConfig(_)));
}
