use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scanpool_contracts::{Decoded, Decoder, DecoderFailure};
use scanpool_model::{DecodeErrorKind, Frame};

/// One scripted reaction to a frame.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Wait `delay`, then answer with `decoded`.
    Answer { delay: Duration, decoded: Decoded },
    /// Wait `delay`, then fail fatally.
    Fail { delay: Duration, reason: String },
    /// Never settle.
    Hang,
}

/// Decoder that replays a fixed script, cycling once it reaches the end.
/// Delays run on the Tokio clock, so paused-time tests see exact latencies.
#[derive(Debug)]
pub struct ScriptedDecoder {
    steps: Vec<ScriptStep>,
    cursor: AtomicUsize,
}

impl ScriptedDecoder {
    /// An empty script hangs on every frame.
    pub fn from_steps(mut steps: Vec<ScriptStep>) -> Self {
        if steps.is_empty() {
            steps.push(ScriptStep::Hang);
        }
        Self {
            steps,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn found(delay: Duration, payload: impl Into<String>) -> Self {
        Self::from_steps(vec![ScriptStep::Answer {
            delay,
            decoded: Decoded::found(payload, None),
        }])
    }

    pub fn missed(delay: Duration, kind: DecodeErrorKind) -> Self {
        Self::from_steps(vec![ScriptStep::Answer {
            delay,
            decoded: Decoded::Missed(kind),
        }])
    }

    pub fn failing(delay: Duration, reason: impl Into<String>) -> Self {
        Self::from_steps(vec![ScriptStep::Fail {
            delay,
            reason: reason.into(),
        }])
    }

    pub fn hanging() -> Self {
        Self::from_steps(vec![ScriptStep::Hang])
    }

    /// Number of frames this decoder has been handed.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Decoder for ScriptedDecoder {
    async fn decode(&self, _frame: Frame) -> Result<Decoded, DecoderFailure> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.steps.len();
        match &self.steps[index] {
            ScriptStep::Answer { delay, decoded } => {
                tokio::time::sleep(*delay).await;
                Ok(decoded.clone())
            }
            ScriptStep::Fail { delay, reason } => {
                tokio::time::sleep(*delay).await;
                Err(DecoderFailure::Unavailable(reason.clone()))
            }
            ScriptStep::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
