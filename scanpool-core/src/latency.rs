use std::collections::VecDeque;

/// Bounded FIFO of the most recent decode latencies across every slot.
#[derive(Clone, Debug)]
pub struct LatencyWindow {
    capacity: usize,
    samples: VecDeque<u64>,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a sample and returns the one evicted to make room, if any.
    pub fn push(&mut self, latency_ms: u64) -> Option<u64> {
        let evicted = if self.samples.len() == self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(latency_ms);
        evicted
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sum(&self) -> u128 {
        self.samples.iter().map(|&s| s as u128).sum()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum() as f64 / self.samples.len() as f64)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u64> {
        self.iter().collect()
    }
}
