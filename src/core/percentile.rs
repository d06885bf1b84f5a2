use std::time::Duration;

use super::circular_buffer::CircularBuffer;

/// Default bounded window for endpoint response-time monitoring.
pub const RESPONSE_TIME_WINDOW: usize = 300;

/// Percentile summary over a [`ResponseTimeWindow`], in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PercentileSummary {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub samples: usize,
}

/// Bounded window of recent response times with nearest-rank percentiles.
///
/// Nearest-rank: `index = ceil(p/100 * n) - 1`, clamped to `>= 0`. A sorted
/// copy per query is fine at this window size and query rate (monitoring
/// reads, not per-frame hot path).
#[derive(Debug, Clone)]
pub struct ResponseTimeWindow {
    samples: CircularBuffer<u64>,
}

impl ResponseTimeWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: CircularBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.samples
            .push(elapsed.as_micros().min(u64::MAX as u128) as u64);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn percentile(&self, pct: f64) -> u64 {
        let n = self.samples.len();
        if n == 0 {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let rank = (pct / 100.0 * n as f64).ceil() as i64 - 1;
        let index = rank.max(0) as usize;
        sorted[index.min(n - 1)]
    }

    pub fn summary(&self) -> PercentileSummary {
        PercentileSummary {
            p50_us: self.percentile(50.0),
            p95_us: self.percentile(95.0),
            p99_us: self.percentile(99.0),
            samples: self.samples.len(),
        }
    }
}

impl Default for ResponseTimeWindow {
    fn default() -> Self {
        Self::new(RESPONSE_TIME_WINDOW)
    }
}
