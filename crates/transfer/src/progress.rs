//! Transfer speed estimation over a sliding window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default sliding-window width.
const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Maximum retained samples regardless of window width.
const MAX_SAMPLES: usize = 128;

/// Calculates transfer speed from timestamped byte-count samples.
///
/// Samples outside the window are pruned on every insert, so long stalls
/// decay the estimate instead of freezing it.
pub struct SpeedCalculator {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl SpeedCalculator {
    /// Creates a calculator with the given window width.
    pub fn new(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
        }
    }

    /// Records `bytes` transferred at the current instant.
    pub fn record(&mut self, bytes: u64) {
        let now = Instant::now();
        self.samples.push_back((now, bytes));

        while let Some(&(ts, _)) = self.samples.front() {
            if now.duration_since(ts) > self.window && self.samples.len() > 1 {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Average speed in bytes/second across the window.
    ///
    /// Returns 0.0 with fewer than two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(&(first, _)), Some(&(last, _))) = (self.samples.front(), self.samples.back())
        else {
            return 0.0;
        };
        let elapsed = last.duration_since(first);
        if self.samples.len() < 2 || elapsed.is_zero() {
            return 0.0;
        }
        let total: u64 = self.samples.iter().map(|&(_, b)| b).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to move `remaining` more bytes, if speed is known.
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    /// Drops all recorded samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
